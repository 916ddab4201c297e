//! NES 2A03 APU core.
//!
//! Models the two pulse channels (envelope, sweep, length counter), the
//! frame counter with its 4/5-step sequencer and frame IRQ, and the DMC's
//! sample-fetch DMA plumbing. Triangle and noise are accepted as register
//! writes but not synthesized, and the DMC contributes memory traffic but
//! no audio; the mix is simply `(pulse1 + pulse2) / 10.0`.

pub mod apu;
pub mod dmc;
pub mod envelope;
pub mod frame_counter;
pub mod length_counter;
pub mod pulse;
pub mod sweep;

pub use apu::Apu;
pub use dmc::Dmc;
pub use envelope::Envelope;
pub use frame_counter::{FrameClocks, FrameCounter};
pub use length_counter::LengthCounter;
pub use pulse::Pulse;
pub use sweep::Sweep;
