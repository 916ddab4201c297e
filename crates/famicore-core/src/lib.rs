//! NES emulation core.
//!
//! This crate wires the CPU, PPU, APU, and cartridge mapper to a single
//! system [`Bus`] and drives them from one master clock. The driving loop
//! is pull-based:
//!
//! ```no_run
//! use famicore_core::Bus;
//!
//! let mut nes = Bus::from_file("game.nes").expect("valid ROM");
//! loop {
//!     nes.execute_cycle();
//!     if nes.ppu().frame_ready() {
//!         let frame = nes.ppu_mut().take_frame();
//!         // hand the 256x240 ARGB frame to the display layer
//!         # let _ = frame;
//!         # break;
//!     }
//! }
//! ```
//!
//! Between cycles the driver may set controller state, drain audio
//! samples, reset the machine, or save/restore the complete state.
//! Emulation itself never fails at runtime: every bus access yields a
//! defined byte, exactly like the hardware.

pub mod audio;
pub mod bus;
pub mod controller;
pub mod save_state;

pub use audio::{AudioSink, SampleRing, SAMPLE_RATE};
pub use bus::{Bus, CPU_CLOCK_HZ};
pub use controller::Controller;
pub use famicore_mappers::{Rom, RomError};
pub use famicore_state::SaveStateError;
