//! Dot-accurate Ricoh 2C02 PPU core.
//!
//! The PPU owns its nametable RAM, palette RAM, and OAM; pattern-table
//! space belongs to the cartridge and is reached through the [`PpuBus`]
//! handle supplied per call. Timing is NTSC: 262 scanlines of 341 dots,
//! three dots per CPU cycle, with the odd-frame dot skip on the pre-render
//! line.
//!
//! Output is a 256x240 `0xAARRGGBB` frame published once per frame at the
//! start of vertical blank; consumers poll [`Ppu::frame_ready`] and call
//! [`Ppu::take_frame`].

pub mod background;
pub mod palette;
pub mod ppu;
pub mod registers;
pub mod scroll;
pub mod sprites;

pub use ppu::{FRAME_HEIGHT, FRAME_WIDTH, Ppu};
pub use registers::{PpuCtrl, PpuMask, PpuStatus};

use famicore_mappers::{Mirroring, ScanlineEffect};

/// The PPU's window onto the cartridge.
///
/// Pattern-table accesses are routed here so mappers can bank CHR and -
/// in MMC2's case - react to the reads themselves. The handle also
/// reports the live mirroring mode (four-screen boards serve nametable
/// space through the CHR path) and carries the dot-260 end-of-scanline
/// notification that clocks the MMC3 IRQ counter.
pub trait PpuBus {
    /// Emulated CHR read; may move mapper latches.
    fn read_chr(&mut self, addr: u16) -> u8;

    /// Side-effect-free CHR snapshot.
    fn view_chr(&self, addr: u16) -> u8;

    /// CHR write (effective on CHR-RAM boards).
    fn write_chr(&mut self, addr: u16, value: u8);

    /// Current nametable mirroring.
    fn mirroring(&self) -> Mirroring;

    /// End-of-scanline notification; returns whether the mapper asserts
    /// its IRQ line.
    fn end_scanline(&mut self) -> ScanlineEffect;
}
