//! Mapper dispatch.
//!
//! Cartridge boards are modeled as one tagged enum rather than a trait
//! object: every variant's registers live inline, dispatch is an exhaustive
//! match, and a ROM load allocates nothing beyond the ROM/RAM vectors
//! themselves.
//!
//! Two access paths exist for both PRG and CHR space. `view_*` is a
//! side-effect-free snapshot used by debuggers and the disassembler; `read_*`
//! is the emulated bus access and may move internal state (MMC2 flips its CHR
//! latches on specific pattern-table reads).

use crate::axrom::Axrom;
use crate::cnrom::Cnrom;
use crate::gxrom::Gxrom;
use crate::mmc1::Mmc1;
use crate::mmc2::Mmc2;
use crate::mmc3::Mmc3;
use crate::nrom::Nrom;
use crate::rom::{Rom, RomError};
use crate::uxrom::Uxrom;
use famicore_state::{Deserializer, SaveStateError, Serializer};
use std::io::{Read, Write};

/// Nametable mirroring mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mirroring {
    /// Horizontal mirroring ($2000/$2400 share, $2800/$2C00 share).
    #[default]
    Horizontal,
    /// Vertical mirroring ($2000/$2800 share, $2400/$2C00 share).
    Vertical,
    /// Single-screen, lower bank.
    OneScreenLower,
    /// Single-screen, upper bank.
    OneScreenUpper,
    /// Four-screen layout backed by cartridge VRAM.
    FourScreen,
}

/// Outcome of the end-of-scanline notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanlineEffect {
    /// Nothing happened.
    None,
    /// The mapper's IRQ line is asserted.
    Irq,
}

/// Size of the PRG-RAM window at $6000-$7FFF.
pub(crate) const PRG_RAM_SIZE: usize = 8 * 1024;

/// CPU address range served by PRG-RAM.
pub(crate) fn prg_ram_slot(addr: u16) -> Option<usize> {
    if (0x6000..=0x7FFF).contains(&addr) {
        Some(usize::from(addr - 0x6000))
    } else {
        None
    }
}

/// A cartridge mapper.
///
/// Selected once at ROM load from the iNES mapper id; the variant owns the
/// PRG/CHR vectors and whatever banking registers the board carries.
#[derive(Debug, Clone)]
pub enum Mapper {
    /// Mapper 0 (NROM): no banking.
    Nrom(Nrom),
    /// Mapper 1 (MMC1): serial shift register banking.
    Mmc1(Mmc1),
    /// Mapper 2 (UxROM): switchable 16 KiB PRG bank.
    Uxrom(Uxrom),
    /// Mapper 3 (CNROM): switchable 8 KiB CHR bank.
    Cnrom(Cnrom),
    /// Mapper 4 (MMC3): fine-grained banking plus scanline IRQ.
    Mmc3(Mmc3),
    /// Mapper 7 (AxROM): 32 KiB PRG switch with one-screen mirroring.
    Axrom(Axrom),
    /// Mapper 9 (MMC2): CHR banks selected by read-triggered latches.
    Mmc2(Mmc2),
    /// Mapper 66 (GxROM): joint PRG/CHR bank register.
    Gxrom(Gxrom),
}

impl Mapper {
    /// Build the mapper selected by the ROM header.
    ///
    /// # Errors
    ///
    /// Returns [`RomError::UnimplementedMapper`] for mapper ids outside the
    /// supported set {0, 1, 2, 3, 4, 7, 9, 66}.
    pub fn new(rom: &Rom) -> Result<Self, RomError> {
        let mapper = match rom.header.mapper_id {
            0 => Self::Nrom(Nrom::new(rom)),
            1 => Self::Mmc1(Mmc1::new(rom)),
            2 => Self::Uxrom(Uxrom::new(rom)),
            3 => Self::Cnrom(Cnrom::new(rom)),
            4 => Self::Mmc3(Mmc3::new(rom)),
            7 => Self::Axrom(Axrom::new(rom)),
            9 => Self::Mmc2(Mmc2::new(rom)),
            66 => Self::Gxrom(Gxrom::new(rom)),
            id => return Err(RomError::UnimplementedMapper(id)),
        };
        log::debug!(
            "mapper {} ({}) selected",
            rom.header.mapper_id,
            mapper.name()
        );
        Ok(mapper)
    }

    /// Human-readable board name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nrom(_) => "NROM",
            Self::Mmc1(_) => "MMC1",
            Self::Uxrom(_) => "UxROM",
            Self::Cnrom(_) => "CNROM",
            Self::Mmc3(_) => "MMC3",
            Self::Axrom(_) => "AxROM",
            Self::Mmc2(_) => "MMC2",
            Self::Gxrom(_) => "GxROM",
        }
    }

    /// iNES mapper id.
    pub fn id(&self) -> u16 {
        match self {
            Self::Nrom(_) => 0,
            Self::Mmc1(_) => 1,
            Self::Uxrom(_) => 2,
            Self::Cnrom(_) => 3,
            Self::Mmc3(_) => 4,
            Self::Axrom(_) => 7,
            Self::Mmc2(_) => 9,
            Self::Gxrom(_) => 66,
        }
    }

    /// Side-effect-free PRG snapshot (CPU address space).
    pub fn view_prg(&self, addr: u16) -> u8 {
        match self {
            Self::Nrom(m) => m.view_prg(addr),
            Self::Mmc1(m) => m.view_prg(addr),
            Self::Uxrom(m) => m.view_prg(addr),
            Self::Cnrom(m) => m.view_prg(addr),
            Self::Mmc3(m) => m.view_prg(addr),
            Self::Axrom(m) => m.view_prg(addr),
            Self::Mmc2(m) => m.view_prg(addr),
            Self::Gxrom(m) => m.view_prg(addr),
        }
    }

    /// Emulated PRG read (CPU address space).
    pub fn read_prg(&mut self, addr: u16) -> u8 {
        // No board in the supported set mutates on PRG reads.
        self.view_prg(addr)
    }

    /// Emulated PRG write: mapper registers at $8000-$FFFF, PRG-RAM below.
    pub fn write_prg(&mut self, addr: u16, value: u8) {
        match self {
            Self::Nrom(m) => m.write_prg(addr, value),
            Self::Mmc1(m) => m.write_prg(addr, value),
            Self::Uxrom(m) => m.write_prg(addr, value),
            Self::Cnrom(m) => m.write_prg(addr, value),
            Self::Mmc3(m) => m.write_prg(addr, value),
            Self::Axrom(m) => m.write_prg(addr, value),
            Self::Mmc2(m) => m.write_prg(addr, value),
            Self::Gxrom(m) => m.write_prg(addr, value),
        }
    }

    /// Side-effect-free CHR snapshot (PPU address space).
    pub fn view_chr(&self, addr: u16) -> u8 {
        match self {
            Self::Nrom(m) => m.view_chr(addr),
            Self::Mmc1(m) => m.view_chr(addr),
            Self::Uxrom(m) => m.view_chr(addr),
            Self::Cnrom(m) => m.view_chr(addr),
            Self::Mmc3(m) => m.view_chr(addr),
            Self::Axrom(m) => m.view_chr(addr),
            Self::Mmc2(m) => m.view_chr(addr),
            Self::Gxrom(m) => m.view_chr(addr),
        }
    }

    /// Emulated CHR read. MMC2 updates its CHR latches here.
    pub fn read_chr(&mut self, addr: u16) -> u8 {
        match self {
            Self::Mmc2(m) => m.read_chr(addr),
            _ => self.view_chr(addr),
        }
    }

    /// Emulated CHR write (effective only on CHR-RAM boards, plus the MMC3
    /// four-screen nametable window).
    pub fn write_chr(&mut self, addr: u16, value: u8) {
        match self {
            Self::Nrom(m) => m.write_chr(addr, value),
            Self::Mmc1(m) => m.write_chr(addr, value),
            Self::Uxrom(m) => m.write_chr(addr, value),
            Self::Cnrom(m) => m.write_chr(addr, value),
            Self::Mmc3(m) => m.write_chr(addr, value),
            Self::Axrom(m) => m.write_chr(addr, value),
            Self::Mmc2(m) => m.write_chr(addr, value),
            Self::Gxrom(m) => m.write_chr(addr, value),
        }
    }

    /// Current nametable mirroring.
    pub fn mirroring(&self) -> Mirroring {
        match self {
            Self::Nrom(m) => m.mirroring(),
            Self::Mmc1(m) => m.mirroring(),
            Self::Uxrom(m) => m.mirroring(),
            Self::Cnrom(m) => m.mirroring(),
            Self::Mmc3(m) => m.mirroring(),
            Self::Axrom(m) => m.mirroring(),
            Self::Mmc2(m) => m.mirroring(),
            Self::Gxrom(m) => m.mirroring(),
        }
    }

    /// End-of-scanline notification, delivered by the PPU at dot 260 of
    /// every visible and pre-render scanline while rendering is enabled.
    pub fn on_scanline_end(&mut self) -> ScanlineEffect {
        match self {
            Self::Mmc3(m) => m.on_scanline_end(),
            _ => ScanlineEffect::None,
        }
    }

    /// Live state of the mapper IRQ line.
    pub fn irq_pending(&self) -> bool {
        match self {
            Self::Mmc3(m) => m.irq_pending(),
            _ => false,
        }
    }

    /// Return the board to its power-on register state. ROM/RAM contents
    /// are preserved.
    pub fn reset(&mut self) {
        match self {
            Self::Nrom(_) => {}
            Self::Mmc1(m) => m.reset(),
            Self::Uxrom(m) => m.reset(),
            Self::Cnrom(m) => m.reset(),
            Self::Mmc3(m) => m.reset(),
            Self::Axrom(m) => m.reset(),
            Self::Mmc2(m) => m.reset(),
            Self::Gxrom(m) => m.reset(),
        }
    }

    /// Serialize mutable mapper state (registers, PRG-RAM, CHR when RAM).
    ///
    /// # Errors
    /// Propagates stream write failures.
    pub fn serialize<W: Write>(&self, s: &mut Serializer<W>) -> Result<(), SaveStateError> {
        match self {
            Self::Nrom(m) => m.serialize(s),
            Self::Mmc1(m) => m.serialize(s),
            Self::Uxrom(m) => m.serialize(s),
            Self::Cnrom(m) => m.serialize(s),
            Self::Mmc3(m) => m.serialize(s),
            Self::Axrom(m) => m.serialize(s),
            Self::Mmc2(m) => m.serialize(s),
            Self::Gxrom(m) => m.serialize(s),
        }
    }

    /// Restore mutable mapper state written by [`Mapper::serialize`].
    ///
    /// # Errors
    /// Propagates stream read failures and corrupt vector lengths.
    pub fn deserialize<R: Read>(&mut self, d: &mut Deserializer<R>) -> Result<(), SaveStateError> {
        match self {
            Self::Nrom(m) => m.deserialize(d),
            Self::Mmc1(m) => m.deserialize(d),
            Self::Uxrom(m) => m.deserialize(d),
            Self::Cnrom(m) => m.deserialize(d),
            Self::Mmc3(m) => m.deserialize(d),
            Self::Axrom(m) => m.deserialize(d),
            Self::Mmc2(m) => m.deserialize(d),
            Self::Gxrom(m) => m.deserialize(d),
        }
    }
}
