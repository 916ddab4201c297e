//! NROM (Mapper 0).
//!
//! No banking hardware at all: 16 or 32 KiB of PRG-ROM (16 KiB images are
//! mirrored across the whole $8000-$FFFF window) and a single 8 KiB CHR
//! bank, ROM or RAM.

use crate::mapper::{prg_ram_slot, Mirroring, PRG_RAM_SIZE};
use crate::rom::{CHR_CHUNK_SIZE, Rom};
use famicore_state::{Deserializer, SaveStateError, Serializer};
use std::io::{Read, Write};

/// Mapper 0.
#[derive(Debug, Clone)]
pub struct Nrom {
    prg_chunks: u8,
    mirroring: Mirroring,
    prg: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Option<Vec<u8>>,
}

impl Nrom {
    /// Build from a parsed ROM image.
    pub fn new(rom: &Rom) -> Self {
        let chr_is_ram = rom.header.chr_chunks == 0;
        Self {
            prg_chunks: rom.header.prg_chunks,
            mirroring: rom.header.mirroring,
            prg: rom.prg.clone(),
            chr: if chr_is_ram {
                vec![0; CHR_CHUNK_SIZE]
            } else {
                rom.chr.clone()
            },
            chr_is_ram,
            prg_ram: rom
                .header
                .has_battery
                .then(|| vec![0; PRG_RAM_SIZE]),
        }
    }

    pub(crate) fn view_prg(&self, addr: u16) -> u8 {
        if addr >= 0x8000 {
            let mask = if self.prg_chunks == 1 { 0x3FFF } else { 0x7FFF };
            self.prg[usize::from(addr & mask) % self.prg.len()]
        } else if let Some(slot) = prg_ram_slot(addr) {
            self.prg_ram.as_ref().map_or(0, |ram| ram[slot])
        } else {
            0
        }
    }

    pub(crate) fn write_prg(&mut self, addr: u16, value: u8) {
        if let (Some(slot), Some(ram)) = (prg_ram_slot(addr), self.prg_ram.as_mut()) {
            ram[slot] = value;
        }
    }

    pub(crate) fn view_chr(&self, addr: u16) -> u8 {
        if addr < 0x2000 {
            self.chr[usize::from(addr)]
        } else {
            0
        }
    }

    pub(crate) fn write_chr(&mut self, addr: u16, value: u8) {
        if addr < 0x2000 && self.chr_is_ram {
            self.chr[usize::from(addr)] = value;
        }
    }

    pub(crate) fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub(crate) fn serialize<W: Write>(&self, s: &mut Serializer<W>) -> Result<(), SaveStateError> {
        if let Some(ram) = &self.prg_ram {
            s.write_byte_vec(ram)?;
        }
        if self.chr_is_ram {
            s.write_byte_vec(&self.chr)?;
        }
        Ok(())
    }

    pub(crate) fn deserialize<R: Read>(
        &mut self,
        d: &mut Deserializer<R>,
    ) -> Result<(), SaveStateError> {
        if self.prg_ram.is_some() {
            self.prg_ram = Some(d.read_byte_vec()?);
        }
        if self.chr_is_ram {
            self.chr = d.read_byte_vec()?;
        }
        Ok(())
    }
}
