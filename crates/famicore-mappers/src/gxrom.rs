//! GxROM (Mapper 66).
//!
//! One register switches both spaces at once: bits 4-5 pick a 32 KiB PRG
//! bank, bits 0-1 pick an 8 KiB CHR bank.

use crate::mapper::Mirroring;
use crate::rom::{CHR_CHUNK_SIZE, PRG_CHUNK_SIZE, Rom};
use famicore_state::{Deserializer, SaveStateError, Serializer};
use std::io::{Read, Write};

/// Mapper 66.
#[derive(Debug, Clone)]
pub struct Gxrom {
    mirroring: Mirroring,
    prg: Vec<u8>,
    chr: Vec<u8>,
    prg_bank: u8,
    chr_bank: u8,
}

impl Gxrom {
    /// Build from a parsed ROM image.
    pub fn new(rom: &Rom) -> Self {
        Self {
            mirroring: rom.header.mirroring,
            prg: rom.prg.clone(),
            chr: if rom.chr.is_empty() {
                vec![0; CHR_CHUNK_SIZE]
            } else {
                rom.chr.clone()
            },
            prg_bank: 0,
            chr_bank: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.prg_bank = 0;
        self.chr_bank = 0;
    }

    pub(crate) fn view_prg(&self, addr: u16) -> u8 {
        if addr >= 0x8000 {
            let mapped =
                usize::from(self.prg_bank) * (PRG_CHUNK_SIZE * 2) + usize::from(addr & 0x7FFF);
            self.prg[mapped % self.prg.len()]
        } else {
            0
        }
    }

    pub(crate) fn write_prg(&mut self, addr: u16, value: u8) {
        if addr >= 0x8000 {
            self.chr_bank = value & 0x03;
            self.prg_bank = (value >> 4) & 0x03;
        }
    }

    pub(crate) fn view_chr(&self, addr: u16) -> u8 {
        if addr < 0x2000 {
            let mapped = usize::from(self.chr_bank) * CHR_CHUNK_SIZE + usize::from(addr);
            self.chr[mapped % self.chr.len()]
        } else {
            0
        }
    }

    pub(crate) fn write_chr(&mut self, _addr: u16, _value: u8) {
        // CHR on GxROM is always ROM.
    }

    pub(crate) fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub(crate) fn serialize<W: Write>(&self, s: &mut Serializer<W>) -> Result<(), SaveStateError> {
        s.write_u8(self.prg_bank)?;
        s.write_u8(self.chr_bank)
    }

    pub(crate) fn deserialize<R: Read>(
        &mut self,
        d: &mut Deserializer<R>,
    ) -> Result<(), SaveStateError> {
        self.prg_bank = d.read_u8()?;
        self.chr_bank = d.read_u8()?;
        Ok(())
    }
}
