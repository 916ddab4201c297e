//! CNROM (Mapper 3).
//!
//! PRG is fixed (16 or 32 KiB, mirrored like NROM); any write to PRG space
//! switches the single 8 KiB CHR-ROM bank.

use crate::mapper::Mirroring;
use crate::rom::{CHR_CHUNK_SIZE, Rom};
use famicore_state::{Deserializer, SaveStateError, Serializer};
use std::io::{Read, Write};

/// Mapper 3.
#[derive(Debug, Clone)]
pub struct Cnrom {
    prg_chunks: u8,
    mirroring: Mirroring,
    prg: Vec<u8>,
    chr: Vec<u8>,
    bank_select: u8,
}

impl Cnrom {
    /// Build from a parsed ROM image.
    pub fn new(rom: &Rom) -> Self {
        Self {
            prg_chunks: rom.header.prg_chunks,
            mirroring: rom.header.mirroring,
            prg: rom.prg.clone(),
            chr: if rom.chr.is_empty() {
                vec![0; CHR_CHUNK_SIZE]
            } else {
                rom.chr.clone()
            },
            bank_select: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.bank_select = 0;
    }

    pub(crate) fn view_prg(&self, addr: u16) -> u8 {
        if addr >= 0x8000 {
            let mask = if self.prg_chunks == 1 { 0x3FFF } else { 0x7FFF };
            self.prg[usize::from(addr & mask) % self.prg.len()]
        } else {
            0
        }
    }

    pub(crate) fn write_prg(&mut self, addr: u16, value: u8) {
        if addr >= 0x8000 {
            self.bank_select = value;
        }
    }

    pub(crate) fn view_chr(&self, addr: u16) -> u8 {
        if addr < 0x2000 {
            let mapped = usize::from(self.bank_select) * CHR_CHUNK_SIZE + usize::from(addr);
            self.chr[mapped % self.chr.len()]
        } else {
            0
        }
    }

    pub(crate) fn write_chr(&mut self, _addr: u16, _value: u8) {
        // CHR on CNROM is always ROM.
    }

    pub(crate) fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub(crate) fn serialize<W: Write>(&self, s: &mut Serializer<W>) -> Result<(), SaveStateError> {
        s.write_u8(self.bank_select)
    }

    pub(crate) fn deserialize<R: Read>(
        &mut self,
        d: &mut Deserializer<R>,
    ) -> Result<(), SaveStateError> {
        self.bank_select = d.read_u8()?;
        Ok(())
    }
}
