//! MMC3 (Mapper 4).
//!
//! The workhorse of the late NES library. A bank-select register pairs with
//! a bank-data register to drive two switchable 8 KiB PRG banks (with a
//! top-fixed or bottom-fixed layout) and six CHR banks (two 2 KiB plus four
//! 1 KiB, in one of two arrangements). A scanline counter, clocked by the
//! PPU at the end of each rendered line, raises an IRQ when it reaches
//! zero while enabled.
//!
//! Register map (all at $8000-$FFFF, decoded by address bit 0):
//!
//! ```text
//! $8000 even  bank select      $8001 odd  bank data
//! $A000 even  mirroring        $A001 odd  PRG-RAM protect
//! $C000 even  IRQ reload value $C001 odd  arm reload on next clock
//! $E000 even  IRQ disable+ack  $E001 odd  IRQ enable
//! ```

use crate::mapper::{prg_ram_slot, Mirroring, ScanlineEffect, PRG_RAM_SIZE};
use crate::rom::{CHR_CHUNK_SIZE, Rom};
use famicore_state::{Deserializer, SaveStateError, Serializer};
use std::io::{Read, Write};

const BANK_8K: usize = 8 * 1024;
const BANK_2K: usize = 2 * 1024;
const BANK_1K: usize = 1024;

/// Mapper 4.
#[derive(Debug, Clone)]
pub struct Mmc3 {
    prg_chunks: u8,
    chr_chunks: u8,
    initial_mirroring: Mirroring,
    four_screen: bool,
    prg: Vec<u8>,
    chr: Vec<u8>,
    prg_ram: Vec<u8>,
    /// Cartridge nametable RAM, allocated only for four-screen boards.
    nametable: Vec<u8>,

    bank_select: u8,
    bank_data: u8,
    /// Mirroring register bit ($A000): 1 selects horizontal.
    mirroring: bool,
    prg_ram_protect: u8,
    irq_reload_value: u8,
    irq_counter: u8,
    irq_enabled: bool,
    irq_reload_pending: bool,
    irq_request: bool,

    prg_bank_select: [u8; 2],
    chr_bank_select: [u8; 6],
}

impl Mmc3 {
    /// Build from a parsed ROM image. MMC3 boards carry PRG-RAM whether or
    /// not the header battery bit is set.
    pub fn new(rom: &Rom) -> Self {
        let mut mapper = Self {
            prg_chunks: rom.header.prg_chunks,
            chr_chunks: rom.header.chr_chunks,
            initial_mirroring: rom.header.mirroring,
            four_screen: rom.header.four_screen,
            prg: rom.prg.clone(),
            chr: if rom.header.chr_chunks == 0 {
                vec![0; CHR_CHUNK_SIZE]
            } else {
                rom.chr.clone()
            },
            prg_ram: vec![0; PRG_RAM_SIZE],
            nametable: Vec::new(),
            bank_select: 0,
            bank_data: 0,
            mirroring: false,
            prg_ram_protect: 0,
            irq_reload_value: 0,
            irq_counter: 0,
            irq_enabled: false,
            irq_reload_pending: false,
            irq_request: false,
            prg_bank_select: [0; 2],
            chr_bank_select: [0; 6],
        };
        mapper.reset();
        mapper
    }

    pub(crate) fn reset(&mut self) {
        self.bank_select = 0;
        self.bank_data = 0;
        self.mirroring = self.initial_mirroring == Mirroring::Horizontal;
        self.prg_ram_protect = 0;
        self.irq_reload_value = 0;
        self.irq_counter = 0;
        self.irq_enabled = false;
        self.irq_reload_pending = false;
        self.irq_request = false;
        // Both switchable banks start at 0; the fixed slots cover the last
        // two 8 KiB banks so the reset vector resolves.
        self.prg_bank_select = [0; 2];
        self.chr_bank_select = [0; 6];
        if self.four_screen {
            self.nametable = vec![0; 4 * 1024];
        }
    }

    fn prg_mode(&self) -> bool {
        (self.bank_select >> 6) & 0x1 != 0
    }

    fn chr_mode(&self) -> bool {
        (self.bank_select >> 7) & 0x1 != 0
    }

    fn prg_ram_readable(&self) -> bool {
        (self.prg_ram_protect >> 7) & 0x1 != 0
    }

    fn prg_ram_writable(&self) -> bool {
        self.prg_ram_readable() && (self.prg_ram_protect >> 6) & 0x1 == 0
    }

    fn chr_is_ram(&self) -> bool {
        self.chr_chunks == 0
    }

    pub(crate) fn view_prg(&self, addr: u16) -> u8 {
        if addr >= 0x8000 {
            let banks_8k = usize::from(self.prg_chunks) * 2;
            let offset = usize::from(addr & 0x1FFF);
            let bank = match (addr, self.prg_mode()) {
                (0x8000..=0x9FFF, false) | (0xC000..=0xDFFF, true) => {
                    usize::from(self.prg_bank_select[0])
                }
                (0xA000..=0xBFFF, _) => usize::from(self.prg_bank_select[1]),
                (0x8000..=0x9FFF, true) | (0xC000..=0xDFFF, false) => banks_8k - 2,
                _ => banks_8k - 1,
            };
            self.prg[(bank * BANK_8K + offset) % self.prg.len()]
        } else if let Some(slot) = prg_ram_slot(addr) {
            if self.prg_ram_readable() {
                self.prg_ram[slot]
            } else {
                0
            }
        } else {
            0
        }
    }

    pub(crate) fn write_prg(&mut self, addr: u16, value: u8) {
        if addr >= 0x8000 {
            let odd = addr & 0x1 != 0;
            match (addr, odd) {
                (0x8000..=0x9FFF, false) => self.bank_select = value,
                (0x8000..=0x9FFF, true) => {
                    self.bank_data = value;
                    let register = usize::from(self.bank_select & 0x7);
                    if register < 6 {
                        self.chr_bank_select[register] = value;
                    } else {
                        self.prg_bank_select[register & 0x1] = value & 0x3F;
                    }
                }
                (0xA000..=0xBFFF, false) => self.mirroring = value & 0x1 != 0,
                (0xA000..=0xBFFF, true) => self.prg_ram_protect = value,
                (0xC000..=0xDFFF, false) => self.irq_reload_value = value,
                (0xC000..=0xDFFF, true) => {
                    self.irq_counter = 0;
                    self.irq_reload_pending = true;
                }
                (0xE000..=0xFFFF, false) => {
                    self.irq_enabled = false;
                    self.irq_request = false;
                }
                (0xE000..=0xFFFF, true) => self.irq_enabled = true,
                _ => {}
            }
        } else if let Some(slot) = prg_ram_slot(addr) {
            if self.prg_ram_writable() {
                self.prg_ram[slot] = value;
            }
        }
    }

    pub(crate) fn view_chr(&self, addr: u16) -> u8 {
        if addr < 0x2000 {
            // The two layouts swap which pattern table holds the 2 KiB
            // banks; bank values for the 2 KiB slots are in 1 KiB units
            // with the low bit dropped.
            let region = usize::from(addr >> 10); // 1 KiB region index 0-7
            let inverted = self.chr_mode();
            let mapped = match (region, inverted) {
                (0 | 1, false) | (4 | 5, true) => {
                    BANK_2K * usize::from(self.chr_bank_select[0] >> 1)
                        + usize::from(addr & 0x7FF)
                }
                (2 | 3, false) | (6 | 7, true) => {
                    BANK_2K * usize::from(self.chr_bank_select[1] >> 1)
                        + usize::from(addr & 0x7FF)
                }
                (4, false) | (0, true) => {
                    BANK_1K * usize::from(self.chr_bank_select[2]) + usize::from(addr & 0x3FF)
                }
                (5, false) | (1, true) => {
                    BANK_1K * usize::from(self.chr_bank_select[3]) + usize::from(addr & 0x3FF)
                }
                (6, false) | (2, true) => {
                    BANK_1K * usize::from(self.chr_bank_select[4]) + usize::from(addr & 0x3FF)
                }
                _ => BANK_1K * usize::from(self.chr_bank_select[5]) + usize::from(addr & 0x3FF),
            };
            self.chr[mapped % self.chr.len()]
        } else if self.four_screen && addr < 0x3F00 {
            self.nametable[usize::from(addr & 0x0FFF)]
        } else {
            0
        }
    }

    pub(crate) fn write_chr(&mut self, addr: u16, value: u8) {
        if addr < 0x2000 {
            if self.chr_is_ram() {
                let mapped = usize::from(addr) % self.chr.len();
                self.chr[mapped] = value;
            }
        } else if self.four_screen && addr < 0x3F00 {
            self.nametable[usize::from(addr & 0x0FFF)] = value;
        }
    }

    pub(crate) fn mirroring(&self) -> Mirroring {
        if self.four_screen {
            Mirroring::FourScreen
        } else if self.mirroring {
            Mirroring::Horizontal
        } else {
            Mirroring::Vertical
        }
    }

    /// Clock the scanline counter. Called by the PPU at dot 260 of each
    /// rendered scanline.
    pub(crate) fn on_scanline_end(&mut self) -> ScanlineEffect {
        if self.irq_counter == 0 || self.irq_reload_pending {
            self.irq_counter = self.irq_reload_value;
            self.irq_reload_pending = false;
        } else {
            self.irq_counter -= 1;
        }

        self.irq_request = self.irq_enabled && self.irq_counter == 0;
        if self.irq_request {
            ScanlineEffect::Irq
        } else {
            ScanlineEffect::None
        }
    }

    pub(crate) fn irq_pending(&self) -> bool {
        self.irq_request
    }

    pub(crate) fn serialize<W: Write>(&self, s: &mut Serializer<W>) -> Result<(), SaveStateError> {
        s.write_u8(self.bank_select)?;
        s.write_u8(self.bank_data)?;
        s.write_bool(self.mirroring)?;
        s.write_u8(self.prg_ram_protect)?;
        s.write_u8(self.irq_reload_value)?;
        s.write_u8(self.irq_counter)?;
        s.write_bool(self.irq_enabled)?;
        s.write_bool(self.irq_reload_pending)?;
        s.write_bool(self.irq_request)?;
        s.write_bytes(&self.prg_bank_select)?;
        s.write_bytes(&self.chr_bank_select)?;
        s.write_byte_vec(&self.prg_ram)?;
        s.write_byte_vec(&self.nametable)?;
        if self.chr_is_ram() {
            s.write_byte_vec(&self.chr)?;
        }
        Ok(())
    }

    pub(crate) fn deserialize<R: Read>(
        &mut self,
        d: &mut Deserializer<R>,
    ) -> Result<(), SaveStateError> {
        self.bank_select = d.read_u8()?;
        self.bank_data = d.read_u8()?;
        self.mirroring = d.read_bool()?;
        self.prg_ram_protect = d.read_u8()?;
        self.irq_reload_value = d.read_u8()?;
        self.irq_counter = d.read_u8()?;
        self.irq_enabled = d.read_bool()?;
        self.irq_reload_pending = d.read_bool()?;
        self.irq_request = d.read_bool()?;
        d.read_bytes(&mut self.prg_bank_select)?;
        d.read_bytes(&mut self.chr_bank_select)?;
        self.prg_ram = d.read_byte_vec()?;
        self.nametable = d.read_byte_vec()?;
        if self.chr_is_ram() {
            self.chr = d.read_byte_vec()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::banked_rom;

    /// A ROM whose PRG encodes the 8 KiB bank number in every byte.
    fn rom_8k_banked(prg_chunks: u8, chr_chunks: u8) -> Rom {
        let mut rom = banked_rom(4, prg_chunks, chr_chunks);
        for (i, byte) in rom.prg.iter_mut().enumerate() {
            *byte = (i / BANK_8K) as u8;
        }
        for (i, byte) in rom.chr.iter_mut().enumerate() {
            *byte = (i / BANK_1K) as u8;
        }
        rom
    }

    fn select(mapper: &mut Mmc3, register: u8, value: u8) {
        mapper.write_prg(0x8000, register);
        mapper.write_prg(0x8001, value);
    }

    #[test]
    fn initial_layout_fixes_last_two_banks() {
        let rom = rom_8k_banked(4, 1); // 8 x 8 KiB banks
        let mmc3 = Mmc3::new(&rom);
        assert_eq!(mmc3.view_prg(0x8000), 0);
        assert_eq!(mmc3.view_prg(0xA000), 0);
        assert_eq!(mmc3.view_prg(0xC000), 6);
        assert_eq!(mmc3.view_prg(0xE000), 7);
    }

    #[test]
    fn prg_mode_swaps_switchable_and_fixed() {
        let rom = rom_8k_banked(4, 1);
        let mut mmc3 = Mmc3::new(&rom);
        select(&mut mmc3, 6, 2);
        assert_eq!(mmc3.view_prg(0x8000), 2);
        assert_eq!(mmc3.view_prg(0xC000), 6);
        // Flip to bottom-fixed layout.
        select(&mut mmc3, 0x46, 2);
        assert_eq!(mmc3.view_prg(0x8000), 6);
        assert_eq!(mmc3.view_prg(0xC000), 2);
        assert_eq!(mmc3.view_prg(0xE000), 7);
    }

    #[test]
    fn chr_layouts_follow_mode_bit() {
        let rom = rom_8k_banked(2, 4); // 32 x 1 KiB CHR banks
        let mut mmc3 = Mmc3::new(&rom);
        select(&mut mmc3, 0, 4); // R0: 2 KiB bank -> 1 KiB banks 4,5
        select(&mut mmc3, 2, 9); // R2: 1 KiB bank 9
        assert_eq!(mmc3.view_chr(0x0000), 4);
        assert_eq!(mmc3.view_chr(0x0400), 5);
        assert_eq!(mmc3.view_chr(0x1000), 9);
        // Inverted layout swaps the pattern tables.
        select(&mut mmc3, 0x80, 4);
        assert_eq!(mmc3.view_chr(0x1000), 4);
        assert_eq!(mmc3.view_chr(0x0000), 9);
    }

    #[test]
    fn scanline_counter_raises_irq_at_zero() {
        let rom = rom_8k_banked(2, 1);
        let mut mmc3 = Mmc3::new(&rom);
        mmc3.write_prg(0xC000, 3); // reload value
        mmc3.write_prg(0xC001, 0); // arm reload
        mmc3.write_prg(0xE001, 0); // enable

        // Reload happens on the first clock, then counts 3,2,1,0.
        assert_eq!(mmc3.on_scanline_end(), ScanlineEffect::None);
        assert_eq!(mmc3.on_scanline_end(), ScanlineEffect::None);
        assert_eq!(mmc3.on_scanline_end(), ScanlineEffect::None);
        assert_eq!(mmc3.on_scanline_end(), ScanlineEffect::Irq);
        assert!(mmc3.irq_pending());
    }

    #[test]
    fn irq_disable_clears_the_line() {
        let rom = rom_8k_banked(2, 1);
        let mut mmc3 = Mmc3::new(&rom);
        mmc3.write_prg(0xC000, 0);
        mmc3.write_prg(0xC001, 0);
        mmc3.write_prg(0xE001, 0);
        assert_eq!(mmc3.on_scanline_end(), ScanlineEffect::Irq);
        mmc3.write_prg(0xE000, 0);
        assert!(!mmc3.irq_pending());
    }

    #[test]
    fn irq_needs_enable() {
        let rom = rom_8k_banked(2, 1);
        let mut mmc3 = Mmc3::new(&rom);
        mmc3.write_prg(0xC000, 0);
        mmc3.write_prg(0xC001, 0);
        assert_eq!(mmc3.on_scanline_end(), ScanlineEffect::None);
    }

    #[test]
    fn prg_ram_protect_gates_access() {
        let rom = rom_8k_banked(2, 1);
        let mut mmc3 = Mmc3::new(&rom);
        // Disabled out of reset.
        mmc3.write_prg(0x6000, 0x42);
        assert_eq!(mmc3.view_prg(0x6000), 0);
        // Chip enable.
        mmc3.write_prg(0xA001, 0x80);
        mmc3.write_prg(0x6000, 0x42);
        assert_eq!(mmc3.view_prg(0x6000), 0x42);
        // Write protect keeps reads alive.
        mmc3.write_prg(0xA001, 0xC0);
        mmc3.write_prg(0x6000, 0x99);
        assert_eq!(mmc3.view_prg(0x6000), 0x42);
    }

    #[test]
    fn four_screen_serves_nametables() {
        let mut rom = rom_8k_banked(2, 1);
        rom.header.four_screen = true;
        let mut mmc3 = Mmc3::new(&rom);
        assert_eq!(mmc3.mirroring(), Mirroring::FourScreen);
        mmc3.write_chr(0x2C00, 0x33);
        assert_eq!(mmc3.view_chr(0x2C00), 0x33);
    }
}
