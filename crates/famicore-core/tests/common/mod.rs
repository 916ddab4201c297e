//! Shared helpers for the integration suites.
#![allow(dead_code)] // not every suite uses every helper

use famicore_core::Bus;
use famicore_mappers::{Mirroring, Rom, RomHeader};

/// Build a 32 KiB NROM image running `program` from $8000, with the reset
/// vector pointing at it and both IRQ/NMI vectors parked on an RTI at
/// $FF00.
pub fn nrom_with_program(program: &[u8]) -> Rom {
    let mut prg = vec![0xEA; 32 * 1024]; // NOP slide
    prg[..program.len()].copy_from_slice(program);
    prg[0x7F00] = 0x40; // RTI at $FF00
    prg[0x7FFA] = 0x00; // NMI vector -> $FF00
    prg[0x7FFB] = 0xFF;
    prg[0x7FFC] = 0x00; // reset vector -> $8000
    prg[0x7FFD] = 0x80;
    prg[0x7FFE] = 0x00; // IRQ vector -> $FF00
    prg[0x7FFF] = 0xFF;

    Rom {
        header: RomHeader {
            prg_chunks: 2,
            chr_chunks: 1,
            mapper_id: 0,
            mirroring: Mirroring::Vertical,
            has_battery: false,
            has_trainer: false,
            four_screen: false,
        },
        prg,
        chr: vec![0; 8 * 1024],
    }
}

/// A machine booted on [`nrom_with_program`].
pub fn machine_with_program(program: &[u8]) -> Bus {
    Bus::new(&nrom_with_program(program)).expect("NROM is always supported")
}

/// Run whole CPU instructions: cycles until `count` instruction
/// boundaries have passed.
pub fn run_instructions(bus: &mut Bus, count: u32) {
    let mut seen = 0;
    while seen < count {
        bus.execute_cycle();
        if bus.cpu().at_instruction_boundary() {
            seen += 1;
        }
    }
}
