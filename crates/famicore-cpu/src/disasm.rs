//! Instruction disassembly.
//!
//! Turns bytes at an address back into canonical 6502 assembly text. All
//! memory is fetched through [`CpuBus::view`], so disassembling never
//! disturbs emulation state - safe to call on a live machine.

use crate::addressing::AddressingMode;
use crate::bus::CpuBus;
use crate::opcodes::{OPCODE_TABLE, Opcode};

/// Look up the decoded table entry for the opcode byte at `addr`.
pub fn opcode_at(addr: u16, bus: &impl CpuBus) -> Opcode {
    OPCODE_TABLE[usize::from(bus.view(addr))]
}

/// Disassemble the instruction at `addr` into `MNEMONIC operand` text.
///
/// Branch targets are resolved to absolute addresses, matching the usual
/// monitor output format.
pub fn disassemble(addr: u16, bus: &impl CpuBus) -> String {
    let entry = opcode_at(addr, bus);
    let mnemonic = entry.instruction.mnemonic();

    let byte = || bus.view(addr.wrapping_add(1));
    let word = || bus.view_u16(addr.wrapping_add(1));

    match entry.mode {
        AddressingMode::Imp => mnemonic.to_string(),
        AddressingMode::Acc => format!("{mnemonic} A"),
        AddressingMode::Imm => format!("{mnemonic} #${:02X}", byte()),
        AddressingMode::Zpg => format!("{mnemonic} ${:02X}", byte()),
        AddressingMode::Zpx => format!("{mnemonic} ${:02X},X", byte()),
        AddressingMode::Zpy => format!("{mnemonic} ${:02X},Y", byte()),
        AddressingMode::Abs => format!("{mnemonic} ${:04X}", word()),
        AddressingMode::Abx => format!("{mnemonic} ${:04X},X", word()),
        AddressingMode::Aby => format!("{mnemonic} ${:04X},Y", word()),
        AddressingMode::Ind => format!("{mnemonic} (${:04X})", word()),
        AddressingMode::Izx => format!("{mnemonic} (${:02X},X)", byte()),
        AddressingMode::Izy => format!("{mnemonic} (${:02X}),Y", byte()),
        AddressingMode::Rel => {
            let offset = byte() as i8;
            let target = addr.wrapping_add(2).wrapping_add(offset as u16);
            format!("{mnemonic} ${target:04X}")
        }
    }
}
