//! The 6502 opcode table.
//!
//! A single immutable 256-entry table maps every opcode byte to its
//! instruction, addressing mode, and default cycle count. It is built once
//! at compile time and shared by every CPU instance. The 105 bytes with no
//! official decoding fall through to a no-op entry costing the default two
//! cycles; the NES never errors on them.

use crate::addressing::AddressingMode;

/// Instruction mnemonic selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)] // The variants are the 6502 mnemonics themselves.
pub enum Instruction {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp,
    Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti,
    Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
    /// Unofficial opcode: decodes to a no-op.
    Uni,
}

impl Instruction {
    /// Mnemonic text for disassembly.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Adc => "ADC", Self::And => "AND", Self::Asl => "ASL",
            Self::Bcc => "BCC", Self::Bcs => "BCS", Self::Beq => "BEQ",
            Self::Bit => "BIT", Self::Bmi => "BMI", Self::Bne => "BNE",
            Self::Bpl => "BPL", Self::Brk => "BRK", Self::Bvc => "BVC",
            Self::Bvs => "BVS", Self::Clc => "CLC", Self::Cld => "CLD",
            Self::Cli => "CLI", Self::Clv => "CLV", Self::Cmp => "CMP",
            Self::Cpx => "CPX", Self::Cpy => "CPY", Self::Dec => "DEC",
            Self::Dex => "DEX", Self::Dey => "DEY", Self::Eor => "EOR",
            Self::Inc => "INC", Self::Inx => "INX", Self::Iny => "INY",
            Self::Jmp => "JMP", Self::Jsr => "JSR", Self::Lda => "LDA",
            Self::Ldx => "LDX", Self::Ldy => "LDY", Self::Lsr => "LSR",
            Self::Nop => "NOP", Self::Ora => "ORA", Self::Pha => "PHA",
            Self::Php => "PHP", Self::Pla => "PLA", Self::Plp => "PLP",
            Self::Rol => "ROL", Self::Ror => "ROR", Self::Rti => "RTI",
            Self::Rts => "RTS", Self::Sbc => "SBC", Self::Sec => "SEC",
            Self::Sed => "SED", Self::Sei => "SEI", Self::Sta => "STA",
            Self::Stx => "STX", Self::Sty => "STY", Self::Tax => "TAX",
            Self::Tay => "TAY", Self::Tsx => "TSX", Self::Txa => "TXA",
            Self::Txs => "TXS", Self::Tya => "TYA", Self::Uni => "???",
        }
    }

    /// Whether a page cross during operand resolution costs an extra cycle.
    /// Only read-style instructions pay the penalty; stores and
    /// read-modify-writes always take their worst-case count.
    pub const fn page_cross_penalty(self) -> bool {
        matches!(
            self,
            Self::Lda
                | Self::Ldx
                | Self::Ldy
                | Self::Cmp
                | Self::Cpx
                | Self::Cpy
                | Self::Adc
                | Self::Sbc
                | Self::And
                | Self::Eor
                | Self::Ora
        )
    }
}

/// One opcode table entry.
#[derive(Debug, Clone, Copy)]
pub struct Opcode {
    /// Decoded instruction.
    pub instruction: Instruction,
    /// Addressing mode.
    pub mode: AddressingMode,
    /// Default cycle count before page-cross and branch penalties.
    pub cycles: u8,
}

const fn op(instruction: Instruction, mode: AddressingMode, cycles: u8) -> Opcode {
    Opcode {
        instruction,
        mode,
        cycles,
    }
}

/// Complete 256-entry lookup table, indexed by opcode byte.
pub const OPCODE_TABLE: [Opcode; 256] = {
    use AddressingMode::{Abs, Abx, Aby, Acc, Imm, Imp, Ind, Izx, Izy, Rel, Zpg, Zpx, Zpy};
    use Instruction::*;

    // Every unlisted byte is an unofficial opcode: no-op, two cycles.
    let mut t = [op(Uni, Imp, 2); 256];

    t[0x00] = op(Brk, Imp, 7);
    t[0x01] = op(Ora, Izx, 6);
    t[0x05] = op(Ora, Zpg, 3);
    t[0x06] = op(Asl, Zpg, 5);
    t[0x08] = op(Php, Imp, 3);
    t[0x09] = op(Ora, Imm, 2);
    t[0x0A] = op(Asl, Acc, 2);
    t[0x0D] = op(Ora, Abs, 4);
    t[0x0E] = op(Asl, Abs, 6);

    t[0x10] = op(Bpl, Rel, 2);
    t[0x11] = op(Ora, Izy, 5);
    t[0x15] = op(Ora, Zpx, 4);
    t[0x16] = op(Asl, Zpx, 6);
    t[0x18] = op(Clc, Imp, 2);
    t[0x19] = op(Ora, Aby, 4);
    t[0x1D] = op(Ora, Abx, 4);
    t[0x1E] = op(Asl, Abx, 7);

    t[0x20] = op(Jsr, Abs, 6);
    t[0x21] = op(And, Izx, 6);
    t[0x24] = op(Bit, Zpg, 3);
    t[0x25] = op(And, Zpg, 3);
    t[0x26] = op(Rol, Zpg, 5);
    t[0x28] = op(Plp, Imp, 4);
    t[0x29] = op(And, Imm, 2);
    t[0x2A] = op(Rol, Acc, 2);
    t[0x2C] = op(Bit, Abs, 4);
    t[0x2D] = op(And, Abs, 4);
    t[0x2E] = op(Rol, Abs, 6);

    t[0x30] = op(Bmi, Rel, 2);
    t[0x31] = op(And, Izy, 5);
    t[0x35] = op(And, Zpx, 4);
    t[0x36] = op(Rol, Zpx, 6);
    t[0x38] = op(Sec, Imp, 2);
    t[0x39] = op(And, Aby, 4);
    t[0x3D] = op(And, Abx, 4);
    t[0x3E] = op(Rol, Abx, 7);

    t[0x40] = op(Rti, Imp, 6);
    t[0x41] = op(Eor, Izx, 6);
    t[0x45] = op(Eor, Zpg, 3);
    t[0x46] = op(Lsr, Zpg, 5);
    t[0x48] = op(Pha, Imp, 3);
    t[0x49] = op(Eor, Imm, 2);
    t[0x4A] = op(Lsr, Acc, 2);
    t[0x4C] = op(Jmp, Abs, 3);
    t[0x4D] = op(Eor, Abs, 4);
    t[0x4E] = op(Lsr, Abs, 6);

    t[0x50] = op(Bvc, Rel, 2);
    t[0x51] = op(Eor, Izy, 5);
    t[0x55] = op(Eor, Zpx, 4);
    t[0x56] = op(Lsr, Zpx, 6);
    t[0x58] = op(Cli, Imp, 2);
    t[0x59] = op(Eor, Aby, 4);
    t[0x5D] = op(Eor, Abx, 4);
    t[0x5E] = op(Lsr, Abx, 7);

    t[0x60] = op(Rts, Imp, 6);
    t[0x61] = op(Adc, Izx, 6);
    t[0x65] = op(Adc, Zpg, 3);
    t[0x66] = op(Ror, Zpg, 5);
    t[0x68] = op(Pla, Imp, 4);
    t[0x69] = op(Adc, Imm, 2);
    t[0x6A] = op(Ror, Acc, 2);
    t[0x6C] = op(Jmp, Ind, 5);
    t[0x6D] = op(Adc, Abs, 4);
    t[0x6E] = op(Ror, Abs, 6);

    t[0x70] = op(Bvs, Rel, 2);
    t[0x71] = op(Adc, Izy, 5);
    t[0x75] = op(Adc, Zpx, 4);
    t[0x76] = op(Ror, Zpx, 6);
    t[0x78] = op(Sei, Imp, 2);
    t[0x79] = op(Adc, Aby, 4);
    t[0x7D] = op(Adc, Abx, 4);
    t[0x7E] = op(Ror, Abx, 7);

    t[0x81] = op(Sta, Izx, 6);
    t[0x84] = op(Sty, Zpg, 3);
    t[0x85] = op(Sta, Zpg, 3);
    t[0x86] = op(Stx, Zpg, 3);
    t[0x88] = op(Dey, Imp, 2);
    t[0x8A] = op(Txa, Imp, 2);
    t[0x8C] = op(Sty, Abs, 4);
    t[0x8D] = op(Sta, Abs, 4);
    t[0x8E] = op(Stx, Abs, 4);

    t[0x90] = op(Bcc, Rel, 2);
    t[0x91] = op(Sta, Izy, 6);
    t[0x94] = op(Sty, Zpx, 4);
    t[0x95] = op(Sta, Zpx, 4);
    t[0x96] = op(Stx, Zpy, 4);
    t[0x98] = op(Tya, Imp, 2);
    t[0x99] = op(Sta, Aby, 5);
    t[0x9A] = op(Txs, Imp, 2);
    t[0x9D] = op(Sta, Abx, 5);

    t[0xA0] = op(Ldy, Imm, 2);
    t[0xA1] = op(Lda, Izx, 6);
    t[0xA2] = op(Ldx, Imm, 2);
    t[0xA4] = op(Ldy, Zpg, 3);
    t[0xA5] = op(Lda, Zpg, 3);
    t[0xA6] = op(Ldx, Zpg, 3);
    t[0xA8] = op(Tay, Imp, 2);
    t[0xA9] = op(Lda, Imm, 2);
    t[0xAA] = op(Tax, Imp, 2);
    t[0xAC] = op(Ldy, Abs, 4);
    t[0xAD] = op(Lda, Abs, 4);
    t[0xAE] = op(Ldx, Abs, 4);

    t[0xB0] = op(Bcs, Rel, 2);
    t[0xB1] = op(Lda, Izy, 5);
    t[0xB4] = op(Ldy, Zpx, 4);
    t[0xB5] = op(Lda, Zpx, 4);
    t[0xB6] = op(Ldx, Zpy, 4);
    t[0xB8] = op(Clv, Imp, 2);
    t[0xB9] = op(Lda, Aby, 4);
    t[0xBA] = op(Tsx, Imp, 2);
    t[0xBC] = op(Ldy, Abx, 4);
    t[0xBD] = op(Lda, Abx, 4);
    t[0xBE] = op(Ldx, Aby, 4);

    t[0xC0] = op(Cpy, Imm, 2);
    t[0xC1] = op(Cmp, Izx, 6);
    t[0xC4] = op(Cpy, Zpg, 3);
    t[0xC5] = op(Cmp, Zpg, 3);
    t[0xC6] = op(Dec, Zpg, 5);
    t[0xC8] = op(Iny, Imp, 2);
    t[0xC9] = op(Cmp, Imm, 2);
    t[0xCA] = op(Dex, Imp, 2);
    t[0xCC] = op(Cpy, Abs, 4);
    t[0xCD] = op(Cmp, Abs, 4);
    t[0xCE] = op(Dec, Abs, 6);

    t[0xD0] = op(Bne, Rel, 2);
    t[0xD1] = op(Cmp, Izy, 5);
    t[0xD5] = op(Cmp, Zpx, 4);
    t[0xD6] = op(Dec, Zpx, 6);
    t[0xD8] = op(Cld, Imp, 2);
    t[0xD9] = op(Cmp, Aby, 4);
    t[0xDD] = op(Cmp, Abx, 4);
    t[0xDE] = op(Dec, Abx, 7);

    t[0xE0] = op(Cpx, Imm, 2);
    t[0xE1] = op(Sbc, Izx, 6);
    t[0xE4] = op(Cpx, Zpg, 3);
    t[0xE5] = op(Sbc, Zpg, 3);
    t[0xE6] = op(Inc, Zpg, 5);
    t[0xE8] = op(Inx, Imp, 2);
    t[0xE9] = op(Sbc, Imm, 2);
    t[0xEA] = op(Nop, Imp, 2);
    t[0xEC] = op(Cpx, Abs, 4);
    t[0xED] = op(Sbc, Abs, 4);
    t[0xEE] = op(Inc, Abs, 6);

    t[0xF0] = op(Beq, Rel, 2);
    t[0xF1] = op(Sbc, Izy, 5);
    t[0xF5] = op(Sbc, Zpx, 4);
    t[0xF6] = op(Inc, Zpx, 6);
    t[0xF8] = op(Sed, Imp, 2);
    t[0xF9] = op(Sbc, Aby, 4);
    t[0xFD] = op(Sbc, Abx, 4);
    t[0xFE] = op(Inc, Abx, 7);

    t
};
