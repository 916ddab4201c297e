//! 6502 addressing modes.
//!
//! Thirteen modes, each resolving to an [`Operand`]: a 16-bit effective
//! address, an immediate byte, or nothing (implied and accumulator forms).
//! Resolution also reports whether indexing crossed a page boundary, which
//! feeds the extra-cycle accounting in the executor.

/// Addressing mode of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// Operate on the accumulator.
    Acc,
    /// Immediate byte at PC+1.
    Imm,
    /// No operand.
    Imp,
    /// 8-bit zero-page address.
    Zpg,
    /// Zero page + X, wrapping within the zero page.
    Zpx,
    /// Zero page + Y, wrapping within the zero page.
    Zpy,
    /// 16-bit absolute address.
    Abs,
    /// Absolute + X, with page-cross detection.
    Abx,
    /// Absolute + Y, with page-cross detection.
    Aby,
    /// 16-bit indirect (JMP only), with the documented page-wrap bug.
    Ind,
    /// (zero page + X) indirect.
    Izx,
    /// (zero page) indirect + Y, with page-cross detection.
    Izy,
    /// Signed 8-bit branch offset relative to PC+2.
    Rel,
}

impl AddressingMode {
    /// Total instruction length in bytes (opcode included).
    pub const fn instruction_size(self) -> u16 {
        match self {
            Self::Acc | Self::Imp => 1,
            Self::Imm
            | Self::Zpg
            | Self::Zpx
            | Self::Zpy
            | Self::Izx
            | Self::Izy
            | Self::Rel => 2,
            Self::Abs | Self::Abx | Self::Aby | Self::Ind => 3,
        }
    }
}

/// What an addressing mode resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Effective memory address.
    Address(u16),
    /// Immediate value.
    Immediate(u8),
    /// Implied / accumulator: no memory operand.
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_sizes() {
        assert_eq!(AddressingMode::Imp.instruction_size(), 1);
        assert_eq!(AddressingMode::Acc.instruction_size(), 1);
        assert_eq!(AddressingMode::Imm.instruction_size(), 2);
        assert_eq!(AddressingMode::Zpg.instruction_size(), 2);
        assert_eq!(AddressingMode::Rel.instruction_size(), 2);
        assert_eq!(AddressingMode::Abs.instruction_size(), 3);
        assert_eq!(AddressingMode::Ind.instruction_size(), 3);
    }
}
