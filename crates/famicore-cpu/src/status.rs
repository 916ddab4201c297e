//! CPU status register (SR) flags.
//!
//! ```text
//! 7  6  5  4  3  2  1  0
//! N  V  U  B  D  I  Z  C
//! │  │  │  │  │  │  │  └─ Carry
//! │  │  │  │  │  │  └──── Zero
//! │  │  │  │  │  └─────── Interrupt Disable
//! │  │  │  │  └────────── Decimal (decoded but ignored by the NES ALU)
//! │  │  │  └───────────── Break (1 when pushed by PHP/BRK, 0 by IRQ/NMI)
//! │  │  └──────────────── Unused (always 1 when pushed to the stack)
//! │  └─────────────────── Overflow
//! └────────────────────── Negative
//! ```

use bitflags::bitflags;

bitflags! {
    /// CPU status register flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u8 {
        /// Carry.
        const C = 1 << 0;
        /// Zero.
        const Z = 1 << 1;
        /// Interrupt disable. Blocks IRQ delivery; NMI is unaffected.
        const I = 1 << 2;
        /// Decimal mode. Stored and restored faithfully but the NES CPU
        /// has no BCD circuitry, so the ALU ignores it.
        const D = 1 << 3;
        /// Break. Only meaningful on values pushed to the stack.
        const B = 1 << 4;
        /// Unused. Reads as 1 on every pushed value.
        const U = 1 << 5;
        /// Overflow.
        const V = 1 << 6;
        /// Negative.
        const N = 1 << 7;
    }
}

impl Status {
    /// Set or clear the Zero and Negative flags from a result byte.
    #[inline]
    pub fn set_zn(&mut self, value: u8) {
        self.set(Self::Z, value == 0);
        self.set(Self::N, value & 0x80 != 0);
    }

    /// Byte representation for pushing to the stack. U is always set; B is
    /// set for software pushes (PHP/BRK) and clear for IRQ/NMI.
    #[inline]
    pub const fn to_stack_byte(self, brk: bool) -> u8 {
        let mut value = self.bits() | Self::U.bits();
        if brk {
            value |= Self::B.bits();
        }
        value
    }

    /// Rebuild the register from a byte pulled off the stack. B is
    /// discarded and U forced to 1.
    #[inline]
    pub fn from_stack_byte(value: u8) -> Self {
        Self::from_bits_truncate((value & !Self::B.bits()) | Self::U.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zn_flags_track_result() {
        let mut status = Status::empty();
        status.set_zn(0);
        assert!(status.contains(Status::Z));
        assert!(!status.contains(Status::N));

        status.set_zn(0x80);
        assert!(!status.contains(Status::Z));
        assert!(status.contains(Status::N));

        status.set_zn(0x42);
        assert!(!status.contains(Status::Z));
        assert!(!status.contains(Status::N));
    }

    #[test]
    fn stack_byte_always_has_u_set() {
        let status = Status::C | Status::Z;
        assert_eq!(status.to_stack_byte(false) & 0x30, 0x20);
        assert_eq!(status.to_stack_byte(true) & 0x30, 0x30);
    }

    #[test]
    fn pulled_byte_drops_b_and_forces_u() {
        let status = Status::from_stack_byte(0xFF);
        assert!(!status.contains(Status::B));
        assert!(status.contains(Status::U));
        assert!(status.contains(Status::N));
        assert!(status.contains(Status::C));
    }
}
