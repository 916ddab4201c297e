//! Cycle-stretched MOS 6502 CPU core.
//!
//! The NES CPU (Ricoh 2A03) is a 6502 without decimal mode. This crate
//! models it with instruction-atomic execution stretched over the correct
//! cycle counts: each instruction runs in full on its first cycle, then
//! idles for the remainder of its budget so the PPU and APU stay phase
//! locked. Memory access goes through the [`CpuBus`] trait; the crate has
//! no knowledge of the NES memory map.
//!
//! # Example
//!
//! ```
//! use famicore_cpu::{Cpu, CpuBus, FlatBus};
//!
//! // LDA #$42 at $8000, reset vector pointing at it.
//! let mut bus = FlatBus::with_program(0x8000, &[0xA9, 0x42]);
//! let mut cpu = Cpu::new();
//! cpu.reset(&mut bus);
//! for _ in 0..10 {
//!     cpu.execute_cycle(&mut bus);
//! }
//! assert_eq!(cpu.a(), 0x42);
//! ```

pub mod addressing;
pub mod bus;
pub mod cpu;
pub mod disasm;
pub mod opcodes;
pub mod status;

pub use addressing::{AddressingMode, Operand};
pub use bus::{CpuBus, FlatBus};
pub use cpu::Cpu;
pub use disasm::{disassemble, opcode_at};
pub use opcodes::{Instruction, OPCODE_TABLE, Opcode};
pub use status::Status;
