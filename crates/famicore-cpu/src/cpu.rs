//! 6502 CPU core.
//!
//! Execution is cycle-stretched rather than micro-coded: when the cycle
//! budget of the previous instruction is exhausted, the next instruction is
//! decoded and executed atomically and its cost (default cycles plus any
//! page-cross or branch penalty) is loaded into `remaining_cycles`, which
//! then burns down by one per [`Cpu::execute_cycle`] call. Bus-visible
//! behavior per instruction is correct; the distribution of reads and
//! writes inside an instruction's cycle window is not modeled.

use crate::addressing::{AddressingMode, Operand};
use crate::bus::CpuBus;
use crate::opcodes::{Instruction, OPCODE_TABLE, Opcode};
use crate::status::Status;
use famicore_state::{Deserializer, SaveStateError, Serializer};
use std::io::{Read, Write};

const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_BRK_VECTOR: u16 = 0xFFFE;
const STACK_BASE: u16 = 0x0100;

const RESET_CYCLES: u8 = 8;
const INTERRUPT_CYCLES: u8 = 7;

/// MOS 6502 CPU (NES variant: decimal mode decoded but ignored).
#[derive(Debug, Clone)]
pub struct Cpu {
    /// Program counter.
    pc: u16,
    /// Accumulator.
    a: u8,
    /// X index register.
    x: u8,
    /// Y index register.
    y: u8,
    /// Stack pointer, offset into $0100-$01FF.
    sp: u8,
    /// Status register.
    sr: Status,

    /// Cycles left before the next instruction is fetched.
    remaining_cycles: u8,
    /// Cleared by instructions that set PC themselves (jumps, branches,
    /// returns, interrupt entry).
    should_advance_pc: bool,
    /// Total CPU cycles executed since power-on.
    total_cycles: u64,
}

impl Cpu {
    /// Power-on register state. The CPU is inert until [`Cpu::reset`] loads
    /// the reset vector.
    pub fn new() -> Self {
        Self {
            pc: 0,
            a: 0,
            x: 0,
            y: 0,
            sp: 0,
            sr: Status::U,
            remaining_cycles: 0,
            should_advance_pc: true,
            total_cycles: 0,
        }
    }

    /// Run the reset sequence: PC from $FFFC, SP decremented by 3, I set.
    /// Other registers keep their values. Costs 8 cycles.
    pub fn reset(&mut self, bus: &mut impl CpuBus) {
        self.pc = bus.read_u16(RESET_VECTOR);
        self.sp = self.sp.wrapping_sub(3);
        self.sr.insert(Status::I);
        self.remaining_cycles = RESET_CYCLES;
        log::debug!("CPU reset, PC = {:#06X}", self.pc);
    }

    /// Advance the CPU by one cycle.
    ///
    /// On the first cycle of an instruction the whole instruction executes;
    /// the remaining cycles of its budget are idle ticks that keep the
    /// rest of the machine in step.
    pub fn execute_cycle(&mut self, bus: &mut impl CpuBus) {
        if self.remaining_cycles == 0 {
            self.should_advance_pc = true;

            let opcode = bus.read(self.pc);
            let entry = OPCODE_TABLE[usize::from(opcode)];

            let (operand, page_crossed) = self.resolve_operand(entry.mode, bus);
            let branch_cycles = self.execute_instruction(entry, operand, bus);

            if self.should_advance_pc {
                self.pc = self.pc.wrapping_add(entry.mode.instruction_size());
            }

            self.remaining_cycles = entry.cycles + branch_cycles;
            if page_crossed && entry.instruction.page_cross_penalty() {
                self.remaining_cycles += 1;
            }
        }

        self.remaining_cycles -= 1;
        self.total_cycles += 1;
    }

    /// Maskable interrupt. Returns whether it was taken (I flag clear).
    pub fn irq(&mut self, bus: &mut impl CpuBus) -> bool {
        if self.sr.contains(Status::I) {
            return false;
        }

        self.push_u16(bus, self.pc);
        self.push(bus, self.sr.to_stack_byte(false));
        self.sr.insert(Status::I);
        self.pc = bus.read_u16(IRQ_BRK_VECTOR);
        self.remaining_cycles = INTERRUPT_CYCLES;
        true
    }

    /// Non-maskable interrupt. Always taken.
    pub fn nmi(&mut self, bus: &mut impl CpuBus) {
        self.push_u16(bus, self.pc);
        self.push(bus, self.sr.to_stack_byte(false));
        self.sr.insert(Status::I);
        self.pc = bus.read_u16(NMI_VECTOR);
        self.remaining_cycles = INTERRUPT_CYCLES;
    }

    /// Whether the next `execute_cycle` call starts a new instruction.
    pub fn at_instruction_boundary(&self) -> bool {
        self.remaining_cycles == 0
    }

    // ==== debug introspection ====

    /// Program counter.
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Accumulator.
    pub fn a(&self) -> u8 {
        self.a
    }

    /// X index register.
    pub fn x(&self) -> u8 {
        self.x
    }

    /// Y index register.
    pub fn y(&self) -> u8 {
        self.y
    }

    /// Stack pointer.
    pub fn sp(&self) -> u8 {
        self.sp
    }

    /// Status register.
    pub fn sr(&self) -> Status {
        self.sr
    }

    /// Test a single status flag.
    pub fn flag(&self, flag: Status) -> bool {
        self.sr.contains(flag)
    }

    /// Total cycles executed since power-on.
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Force the program counter (test harnesses and trace replays).
    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    // ==== operand resolution ====

    #[allow(clippy::too_many_lines)]
    fn resolve_operand(&mut self, mode: AddressingMode, bus: &mut impl CpuBus) -> (Operand, bool) {
        let arg = self.pc.wrapping_add(1);
        match mode {
            AddressingMode::Imp | AddressingMode::Acc => (Operand::None, false),

            AddressingMode::Imm => (Operand::Immediate(bus.read(arg)), false),

            AddressingMode::Zpg => (Operand::Address(u16::from(bus.read(arg))), false),

            AddressingMode::Zpx => {
                let addr = bus.read(arg).wrapping_add(self.x);
                (Operand::Address(u16::from(addr)), false)
            }

            AddressingMode::Zpy => {
                let addr = bus.read(arg).wrapping_add(self.y);
                (Operand::Address(u16::from(addr)), false)
            }

            AddressingMode::Abs => (Operand::Address(bus.read_u16(arg)), false),

            AddressingMode::Abx => {
                let base = bus.read_u16(arg);
                let addr = base.wrapping_add(u16::from(self.x));
                (Operand::Address(addr), page_crossed(base, addr))
            }

            AddressingMode::Aby => {
                let base = bus.read_u16(arg);
                let addr = base.wrapping_add(u16::from(self.y));
                (Operand::Address(addr), page_crossed(base, addr))
            }

            AddressingMode::Ind => {
                let ptr = bus.read_u16(arg);
                let lo = bus.read(ptr);
                // Hardware bug: the high byte is fetched from the same
                // page when the pointer sits at $xxFF.
                let hi_addr = (ptr & 0xFF00) | u16::from((ptr as u8).wrapping_add(1));
                let hi = bus.read(hi_addr);
                (Operand::Address(u16::from_le_bytes([lo, hi])), false)
            }

            AddressingMode::Izx => {
                let ptr = bus.read(arg).wrapping_add(self.x);
                let lo = bus.read(u16::from(ptr));
                let hi = bus.read(u16::from(ptr.wrapping_add(1)));
                (Operand::Address(u16::from_le_bytes([lo, hi])), false)
            }

            AddressingMode::Izy => {
                let ptr = bus.read(arg);
                let lo = bus.read(u16::from(ptr));
                let hi = bus.read(u16::from(ptr.wrapping_add(1)));
                let base = u16::from_le_bytes([lo, hi]);
                let addr = base.wrapping_add(u16::from(self.y));
                (Operand::Address(addr), page_crossed(base, addr))
            }

            AddressingMode::Rel => {
                let offset = bus.read(arg) as i8;
                let target = self
                    .pc
                    .wrapping_add(2)
                    .wrapping_add(offset as u16);
                (Operand::Address(target), false)
            }
        }
    }

    fn operand_value(&mut self, operand: Operand, bus: &mut impl CpuBus) -> u8 {
        match operand {
            Operand::Immediate(value) => value,
            Operand::Address(addr) => bus.read(addr),
            Operand::None => self.a,
        }
    }

    // ==== instruction execution ====

    /// Execute one decoded instruction. Returns extra cycles consumed by
    /// taken branches (the page-cross penalty is handled by the caller).
    #[allow(clippy::too_many_lines)]
    fn execute_instruction(
        &mut self,
        entry: Opcode,
        operand: Operand,
        bus: &mut impl CpuBus,
    ) -> u8 {
        match entry.instruction {
            // Loads and stores
            Instruction::Lda => {
                self.a = self.operand_value(operand, bus);
                self.sr.set_zn(self.a);
            }
            Instruction::Ldx => {
                self.x = self.operand_value(operand, bus);
                self.sr.set_zn(self.x);
            }
            Instruction::Ldy => {
                self.y = self.operand_value(operand, bus);
                self.sr.set_zn(self.y);
            }
            Instruction::Sta => {
                if let Operand::Address(addr) = operand {
                    bus.write(addr, self.a);
                }
            }
            Instruction::Stx => {
                if let Operand::Address(addr) = operand {
                    bus.write(addr, self.x);
                }
            }
            Instruction::Sty => {
                if let Operand::Address(addr) = operand {
                    bus.write(addr, self.y);
                }
            }

            // Arithmetic
            Instruction::Adc => {
                let value = self.operand_value(operand, bus);
                self.adc(value);
            }
            Instruction::Sbc => {
                let value = self.operand_value(operand, bus);
                self.adc(!value);
            }
            Instruction::Cmp => {
                let value = self.operand_value(operand, bus);
                self.compare(self.a, value);
            }
            Instruction::Cpx => {
                let value = self.operand_value(operand, bus);
                self.compare(self.x, value);
            }
            Instruction::Cpy => {
                let value = self.operand_value(operand, bus);
                self.compare(self.y, value);
            }

            // Logic
            Instruction::And => {
                self.a &= self.operand_value(operand, bus);
                self.sr.set_zn(self.a);
            }
            Instruction::Ora => {
                self.a |= self.operand_value(operand, bus);
                self.sr.set_zn(self.a);
            }
            Instruction::Eor => {
                self.a ^= self.operand_value(operand, bus);
                self.sr.set_zn(self.a);
            }
            Instruction::Bit => {
                let value = self.operand_value(operand, bus);
                self.sr.set(Status::Z, self.a & value == 0);
                self.sr.set(Status::V, value & 0x40 != 0);
                self.sr.set(Status::N, value & 0x80 != 0);
            }

            // Shifts and rotates (in place: memory or accumulator)
            Instruction::Asl => self.modify(operand, bus, |sr, v| {
                sr.set(Status::C, v & 0x80 != 0);
                v << 1
            }),
            Instruction::Lsr => self.modify(operand, bus, |sr, v| {
                sr.set(Status::C, v & 0x01 != 0);
                v >> 1
            }),
            Instruction::Rol => self.modify(operand, bus, |sr, v| {
                let carry_in = u8::from(sr.contains(Status::C));
                sr.set(Status::C, v & 0x80 != 0);
                (v << 1) | carry_in
            }),
            Instruction::Ror => self.modify(operand, bus, |sr, v| {
                let carry_in = u8::from(sr.contains(Status::C)) << 7;
                sr.set(Status::C, v & 0x01 != 0);
                (v >> 1) | carry_in
            }),

            // Increments and decrements
            Instruction::Inc => self.modify(operand, bus, |_, v| v.wrapping_add(1)),
            Instruction::Dec => self.modify(operand, bus, |_, v| v.wrapping_sub(1)),
            Instruction::Inx => {
                self.x = self.x.wrapping_add(1);
                self.sr.set_zn(self.x);
            }
            Instruction::Iny => {
                self.y = self.y.wrapping_add(1);
                self.sr.set_zn(self.y);
            }
            Instruction::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.sr.set_zn(self.x);
            }
            Instruction::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.sr.set_zn(self.y);
            }

            // Register transfers
            Instruction::Tax => {
                self.x = self.a;
                self.sr.set_zn(self.x);
            }
            Instruction::Tay => {
                self.y = self.a;
                self.sr.set_zn(self.y);
            }
            Instruction::Txa => {
                self.a = self.x;
                self.sr.set_zn(self.a);
            }
            Instruction::Tya => {
                self.a = self.y;
                self.sr.set_zn(self.a);
            }
            Instruction::Tsx => {
                self.x = self.sp;
                self.sr.set_zn(self.x);
            }
            Instruction::Txs => self.sp = self.x,

            // Stack
            Instruction::Pha => self.push(bus, self.a),
            Instruction::Php => self.push(bus, self.sr.to_stack_byte(true)),
            Instruction::Pla => {
                self.a = self.pop(bus);
                self.sr.set_zn(self.a);
            }
            Instruction::Plp => {
                let value = self.pop(bus);
                self.sr = Status::from_stack_byte(value);
            }

            // Flag manipulation
            Instruction::Clc => self.sr.remove(Status::C),
            Instruction::Sec => self.sr.insert(Status::C),
            Instruction::Cli => self.sr.remove(Status::I),
            Instruction::Sei => self.sr.insert(Status::I),
            Instruction::Clv => self.sr.remove(Status::V),
            Instruction::Cld => self.sr.remove(Status::D),
            Instruction::Sed => self.sr.insert(Status::D),

            // Jumps and returns
            Instruction::Jmp => {
                if let Operand::Address(addr) = operand {
                    self.pc = addr;
                    self.should_advance_pc = false;
                }
            }
            Instruction::Jsr => {
                if let Operand::Address(addr) = operand {
                    // Return address minus one: the last byte of the JSR.
                    self.push_u16(bus, self.pc.wrapping_add(2));
                    self.pc = addr;
                    self.should_advance_pc = false;
                }
            }
            Instruction::Rts => {
                self.pc = self.pop_u16(bus).wrapping_add(1);
                self.should_advance_pc = false;
            }
            Instruction::Rti => {
                let value = self.pop(bus);
                self.sr = Status::from_stack_byte(value);
                self.pc = self.pop_u16(bus);
                self.should_advance_pc = false;
            }

            // Branches
            Instruction::Bcc => return self.branch(operand, !self.sr.contains(Status::C)),
            Instruction::Bcs => return self.branch(operand, self.sr.contains(Status::C)),
            Instruction::Bne => return self.branch(operand, !self.sr.contains(Status::Z)),
            Instruction::Beq => return self.branch(operand, self.sr.contains(Status::Z)),
            Instruction::Bpl => return self.branch(operand, !self.sr.contains(Status::N)),
            Instruction::Bmi => return self.branch(operand, self.sr.contains(Status::N)),
            Instruction::Bvc => return self.branch(operand, !self.sr.contains(Status::V)),
            Instruction::Bvs => return self.branch(operand, self.sr.contains(Status::V)),

            // Software interrupt
            Instruction::Brk => {
                self.push_u16(bus, self.pc.wrapping_add(2));
                self.push(bus, self.sr.to_stack_byte(true));
                self.sr.insert(Status::I);
                self.pc = bus.read_u16(IRQ_BRK_VECTOR);
                self.should_advance_pc = false;
            }

            // NOP, and every unofficial opcode
            Instruction::Nop | Instruction::Uni => {}
        }
        0
    }

    /// Read-modify-write on memory, or on A for accumulator mode. The
    /// write-back goes through the bus, so it is observable like any store.
    fn modify(
        &mut self,
        operand: Operand,
        bus: &mut impl CpuBus,
        f: impl FnOnce(&mut Status, u8) -> u8,
    ) {
        match operand {
            Operand::Address(addr) => {
                let value = bus.read(addr);
                let result = f(&mut self.sr, value);
                self.sr.set_zn(result);
                bus.write(addr, result);
            }
            _ => {
                let result = f(&mut self.sr, self.a);
                self.sr.set_zn(result);
                self.a = result;
            }
        }
    }

    /// Binary-mode add with carry. SBC is ADC of the inverted operand.
    fn adc(&mut self, value: u8) {
        let sum = u16::from(self.a) + u16::from(value) + u16::from(self.sr.contains(Status::C));
        let result = sum as u8;

        self.sr.set(Status::C, sum > 0xFF);
        self.sr.set(
            Status::V,
            (self.a ^ result) & (value ^ result) & 0x80 != 0,
        );
        self.a = result;
        self.sr.set_zn(result);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.sr.set(Status::C, register >= value);
        self.sr.set_zn(register.wrapping_sub(value));
    }

    /// Take or skip a branch: +1 cycle when taken, +1 more when the target
    /// is on a different page than the next instruction.
    fn branch(&mut self, operand: Operand, condition: bool) -> u8 {
        let Operand::Address(target) = operand else {
            return 0;
        };
        if !condition {
            return 0;
        }

        let next = self.pc.wrapping_add(2);
        self.pc = target;
        self.should_advance_pc = false;
        1 + u8::from(page_crossed(next, target))
    }

    // ==== stack helpers ====

    fn push(&mut self, bus: &mut impl CpuBus, value: u8) {
        bus.write(STACK_BASE | u16::from(self.sp), value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop(&mut self, bus: &mut impl CpuBus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(STACK_BASE | u16::from(self.sp))
    }

    fn push_u16(&mut self, bus: &mut impl CpuBus, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, (value & 0xFF) as u8);
    }

    fn pop_u16(&mut self, bus: &mut impl CpuBus) -> u16 {
        let lo = self.pop(bus);
        let hi = self.pop(bus);
        u16::from_le_bytes([lo, hi])
    }

    // ==== serialization ====

    /// Write CPU state in declaration order.
    ///
    /// # Errors
    /// Propagates stream write failures.
    pub fn serialize<W: Write>(&self, s: &mut Serializer<W>) -> Result<(), SaveStateError> {
        s.write_u16(self.pc)?;
        s.write_u8(self.a)?;
        s.write_u8(self.x)?;
        s.write_u8(self.y)?;
        s.write_u8(self.sp)?;
        s.write_u8(self.sr.bits())?;
        s.write_u8(self.remaining_cycles)?;
        s.write_bool(self.should_advance_pc)?;
        s.write_u64(self.total_cycles)
    }

    /// Restore CPU state written by [`Cpu::serialize`].
    ///
    /// # Errors
    /// Propagates stream read failures.
    pub fn deserialize<R: Read>(&mut self, d: &mut Deserializer<R>) -> Result<(), SaveStateError> {
        self.pc = d.read_u16()?;
        self.a = d.read_u8()?;
        self.x = d.read_u8()?;
        self.y = d.read_u8()?;
        self.sp = d.read_u8()?;
        self.sr = Status::from_bits_truncate(d.read_u8()?);
        self.remaining_cycles = d.read_u8()?;
        self.should_advance_pc = d.read_bool()?;
        self.total_cycles = d.read_u64()?;
        Ok(())
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

fn page_crossed(a: u16, b: u16) -> bool {
    a & 0xFF00 != b & 0xFF00
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FlatBus;
    use proptest::prelude::*;

    /// Run exactly one instruction (however many cycles it is stretched
    /// over) and return its cycle count.
    fn step(cpu: &mut Cpu, bus: &mut FlatBus) -> u32 {
        let mut cycles = 0;
        loop {
            cpu.execute_cycle(bus);
            cycles += 1;
            if cpu.at_instruction_boundary() {
                return cycles;
            }
        }
    }

    fn boot(program: &[u8]) -> (Cpu, FlatBus) {
        let mut bus = FlatBus::with_program(0x8000, program);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        // Burn off the 8 reset cycles.
        for _ in 0..8 {
            cpu.execute_cycle(&mut bus);
        }
        (cpu, bus)
    }

    #[test]
    fn reset_loads_vector_and_costs_eight_cycles() {
        let mut bus = FlatBus::with_program(0xC000, &[0xEA]);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        assert_eq!(cpu.pc(), 0xC000);
        assert_eq!(cpu.sp(), 0xFD);
        assert!(cpu.flag(Status::I));
        for _ in 0..8 {
            assert!(!cpu.at_instruction_boundary());
            cpu.execute_cycle(&mut bus);
        }
        assert!(cpu.at_instruction_boundary());
    }

    #[test]
    fn lda_immediate_sets_flags() {
        let (mut cpu, mut bus) = boot(&[0xA9, 0x00, 0xA9, 0x80, 0xA9, 0x42]);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.a(), 0x00);
        assert!(cpu.flag(Status::Z));
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.a(), 0x80);
        assert!(cpu.flag(Status::N));
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.a(), 0x42);
        assert!(!cpu.flag(Status::Z) && !cpu.flag(Status::N));
    }

    #[test]
    fn instruction_cycle_counts_stretch() {
        // LDA #$01 (2 cycles), STA $0200 (4 cycles), INC $0200 (6 cycles)
        let (mut cpu, mut bus) = boot(&[0xA9, 0x01, 0x8D, 0x00, 0x02, 0xEE, 0x00, 0x02]);
        assert_eq!(step(&mut cpu, &mut bus), 2);
        assert_eq!(step(&mut cpu, &mut bus), 4);
        assert_eq!(step(&mut cpu, &mut bus), 6);
        assert_eq!(bus.view(0x0200), 2);
    }

    #[test]
    fn page_cross_adds_a_cycle_for_reads_only() {
        // LDA $80FF,X with X=1 crosses into $8100.
        let (mut cpu, mut bus) = boot(&[0xA2, 0x01, 0xBD, 0xFF, 0x80, 0x9D, 0xFF, 0x80]);
        step(&mut cpu, &mut bus); // LDX #$01
        assert_eq!(step(&mut cpu, &mut bus), 5); // LDA abs,X crossed: 4+1
        assert_eq!(step(&mut cpu, &mut bus), 5); // STA abs,X: always 5
    }

    #[test]
    fn branch_cycle_accounting() {
        // BNE forward, not taken (Z set): 2 cycles.
        let (mut cpu, mut bus) = boot(&[0xA9, 0x00, 0xD0, 0x10, 0xEA]);
        step(&mut cpu, &mut bus);
        assert_eq!(step(&mut cpu, &mut bus), 2);

        // BEQ taken, same page: 3 cycles.
        let (mut cpu, mut bus) = boot(&[0xA9, 0x00, 0xF0, 0x10]);
        step(&mut cpu, &mut bus);
        assert_eq!(step(&mut cpu, &mut bus), 3);
        assert_eq!(cpu.pc(), 0x8014);

        // BEQ taken backwards across a page: 4 cycles.
        let (mut cpu, mut bus) = boot(&[0xA9, 0x00, 0xF0, 0xFA]);
        step(&mut cpu, &mut bus);
        assert_eq!(step(&mut cpu, &mut bus), 4);
        assert_eq!(cpu.pc(), 0x7FFE);
    }

    #[test]
    fn jmp_indirect_page_wrap_bug() {
        let (mut cpu, mut bus) = boot(&[0x6C, 0xFF, 0x02]);
        bus.write(0x02FF, 0x34);
        bus.write(0x0300, 0x56); // would be the high byte without the bug
        bus.write(0x0200, 0x12); // the bug fetches from here instead
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.pc(), 0x1234);
    }

    #[test]
    fn indexed_indirect_wraps_in_zero_page() {
        // LDX #$04, LDA ($FE,X) -> pointer at $02/$03.
        let (mut cpu, mut bus) = boot(&[0xA2, 0x04, 0xA1, 0xFE]);
        bus.write(0x0002, 0x00);
        bus.write(0x0003, 0x04);
        bus.write(0x0400, 0x99);
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.a(), 0x99);
    }

    #[test]
    fn indirect_indexed_pointer_wraps() {
        // LDY #$01, LDA ($FF),Y -> pointer low at $FF, high at $00.
        let (mut cpu, mut bus) = boot(&[0xA0, 0x01, 0xB1, 0xFF]);
        bus.write(0x00FF, 0x00);
        bus.write(0x0000, 0x04);
        bus.write(0x0401, 0x77);
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.a(), 0x77);
    }

    #[test]
    fn adc_overflow_and_carry() {
        // 0x50 + 0x50 = 0xA0: V set (positive + positive = negative).
        let (mut cpu, mut bus) = boot(&[0xA9, 0x50, 0x69, 0x50]);
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.a(), 0xA0);
        assert!(cpu.flag(Status::V));
        assert!(!cpu.flag(Status::C));
        assert!(cpu.flag(Status::N));

        // 0xFF + 0x01 carries out with no signed overflow.
        let (mut cpu, mut bus) = boot(&[0xA9, 0xFF, 0x69, 0x01]);
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.a(), 0x00);
        assert!(cpu.flag(Status::C));
        assert!(cpu.flag(Status::Z));
        assert!(!cpu.flag(Status::V));
    }

    #[test]
    fn sbc_is_adc_of_inverted_operand() {
        // SEC; LDA #$10; SBC #$08 -> 0x08, carry set (no borrow).
        let (mut cpu, mut bus) = boot(&[0x38, 0xA9, 0x10, 0xE9, 0x08]);
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.a(), 0x08);
        assert!(cpu.flag(Status::C));
    }

    #[test]
    fn decimal_flag_is_stored_but_ignored() {
        // SED; SEC; LDA #$09; ADC #$01 -> binary 0x0B, not BCD 0x10.
        let (mut cpu, mut bus) = boot(&[0xF8, 0x38, 0xA9, 0x09, 0x69, 0x01]);
        for _ in 0..4 {
            step(&mut cpu, &mut bus);
        }
        assert_eq!(cpu.a(), 0x0B);
        assert!(cpu.flag(Status::D));
    }

    #[test]
    fn compare_sets_carry_on_greater_equal() {
        let (mut cpu, mut bus) = boot(&[0xA9, 0x40, 0xC9, 0x40, 0xC9, 0x41]);
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        assert!(cpu.flag(Status::C));
        assert!(cpu.flag(Status::Z));
        step(&mut cpu, &mut bus);
        assert!(!cpu.flag(Status::C));
        assert!(cpu.flag(Status::N));
    }

    #[test]
    fn shifts_write_back_to_memory() {
        // ASL $10 twice.
        let (mut cpu, mut bus) = boot(&[0x06, 0x10, 0x06, 0x10]);
        bus.write(0x0010, 0x81);
        step(&mut cpu, &mut bus);
        assert_eq!(bus.view(0x0010), 0x02);
        assert!(cpu.flag(Status::C));
        step(&mut cpu, &mut bus);
        assert_eq!(bus.view(0x0010), 0x04);
        assert!(!cpu.flag(Status::C));
    }

    #[test]
    fn rotate_accumulator_through_carry() {
        // SEC; ROL A with A=0 pulls the carry into bit 0.
        let (mut cpu, mut bus) = boot(&[0x38, 0x2A]);
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.a(), 0x01);
        assert!(!cpu.flag(Status::C));
    }

    #[test]
    fn jsr_rts_roundtrip() {
        // JSR $8010; (at $8010) RTS. PC must land on the byte after JSR,
        // SP and registers unchanged.
        let mut program = vec![0x20, 0x10, 0x80];
        program.resize(0x10, 0xEA);
        program.push(0x60); // $8010: RTS
        let (mut cpu, mut bus) = boot(&program);
        let sp_before = cpu.sp();
        let a_before = cpu.a();

        step(&mut cpu, &mut bus); // JSR
        assert_eq!(cpu.pc(), 0x8010);
        step(&mut cpu, &mut bus); // RTS
        assert_eq!(cpu.pc(), 0x8003);
        assert_eq!(cpu.sp(), sp_before);
        assert_eq!(cpu.a(), a_before);
    }

    #[test]
    fn brk_pushes_pc_plus_two_with_b_set() {
        let mut bus = FlatBus::with_program(0x8000, &[0x00]);
        bus.write(0xFFFE, 0x00);
        bus.write(0xFFFF, 0x90);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        for _ in 0..8 {
            cpu.execute_cycle(&mut bus);
        }
        let sp_before = cpu.sp();
        step(&mut cpu, &mut bus);

        assert_eq!(cpu.pc(), 0x9000);
        assert!(cpu.flag(Status::I));
        let pushed_sr = bus.view(0x0100 | u16::from(sp_before.wrapping_sub(2)));
        assert_eq!(pushed_sr & 0x30, 0x30); // B and U both set
        let pushed_pc = u16::from(bus.view(0x0100 | u16::from(sp_before.wrapping_sub(1))))
            | (u16::from(bus.view(0x0100 | u16::from(sp_before))) << 8);
        assert_eq!(pushed_pc, 0x8002);
    }

    #[test]
    fn rti_restores_status_and_pc_without_increment() {
        // BRK into a handler that immediately RTIs.
        let mut bus = FlatBus::with_program(0x8000, &[0x00, 0xEA, 0xEA]);
        bus.write(0xFFFE, 0x00);
        bus.write(0xFFFF, 0x90);
        bus.write(0x9000, 0x40); // RTI
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        for _ in 0..8 {
            cpu.execute_cycle(&mut bus);
        }
        step(&mut cpu, &mut bus); // BRK
        step(&mut cpu, &mut bus); // RTI
        assert_eq!(cpu.pc(), 0x8002); // BRK pushed PC+2, RTI adds nothing
    }

    #[test]
    fn irq_respects_interrupt_disable() {
        let mut bus = FlatBus::with_program(0x8000, &[0x78, 0x58]); // SEI; CLI
        bus.write(0xFFFE, 0x00);
        bus.write(0xFFFF, 0xA0);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        for _ in 0..8 {
            cpu.execute_cycle(&mut bus);
        }
        step(&mut cpu, &mut bus); // SEI
        assert!(!cpu.irq(&mut bus));
        step(&mut cpu, &mut bus); // CLI
        assert!(cpu.irq(&mut bus));
        assert_eq!(cpu.pc(), 0xA000);
        assert!(cpu.flag(Status::I));
    }

    #[test]
    fn nmi_is_unconditional_and_pushes_with_b_clear() {
        let mut bus = FlatBus::with_program(0x8000, &[0x78]); // SEI
        bus.write(0xFFFA, 0x00);
        bus.write(0xFFFB, 0xB0);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        for _ in 0..8 {
            cpu.execute_cycle(&mut bus);
        }
        step(&mut cpu, &mut bus); // SEI: I is set, NMI fires anyway
        let sp_before = cpu.sp();
        cpu.nmi(&mut bus);
        assert_eq!(cpu.pc(), 0xB000);
        let pushed_sr = bus.view(0x0100 | u16::from(sp_before.wrapping_sub(2)));
        assert_eq!(pushed_sr & 0x30, 0x20); // U set, B clear
    }

    #[test]
    fn unofficial_opcodes_are_harmless() {
        let (mut cpu, mut bus) = boot(&[0x02, 0xEA]);
        let a = cpu.a();
        assert_eq!(step(&mut cpu, &mut bus), 2);
        assert_eq!(cpu.pc(), 0x8001);
        assert_eq!(cpu.a(), a);
    }

    #[test]
    fn serialize_roundtrip_is_identical() {
        let (mut cpu, mut bus) = boot(&[0xA9, 0x42, 0x48, 0xA2, 0x10]);
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        cpu.execute_cycle(&mut bus); // stop mid-instruction

        let mut s = Serializer::new(Vec::new());
        cpu.serialize(&mut s).unwrap();
        let first = s.into_inner();

        let mut restored = Cpu::new();
        let mut d = Deserializer::new(first.as_slice());
        restored.deserialize(&mut d).unwrap();

        let mut s = Serializer::new(Vec::new());
        restored.serialize(&mut s).unwrap();
        assert_eq!(first, s.into_inner());
        assert_eq!(restored.pc(), cpu.pc());
        assert_eq!(restored.a(), cpu.a());
    }

    proptest! {
        /// PHA/PLA roundtrip: any byte comes back with N/Z set from it.
        #[test]
        fn stack_roundtrip(value in any::<u8>()) {
            let (mut cpu, mut bus) = boot(&[0xA9, value, 0x48, 0xA9, 0x00, 0x68]);
            for _ in 0..4 {
                step(&mut cpu, &mut bus);
            }
            prop_assert_eq!(cpu.a(), value);
            prop_assert_eq!(cpu.flag(Status::Z), value == 0);
            prop_assert_eq!(cpu.flag(Status::N), value & 0x80 != 0);
        }

    }

    #[test]
    fn sp_wraps_within_the_stack_page() {
        // LDA #$AA then 300 pushes: SP walks off the bottom of the page
        // and wraps; every stack byte gets written, nothing outside it.
        let mut program = vec![0xA9, 0xAA];
        program.extend(std::iter::repeat(0x48).take(300));
        let (mut cpu, mut bus) = boot(&program);
        for _ in 0..301 {
            step(&mut cpu, &mut bus);
        }
        assert_eq!(cpu.sp(), 0xFDu8.wrapping_sub(44)); // 300 % 256 = 44
        assert_eq!(bus.view(0x0100), 0xAA);
        assert_eq!(bus.view(0x01FF), 0xAA);
        assert_eq!(bus.view(0x00FF), 0x00);
        assert_eq!(bus.view(0x0200), 0x00);
    }
}
