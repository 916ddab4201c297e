//! 2A03 APU top level.
//!
//! Register traffic ($4000-$4013, $4015, $4017) lands here. The bus
//! advances the APU by one half-step per master cycle: two half-steps
//! make one APU cycle, which clocks the pulse timers, while the frame
//! counter and DMC rate timer count whole CPU cycles.
//!
//! The `view_status`/`read_status` split mirrors the rest of the machine:
//! `read` acknowledges the frame IRQ, `view` is a debugger snapshot that
//! does not.

use crate::dmc::Dmc;
use crate::frame_counter::FrameCounter;
use crate::pulse::Pulse;
use famicore_state::{Deserializer, SaveStateError, Serializer};
use std::io::{Read, Write};

/// The audio processing unit.
#[derive(Debug, Clone)]
pub struct Apu {
    pulse1: Pulse,
    pulse2: Pulse,
    dmc: Dmc,
    frame_counter: FrameCounter,
    /// $4015 enable register shadow.
    enable: u8,
    /// Half-step phase: pulse timers clock on every second call.
    half_step: bool,
    /// CPU cycle parity for the $4017 reset delay.
    odd_cycle: bool,
}

impl Apu {
    /// Power-on state: all channels disabled.
    pub fn new() -> Self {
        Self {
            pulse1: Pulse::new(true),
            pulse2: Pulse::new(false),
            dmc: Dmc::new(),
            frame_counter: FrameCounter::new(),
            enable: 0,
            half_step: false,
            odd_cycle: false,
        }
    }

    /// Return to power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Channel register write, $4000-$4013.
    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x4000 => self.pulse1.write_control(value),
            0x4001 => self.pulse1.write_sweep(value),
            0x4002 => self.pulse1.write_timer_lo(value),
            0x4003 => self.pulse1.write_timer_hi(value),
            0x4004 => self.pulse2.write_control(value),
            0x4005 => self.pulse2.write_sweep(value),
            0x4006 => self.pulse2.write_timer_lo(value),
            0x4007 => self.pulse2.write_timer_hi(value),
            // Triangle and noise registers are accepted and dropped;
            // those channels are not modeled.
            0x4008..=0x400F => {}
            0x4010..=0x4013 => self.dmc.write(addr, value),
            _ => {}
        }
    }

    /// $4015 write: channel enables.
    pub fn write_status(&mut self, value: u8) {
        self.enable = value;
        self.pulse1.set_enabled(value & 0x01 != 0);
        self.pulse2.set_enabled(value & 0x02 != 0);
        self.dmc.set_enabled(value & 0x10 != 0);
    }

    fn status_byte(&self) -> u8 {
        u8::from(self.pulse1.active())
            | (u8::from(self.pulse2.active()) << 1)
            | (u8::from(self.dmc.active()) << 4)
            | (u8::from(self.frame_counter.irq_pending()) << 6)
    }

    /// $4015 read: channel-active bits plus the frame IRQ flag, which the
    /// read acknowledges.
    pub fn read_status(&mut self) -> u8 {
        let value = self.status_byte();
        self.frame_counter.clear_irq();
        value
    }

    /// $4015 snapshot without the IRQ acknowledgement.
    pub fn view_status(&self) -> u8 {
        self.status_byte()
    }

    /// $4017 write: frame counter mode.
    pub fn write_frame_counter(&mut self, value: u8) {
        self.frame_counter.write(value, self.odd_cycle);
    }

    /// Frame IRQ line.
    pub fn irq_pending(&self) -> bool {
        self.frame_counter.irq_pending()
    }

    /// Outstanding DMC sample-read request for the bus to service.
    pub fn take_dmc_request(&mut self) -> Option<u16> {
        self.dmc.take_request()
    }

    /// DMC DMA completion.
    pub fn receive_dmc_sample(&mut self, value: u8) {
        self.dmc.receive_sample(value);
    }

    /// Advance one half-step (one per master cycle; two per APU cycle).
    pub fn execute_half_cycle(&mut self) {
        self.odd_cycle = !self.odd_cycle;

        // Frame counter and DMC rate timer run on CPU cycles.
        let clocks = self.frame_counter.clock();
        if clocks.quarter {
            self.pulse1.clock_quarter_frame();
            self.pulse2.clock_quarter_frame();
        }
        if clocks.half {
            self.pulse1.clock_half_frame();
            self.pulse2.clock_half_frame();
        }
        self.dmc.clock();

        // Pulse timers run at half CPU speed.
        self.half_step = !self.half_step;
        if !self.half_step {
            self.pulse1.clock_timer();
            self.pulse2.clock_timer();
        }
    }

    /// Current mono output sample.
    pub fn sample(&self) -> f32 {
        (self.pulse1.output() + self.pulse2.output()) / 10.0
    }

    /// Write APU state in declaration order.
    ///
    /// # Errors
    /// Propagates stream write failures.
    pub fn serialize<W: Write>(&self, s: &mut Serializer<W>) -> Result<(), SaveStateError> {
        self.pulse1.serialize(s)?;
        self.pulse2.serialize(s)?;
        self.frame_counter.serialize(s)?;
        s.write_u8(self.enable)?;
        self.dmc.serialize(s)?;
        s.write_bool(self.half_step)?;
        s.write_bool(self.odd_cycle)
    }

    /// Restore APU state written by [`Apu::serialize`].
    ///
    /// # Errors
    /// Propagates stream read failures.
    pub fn deserialize<R: Read>(&mut self, d: &mut Deserializer<R>) -> Result<(), SaveStateError> {
        self.pulse1.deserialize(d)?;
        self.pulse2.deserialize(d)?;
        self.frame_counter.deserialize(d)?;
        self.enable = d.read_u8()?;
        self.dmc.deserialize(d)?;
        self.half_step = d.read_bool()?;
        self.odd_cycle = d.read_bool()?;
        Ok(())
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}
