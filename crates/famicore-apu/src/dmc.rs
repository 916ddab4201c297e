//! DMC sample-fetch plumbing.
//!
//! The delta modulation channel's audio output is not modeled; what is
//! modeled is its memory traffic, because fetching sample bytes steals
//! the CPU from the bus. The rate timer drains a one-byte sample buffer
//! through the output shifter; whenever the buffer is empty and bytes
//! remain, the channel posts an outstanding read request (a flag plus the
//! target address) that the bus services with a 4-cycle DMA stall.

use famicore_state::{Deserializer, SaveStateError, Serializer};
use std::io::{Read, Write};

/// NTSC rate table: CPU cycles between output-unit clocks.
const RATE_TABLE: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

/// DMC state.
#[derive(Debug, Clone)]
pub struct Dmc {
    /// Outstanding read request flag.
    request_pending: bool,
    /// Address of the outstanding read.
    request_address: u16,

    /// $4010: loop flag and rate index (IRQ enable is stored, unused).
    control: u8,
    /// $4012: sample start address register.
    sample_address: u8,
    /// $4013: sample length register.
    sample_length: u8,

    timer_counter: u16,
    current_address: u16,
    bytes_remaining: u16,
    sample_buffer: Option<u8>,
    bits_remaining: u8,
}

impl Dmc {
    /// Power-on state.
    pub fn new() -> Self {
        Self {
            request_pending: false,
            request_address: 0,
            control: 0,
            sample_address: 0,
            sample_length: 0,
            timer_counter: RATE_TABLE[0],
            current_address: 0xC000,
            bytes_remaining: 0,
            sample_buffer: None,
            bits_remaining: 8,
        }
    }

    /// $4010-$4013 writes.
    pub fn write(&mut self, register: u16, value: u8) {
        match register & 0x3 {
            0 => self.control = value,
            1 => {} // direct output level: audio output is out of scope
            2 => self.sample_address = value,
            _ => self.sample_length = value,
        }
    }

    fn rate(&self) -> u16 {
        RATE_TABLE[usize::from(self.control & 0x0F)]
    }

    fn looping(&self) -> bool {
        (self.control >> 6) & 0x1 != 0
    }

    fn restart_sample(&mut self) {
        self.current_address = 0xC000 + u16::from(self.sample_address) * 64;
        self.bytes_remaining = u16::from(self.sample_length) * 16 + 1;
    }

    /// $4015 enable bit. Enabling with an exhausted sample restarts it;
    /// disabling stops fetches immediately.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            if self.bytes_remaining == 0 {
                self.restart_sample();
                log::trace!(
                    "DMC sample started at {:#06X}, {} bytes",
                    self.current_address,
                    self.bytes_remaining
                );
            }
            self.refill();
        } else {
            self.bytes_remaining = 0;
            self.request_pending = false;
        }
    }

    /// Bytes remaining (the $4015 status bit).
    pub fn active(&self) -> bool {
        self.bytes_remaining > 0
    }

    /// Post a read request if the buffer is empty and bytes remain.
    fn refill(&mut self) {
        if self.sample_buffer.is_none() && self.bytes_remaining > 0 {
            self.request_pending = true;
            self.request_address = self.current_address;
        }
    }

    /// Take the outstanding request, if any, for the bus to service.
    pub fn take_request(&mut self) -> Option<u16> {
        if self.request_pending {
            self.request_pending = false;
            Some(self.request_address)
        } else {
            None
        }
    }

    /// DMA completion: one sample byte arrives from the bus.
    pub fn receive_sample(&mut self, value: u8) {
        self.sample_buffer = Some(value);
        // Address wraps from $FFFF back into $8000.
        self.current_address = if self.current_address == 0xFFFF {
            0x8000
        } else {
            self.current_address + 1
        };
        self.bytes_remaining = self.bytes_remaining.saturating_sub(1);
        if self.bytes_remaining == 0 && self.looping() {
            self.restart_sample();
        }
    }

    /// CPU-cycle clock of the rate timer and output shifter.
    pub fn clock(&mut self) {
        if self.timer_counter > 0 {
            self.timer_counter -= 1;
            return;
        }
        self.timer_counter = self.rate();

        // One output bit consumed; after eight the shifter reloads from
        // the sample buffer, which then wants refilling.
        if self.bits_remaining > 1 {
            self.bits_remaining -= 1;
        } else {
            self.bits_remaining = 8;
            if self.sample_buffer.take().is_some() {
                self.refill();
            }
        }
    }

    pub(crate) fn serialize<W: Write>(&self, s: &mut Serializer<W>) -> Result<(), SaveStateError> {
        s.write_bool(self.request_pending)?;
        s.write_u16(self.request_address)?;
        s.write_u8(self.control)?;
        s.write_u8(self.sample_address)?;
        s.write_u8(self.sample_length)?;
        s.write_u16(self.timer_counter)?;
        s.write_u16(self.current_address)?;
        s.write_u16(self.bytes_remaining)?;
        s.write_bool(self.sample_buffer.is_some())?;
        s.write_u8(self.sample_buffer.unwrap_or(0))?;
        s.write_u8(self.bits_remaining)
    }

    pub(crate) fn deserialize<R: Read>(
        &mut self,
        d: &mut Deserializer<R>,
    ) -> Result<(), SaveStateError> {
        self.request_pending = d.read_bool()?;
        self.request_address = d.read_u16()?;
        self.control = d.read_u8()?;
        self.sample_address = d.read_u8()?;
        self.sample_length = d.read_u8()?;
        self.timer_counter = d.read_u16()?;
        self.current_address = d.read_u16()?;
        self.bytes_remaining = d.read_u16()?;
        let has_buffer = d.read_bool()?;
        let buffer = d.read_u8()?;
        self.sample_buffer = has_buffer.then_some(buffer);
        self.bits_remaining = d.read_u8()?;
        Ok(())
    }
}

impl Default for Dmc {
    fn default() -> Self {
        Self::new()
    }
}
