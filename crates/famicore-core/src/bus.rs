//! System bus and master clock.
//!
//! The bus owns every device - CPU, PPU, APU, mapper, internal RAM,
//! controller latches, and the two DMA engines - and advances the whole
//! machine with [`Bus::execute_cycle`]: three PPU dots, then one CPU
//! sub-cycle (or a DMA sub-cycle stealing the bus from it), then an APU
//! half-step, then interrupt delivery.
//!
//! CPU address decode:
//!
//! ```text
//! $0000-$1FFF  2 KiB internal RAM, mirrored every $0800
//! $2000-$3FFF  PPU registers, mirrored every 8 bytes
//! $4000-$4013  APU channel registers
//! $4014        OAM DMA trigger
//! $4015        APU status
//! $4016        controller 1 data / joint strobe
//! $4017        controller 2 data / APU frame counter
//! $4018-$401F  open bus
//! $4020-$FFFF  cartridge (mapper)
//! ```

use crate::audio::{AudioSink, SampleRing, SAMPLE_RATE};
use crate::controller::Controller;
use famicore_apu::Apu;
use famicore_cpu::{Cpu, CpuBus};
use famicore_mappers::{Mapper, Mirroring, Rom, RomError, ScanlineEffect};
use famicore_ppu::{Ppu, PpuBus};
use famicore_state::{Deserializer, SaveStateError, Serializer};
use std::io::{Read, Write};
use std::path::Path;

/// Emulated CPU cycles per second (29,780 cycles x 60 frames), the pacing
/// denominator for audio sample emission.
pub const CPU_CLOCK_HZ: u32 = 1_786_800;

/// OAM DMA engine state ($4014).
#[derive(Debug, Clone, Default)]
struct OamDma {
    requested: bool,
    ongoing: bool,
    page: u8,
    offset: u8,
    data: u8,
}

/// DMC DMA engine state (single-byte sample fetches).
#[derive(Debug, Clone, Default)]
struct DmcDma {
    requested: bool,
    ongoing: bool,
    address: u16,
    data: u8,
    delay: u8,
}

/// The NES system bus.
pub struct Bus {
    cpu: Cpu,
    ppu: Ppu,
    apu: Apu,
    mapper: Mapper,

    ram: [u8; 0x800],
    controllers: [Controller; 2],
    controller_latches: [u8; 2],
    strobe: bool,

    oam_dma: OamDma,
    dmc_dma: DmcDma,

    total_cycles: u64,
    /// Fixed-point audio clock: accumulates `SAMPLE_RATE` per cycle and
    /// emits one sample per `CPU_CLOCK_HZ` accumulated.
    sample_clock: u32,
    audio: SampleRing,
}

/// The mapper as seen from the PPU: CHR space, mirroring, and the
/// end-of-scanline notification.
struct MapperPpuBus<'a> {
    mapper: &'a mut Mapper,
}

impl PpuBus for MapperPpuBus<'_> {
    fn read_chr(&mut self, addr: u16) -> u8 {
        self.mapper.read_chr(addr)
    }

    fn view_chr(&self, addr: u16) -> u8 {
        self.mapper.view_chr(addr)
    }

    fn write_chr(&mut self, addr: u16, value: u8) {
        self.mapper.write_chr(addr, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    fn end_scanline(&mut self) -> ScanlineEffect {
        self.mapper.on_scanline_end()
    }
}

/// Read-only variant of [`MapperPpuBus`] for the `view` paths. The
/// mutating trait methods are never reached from a view; they fall back
/// to side-effect-free behavior.
struct MapperPpuView<'a> {
    mapper: &'a Mapper,
}

impl PpuBus for MapperPpuView<'_> {
    fn read_chr(&mut self, addr: u16) -> u8 {
        self.mapper.view_chr(addr)
    }

    fn view_chr(&self, addr: u16) -> u8 {
        self.mapper.view_chr(addr)
    }

    fn write_chr(&mut self, _addr: u16, _value: u8) {}

    fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    fn end_scanline(&mut self) -> ScanlineEffect {
        ScanlineEffect::None
    }
}

/// Everything the CPU can reach, split off from the CPU itself so the
/// borrow is clean while an instruction executes.
struct CpuView<'a> {
    ram: &'a mut [u8; 0x800],
    ppu: &'a mut Ppu,
    apu: &'a mut Apu,
    mapper: &'a mut Mapper,
    controllers: &'a [Controller; 2],
    controller_latches: &'a mut [u8; 2],
    strobe: &'a mut bool,
    oam_dma: &'a mut OamDma,
}

impl CpuView<'_> {
    fn read_controller(&mut self, port: usize) -> u8 {
        if *self.strobe {
            // Strobe held high: the shifter is frozen on bit 0.
            self.controllers[port].snapshot() & 0x1
        } else {
            let data = self.controller_latches[port] & 0x1;
            // Shift in 1s so exhausted reads return open-bus style 1.
            self.controller_latches[port] = (self.controller_latches[port] >> 1) | 0x80;
            data
        }
    }

    fn write_strobe(&mut self, value: u8) {
        let new_strobe = value & 0x1 != 0;
        if *self.strobe && !new_strobe {
            self.controller_latches[0] = self.controllers[0].snapshot();
            self.controller_latches[1] = self.controllers[1].snapshot();
        }
        *self.strobe = new_strobe;
    }
}

impl CpuBus for CpuView<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr & 0x07FF)],
            0x2000..=0x3FFF => {
                let mut chr = MapperPpuBus {
                    mapper: self.mapper,
                };
                self.ppu.read_register(addr & 0x7, &mut chr)
            }
            0x4015 => self.apu.read_status(),
            0x4016 => self.read_controller(0),
            0x4017 => self.read_controller(1),
            // Write-only and disabled registers read as open bus 0.
            0x4000..=0x401F => 0,
            _ => self.mapper.read_prg(addr),
        }
    }

    fn view(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr & 0x07FF)],
            0x2000..=0x3FFF => {
                let chr = MapperPpuView {
                    mapper: self.mapper,
                };
                self.ppu.view_register(addr & 0x7, &chr)
            }
            0x4015 => self.apu.view_status(),
            0x4016 => self.controller_latches[0],
            0x4017 => self.controller_latches[1],
            0x4000..=0x401F => 0,
            _ => self.mapper.view_prg(addr),
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr & 0x07FF)] = value,
            0x2000..=0x3FFF => {
                let mut chr = MapperPpuBus {
                    mapper: self.mapper,
                };
                self.ppu.write_register(addr & 0x7, value, &mut chr);
            }
            0x4000..=0x4013 => self.apu.write(addr, value),
            0x4014 => {
                self.oam_dma.requested = true;
                self.oam_dma.ongoing = false;
                self.oam_dma.page = value;
                self.oam_dma.offset = 0;
            }
            0x4015 => self.apu.write_status(value),
            0x4016 => self.write_strobe(value),
            0x4017 => self.apu.write_frame_counter(value),
            0x4018..=0x401F => {}
            _ => self.mapper.write_prg(addr, value),
        }
    }
}

impl Bus {
    /// Build a machine from a parsed ROM and run the CPU reset sequence.
    ///
    /// # Errors
    ///
    /// Returns [`RomError::UnimplementedMapper`] for unsupported boards.
    pub fn new(rom: &Rom) -> Result<Self, RomError> {
        let mapper = Mapper::new(rom)?;
        let mut bus = Self {
            cpu: Cpu::new(),
            ppu: Ppu::new(),
            apu: Apu::new(),
            mapper,
            ram: [0; 0x800],
            controllers: [Controller::default(); 2],
            controller_latches: [0; 2],
            strobe: false,
            oam_dma: OamDma::default(),
            dmc_dma: DmcDma::default(),
            total_cycles: 0,
            sample_clock: 0,
            audio: SampleRing::new(),
        };
        bus.with_cpu_view(|cpu, view| cpu.reset(view));
        Ok(bus)
    }

    /// Load a `.nes` file and build a machine from it.
    ///
    /// # Errors
    ///
    /// Returns the [`RomError`] describing why the file was rejected.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RomError> {
        let rom = Rom::from_file(path)?;
        Self::new(&rom)
    }

    /// Reset the whole machine: RAM, devices, DMA, and the CPU reset
    /// sequence. Cartridge RAM contents survive, as on real hardware.
    pub fn reset(&mut self) {
        self.ram = [0; 0x800];
        self.controller_latches = [0; 2];
        self.strobe = false;
        self.oam_dma = OamDma::default();
        self.dmc_dma = DmcDma::default();
        self.total_cycles = 0;
        self.sample_clock = 0;
        self.audio.clear();
        self.ppu.reset();
        self.apu.reset();
        self.mapper.reset();
        self.cpu = Cpu::new();
        self.with_cpu_view(|cpu, view| cpu.reset(view));
    }

    fn with_cpu_view<T>(&mut self, f: impl FnOnce(&mut Cpu, &mut CpuView<'_>) -> T) -> T {
        let Self {
            cpu,
            ppu,
            apu,
            mapper,
            ram,
            controllers,
            controller_latches,
            strobe,
            oam_dma,
            ..
        } = self;
        let mut view = CpuView {
            ram,
            ppu,
            apu,
            mapper,
            controllers,
            controller_latches,
            strobe,
            oam_dma,
        };
        f(cpu, &mut view)
    }

    /// Advance the machine by one master cycle (one CPU cycle, three PPU
    /// dots, half an APU cycle).
    pub fn execute_cycle(&mut self) {
        // Three PPU dots per CPU cycle.
        for _ in 0..3 {
            let mut chr = MapperPpuBus {
                mapper: &mut self.mapper,
            };
            self.ppu.tick(&mut chr);
        }

        // The DMA engines steal the bus from the CPU; OAM DMA has
        // priority over DMC DMA.
        if self.oam_dma.requested {
            self.oam_dma_cycle();
        } else if self.dmc_dma.requested {
            self.dmc_dma_cycle();
        } else {
            self.with_cpu_view(|cpu, view| cpu.execute_cycle(view));
        }

        // Two master cycles per APU cycle.
        self.apu.execute_half_cycle();
        if let Some(address) = self.apu.take_dmc_request() {
            self.dmc_dma.requested = true;
            self.dmc_dma.address = address;
        }

        // Interrupt delivery. NMI is edge-like: delivered once and
        // acknowledged. IRQ is level-triggered off the live mapper and
        // APU lines, so a handler's acknowledge write takes effect
        // immediately; the CPU ignores it while I is set.
        if self.ppu.nmi_request() {
            self.with_cpu_view(|cpu, view| cpu.nmi(view));
            self.ppu.clear_nmi_request();
        }
        if self.mapper.irq_pending() || self.apu.irq_pending() {
            self.with_cpu_view(|cpu, view| cpu.irq(view));
        }

        self.total_cycles += 1;

        // Emit one audio sample every CPU_CLOCK_HZ / SAMPLE_RATE cycles,
        // tracked exactly with an integer accumulator.
        self.sample_clock += SAMPLE_RATE;
        if self.sample_clock >= CPU_CLOCK_HZ {
            self.sample_clock -= CPU_CLOCK_HZ;
            let sample = self.apu.sample();
            self.audio.push_sample(sample);
        }
    }

    /// One OAM DMA sub-cycle: an alignment wait if triggered on an odd
    /// cycle, then 256 read/write pairs into OAM. Total stall is 513 or
    /// 514 CPU cycles.
    fn oam_dma_cycle(&mut self) {
        let odd_cycle = self.total_cycles & 0x1 != 0;

        if !self.oam_dma.ongoing && !odd_cycle {
            self.oam_dma.ongoing = true;
        }

        if self.oam_dma.ongoing {
            if odd_cycle {
                self.ppu
                    .dma_write_oam(self.oam_dma.offset, self.oam_dma.data);
                self.oam_dma.offset = self.oam_dma.offset.wrapping_add(1);
                if self.oam_dma.offset == 0 {
                    self.oam_dma.requested = false;
                    self.oam_dma.ongoing = false;
                }
            } else {
                let addr = (u16::from(self.oam_dma.page) << 8) | u16::from(self.oam_dma.offset);
                self.oam_dma.data = self.with_cpu_view(|_, view| view.read(addr));
            }
        }
    }

    /// One DMC DMA sub-cycle: the CPU stalls four cycles and the sample
    /// byte is fetched on the last one.
    fn dmc_dma_cycle(&mut self) {
        if !self.dmc_dma.ongoing {
            self.dmc_dma.ongoing = true;
            self.dmc_dma.delay = 0;
        }

        self.dmc_dma.delay += 1;
        if self.dmc_dma.delay >= 4 {
            let addr = self.dmc_dma.address;
            self.dmc_dma.data = self.with_cpu_view(|_, view| view.read(addr));
            self.apu.receive_dmc_sample(self.dmc_dma.data);
            self.dmc_dma.requested = false;
            self.dmc_dma.ongoing = false;
            self.dmc_dma.delay = 0;
        }
    }

    // ==== driver interface ====

    /// Side-effect-free read of the CPU address space.
    pub fn view(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr & 0x07FF)],
            0x2000..=0x3FFF => {
                let chr = MapperPpuView {
                    mapper: &self.mapper,
                };
                self.ppu.view_register(addr & 0x7, &chr)
            }
            0x4015 => self.apu.view_status(),
            0x4016 => self.controller_latches[0],
            0x4017 => self.controller_latches[1],
            0x4000..=0x401F => 0,
            _ => self.mapper.view_prg(addr),
        }
    }

    /// Set a controller's live button mask (port 0 or 1).
    pub fn set_controller(&mut self, port: usize, buttons: u8) {
        self.controllers[port & 0x1].set_buttons(buttons);
    }

    /// Master cycles executed since power-on or reset.
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// The CPU, for debug inspection.
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Mutable CPU access (test harnesses force the PC through here).
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// The PPU, for frame and status queries.
    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    /// Mutable PPU access (the driver takes finished frames here).
    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    /// The APU, for debug inspection.
    pub fn apu(&self) -> &Apu {
        &self.apu
    }

    /// The cartridge mapper.
    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// The audio ring the engine fills; the driver drains it.
    pub fn audio_mut(&mut self) -> &mut SampleRing {
        &mut self.audio
    }

    /// Disassemble the instruction at `addr` without disturbing state.
    pub fn disassemble(&self, addr: u16) -> String {
        struct ViewOnly<'a>(&'a Bus);
        impl CpuBus for ViewOnly<'_> {
            fn read(&mut self, addr: u16) -> u8 {
                self.0.view(addr)
            }
            fn view(&self, addr: u16) -> u8 {
                self.0.view(addr)
            }
            fn write(&mut self, _addr: u16, _value: u8) {}
        }
        famicore_cpu::disassemble(addr, &ViewOnly(self))
    }

    // ==== save states ====

    /// Serialize bus-owned state (the devices serialize themselves; see
    /// `save_state`).
    pub(crate) fn serialize_bus<W: Write>(
        &self,
        s: &mut Serializer<W>,
    ) -> Result<(), SaveStateError> {
        s.write_u64(self.total_cycles)?;
        s.write_bytes(&self.ram)?;
        s.write_bytes(&self.controller_latches)?;
        s.write_bool(self.strobe)?;

        s.write_bool(self.oam_dma.requested)?;
        s.write_bool(self.oam_dma.ongoing)?;
        s.write_u8(self.oam_dma.page)?;
        s.write_u8(self.oam_dma.offset)?;
        s.write_u8(self.oam_dma.data)?;

        s.write_bool(self.dmc_dma.requested)?;
        s.write_bool(self.dmc_dma.ongoing)?;
        s.write_u16(self.dmc_dma.address)?;
        s.write_u8(self.dmc_dma.data)?;
        s.write_u8(self.dmc_dma.delay)?;

        s.write_u32(self.sample_clock)
    }

    pub(crate) fn deserialize_bus<R: Read>(
        &mut self,
        d: &mut Deserializer<R>,
    ) -> Result<(), SaveStateError> {
        self.total_cycles = d.read_u64()?;
        d.read_bytes(&mut self.ram)?;
        d.read_bytes(&mut self.controller_latches)?;
        self.strobe = d.read_bool()?;

        self.oam_dma.requested = d.read_bool()?;
        self.oam_dma.ongoing = d.read_bool()?;
        self.oam_dma.page = d.read_u8()?;
        self.oam_dma.offset = d.read_u8()?;
        self.oam_dma.data = d.read_u8()?;

        self.dmc_dma.requested = d.read_bool()?;
        self.dmc_dma.ongoing = d.read_bool()?;
        self.dmc_dma.address = d.read_u16()?;
        self.dmc_dma.data = d.read_u8()?;
        self.dmc_dma.delay = d.read_u8()?;

        self.sample_clock = d.read_u32()?;
        Ok(())
    }

    pub(crate) fn components(
        &self,
    ) -> (&Cpu, &Ppu, &Apu, &Mapper) {
        (&self.cpu, &self.ppu, &self.apu, &self.mapper)
    }

    pub(crate) fn components_mut(
        &mut self,
    ) -> (&mut Cpu, &mut Ppu, &mut Apu, &mut Mapper) {
        (&mut self.cpu, &mut self.ppu, &mut self.apu, &mut self.mapper)
    }
}

impl Clone for Bus {
    fn clone(&self) -> Self {
        Self {
            cpu: self.cpu.clone(),
            ppu: self.ppu.clone(),
            apu: self.apu.clone(),
            mapper: self.mapper.clone(),
            ram: self.ram,
            controllers: self.controllers,
            controller_latches: self.controller_latches,
            strobe: self.strobe,
            oam_dma: self.oam_dma.clone(),
            dmc_dma: self.dmc_dma.clone(),
            total_cycles: self.total_cycles,
            sample_clock: self.sample_clock,
            audio: self.audio.clone(),
        }
    }
}

