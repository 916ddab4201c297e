//! Ricoh 2C02 PPU core.
//!
//! One [`Ppu::tick`] call is one dot. A frame is 262 scanlines of 341 dots:
//! the pre-render line (-1), 240 visible lines, the post-render line, and
//! 20 lines of vertical blank. Rendering walks the loopy `v` register
//! through the nametables, feeding four shift registers that produce one
//! background pixel per dot, while up to eight sprites evaluated on the
//! previous line overlay it.
//!
//! The CPU sees eight registers ($2000-$2007); pattern-table memory lives
//! on the cartridge and is reached through the [`PpuBus`] handle passed to
//! each call, which also reports the current mirroring and carries the
//! end-of-scanline notification to the mapper.

use crate::background::Background;
use crate::palette::screen_color;
use crate::registers::{PpuCtrl, PpuMask, PpuStatus};
use crate::scroll::Scroll;
use crate::sprites::{ScanlineSprite, SpriteLine};
use crate::PpuBus;
use famicore_mappers::{Mirroring, ScanlineEffect};
use famicore_state::{Deserializer, SaveStateError, Serializer};
use std::io::{Read, Write};

/// Frame width in pixels.
pub const FRAME_WIDTH: usize = 256;
/// Frame height in pixels.
pub const FRAME_HEIGHT: usize = 240;

const DOTS_PER_SCANLINE: i32 = 341;
const PRE_RENDER_SCANLINE: i32 = -1;
const LAST_SCANLINE: i32 = 260;

/// Dots between the vblank flag going up and the NMI request being
/// delivered, reproducing hardware behavior around $2002 reads at the
/// vblank boundary.
const NMI_DELAY_DOTS: u8 = 3;

/// The picture processing unit.
#[derive(Debug, Clone)]
pub struct Ppu {
    // Register shadows
    ctrl: PpuCtrl,
    mask: PpuMask,
    status: PpuStatus,
    scroll: Scroll,
    read_buffer: u8,
    oam_addr: u8,

    // Memory
    nametable: [u8; 2048],
    palette_ram: [u8; 32],
    oam: [u8; 256],

    // Render pipeline
    background: Background,
    sprite_line: SpriteLine,

    // Timing
    scanline: i32,
    cycle: i32,
    odd_frame: bool,

    // Interrupt requests
    nmi_request: bool,
    nmi_delay: u8,
    irq_request: bool,

    // Output
    working: Vec<u32>,
    finished: Vec<u32>,
    frame_ready: bool,
    total_frames: u64,
}

impl Ppu {
    /// Power-on state.
    pub fn new() -> Self {
        Self {
            ctrl: PpuCtrl::empty(),
            mask: PpuMask::empty(),
            status: PpuStatus::empty(),
            scroll: Scroll::default(),
            read_buffer: 0,
            oam_addr: 0,
            nametable: [0; 2048],
            palette_ram: [0; 32],
            oam: [0; 256],
            background: Background::default(),
            sprite_line: SpriteLine::default(),
            scanline: PRE_RENDER_SCANLINE,
            cycle: 0,
            odd_frame: false,
            nmi_request: false,
            nmi_delay: 0,
            irq_request: false,
            working: vec![0; FRAME_WIDTH * FRAME_HEIGHT],
            finished: vec![0; FRAME_WIDTH * FRAME_HEIGHT],
            frame_ready: false,
            total_frames: 0,
        }
    }

    /// Return to power-on state. Memory contents are cleared.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // ==== external signals ====

    /// Pending NMI request (vblank began with NMI enabled).
    pub fn nmi_request(&self) -> bool {
        self.nmi_request
    }

    /// Acknowledge the NMI request after delivering it.
    pub fn clear_nmi_request(&mut self) {
        self.nmi_request = false;
    }

    /// Mapper IRQ line as sampled at the last end-of-scanline.
    pub fn irq_request(&self) -> bool {
        self.irq_request
    }

    /// A finished frame is waiting in the front buffer.
    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    /// Hand out the finished 256x240 `0xAARRGGBB` frame and clear the
    /// ready flag.
    pub fn take_frame(&mut self) -> &[u32] {
        self.frame_ready = false;
        &self.finished
    }

    /// Frames completed since power-on.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Current scanline, -1 to 260.
    pub fn scanline(&self) -> i32 {
        self.scanline
    }

    /// Current dot within the scanline, 0 to 340.
    pub fn cycle(&self) -> i32 {
        self.cycle
    }

    // ==== CPU register interface ($2000-$2007, mirrored) ====

    /// Side-effect-free register snapshot for debug surfaces.
    pub fn view_register(&self, register: u16, bus: &impl PpuBus) -> u8 {
        match register & 0x7 {
            2 => (self.status.bits() & 0xE0) | (self.read_buffer & 0x1F),
            4 => self.oam[usize::from(self.oam_addr)],
            7 => {
                let addr = self.scroll.v.0 & 0x3FFF;
                if addr >= 0x3F00 {
                    self.mem_view(bus, addr)
                } else {
                    self.read_buffer
                }
            }
            _ => 0,
        }
    }

    /// Emulated register read.
    pub fn read_register(&mut self, register: u16, bus: &mut impl PpuBus) -> u8 {
        match register & 0x7 {
            // PPUSTATUS: top three bits driven, low five stale bus. The
            // read clears vblank and resets the scroll write latch.
            2 => {
                let data = (self.status.bits() & 0xE0) | (self.read_buffer & 0x1F);
                self.status.remove(PpuStatus::VBLANK);
                self.scroll.read_status();
                data
            }
            // OAMDATA: no address increment on reads.
            4 => self.oam[usize::from(self.oam_addr)],
            // PPUDATA: buffered, except palette space which is immediate.
            // A palette read still refills the buffer from the nametable
            // underneath the palette window.
            7 => {
                let addr = self.scroll.v.0 & 0x3FFF;
                let data = if addr >= 0x3F00 {
                    self.read_buffer = self.mem_read(bus, addr - 0x1000);
                    self.mem_read(bus, addr)
                } else {
                    let buffered = self.read_buffer;
                    self.read_buffer = self.mem_read(bus, addr);
                    buffered
                };
                self.scroll.increment_vram(self.ctrl.vram_increment());
                data
            }
            _ => 0,
        }
    }

    /// Emulated register write.
    pub fn write_register(&mut self, register: u16, value: u8, bus: &mut impl PpuBus) {
        match register & 0x7 {
            0 => {
                let was_enabled = self.ctrl.contains(PpuCtrl::NMI_ENABLE);
                self.ctrl = PpuCtrl::from_bits_truncate(value);
                self.scroll.write_ctrl(value);
                // Enabling NMI while the vblank flag is already up fires
                // immediately.
                if !was_enabled
                    && self.ctrl.contains(PpuCtrl::NMI_ENABLE)
                    && self.status.contains(PpuStatus::VBLANK)
                {
                    self.nmi_request = true;
                }
            }
            1 => self.mask = PpuMask::from_bits_truncate(value),
            2 => {
                // PPUSTATUS is read-only; the write still clears the
                // vblank flag like the read-side access does.
                self.status.remove(PpuStatus::VBLANK);
            }
            3 => self.oam_addr = value,
            4 => {
                self.oam[usize::from(self.oam_addr)] = value;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            5 => self.scroll.write_scroll(value),
            6 => self.scroll.write_addr(value),
            7 => {
                let addr = self.scroll.v.0 & 0x3FFF;
                self.mem_write(bus, addr, value);
                self.scroll.increment_vram(self.ctrl.vram_increment());
            }
            _ => unreachable!(),
        }
    }

    /// OAM DMA write: byte `offset` of the transferred page lands at the
    /// OAM address pointer plus `offset`.
    pub fn dma_write_oam(&mut self, offset: u8, value: u8) {
        self.oam[usize::from(self.oam_addr.wrapping_add(offset))] = value;
    }

    // ==== PPU memory space ($0000-$3FFF) ====

    fn ciram_index(mirroring: Mirroring, addr: u16) -> usize {
        let addr = addr & 0x0FFF;
        let offset = usize::from(addr & 0x03FF);
        match mirroring {
            Mirroring::Horizontal => usize::from((addr >> 11) & 0x1) * 0x400 + offset,
            // Four-screen boards serve nametables themselves; this path
            // is only reached for the plain modes.
            Mirroring::Vertical | Mirroring::FourScreen => {
                usize::from((addr >> 10) & 0x1) * 0x400 + offset
            }
            Mirroring::OneScreenLower => offset,
            Mirroring::OneScreenUpper => 0x400 + offset,
        }
    }

    fn palette_index(addr: u16) -> usize {
        let index = addr & 0x1F;
        // Sprite palette slots 0 mirror the background slots.
        usize::from(match index {
            0x10 | 0x14 | 0x18 | 0x1C => index & 0x0F,
            _ => index,
        })
    }

    fn mem_read(&mut self, bus: &mut impl PpuBus, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => bus.read_chr(addr),
            0x2000..=0x3EFF => {
                if bus.mirroring() == Mirroring::FourScreen {
                    bus.read_chr(addr)
                } else {
                    self.nametable[Self::ciram_index(bus.mirroring(), addr)]
                }
            }
            _ => self.palette_ram[Self::palette_index(addr)],
        }
    }

    fn mem_view(&self, bus: &impl PpuBus, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => bus.view_chr(addr),
            0x2000..=0x3EFF => {
                if bus.mirroring() == Mirroring::FourScreen {
                    bus.view_chr(addr)
                } else {
                    self.nametable[Self::ciram_index(bus.mirroring(), addr)]
                }
            }
            _ => self.palette_ram[Self::palette_index(addr)],
        }
    }

    fn mem_write(&mut self, bus: &mut impl PpuBus, addr: u16, value: u8) {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => bus.write_chr(addr, value),
            0x2000..=0x3EFF => {
                if bus.mirroring() == Mirroring::FourScreen {
                    bus.write_chr(addr, value);
                } else {
                    self.nametable[Self::ciram_index(bus.mirroring(), addr)] = value;
                }
            }
            _ => self.palette_ram[Self::palette_index(addr)] = value,
        }
    }

    // ==== dot clock ====

    /// Advance one dot.
    pub fn tick(&mut self, bus: &mut impl PpuBus) {
        // Delayed NMI delivery, counted down before this dot's work so a
        // $2002 read inside the window can still suppress it.
        if self.nmi_delay > 0 {
            self.nmi_delay -= 1;
            if self.nmi_delay == 0
                && self.ctrl.contains(PpuCtrl::NMI_ENABLE)
                && self.status.contains(PpuStatus::VBLANK)
            {
                self.nmi_request = true;
            }
        }

        match self.scanline {
            PRE_RENDER_SCANLINE => {
                if self.cycle == 1 {
                    self.status.remove(
                        PpuStatus::VBLANK | PpuStatus::SPRITE_ZERO_HIT | PpuStatus::SPRITE_OVERFLOW,
                    );
                }
                self.background_pipeline(bus);
                if self.mask.rendering_enabled() && (280..=304).contains(&self.cycle) {
                    self.scroll.copy_y();
                }
                if self.cycle == 257 {
                    self.evaluate_sprites(bus);
                }
            }
            0..=239 => {
                self.background_pipeline(bus);
                if (1..=256).contains(&self.cycle) {
                    self.draw_pixel();
                }
                if self.cycle == 257 {
                    self.evaluate_sprites(bus);
                }
            }
            241 => {
                if self.cycle == 1 {
                    self.status.insert(PpuStatus::VBLANK);
                    std::mem::swap(&mut self.working, &mut self.finished);
                    self.frame_ready = true;
                    self.total_frames += 1;
                    log::trace!("frame {} complete", self.total_frames);
                    if self.ctrl.contains(PpuCtrl::NMI_ENABLE) {
                        self.nmi_delay = NMI_DELAY_DOTS;
                    }
                }
            }
            _ => {}
        }

        // End-of-scanline notification for the mapper IRQ counter.
        if self.cycle == 260 && self.scanline < 240 && self.mask.rendering_enabled() {
            self.irq_request = bus.end_scanline() == ScanlineEffect::Irq;
        }

        self.increment_dot();
    }

    fn increment_dot(&mut self) {
        // Odd-frame skip: the pre-render line loses its last dot when
        // rendering is enabled.
        if self.scanline == PRE_RENDER_SCANLINE
            && self.cycle == DOTS_PER_SCANLINE - 2
            && self.odd_frame
            && self.mask.rendering_enabled()
        {
            self.cycle = 0;
            self.scanline = 0;
            return;
        }

        self.cycle += 1;
        if self.cycle == DOTS_PER_SCANLINE {
            self.cycle = 0;
            self.scanline += 1;
            if self.scanline > LAST_SCANLINE {
                self.scanline = PRE_RENDER_SCANLINE;
                self.odd_frame = !self.odd_frame;
            }
        }
    }

    /// Background fetches, shifter movement, and scroll updates for one
    /// dot of a rendering scanline. The 8-dot cadence is NT, AT, pattern
    /// low, pattern high, then a coarse X step.
    fn background_pipeline(&mut self, bus: &mut impl PpuBus) {
        if !self.mask.rendering_enabled() {
            return;
        }

        let cycle = self.cycle;
        if (2..=257).contains(&cycle) || (321..=337).contains(&cycle) {
            self.background.shift();
            match (cycle - 1) % 8 {
                0 => {
                    self.background.reload();
                    self.fetch_nametable_byte(bus);
                }
                2 => self.fetch_attribute_byte(bus),
                4 => self.fetch_pattern_byte(bus, false),
                6 => self.fetch_pattern_byte(bus, true),
                7 => self.scroll.increment_coarse_x(),
                _ => {}
            }
        }

        if cycle == 256 {
            self.scroll.increment_y();
        }
        if cycle == 257 {
            self.scroll.copy_x();
        }
        // Dummy nametable fetches closing the scanline.
        if cycle == 338 || cycle == 340 {
            self.fetch_nametable_byte(bus);
        }
    }

    fn fetch_nametable_byte(&mut self, bus: &mut impl PpuBus) {
        let addr = 0x2000 | (self.scroll.v.0 & 0x0FFF);
        self.background.next_tile_index = self.mem_read(bus, addr);
    }

    fn fetch_attribute_byte(&mut self, bus: &mut impl PpuBus) {
        let v = self.scroll.v;
        let addr = 0x23C0
            | (v.0 & 0x0C00)
            | ((v.coarse_y() >> 2) << 3)
            | (v.coarse_x() >> 2);
        let byte = self.mem_read(bus, addr);
        let shift = ((v.coarse_y() & 0x2) << 1) | (v.coarse_x() & 0x2);
        let bits = (byte >> shift) & 0x3;
        self.background.next_attribute_lo = bits & 0x1 != 0;
        self.background.next_attribute_hi = bits & 0x2 != 0;
    }

    fn fetch_pattern_byte(&mut self, bus: &mut impl PpuBus, high: bool) {
        let addr = self.ctrl.background_table_base()
            | (u16::from(self.background.next_tile_index) << 4)
            | self.scroll.v.fine_y()
            | if high { 8 } else { 0 };
        let byte = self.mem_read(bus, addr);
        if high {
            self.background.next_pattern_hi = byte;
        } else {
            self.background.next_pattern_lo = byte;
        }
    }

    /// Select the sprites covering the next scanline and fetch their
    /// pattern rows. Runs at dot 257 of the pre-render and visible lines.
    fn evaluate_sprites(&mut self, bus: &mut impl PpuBus) {
        self.sprite_line = SpriteLine::default();
        if !self.mask.rendering_enabled() {
            return;
        }

        let line = self.scanline + 1;
        if line >= FRAME_HEIGHT as i32 {
            return;
        }
        let height = i32::from(self.ctrl.sprite_height());
        let tall = height == 16;

        for index in 0..64 {
            let base = index * 4;
            let row = line - i32::from(self.oam[base]);
            if !(0..height).contains(&row) {
                continue;
            }
            if self.sprite_line.count == 8 {
                self.status.insert(PpuStatus::SPRITE_OVERFLOW);
                break;
            }

            let tile = self.oam[base + 1];
            let attributes = self.oam[base + 2];
            let addr = SpriteLine::pattern_row_addr(
                tile,
                row as u8,
                self.ctrl.sprite_table_base(),
                tall,
                attributes & 0x80 != 0,
            );
            let sprite = ScanlineSprite {
                y: self.oam[base],
                tile,
                attributes,
                x: self.oam[base + 3],
                pattern_lo: self.mem_read(bus, addr),
                pattern_hi: self.mem_read(bus, addr + 8),
            };

            if index == 0 {
                self.sprite_line.sprite_zero_present = true;
            }
            let slot = usize::from(self.sprite_line.count);
            self.sprite_line.sprites[slot] = sprite;
            self.sprite_line.count += 1;
        }
    }

    /// Produce the pixel for the current dot and store it in the working
    /// frame.
    fn draw_pixel(&mut self) {
        let x = (self.cycle - 1) as usize;
        let y = self.scanline as usize;

        let (mut bg_pattern, mut bg_palette) = (0u8, 0u8);
        if self.mask.contains(PpuMask::SHOW_BACKGROUND)
            && (x >= 8 || self.mask.contains(PpuMask::SHOW_BACKGROUND_LEFT))
        {
            (bg_pattern, bg_palette) = self.background.pixel(self.scroll.fine_x);
        }

        let mut sprite_pattern = 0u8;
        let mut sprite_palette = 0u8;
        let mut sprite_behind = false;
        let mut sprite_is_zero = false;
        if self.mask.contains(PpuMask::SHOW_SPRITES)
            && (x >= 8 || self.mask.contains(PpuMask::SHOW_SPRITES_LEFT))
        {
            for (index, sprite) in self.sprite_line.iter().enumerate() {
                let pattern = sprite.pattern_at(x as u8);
                if pattern != 0 {
                    sprite_pattern = pattern;
                    sprite_palette = sprite.palette();
                    sprite_behind = sprite.behind_background();
                    sprite_is_zero = self.sprite_line.sprite_zero_present && index == 0;
                    break;
                }
            }
        }

        let (pattern, palette) = match (bg_pattern, sprite_pattern) {
            (0, 0) => (0, 0),
            (0, _) => (sprite_pattern, sprite_palette),
            (_, 0) => (bg_pattern, bg_palette),
            _ => {
                if sprite_is_zero && x != 255 {
                    self.status.insert(PpuStatus::SPRITE_ZERO_HIT);
                }
                if sprite_behind {
                    (bg_pattern, bg_palette)
                } else {
                    (sprite_pattern, sprite_palette)
                }
            }
        };

        let palette_addr = if pattern == 0 {
            0x3F00
        } else {
            0x3F00 + (u16::from(palette) << 2) + u16::from(pattern)
        };
        let mut index = self.palette_ram[Self::palette_index(palette_addr)];
        if self.mask.contains(PpuMask::GREYSCALE) {
            index &= 0x30;
        }

        self.working[y * FRAME_WIDTH + x] = screen_color(
            index,
            self.mask.contains(PpuMask::EMPHASIZE_RED),
            self.mask.contains(PpuMask::EMPHASIZE_GREEN),
            self.mask.contains(PpuMask::EMPHASIZE_BLUE),
        );
    }

    // ==== serialization ====

    /// Write PPU state in declaration order. Frame buffers are not
    /// persisted; the first frame rendered after a mid-frame restore is
    /// completed from live state.
    ///
    /// # Errors
    /// Propagates stream write failures.
    pub fn serialize<W: Write>(&self, s: &mut Serializer<W>) -> Result<(), SaveStateError> {
        s.write_u16(self.scroll.v.0)?;
        s.write_u16(self.scroll.t.0)?;
        s.write_u8(self.scroll.fine_x)?;
        s.write_bool(self.scroll.latch)?;
        s.write_u8(self.read_buffer)?;
        s.write_u8(self.ctrl.bits())?;
        s.write_u8(self.mask.bits())?;
        s.write_u8(self.status.bits())?;
        s.write_u8(self.oam_addr)?;
        s.write_bytes(&self.nametable)?;
        s.write_bytes(&self.palette_ram)?;
        s.write_bytes(&self.oam)?;

        s.write_u16(self.background.pattern_lo)?;
        s.write_u16(self.background.pattern_hi)?;
        s.write_u16(self.background.attribute_lo)?;
        s.write_u16(self.background.attribute_hi)?;
        s.write_u8(self.background.next_tile_index)?;
        s.write_bool(self.background.next_attribute_lo)?;
        s.write_bool(self.background.next_attribute_hi)?;
        s.write_u8(self.background.next_pattern_lo)?;
        s.write_u8(self.background.next_pattern_hi)?;

        s.write_u8(self.sprite_line.count)?;
        s.write_bool(self.sprite_line.sprite_zero_present)?;
        for sprite in &self.sprite_line.sprites {
            s.write_u8(sprite.y)?;
            s.write_u8(sprite.tile)?;
            s.write_u8(sprite.attributes)?;
            s.write_u8(sprite.x)?;
            s.write_u8(sprite.pattern_lo)?;
            s.write_u8(sprite.pattern_hi)?;
        }

        s.write_i32(self.scanline)?;
        s.write_i32(self.cycle)?;
        s.write_bool(self.odd_frame)?;
        s.write_bool(self.nmi_request)?;
        s.write_u8(self.nmi_delay)?;
        s.write_bool(self.irq_request)?;
        s.write_bool(self.frame_ready)?;
        s.write_u64(self.total_frames)
    }

    /// Restore PPU state written by [`Ppu::serialize`].
    ///
    /// # Errors
    /// Propagates stream read failures.
    pub fn deserialize<R: Read>(&mut self, d: &mut Deserializer<R>) -> Result<(), SaveStateError> {
        self.scroll.v.0 = d.read_u16()? & 0x7FFF;
        self.scroll.t.0 = d.read_u16()? & 0x7FFF;
        self.scroll.fine_x = d.read_u8()?;
        self.scroll.latch = d.read_bool()?;
        self.read_buffer = d.read_u8()?;
        self.ctrl = PpuCtrl::from_bits_truncate(d.read_u8()?);
        self.mask = PpuMask::from_bits_truncate(d.read_u8()?);
        self.status = PpuStatus::from_bits_truncate(d.read_u8()?);
        self.oam_addr = d.read_u8()?;
        d.read_bytes(&mut self.nametable)?;
        d.read_bytes(&mut self.palette_ram)?;
        d.read_bytes(&mut self.oam)?;

        self.background.pattern_lo = d.read_u16()?;
        self.background.pattern_hi = d.read_u16()?;
        self.background.attribute_lo = d.read_u16()?;
        self.background.attribute_hi = d.read_u16()?;
        self.background.next_tile_index = d.read_u8()?;
        self.background.next_attribute_lo = d.read_bool()?;
        self.background.next_attribute_hi = d.read_bool()?;
        self.background.next_pattern_lo = d.read_u8()?;
        self.background.next_pattern_hi = d.read_u8()?;

        self.sprite_line.count = d.read_u8()?.min(8);
        self.sprite_line.sprite_zero_present = d.read_bool()?;
        for sprite in &mut self.sprite_line.sprites {
            sprite.y = d.read_u8()?;
            sprite.tile = d.read_u8()?;
            sprite.attributes = d.read_u8()?;
            sprite.x = d.read_u8()?;
            sprite.pattern_lo = d.read_u8()?;
            sprite.pattern_hi = d.read_u8()?;
        }

        self.scanline = d.read_i32()?;
        self.cycle = d.read_i32()?;
        self.odd_frame = d.read_bool()?;
        self.nmi_request = d.read_bool()?;
        self.nmi_delay = d.read_u8()?;
        self.irq_request = d.read_bool()?;
        self.frame_ready = d.read_bool()?;
        self.total_frames = d.read_u64()?;
        Ok(())
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
