//! PPU register shadows: PPUCTRL, PPUMASK, PPUSTATUS.
//!
//! Field meanings follow the NesDev register descriptions. These are plain
//! bit sets; the loopy scroll registers that some PPUCTRL/PPUSCROLL writes
//! also feed live in [`crate::scroll`].

use bitflags::bitflags;

bitflags! {
    /// PPUCTRL ($2000, write).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuCtrl: u8 {
        /// Base nametable address, X bit.
        const NAMETABLE_X = 1 << 0;
        /// Base nametable address, Y bit.
        const NAMETABLE_Y = 1 << 1;
        /// PPUDATA address increment: 0 adds 1 (across), 1 adds 32 (down).
        const VRAM_INCREMENT = 1 << 2;
        /// Sprite pattern table for 8x8 sprites.
        const SPRITE_TABLE = 1 << 3;
        /// Background pattern table.
        const BACKGROUND_TABLE = 1 << 4;
        /// Sprite size: 0 is 8x8, 1 is 8x16.
        const SPRITE_SIZE = 1 << 5;
        /// PPU master/slave select (unused on a stock NES).
        const MASTER_SLAVE = 1 << 6;
        /// Generate NMI at the start of vertical blank.
        const NMI_ENABLE = 1 << 7;
    }
}

impl PpuCtrl {
    /// PPUDATA increment per access.
    pub fn vram_increment(self) -> u16 {
        if self.contains(Self::VRAM_INCREMENT) {
            32
        } else {
            1
        }
    }

    /// Pattern table base for 8x8 sprites.
    pub fn sprite_table_base(self) -> u16 {
        if self.contains(Self::SPRITE_TABLE) {
            0x1000
        } else {
            0x0000
        }
    }

    /// Pattern table base for background tiles.
    pub fn background_table_base(self) -> u16 {
        if self.contains(Self::BACKGROUND_TABLE) {
            0x1000
        } else {
            0x0000
        }
    }

    /// Sprite height in scanlines.
    pub fn sprite_height(self) -> u8 {
        if self.contains(Self::SPRITE_SIZE) {
            16
        } else {
            8
        }
    }
}

bitflags! {
    /// PPUMASK ($2001, write).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuMask: u8 {
        /// Greyscale: mask palette indices to the grey column.
        const GREYSCALE = 1 << 0;
        /// Show background in the leftmost 8 pixels.
        const SHOW_BACKGROUND_LEFT = 1 << 1;
        /// Show sprites in the leftmost 8 pixels.
        const SHOW_SPRITES_LEFT = 1 << 2;
        /// Render the background.
        const SHOW_BACKGROUND = 1 << 3;
        /// Render sprites.
        const SHOW_SPRITES = 1 << 4;
        /// Emphasize red.
        const EMPHASIZE_RED = 1 << 5;
        /// Emphasize green.
        const EMPHASIZE_GREEN = 1 << 6;
        /// Emphasize blue.
        const EMPHASIZE_BLUE = 1 << 7;
    }
}

impl PpuMask {
    /// Rendering is on when either layer is enabled.
    pub fn rendering_enabled(self) -> bool {
        self.intersects(Self::SHOW_BACKGROUND | Self::SHOW_SPRITES)
    }
}

bitflags! {
    /// PPUSTATUS ($2002, read). Only the top three bits are driven; the
    /// low five return stale PPU bus contents.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuStatus: u8 {
        /// More than eight sprites matched a scanline.
        const SPRITE_OVERFLOW = 1 << 5;
        /// Opaque sprite-0 pixel overlapped an opaque background pixel.
        const SPRITE_ZERO_HIT = 1 << 6;
        /// Vertical blank has started.
        const VBLANK = 1 << 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vram_increment_switches() {
        assert_eq!(PpuCtrl::empty().vram_increment(), 1);
        assert_eq!(PpuCtrl::VRAM_INCREMENT.vram_increment(), 32);
    }

    #[test]
    fn sprite_height_follows_size_bit() {
        assert_eq!(PpuCtrl::empty().sprite_height(), 8);
        assert_eq!(PpuCtrl::SPRITE_SIZE.sprite_height(), 16);
    }

    #[test]
    fn rendering_enabled_when_either_layer_shows() {
        assert!(!PpuMask::empty().rendering_enabled());
        assert!(PpuMask::SHOW_BACKGROUND.rendering_enabled());
        assert!(PpuMask::SHOW_SPRITES.rendering_enabled());
    }
}
