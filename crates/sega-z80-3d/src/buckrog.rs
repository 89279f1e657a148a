//! Buck Rogers video board.
//!
//! Same sprite hardware as Subroc-3D; the compositor differs. An 8-to-3
//! priority encoder turns the sprite PLB sideband into MUX0-3 directly,
//! and the final pixel cascades through fixed priorities: opaque
//! foreground, sprites via PR5199, low-priority foreground, the starfield
//! bitmap, then the background colour ROM.

use crate::sprites::{SpriteBoard, SpriteUnit};
use crate::{LINE_COLUMNS, LINE_WIDTH, X_SCALE};

/// Combined video PROM dump (PR5194 through PR5199).
pub const PROM_SIZE: usize = 0xb00;
/// Eight 32 KiB sprite pattern pages.
pub const SPRITE_ROM_SIZE: usize = 0x40000;
/// Background colour ROM, one byte per scanline per scroll bank.
pub const BG_COLOR_ROM_SIZE: usize = 0x2000;
/// Starfield bitmap, one byte per 5 MHz column.
pub const BITMAP_SIZE: usize = 0x10000;

// PROM regions within the combined dump.
const PR5194: usize = 0x000; // foreground column mirror
const PR5196: usize = 0x100; // sprite row advance
const PR5198: usize = 0x500; // foreground color table
const PR5199: usize = 0x700; // sprite color

const BOARD: SpriteBoard = SpriteBoard {
    vr1: 1.2e3,
    // 820 ohm verified in schematics.
    vr2: 820.0,
    cext: 220e-12,
    frac_one: 0x0080_0000,
    level_shift: 15,
    rom_mask: 0x7fff,
    offset_shift: 1,
    dir_bit: 0x1_0000,
    y_invert: false,
    end_plb: [0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2],
};

/// Buck Rogers video board state.
pub struct Buckrog {
    sprites: SpriteUnit,
    proms: Vec<u8>,
    bg_color: Vec<u8>,
    bitmap: Vec<u8>,
    position: [u8; 0x200],

    /// Foreground colour bank.
    pub fchg: u8,
    /// Sprite colour bank.
    pub obch: u8,
    /// Background scroll position.
    pub mov: u8,
}

impl Buckrog {
    #[must_use]
    pub fn new(proms: Vec<u8>, sprite_rom: Vec<u8>, bg_color_rom: Vec<u8>) -> Self {
        assert_eq!(proms.len(), PROM_SIZE);
        assert_eq!(bg_color_rom.len(), BG_COLOR_ROM_SIZE);
        Self {
            sprites: SpriteUnit::new(BOARD, sprite_rom),
            proms,
            bg_color: bg_color_rom,
            bitmap: vec![0; BITMAP_SIZE],
            position: [0; 0x200],
            fchg: 0,
            obch: 0,
            mov: 0,
        }
    }

    pub fn write_sprite_ram(&mut self, offset: usize, data: u8) {
        self.sprites.write_ram(offset, data);
    }

    #[must_use]
    pub fn read_sprite_ram(&self, offset: usize) -> u8 {
        self.sprites.read_ram(offset)
    }

    /// Horizontal sprite position RAM, two bytes per column.
    pub fn write_sprite_position(&mut self, offset: usize, data: u8) {
        self.position[offset & 0x1ff] = data;
    }

    /// Starfield bitmap RAM; only bit 0 is backed by memory.
    pub fn write_bitmap(&mut self, offset: usize, data: u8) {
        self.bitmap[offset & (BITMAP_SIZE - 1)] = data & 1;
    }

    #[must_use]
    pub fn read_bitmap(&self, offset: usize) -> u8 {
        self.bitmap[offset & (BITMAP_SIZE - 1)]
    }

    /// Render one scanline of palette indices into `dest`.
    pub fn render_line(&mut self, y: u8, fore: &[u16], dest: &mut [u16]) {
        assert!(fore.len() >= LINE_COLUMNS);
        assert!(dest.len() >= LINE_WIDTH);

        // This ran during the previous line's HBLANK on hardware.
        self.sprites
            .prepare_line(y, &self.proms[PR5196..PR5196 + 0x200]);

        for xx in 0..LINE_COLUMNS {
            let he =
                u16::from(self.position[xx * 2]) | (u16::from(self.position[xx * 2 + 1]) << 8);
            self.sprites.mark_live(he);

            // Character lookup through the PR5194 column mirror, then the
            // foreground colour table.
            let col = usize::from(self.proms[PR5194 + ((xx >> 3).wrapping_sub(1) & 0x1f)] & 0x1f);
            let foreraw = usize::from(fore[(col << 3) | (xx & 0x07)] & 0xff);
            let offs = (foreraw & 0x03)
                | ((foreraw & 0xf8) >> 1)
                | (usize::from(self.fchg & 0x03) << 7);
            let forebits = self.proms[PR5198 + offs];

            let star = self.bitmap[usize::from(y) * 256 + xx] != 0;

            for ix in 0..X_SCALE {
                // CDA0-7 = D0-D7, CDB = D8-15, CDC = D16-23, CDD = D24-31.
                let bits = self.sprites.sample(0xff);

                // 8-to-3 priority encode of the PLB lines into MUX0-3;
                // no line asserted gives 0xf.
                let mux = if bits.plb == 0 {
                    0x0f
                } else {
                    bits.plb.trailing_zeros() as u8
                };

                // MUX selects one level's bit out of each data lane.
                let sprbits = (bits.data >> (mux & 0x07)) & 0x0101_0101;
                let cd = ((sprbits >> 21) | (sprbits >> 14) | (sprbits >> 7) | sprbits) as u8;

                // Fixed priority cascade.
                let palbits = if forebits & 0x80 == 0 {
                    // Opaque foreground.
                    u16::from(
                        ((forebits & 0x3c) << 2) | ((forebits & 0x06) << 1) | (forebits & 0x01),
                    )
                } else if mux & 0x08 == 0 {
                    // A sprite level won the encoder.
                    let offs = usize::from(cd & 0x0f)
                        | (usize::from(mux & 0x07) << 4)
                        | (usize::from(self.obch & 0x07) << 7);
                    u16::from(self.proms[PR5199 + offs])
                } else if forebits & 0x40 == 0 {
                    // Low-priority foreground.
                    u16::from(
                        ((forebits & 0x3c) << 2) | ((forebits & 0x06) << 1) | (forebits & 0x01),
                    )
                } else if star {
                    0xff
                } else {
                    // Background colour ROM, scrolled by MOV.
                    let bg = self.bg_color[usize::from(y) | (usize::from(self.mov & 0x1f) << 8)];
                    u16::from(bg & 0xc0) | (u16::from(bg & 0x30) << 4) | (u16::from(bg & 0x0f) << 2)
                };

                dest[xx * X_SCALE + ix] = palbits;
            }
        }
    }
}
