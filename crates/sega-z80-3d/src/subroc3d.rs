//! Subroc-3D video board.
//!
//! Same sprite hardware as Turbo but without the road generator: the
//! sprite PLB sideband drives a priority encoder in PR1450, which either
//! selects one sprite level's colour bits or passes the foreground
//! through, and PR1419 resolves the final palette index.

use crate::sprites::{SpriteBoard, SpriteUnit};
use crate::{LINE_COLUMNS, LINE_WIDTH, X_SCALE};

/// Combined video PROM dump (PR1419 through PR1454).
pub const PROM_SIZE: usize = 0x940;
/// Eight 32 KiB sprite pattern pages.
pub const SPRITE_ROM_SIZE: usize = 0x40000;

// PROM regions within the combined dump.
const PR1419: usize = 0x000; // color
const PR1620: usize = 0x200; // foreground color table
const PR1449: usize = 0x300; // sprite row advance
const PR1450: usize = 0x500; // sprite priority encode
const PR1454: usize = 0x920; // foreground column flip

const BOARD: SpriteBoard = SpriteBoard {
    vr1: 1.2e3,
    vr2: 1.2e3,
    cext: 220e-12,
    // The sprite clock runs at the 5 MHz column rate.
    frac_one: 0x0080_0000,
    level_shift: 15,
    rom_mask: 0x7fff,
    offset_shift: 1,
    dir_bit: 0x1_0000,
    y_invert: false,
    // END = CDA high with both lane pairs equal; PLB = END xor the
    // half-match. Bit 1 is END, bit 0 PLB.
    end_plb: [0, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 1, 0, 1, 1, 2],
};

/// Subroc-3D video board state.
pub struct Subroc3d {
    sprites: SpriteUnit,
    proms: Vec<u8>,
    position: [u8; 0x200],

    /// Palette bank.
    pub col: u8,
    /// Priority-encoder bank select.
    pub ply: u8,
    /// Horizontal screen flip.
    pub flip: bool,
}

impl Subroc3d {
    #[must_use]
    pub fn new(proms: Vec<u8>, sprite_rom: Vec<u8>) -> Self {
        assert_eq!(proms.len(), PROM_SIZE);
        Self {
            sprites: SpriteUnit::new(BOARD, sprite_rom),
            proms,
            position: [0; 0x200],
            col: 0,
            ply: 0,
            flip: false,
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

    /// Render one scanline of palette indices into `dest`.
    pub fn render_line(&mut self, y: u8, fore: &[u16], dest: &mut [u16]) {
        assert!(fore.len() >= LINE_COLUMNS);
        assert!(dest.len() >= LINE_WIDTH);

        // This ran during the previous line's HBLANK on hardware.
        self.sprites
            .prepare_line(y, &self.proms[PR1449..PR1449 + 0x200]);

        for xx in 0..LINE_COLUMNS {
            let he =
                u16::from(self.position[xx * 2]) | (u16::from(self.position[xx * 2 + 1]) << 8);
            self.sprites.mark_live(he);

            // Character lookup; flipped screens remap the column through
            // PR1454.
            let foreraw = if self.flip {
                let col = usize::from(self.proms[PR1454 + ((xx >> 3) & 0x1f)] & 0x1f);
                usize::from(fore[(col << 3) | (xx & 0x07)] & 0xff)
            } else {
                usize::from(fore[xx] & 0xff)
            };
            let forebits = self.proms[PR1620 + foreraw];

            // MPLB opens the sprite mux wherever the foreground is
            // transparent or flagged low-priority.
            let mplb = foreraw & 0x80 != 0 || forebits & 0x0f == 0;

            for ix in 0..X_SCALE {
                // CDA0-7 = D0-D7, CDB = D8-15, CDC = D16-23, CDD = D24-31.
                let bits = self.sprites.sample(0xff);

                // PR1450 encodes the inverted PLB lines into MUX0-3,
                // grounded when the foreground wins outright.
                let mux = if mplb {
                    let offs =
                        usize::from(bits.plb ^ 0xff) | (usize::from(self.ply & 0x02) << 7);
                    self.proms[PR1450 + offs] >> ((self.ply & 0x01) * 4)
                } else {
                    0
                };

                // MUX0-2 select one level's bit out of each data lane.
                let sprbits = (bits.data >> (mux & 0x07)) & 0x0101_0101;
                let cd = ((sprbits >> 21) | (sprbits >> 14) | (sprbits >> 7) | sprbits) as u8;

                // MUX3 chooses sprite colour bits or the foreground.
                let finalbits = if mux & 0x08 != 0 { cd } else { forebits };

                let offs = usize::from(finalbits & 0x0f)
                    | (usize::from(mux & 0x08) << 1)
                    | (usize::from(self.col & 0x0f) << 5);
                dest[xx * X_SCALE + ix] = u16::from(self.proms[PR1419 + offs]);
            }
        }
    }
}
