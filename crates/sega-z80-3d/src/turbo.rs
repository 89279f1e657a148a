//! Turbo video board: road generator plus the shared sprite hardware.
//!
//! The road ROMs produce five area bits per column; PR1115 turns those
//! into the background bits plus the SLIPAR/ACCIAR sidebands. Sprites,
//! foreground characters and the road colour are then folded through the
//! PR1122/PR1123 priority chain and resolved per colour gun by PR1121.

use crate::sprites::{SpriteBoard, SpriteUnit};
use crate::{LINE_COLUMNS, LINE_WIDTH, X_SCALE};

/// Combined video PROM dump (PR1114 through PR1123).
pub const PROM_SIZE: usize = 0x1000;
/// Eight 16 KiB sprite pattern pages.
pub const SPRITE_ROM_SIZE: usize = 0x20000;
/// Road generator ROMs, five regions of 0x1000 plus the stripe ROM.
pub const ROAD_ROM_SIZE: usize = 0x4800;

// PROM regions within the combined dump.
const PR1114: usize = 0x000; // road red/green color
const PR1115: usize = 0x020; // road area decode
const PR1116: usize = 0x040; // collision detection
const PR1117: usize = 0x060; // road blue color
const PR1118: usize = 0x100; // foreground color table
const PR1119: usize = 0x200; // sprite row advance
const PR1121: usize = 0x600; // final color mux
const PR1122: usize = 0x800; // sprite priority
const PR1123: usize = 0xc00; // overall priority

/// Default front-panel pot settings, measured on one board.
pub const DEFAULT_VR1_OHMS: f64 = 310.0;
pub const DEFAULT_VR2_OHMS: f64 = 910.0;

const BOARD: SpriteBoard = SpriteBoard {
    vr1: DEFAULT_VR1_OHMS,
    vr2: DEFAULT_VR2_OHMS,
    cext: 100e-12,
    // The sprite clock runs at the 10 MHz output pixel rate.
    frac_one: 0x0100_0000,
    level_shift: 14,
    rom_mask: 0x3fff,
    offset_shift: 0,
    dir_bit: 0x8000,
    y_invert: true,
    // End when nibble bit 3 is clear and bit 2 set; no PLB sideband.
    end_plb: [0, 0, 0, 0, 2, 2, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0],
};

/// Turbo video board state.
pub struct Turbo {
    sprites: SpriteUnit,
    proms: Vec<u8>,
    road: Vec<u8>,
    position: [u8; 0x200],

    /// Road/video control ports, written by the main CPU.
    pub opa: u8,
    pub opb: u8,
    pub opc: u8,
    pub ipa: u8,
    pub ipb: u8,
    pub ipc: u8,
    pub fbcol: u8,
    pub fbpla: u8,

    collision: u8,
}

impl Turbo {
    #[must_use]
    pub fn new(proms: Vec<u8>, sprite_rom: Vec<u8>, road_rom: Vec<u8>) -> Self {
        assert_eq!(proms.len(), PROM_SIZE);
        assert_eq!(road_rom.len(), ROAD_ROM_SIZE);
        Self {
            sprites: SpriteUnit::new(BOARD, sprite_rom),
            proms,
            road: road_rom,
            position: [0; 0x200],
            opa: 0,
            opb: 0,
            opc: 0,
            ipa: 0,
            ipb: 0,
            ipc: 0,
            fbcol: 0,
            fbpla: 0,
            collision: 0,
        }
    }

    pub fn write_sprite_ram(&mut self, offset: usize, data: u8) {
        self.sprites.write_ram(offset, data);
    }

    #[must_use]
    pub fn read_sprite_ram(&self, offset: usize) -> u8 {
        self.sprites.read_ram(offset)
    }

    /// Horizontal sprite position RAM: the low 0x100 bytes hold enables
    /// for levels 0-7, the high 0x100 for slots 8-15.
    pub fn write_sprite_position(&mut self, offset: usize, data: u8) {
        self.position[offset & 0x1ff] = data;
    }

    /// Front-panel sprite-scale pots, in ohms.
    pub fn set_pots(&mut self, vr1_ohms: f64, vr2_ohms: f64) {
        self.sprites.set_pots(vr1_ohms, vr2_ohms);
    }

    /// Accumulated collision bits from PR1116.
    #[must_use]
    pub fn collision(&self) -> u8 {
        self.collision
    }

    pub fn clear_collision(&mut self) {
        self.collision = 0;
    }

    /// Render one scanline of palette indices into `dest`.
    ///
    /// `fore` is the foreground tile pixmap row (one entry per 5 MHz
    /// column); `dest` receives `LINE_WIDTH` output pixels.
    pub fn render_line(&mut self, y: u8, fore: &[u16], dest: &mut [u16]) {
        assert!(fore.len() >= LINE_COLUMNS);
        assert!(dest.len() >= LINE_WIDTH);

        let mut road = false;

        // Y sum between OPA and the current scanline; OPC bit 7 inverts
        // the road.
        let mut va = usize::from(y.wrapping_add(self.opa));
        if self.opc & 0x80 == 0 {
            va ^= 0xff;
        }

        // This ran during the previous line's HBLANK on hardware.
        self.sprites
            .prepare_line(y, &self.proms[PR1119..PR1119 + 0x200]);

        for xx in 0..LINE_COLUMNS {
            // Horizontal enables for both halves of the slots.
            let he = u16::from(self.position[xx]) | (u16::from(self.position[xx + 0x100]) << 8);
            self.sprites.mark_live(he);

            // X sum between OPB and the current column; only the carry
            // matters and it selects the input latch pair.
            let carry = (xx + usize::from(self.opb)) >> 8 & 1;
            let (sel, coch) = if carry != 0 {
                (usize::from(self.ipb), self.ipc >> 4)
            } else {
                (usize::from(self.ipa), self.ipc & 0x0f)
            };

            // AREA1-AREA4: four road ROMs addressed by VA and the latch,
            // each contributing the carry of its byte plus the column.
            let mut offs = va | ((sel & 0x0f) << 8);
            let mut area = (usize::from(self.road[offs]) + xx) >> 8 & 1;
            area |= ((usize::from(self.road[0x1000 | offs]) + xx) >> 8 & 1) << 1;

            offs = va | ((sel & 0xf0) << 4);
            area |= ((usize::from(self.road[0x2000 | offs]) + xx) >> 8 & 1) << 2;
            area |= ((usize::from(self.road[0x3000 | offs]) + xx) >> 8 & 1) << 3;

            // AREA5: the stripe ROM, one bit per column.
            offs = (xx >> 3) | (usize::from(self.opc & 0x3f) << 5);
            area |= (usize::from(self.road[0x4000 | offs]) << (xx & 7) & 0x80) >> 3;

            // SLIPAR is 0 on the road surface only; ACCIAR is 0 on the
            // road surface and the striped edges.
            let babit = self.proms[PR1115 + area];
            let slipar_acciar = babit & 0x30;
            if !road && slipar_acciar & 0x20 != 0 {
                road = true;
            }

            // Road color from PR1114 (red/green) and PR1117 (blue).
            let coloffs = usize::from(coch & 0x0f) | (usize::from(self.fbcol & 0x01) << 4);
            let bacol = u16::from(self.proms[PR1114 + coloffs])
                | (u16::from(self.proms[PR1117 + coloffs]) << 8);

            // The sync PROM's shift-register load delays the character
            // output by 8 columns.
            let foreraw = if xx < 8 {
                0
            } else {
                usize::from(fore[xx - 8] & 0xff)
            };
            let forebits = self.proms[PR1118 + foreraw];

            for ix in 0..X_SCALE {
                // CDB0-7 = D0-D7, CDG = D8-15, CDR = D16-23, PLB = D24-31.
                let live_mask = if road { 0xff } else { 0x07 };
                let sprbits = self.sprites.sample(live_mask).data;

                // Collision detection in PR1116.
                self.collision |= self.proms
                    [PR1116 + ((sprbits >> 24 & 7) as usize | usize::from(slipar_acciar >> 1))];

                // PLB1-7 plus the playfield latch select the sprite
                // priority in PR1122.
                let priority = self.proms[PR1122
                    + (((sprbits & 0xfe00_0000) >> 25) as usize
                        | (usize::from(self.fbpla & 0x07) << 7))];

                // Overall priority in PR1123.
                let mx = self.proms[PR1123
                    + (usize::from(priority & 7)
                        | ((sprbits & 0x0100_0000) >> 21) as usize
                        | ((foreraw & 0x80) >> 3)
                        | (usize::from(forebits & 0x08) << 2)
                        | (usize::from(babit & 0x07) << 6)
                        | (usize::from(self.fbpla & 0x08) << 6))];
                let mx = u16::from(mx & 0x0f);

                // MX selects one of 16 candidate bits per colour gun.
                let red = (sprbits & 0x0000_00ff) as u16
                    | (u16::from(forebits & 0x01) << 8)
                    | ((bacol & 0x001f) << 9)
                    | (1 << 14);

                let grn = ((sprbits & 0x0000_ff00) >> 8) as u16
                    | (u16::from(forebits & 0x02) << 7)
                    | ((bacol & 0x03e0) << 4)
                    | (1 << 14);

                let blu = ((sprbits & 0x00ff_0000) >> 16) as u16
                    | (u16::from(forebits & 0x04) << 6)
                    | ((bacol & 0x7c00) >> 1)
                    | (1 << 14);

                // Final mux through PR1121.
                let offs = usize::from(mx)
                    | usize::from(!red >> mx & 1) << 4
                    | usize::from(!grn >> mx & 1) << 5
                    | usize::from(!blu >> mx & 1) << 6
                    | usize::from(self.fbcol & 0x06) << 6;
                dest[xx * X_SCALE + ix] = u16::from(self.proms[PR1121 + offs]);
            }
        }
    }
}
