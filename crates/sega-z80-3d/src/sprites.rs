//! Shared sprite hardware: 16 slots, 8 levels, fractional-step sampling.
//!
//! The board multiplexes 16 physical sprite slots onto 8 logical levels
//! (`level = slot & 7`). Scanline preparation runs the enable ALU for
//! every slot (the hardware did this during the previous line's HBLANK);
//! enabled slots reload their level's latch, ROM offset, fractional
//! accumulator and step rate — slots are processed in ascending order, so
//! when both slots aliasing a level enable on the same line, the higher
//! slot's state wins. Per-pixel sampling then ORs each live level's
//! latched bits into the composite and advances its fractional position,
//! pulling new nibbles out of the sprite pattern ROMs as whole pixel
//! units elapse.

use crate::scaler;

/// Sprite RAM size: 16 slots of 8 registers.
pub const SPRITE_RAM_SIZE: usize = 128;

/// Expansion of a ROM nibble into four sparse bit planes, one byte lane
/// per source bit. Shifting the expanded word left by the level number
/// interleaves all eight levels: lane byte N carries data line N's bit
/// for every level.
const SPRITE_EXPAND: [u32; 16] = [
    0x0000_0000, 0x0000_0001, 0x0000_0100, 0x0000_0101,
    0x0001_0000, 0x0001_0001, 0x0001_0100, 0x0001_0101,
    0x0100_0000, 0x0100_0001, 0x0100_0100, 0x0100_0101,
    0x0101_0000, 0x0101_0001, 0x0101_0100, 0x0101_0101,
];

/// Fixed constants for one board variant of the sprite pipeline.
///
/// The three boards share the control flow; they differ only in these
/// values and in the compositor downstream.
#[derive(Clone, Copy)]
pub struct SpriteBoard {
    /// VCO control resistances in ohms (front-panel pots on Turbo, fixed
    /// on the other boards).
    pub vr1: f64,
    pub vr2: f64,
    /// External VCO capacitor in farads.
    pub cext: f64,
    /// One whole output pixel in the 8.24 fractional accumulator
    /// (the boards run the sprite clock at different ratios of the pixel
    /// clock).
    pub frac_one: u32,
    /// log2 of sprite pattern ROM bytes per level.
    pub level_shift: u32,
    /// Mask applied to the byte address within a level's ROM page.
    pub rom_mask: u32,
    /// Shift applied to the row offset on load (the two-ROM boards
    /// address nibbles, so the RAM value is doubled).
    pub offset_shift: u32,
    /// Offset bit that selects decrement instead of increment.
    pub dir_bit: u32,
    /// The y-compare bytes are stored inverted on Turbo.
    pub y_invert: bool,
    /// Per-nibble end/PLB packing: bit 1 clears the level's live flag,
    /// bit 0 is the level's PLB (priority) output.
    pub end_plb: [u8; 16],
}

/// Composited sprite output for one output pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpriteBits {
    /// Expanded pixel bits: four byte lanes of eight level bits each
    /// (CDA/CDB/CDC/CDD on the two-ROM boards; CDB/CDG/CDR/PLB on Turbo).
    pub data: u32,
    /// PLB sideband, one bit per level (two-ROM boards only).
    pub plb: u8,
}

/// The sprite half of the video board: slot RAM, pattern ROMs and the
/// per-level arena that persists across a scanline.
pub struct SpriteUnit {
    board: SpriteBoard,
    rom: Vec<u8>,
    ram: [u8; SPRITE_RAM_SIZE],
    /// Slot enable bits, rebuilt by `prepare_line`.
    ve: u16,
    /// Live-level latches, armed by `mark_live`, cleared by end nibbles.
    lst: u8,
    latched: [u32; 8],
    plb: [u8; 8],
    offset: [u32; 8],
    frac: [u32; 8],
    step: [u32; 8],
}

impl SpriteUnit {
    /// `rom` must cover all eight level pages implied by the board's
    /// `level_shift`.
    #[must_use]
    pub fn new(board: SpriteBoard, rom: Vec<u8>) -> Self {
        assert!(
            rom.len() >= 8 << board.level_shift,
            "sprite ROM too small for 8 level pages"
        );
        Self {
            board,
            rom,
            ram: [0; SPRITE_RAM_SIZE],
            ve: 0,
            lst: 0,
            latched: [0; 8],
            plb: [0; 8],
            offset: [0; 8],
            frac: [0; 8],
            step: [0; 8],
        }
    }

    pub fn write_ram(&mut self, offset: usize, data: u8) {
        self.ram[offset & (SPRITE_RAM_SIZE - 1)] = data;
    }

    #[must_use]
    pub fn read_ram(&self, offset: usize) -> u8 {
        self.ram[offset & (SPRITE_RAM_SIZE - 1)]
    }

    /// Replace the VCO control pots (Turbo front panel).
    pub fn set_pots(&mut self, vr1_ohms: f64, vr2_ohms: f64) {
        self.board.vr1 = vr1_ohms;
        self.board.vr2 = vr2_ohms;
    }

    /// Slot enables computed by the last `prepare_line`.
    #[must_use]
    pub fn enables(&self) -> u16 {
        self.ve
    }

    /// Currently live levels.
    #[must_use]
    pub fn live(&self) -> u8 {
        self.lst
    }

    /// Run the enable ALU and row-offset update for every slot.
    ///
    /// `row_advance` is the board's row-advance PROM region (at least
    /// 0x200 bytes): A0-A7 take the low byte of the running sum, A8 takes
    /// y-scale bit 3, and the y-scale low bits select one of the entry's
    /// eight bits. A clear bit adds the signed 16-bit row increment to
    /// the row offset and writes it back to sprite RAM — the offset is
    /// not monotonic across scanlines.
    pub fn prepare_line(&mut self, y: u8, row_advance: &[u8]) {
        self.ve = 0;
        self.lst = 0;

        let inv = if self.board.y_invert { 0xff } else { 0x00 };
        for slot in 0..16 {
            let base = slot * 8;
            let level = slot & 7;

            // Chained 9-bit adds: the low carry ANDed with the inverted
            // high carry clocks the slot's enable bit.
            let mut sum = u32::from(y) + u32::from(self.ram[base] ^ inv);
            let clo = (sum >> 8) & 1;
            sum += (u32::from(y) << 8) + (u32::from(self.ram[base + 1] ^ inv) << 8);
            let chi = (sum >> 16) & 1;
            if clo & (chi ^ 1) == 0 {
                continue;
            }

            let xscale = self.ram[base + 2] ^ 0xff;
            let yscale = self.ram[base + 3];
            let mut offset =
                u16::from(self.ram[base + 6]) | (u16::from(self.ram[base + 7]) << 8);

            self.ve |= 1 << slot;

            let offs = (sum & 0xff) as usize | (usize::from(yscale & 0x08) << 5);
            if row_advance[offs] >> (yscale & 0x07) & 1 == 0 {
                let increment =
                    u16::from(self.ram[base + 4]) | (u16::from(self.ram[base + 5]) << 8);
                offset = offset.wrapping_add(increment);
                self.ram[base + 6] = offset as u8;
                self.ram[base + 7] = (offset >> 8) as u8;
            }

            // The ALU output feeds the level counter: last enabled slot
            // aliasing this level wins.
            self.latched[level] = 0;
            self.plb[level] = 0;
            self.offset[level] = u32::from(offset) << self.board.offset_shift;
            self.frac[level] = 0;
            self.step[level] =
                scaler::sprite_step(xscale, self.board.vr1, self.board.vr2, self.board.cext);
        }
    }

    /// Clock the horizontal-enable bits for the current column: the AND
    /// of line enable and horizontal enable is held in the live-level
    /// latches.
    pub fn mark_live(&mut self, he: u16) {
        let he = he & self.ve;
        self.lst |= (he & 0xff) as u8 | (he >> 8) as u8;
    }

    /// Emit the composite sprite bits for one output pixel and advance
    /// every live level's fractional position.
    ///
    /// `live_mask` restricts which levels participate this pixel (Turbo
    /// holds levels 3-7 off until the beam leaves the road); masked
    /// levels neither contribute nor advance.
    pub fn sample(&mut self, live_mask: u8) -> SpriteBits {
        let mut data = 0u32;
        let mut plb = 0u8;

        for level in 0..8 {
            if (self.lst & live_mask) & (1 << level) == 0 {
                continue;
            }

            // Latch first, then advance: a fetch triggered this pixel is
            // seen on the next one.
            data |= self.latched[level];
            plb |= self.plb[level];
            self.frac[level] += self.step[level];

            while self.frac[level] >= self.board.frac_one {
                let offs = self.offset[level];

                // Offset bit 0 selects the nibble within the byte; the
                // higher bits address the level's ROM page.
                let addr = ((level as u32) << self.board.level_shift)
                    | ((offs >> 1) & self.board.rom_mask);
                let pix = usize::from(self.rom[addr as usize] >> ((!offs & 1) * 4) & 0x0f);

                self.latched[level] = SPRITE_EXPAND[pix] << level;
                self.plb[level] = (self.board.end_plb[pix] & 1) << level;

                // An end nibble resets the level's enable flip-flop.
                if self.board.end_plb[pix] & 2 != 0 {
                    self.lst &= !(1 << level);
                }

                self.offset[level] = if offs & self.board.dir_bit != 0 {
                    offs.wrapping_sub(1)
                } else {
                    offs.wrapping_add(1)
                };
                self.frac[level] -= self.board.frac_one;
            }
        }

        SpriteBits { data, plb }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A two-ROM-board parameter set (Subroc-3D shape) for exercising the
    // shared machinery.
    const TEST_BOARD: SpriteBoard = SpriteBoard {
        vr1: 1.2e3,
        vr2: 1.2e3,
        cext: 220e-12,
        frac_one: 0x0080_0000,
        level_shift: 15,
        rom_mask: 0x7fff,
        offset_shift: 1,
        dir_bit: 0x1_0000,
        y_invert: false,
        end_plb: [0, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 1, 0, 1, 1, 2],
    };

    const TURBO_BOARD: SpriteBoard = SpriteBoard {
        vr1: 310.0,
        vr2: 910.0,
        cext: 100e-12,
        frac_one: 0x0100_0000,
        level_shift: 14,
        rom_mask: 0x3fff,
        offset_shift: 0,
        dir_bit: 0x8000,
        y_invert: true,
        end_plb: [0, 0, 0, 0, 2, 2, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0],
    };

    fn unit(board: SpriteBoard) -> SpriteUnit {
        SpriteUnit::new(board, vec![0; 8 << board.level_shift])
    }

    #[test]
    fn expand_table_spreads_nibble_across_lanes() {
        for nibble in 0..16u32 {
            let mut expected = 0u32;
            for bit in 0..4 {
                if nibble >> bit & 1 != 0 {
                    expected |= 1 << (bit * 8);
                }
            }
            assert_eq!(SPRITE_EXPAND[nibble as usize], expected);
        }
        // Level shift interleaves: nibble 0xf on level 5 owns bit 5 of
        // every lane.
        assert_eq!(SPRITE_EXPAND[0xf] << 5, 0x2020_2020);
    }

    #[test]
    fn enable_alu_window_edges() {
        // Turbo stores the compare bytes inverted: with row0 = 0 and
        // row1 = 3 the low carry fires from scanline 1 and the high
        // carry from scanline 3, leaving scanlines 1 and 2 enabled.
        let prom = [0xff; 0x200]; // never advance the row offset
        let mut s = unit(TURBO_BOARD);
        s.write_ram(0, 0x00);
        s.write_ram(1, 0x03);

        s.prepare_line(0, &prom);
        assert_eq!(s.enables(), 0, "no carry possible on scanline 0");

        s.prepare_line(1, &prom);
        assert_eq!(s.enables() & 1, 1, "low edge of the window");

        s.prepare_line(2, &prom);
        assert_eq!(s.enables() & 1, 1, "high edge of the window");

        s.prepare_line(3, &prom);
        assert_eq!(s.enables(), 0, "high carry kills the enable");
    }

    #[test]
    fn enable_alu_without_inversion() {
        // Two-ROM boards compare the raw bytes: y + row0 must carry.
        let prom = [0xff; 0x200];
        let mut s = unit(TEST_BOARD);
        s.write_ram(0, 0xff);
        s.write_ram(1, 0xfd);

        s.prepare_line(0, &prom);
        assert_eq!(s.enables(), 0);

        s.prepare_line(1, &prom);
        assert_eq!(s.enables() & 1, 1);
    }

    #[test]
    fn row_offset_advances_and_writes_back() {
        // A clear PROM bit adds the (two's-complement) row increment and
        // stores it back into slot RAM.
        let advance = [0x00; 0x200];
        let hold = [0xff; 0x200];
        let mut s = unit(TEST_BOARD);
        s.write_ram(0, 0xff); // enables on y = 1
        s.write_ram(1, 0xf0);
        s.write_ram(4, 0xfe); // increment = -2
        s.write_ram(5, 0xff);
        s.write_ram(6, 0x10); // offset = 0x0010
        s.write_ram(7, 0x00);

        s.prepare_line(1, &hold);
        assert_eq!(s.read_ram(6), 0x10, "held offset must not be written back");
        assert_eq!(s.offset[0], 0x0010 << 1);

        s.prepare_line(1, &advance);
        assert_eq!(s.read_ram(6), 0x0e);
        assert_eq!(s.read_ram(7), 0x00);
        assert_eq!(s.offset[0], 0x000e << 1);

        // Offsets are not monotonic: a positive increment on the next
        // line moves it back up.
        s.write_ram(4, 0x05);
        s.write_ram(5, 0x00);
        s.prepare_line(1, &advance);
        assert_eq!(s.read_ram(6), 0x13);
    }

    #[test]
    fn aliased_slots_last_write_wins() {
        // Slots 2 and 10 share level 2; slot 10 is processed second and
        // owns the level state.
        let prom = [0xff; 0x200];
        let mut s = unit(TEST_BOARD);
        for slot in [2usize, 10] {
            s.write_ram(slot * 8, 0xff);
            s.write_ram(slot * 8 + 1, 0xf0);
        }
        s.write_ram(2 * 8 + 6, 0x11);
        s.write_ram(10 * 8 + 6, 0x77);

        s.prepare_line(1, &prom);
        assert_eq!(s.enables(), (1 << 2) | (1 << 10));
        assert_eq!(s.offset[2], 0x77 << 1);
    }

    #[test]
    fn mark_live_requires_slot_enable() {
        let prom = [0xff; 0x200];
        let mut s = unit(TEST_BOARD);
        s.write_ram(0, 0xff);
        s.write_ram(1, 0xf0);
        s.prepare_line(1, &prom);

        // Horizontal enable for a slot that never passed the ALU is
        // ignored; the enabled slot arms its level.
        s.mark_live(1 << 5);
        assert_eq!(s.live(), 0);
        s.mark_live(1 << 0);
        assert_eq!(s.live(), 1);
    }

    #[test]
    fn upper_slot_folds_onto_level() {
        let prom = [0xff; 0x200];
        let mut s = unit(TEST_BOARD);
        s.write_ram(12 * 8, 0xff); // slot 12 = level 4
        s.write_ram(12 * 8 + 1, 0xf0);
        s.prepare_line(1, &prom);

        s.mark_live(1 << 12);
        assert_eq!(s.live(), 1 << 4);
    }

    #[test]
    fn sampler_latches_one_pixel_behind() {
        let mut rom = vec![0u8; 8 << TEST_BOARD.level_shift];
        rom[0] = 0xa5; // offset 0 reads the high nibble first
        let mut s = SpriteUnit::new(TEST_BOARD, rom);
        s.lst = 1;
        s.step[0] = TEST_BOARD.frac_one;

        // First pixel returns the (empty) latch and fetches nibble 0xa.
        let first = s.sample(0xff);
        assert_eq!(first.data, 0);
        assert_eq!(s.latched[0], SPRITE_EXPAND[0xa]);
        assert_eq!(s.plb[0], 1, "nibble 0xa carries the PLB bit");
        assert_eq!(s.offset[0], 1);

        // Second pixel emits it and fetches the low nibble 0x5.
        let second = s.sample(0xff);
        assert_eq!(second.data, SPRITE_EXPAND[0xa]);
        assert_eq!(second.plb, 1);
        assert_eq!(s.latched[0], SPRITE_EXPAND[0x5]);
    }

    #[test]
    fn end_nibble_clears_live_flag() {
        let mut rom = vec![0u8; 8 << TEST_BOARD.level_shift];
        rom[0] = 0x30; // high nibble 3: END in the two-ROM table
        let mut s = SpriteUnit::new(TEST_BOARD, rom);
        s.lst = 1;
        s.step[0] = TEST_BOARD.frac_one;

        s.sample(0xff);
        assert_eq!(s.live(), 0);
        // A dead level neither contributes nor advances.
        let frac = s.frac[0];
        s.sample(0xff);
        assert_eq!(s.frac[0], frac);
    }

    #[test]
    fn turbo_end_encoding() {
        // Turbo ends when nibble bit 3 is clear and bit 2 set; no PLB.
        let mut rom = vec![0u8; 8 << TURBO_BOARD.level_shift];
        rom[0] = 0x4c; // high nibble 4 ends, low nibble 0xc does not
        let mut s = SpriteUnit::new(TURBO_BOARD, rom);
        s.lst = 1;
        s.step[0] = TURBO_BOARD.frac_one;

        s.sample(0xff);
        assert_eq!(s.live(), 0);
        assert_eq!(s.plb[0], 0);

        rom = vec![0u8; 8 << TURBO_BOARD.level_shift];
        rom[0] = 0xc0;
        let mut s = SpriteUnit::new(TURBO_BOARD, rom);
        s.lst = 1;
        s.step[0] = TURBO_BOARD.frac_one;
        s.sample(0xff);
        assert_eq!(s.live(), 1, "nibble 0xc keeps the level live");
    }

    #[test]
    fn direction_bit_decrements_offset() {
        let mut rom = vec![0u8; 8 << TEST_BOARD.level_shift];
        rom[4] = 0xf0; // offs 0x10008 >> 1 masked = byte 4
        let mut s = SpriteUnit::new(TEST_BOARD, rom);
        s.lst = 1;
        s.offset[0] = 0x1_0008;
        s.step[0] = TEST_BOARD.frac_one;

        s.sample(0xff);
        assert_eq!(s.offset[0], 0x1_0007);
    }

    #[test]
    fn live_mask_freezes_masked_levels() {
        let mut rom = vec![0u8; 8 << TEST_BOARD.level_shift];
        rom[3 << TEST_BOARD.level_shift] = 0x11;
        let mut s = SpriteUnit::new(TEST_BOARD, rom);
        s.lst = 1 << 3;
        s.step[3] = TEST_BOARD.frac_one;

        // Level 3 masked off: no fetch, no advance.
        let bits = s.sample(0x07);
        assert_eq!(bits.data, 0);
        assert_eq!(s.frac[3], 0);
        assert_eq!(s.offset[3], 0);

        // Unmasked it runs.
        s.sample(0xff);
        assert_eq!(s.latched[3], SPRITE_EXPAND[1] << 3);
    }

    #[test]
    fn fraction_accumulates_partial_steps() {
        let mut rom = vec![0u8; 8 << TEST_BOARD.level_shift];
        rom[0] = 0x0f;
        let mut s = SpriteUnit::new(TEST_BOARD, rom);
        s.lst = 1;
        s.step[0] = TEST_BOARD.frac_one / 2;

        s.sample(0xff);
        assert_eq!(s.offset[0], 0, "half a pixel is not enough to fetch");
        s.sample(0xff);
        assert_eq!(s.offset[0], 1);
        assert_eq!(s.frac[0], 0);
    }
}
