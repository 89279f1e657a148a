//! Sega Z80-3D board video pipeline.
//!
//! Three arcade systems — Turbo, Subroc-3D and Buck Rogers — share one
//! sprite board lineage: 16 sprite slots multiplexed onto 8 levels, a
//! per-sprite voltage-controlled oscillator clocking ROM fetches at a
//! fractional rate, and PROM-driven priority muxing into the final palette
//! index. The boards differ only in analog constants, ROM paging and a few
//! table shapes; the control flow is identical.
//!
//! # Standalone IC
//!
//! This crate has no dependencies — PROM dumps, sprite pattern ROMs and
//! road/background ROMs are supplied as byte vectors by the caller, the
//! foreground tile row arrives as a plain slice per scanline, and each
//! `render_line` call writes one row of palette indices into a
//! caller-owned buffer. Palette conversion, tilemap bookkeeping and device
//! wiring are external concerns.
//!
//! # Pipeline per scanline
//!
//! 1. Sprite preparation: for every slot, the enable ALU decides whether
//!    the sprite covers this line; enabled slots conditionally advance
//!    their row offset (writing it back to sprite RAM) and reload the
//!    level's latch, offset, fraction and step.
//! 2. Per-column: the horizontal position RAM arms live levels, road/area
//!    or character PROMs are consulted once per 5 MHz column.
//! 3. Per output pixel (2 per column): live levels accumulate their
//!    latched bits and advance their fractional position, fetching new
//!    ROM nibbles as whole pixel units elapse; the board's compositor
//!    folds sprite, foreground and background bits through its PROM
//!    chain into a palette index.

mod scaler;
mod sprites;

pub mod buckrog;
pub mod subroc3d;
pub mod turbo;

pub use buckrog::Buckrog;
pub use scaler::{sprite_step, vco_frequency};
pub use sprites::{SpriteBits, SpriteBoard, SpriteUnit, SPRITE_RAM_SIZE};
pub use subroc3d::Subroc3d;
pub use turbo::Turbo;

/// Horizontal scale factor: each 5 MHz pixel column produces two output
/// pixels, mixed at the sprite boards' doubled clock.
pub const X_SCALE: usize = 2;

/// Pixel columns per scanline.
pub const LINE_COLUMNS: usize = 0x100;

/// Output pixels per scanline.
pub const LINE_WIDTH: usize = LINE_COLUMNS * X_SCALE;
