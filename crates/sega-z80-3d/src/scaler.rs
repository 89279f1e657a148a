//! Sprite X-scale step rate.
//!
//! Each sprite level is clocked by its own voltage-controlled oscillator.
//! The sprite's X-scale register drives a DAC whose output current, summed
//! with a resistor-divider reference, becomes the VCO control voltage; the
//! resulting frequency determines how fast the level steps through its
//! pattern ROM relative to the fixed 5 MHz pixel clock. The step is
//! expressed as an 8.24 fixed-point fraction of one output pixel.
//!
//! Turbo exposes the two control resistances as front-panel pots; the
//! other boards fix them on the PCB.

use crate::X_SCALE;

/// Pixel clock in Hz, common to all three boards.
const PIXEL_CLOCK_HZ: f64 = 5e6;

/// One whole pixel in 8.24 fixed point.
const FRAC_UNIT: f64 = 16_777_216.0;

/// VCO output frequency in Hz for a control voltage and external
/// capacitance.
///
/// The control voltage is clamped to the 0-5 V supply range. Below 10 pF
/// the datasheet graph (recorded at 50 pF) is modelled as three segments
/// with a rough fit of the non-linear ends, scaled by the capacitance
/// ratio — the frequency rises roughly tenfold for every tenfold drop in
/// capacitance. At larger capacitances the datasheet's figure-6 log fit
/// applies directly.
#[must_use]
pub fn vco_frequency(control_voltage: f64, cext: f64) -> f64 {
    let cv = control_voltage.clamp(0.0, 5.0);
    if cext < 1e-11 {
        let freq = if cv < 1.33 {
            (0.68129 + (cv + 0.6).powf(1.285)) * 1e6
        } else if cv < 4.3 {
            (3.0 + (8.0 - 3.0) * ((cv - 1.33) / (4.3 - 1.33))) * 1e6
        } else {
            (-1.560279 + (cv - 4.3 + 6.0).powf(1.26)) * 1e6
        };
        freq * (50e-12 / cext)
    } else {
        let exponent = -0.989_294_2 * cext.log10() - 0.030_969_7 * cv * cv
            + 0.344_079_975 * cv
            - 4.086_395_841;
        10f64.powf(exponent)
    }
}

/// Control voltage produced by the scale DAC through the reference
/// network. `vr1` and `vr2` are in ohms.
fn control_voltage(dac: u8, vr1: f64, vr2: f64) -> f64 {
    let iref = 5.0 / (1.5e3 + vr2);
    let iout = iref * (f64::from(dac) / 256.0);
    let vref = 5.0 * 1e3 / (3.8e3 + 1e3 + vr1);
    2.2e3 * iout + vref
}

/// Per-pixel step for a sprite X-scale register value: an 8.24 fixed-point
/// fraction of the pixel clock divided by the horizontal scale factor.
///
/// Pure — identical inputs always produce identical output.
#[must_use]
pub fn sprite_step(dac: u8, vr1: f64, vr2: f64, cext: f64) -> u32 {
    let freq = vco_frequency(control_voltage(dac, vr1, vr2), cext);
    (freq / (PIXEL_CLOCK_HZ * X_SCALE as f64) * FRAC_UNIT) as u32
}
