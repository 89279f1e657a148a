//! Dempa Micom Soft XE-1A analog/digital controller emulator.
//!
//! The controller speaks two protocols over the same six output lines
//! (D0-D3, L/H, /Ack):
//!
//! * In analog mode a falling edge on /Req snapshots the stick and
//!   buttons into a 6-byte packet, then an internal microcontroller
//!   shifts it out as twelve nybbles. The host cannot pace the
//!   transfer; it polls L/H and /Ack to know when each nybble is valid.
//! * In digital mode /Req is a plain multiplexer select and every read
//!   reflects the current inputs, mapped as a Towns-pad-alike (PC
//!   interface) or a 3-button Mega Drive pad (MD interface).
//!
//! All button lines are active low. Axes are unsigned bytes with 0x80
//! at centre.
//!
//! # Standalone IC
//!
//! This crate has no dependencies. Host inputs arrive through two
//! caller-provided closures, and time is advanced explicitly in
//! nanoseconds — the device has no clock of its own.

/// Delay from the /Req falling edge to the first nybble phase.
const STARTUP_DELAY_NS: u64 = 50_000;

/// Interval between output phases while shifting a packet.
const STEP_INTERVAL_NS: u64 = 10_000;

/// Quiescent output: D0-D3 high, L/H high, /Ack high.
const OUT_IDLE: u8 = 0x2f;

/// Button bit assignments in the 16-bit callback value (active low).
///
/// | bit | button | bit | button |
/// |-----|--------|-----|--------|
/// | 0   | D      | 8   | B'     |
/// | 1   | C      | 9   | A'     |
/// | 2   | B      | 10  | -      |
/// | 3   | A      | 11  | -      |
/// | 4   | Select | 12  | -      |
/// | 5   | Start  | 13  | -      |
/// | 6   | E2     | 14  | -      |
/// | 7   | E1     | 15  | -      |
pub type ButtonsFn = dyn FnMut() -> u16;

/// Analog channel callback: 0 = Y, 1 = X, 2 = Z (throttle), 3 = RZ.
pub type AnalogFn = dyn FnMut(usize) -> u8;

/// XE-1A controller state.
pub struct MicomXe1a {
    buttons_callback: Option<Box<ButtonsFn>>,
    analog_callback: Option<Box<AnalogFn>>,

    /// /Req input line.
    req: bool,
    /// Mode switch: true = analog, false = digital.
    mode: bool,
    /// Interface switch: true = MD, false = PC.
    interface: bool,

    /// Packed analog-mode packet.
    data: [u8; 6],
    /// Current output lines: D0-D3 in bits 0-3, L/H bit 4, /Ack bit 5.
    out: u8,

    /// Device time in nanoseconds.
    now: u64,
    /// Next output-timer firing, with the phase parameter it carries.
    timer: Option<(u64, u32)>,
}

impl MicomXe1a {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buttons_callback: None,
            analog_callback: None,
            req: true,
            mode: true,
            interface: false,
            data: [0; 6],
            out: OUT_IDLE,
            now: 0,
            timer: None,
        }
    }

    /// Install the button input source. Unset, all buttons read
    /// released (0xffff, active low).
    pub fn set_buttons_callback(&mut self, cb: impl FnMut() -> u16 + 'static) {
        self.buttons_callback = Some(Box::new(cb));
    }

    /// Install the analog input source. Unset, all channels read 0x00.
    pub fn set_analog_callback(&mut self, cb: impl FnMut(usize) -> u8 + 'static) {
        self.analog_callback = Some(Box::new(cb));
    }

    fn buttons(&mut self) -> u16 {
        self.buttons_callback.as_mut().map_or(0xffff, |cb| cb())
    }

    fn analog(&mut self, channel: usize) -> u8 {
        self.analog_callback.as_mut().map_or(0x00, |cb| cb(channel))
    }

    /// Advance device time by `ns` nanoseconds, stepping the output
    /// shifter through any phases that fall due.
    pub fn advance(&mut self, ns: u64) {
        let target = self.now + ns;
        while let Some((deadline, param)) = self.timer {
            if deadline > target {
                break;
            }
            // The cadence is anchored to the previous deadline, not to
            // the observation time.
            self.now = deadline;
            self.timer = None;
            self.step_output(param);
        }
        self.now = target;
    }

    /// Read the output lines: D0-D3, L/H (bit 4), /Ack (bit 5).
    pub fn out_r(&mut self) -> u8 {
        if self.mode {
            return self.out;
        }

        let buttons = self.buttons();
        if self.interface {
            // MD digital: a 3-button Mega Drive pad.
            let y = self.analog(0);
            if self.req {
                let x = self.analog(1);
                u8::from(y >= 0x40)
                    | (u8::from(y < 0xc0) << 1)
                    | (u8::from(x >= 0x40) << 2)
                    | (u8::from(x < 0xc0) << 3)
                    | ((bit(buttons, 2) & bit(buttons, 8)) << 4) // B/B'
                    | (bit(buttons, 1) << 5) // C
            } else {
                u8::from(y >= 0x40)
                    | (u8::from(y < 0xc0) << 1)
                    | ((bit(buttons, 3) & bit(buttons, 9)) << 4) // A/A'
                    | (bit(buttons, 5) << 5) // Start
            }
        } else if self.req {
            // PC digital, extended bank: throttle plus C/D/E1/E2.
            let z = self.analog(2);
            u8::from(z < 0xc0)
                | (u8::from(z >= 0x40) << 1)
                | (bit(buttons, 1) << 2) // C
                | (bit(buttons, 0) << 3) // D
                | (bit(buttons, 7) << 4) // E1
                | (bit(buttons, 6) << 5) // E2
        } else {
            // PC digital, basic bank: Select shows as Up+Down and Start
            // as Left+Right, gating the direction comparators.
            let y = self.analog(0);
            let x = self.analog(1);
            u8::from(bit(buttons, 4) != 0 && y >= 0x40)
                | (u8::from(bit(buttons, 4) != 0 && y < 0xc0) << 1)
                | (u8::from(bit(buttons, 5) != 0 && x >= 0x40) << 2)
                | (u8::from(bit(buttons, 5) != 0 && x < 0xc0) << 3)
                | ((bit(buttons, 3) & bit(buttons, 9)) << 4) // A/A'
                | ((bit(buttons, 2) & bit(buttons, 8)) << 5) // B/B'
        }
    }

    /// /Req line. In analog mode a falling edge snapshots the inputs
    /// and starts the packet shifter; in digital mode it only switches
    /// the multiplexer bank.
    pub fn req_w(&mut self, state: bool) {
        if state == self.req {
            return;
        }
        if self.mode && !state {
            let buttons = self.buttons();
            let mut analog = [0u8; 4];
            for (i, a) in analog.iter_mut().enumerate() {
                *a = self.analog(i);
            }

            self.data[0] = (buttons & 0xff) as u8 & ((((buttons >> 8) & 3) as u8) << 2 | 0xf3);
            self.data[1] = (analog[0] >> 4) | (analog[1] & 0xf0);
            self.data[2] = (analog[2] >> 4) | (analog[3] & 0xf0);
            self.data[3] = (analog[0] & 0x0f) | (analog[1] << 4);
            self.data[4] = (analog[2] & 0x0f) | (analog[3] << 4);
            self.data[5] = ((buttons >> 8) & 0xff) as u8 & ((((buttons >> 6) & 3) as u8) << 2 | 0xf3);

            // The microcontroller takes a while to respond.
            self.timer = Some((self.now + STARTUP_DELAY_NS, 0));
        }
        self.req = state;
    }

    /// Mode switch: true selects analog mode. Dropping to digital mode
    /// cancels any transfer in progress and idles the output lines.
    pub fn mode_w(&mut self, state: bool) {
        if state == self.mode {
            return;
        }
        if !state {
            self.timer = None;
            self.out = OUT_IDLE;
        }
        self.mode = state;
    }

    /// Interface switch: true selects MD pinout, false PC.
    pub fn interface_w(&mut self, state: bool) {
        self.interface = state;
    }

    /// One phase of the packet shifter. Even phases toggle L/H and
    /// raise /Ack; odd phases present a data nybble and drop /Ack.
    fn step_output(&mut self, param: u32) {
        let step = param >> 1;
        if param & 1 == 0 {
            self.out = (self.out & 0x0f) | if step & 1 != 0 { 0x30 } else { 0x20 };
            if step < self.data.len() as u32 * 2 {
                self.timer = Some((self.now + STEP_INTERVAL_NS, param + 1));
            }
        } else if step < self.data.len() as u32 * 2 {
            let nybble = step ^ u32::from(self.interface);
            let byte = self.data[(nybble >> 1) as usize];
            let value = if nybble & 1 != 0 { byte >> 4 } else { byte & 0x0f };
            self.out = value | (self.out & 0x10);
            self.timer = Some((self.now + STEP_INTERVAL_NS, param + 1));
        }
    }
}

impl Default for MicomXe1a {
    fn default() -> Self {
        Self::new()
    }
}

/// Single bit of a button word, as 0 or 1.
fn bit(value: u16, n: u8) -> u8 {
    (value >> n & 1) as u8
}
