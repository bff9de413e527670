//! The simulated board: an ATmega328P-like part with the keypad and the display wired to ports B,
//! C and D.
//!
//! - Port C drives the keypad lines, from pin 0.
//! - Port B reads the keypad columns, from pin 2, and selects the digits, from pin 0.
//! - Port D drives the segment bus.

use eyre::eyre;
use segpad_gpio::keypad::KeypadGeometry;
use segpad_gpio::sim::{MatrixPort, SimPort};
use segpad_gpio::{DeviceResult, LineGroup};

pub const KEYPAD_LINES_FIRST: u8 = 0;
pub const KEYPAD_COLUMNS_FIRST: u8 = 2;
pub const DISPLAY_SELECT_FIRST: u8 = 0;

pub static PORT_C: SimPort = SimPort::new();
pub static PORT_D: SimPort = SimPort::new();
pub static PORT_B: MatrixPort<'static> =
    MatrixPort::new(&PORT_C, KEYPAD_LINES_FIRST, KEYPAD_COLUMNS_FIRST);

/// Gets the line and column groups of a keypad with the given geometry.
pub fn keypad_groups(
    geometry: KeypadGeometry,
) -> DeviceResult<(LineGroup<'static>, LineGroup<'static>)> {
    let lines = LineGroup::new(&PORT_C, KEYPAD_LINES_FIRST, geometry.lines())?;
    let columns = LineGroup::new(&PORT_B, KEYPAD_COLUMNS_FIRST, geometry.columns())?;
    Ok((lines, columns))
}

/// Checks that the digit select lines leave the keypad columns alone.
pub fn check_layout(digits: u8) -> eyre::Result<()> {
    let free = KEYPAD_COLUMNS_FIRST - DISPLAY_SELECT_FIRST;
    if digits > free {
        return Err(eyre!(
            "Port B only has {} select lines free, cannot drive {} digits",
            free,
            digits
        ));
    }
    Ok(())
}
