//! The module for the main loop state and logic.

use log::{info, warn};
use segpad_gpio::DeviceResult;
use segpad_gpio::keypad::{Keypad, NO_KEY};
use segpad_gpio::sevseg::{MuxDisplay, MAX_DIGITS};

/// The main app state struct.
///
/// Every reported key is shifted into the rightmost digit, pushing the others to the left.
pub struct App<'a> {
    keypad: &'a mut dyn Keypad,
    display: &'a MuxDisplay<'a>,
    /// The codes currently shown, leftmost first. Only the first `count` are used.
    digits: [u8; MAX_DIGITS as usize],
    count: usize,
}

impl<'a> App<'a> {
    /// Creates the app and shows zeroes on every digit.
    pub fn new(keypad: &'a mut dyn Keypad, display: &'a MuxDisplay<'a>) -> DeviceResult<Self> {
        let count = display.digit_count().unwrap_or_default() as usize;
        let digits = [0; MAX_DIGITS as usize];
        display.update_values(&digits[..count])?;

        Ok(App {
            keypad,
            display,
            digits,
            count,
        })
    }

    pub fn digits(&self) -> &[u8] {
        &self.digits[..self.count]
    }

    /// Polls the keypad once. Returns the reported key, if any.
    pub fn update(&mut self) -> DeviceResult<Option<u8>> {
        let key = self.keypad.poll()?;
        if key == NO_KEY {
            return Ok(None);
        }

        let mut digits = self.digits;
        let shown = &mut digits[..self.count];
        shown.rotate_left(1);
        if let Some(last) = shown.last_mut() {
            *last = key;
        }

        match self.display.update_values(shown) {
            Ok(()) => {
                self.digits = digits;
                info!("Key {:X}, showing {}", key, self.render());
            }
            Err(err) => warn!("Cannot show key {:#04x}: {}", key, err),
        }
        Ok(Some(key))
    }

    /// Renders the shown codes as text, one character per digit.
    pub fn render(&self) -> String {
        self.digits()
            .iter()
            .map(|&code| match code {
                0..=0xF => char::from_digit(code as u32, 16)
                    .map_or('?', |c| c.to_ascii_uppercase()),
                0xFD => '8',
                0xFF => ' ',
                _ => code as char,
            })
            .collect()
    }
}
