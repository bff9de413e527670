//! Key presses typed on stdin, played on the simulated key matrix.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use log::{debug, info, warn};
use segpad_gpio::keypad::KeyMap;
use segpad_gpio::sim::MatrixPort;

/// Converts a typed character to a key code: hex digits map to their value, `*` to `0xE` and
/// `#` to `0xF`, the way the default key maps label them.
pub fn key_code(c: char) -> Option<u8> {
    match c {
        '*' => Some(0xE),
        '#' => Some(0xF),
        _ => c.to_digit(16).map(|digit| digit as u8),
    }
}

/// Spawns the thread reading stdin. Every known key typed is held for `hold`, then released for
/// as long again so repeated keys are seen as separate presses.
///
/// `running` is cleared when stdin is closed.
pub fn spawn_key_presser(
    matrix: &'static MatrixPort<'static>,
    key_map: KeyMap,
    hold: Duration,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            info!("Type keys and press enter, close stdin to quit.");

            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        warn!("Cannot read stdin: {}", err);
                        break;
                    }
                };

                for c in line.chars().filter(|c| !c.is_whitespace()) {
                    let Some((row, column)) = key_code(c).and_then(|code| key_map.position_of(code))
                    else {
                        warn!("No key {:?} on the keypad", c);
                        continue;
                    };

                    debug!("Pressing {:?} at ({}, {})", c, row, column);
                    matrix.press(row, column);
                    thread::sleep(hold);
                    matrix.release(row, column);
                    thread::sleep(hold);
                }
            }

            running.store(false, Ordering::Release);
        })
}
