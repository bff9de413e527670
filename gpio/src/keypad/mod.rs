mod gpio;

use crate::{DeviceError, DeviceResult};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
pub use gpio::*;

/// The code reported when no key is pressed.
pub const NO_KEY: u8 = 0xFF;

/// The `Keypad` trait defines the interface for keypad input devices.
pub trait Keypad: Debug {
    /// Scans the keypad once.
    ///
    /// Returns the code of a key whose press has just been confirmed, or [NO_KEY].
    fn poll(&mut self) -> DeviceResult<u8>;
}

/// The supported matrix layouts, as lines × columns.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeypadGeometry {
    Keypad4x4,
    Keypad4x3,
    Keypad5x3,
}

impl KeypadGeometry {
    pub fn lines(&self) -> u8 {
        match self {
            KeypadGeometry::Keypad4x4 | KeypadGeometry::Keypad4x3 => 4,
            KeypadGeometry::Keypad5x3 => 5,
        }
    }

    pub fn columns(&self) -> u8 {
        match self {
            KeypadGeometry::Keypad4x4 => 4,
            KeypadGeometry::Keypad4x3 | KeypadGeometry::Keypad5x3 => 3,
        }
    }

    pub fn key_count(&self) -> usize {
        self.lines() as usize * self.columns() as usize
    }
}

impl FromStr for KeypadGeometry {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "4x4" => Ok(KeypadGeometry::Keypad4x4),
            "4x3" => Ok(KeypadGeometry::Keypad4x3),
            "5x3" => Ok(KeypadGeometry::Keypad5x3),
            _ => Err(DeviceError::InvalidGeometry),
        }
    }
}

impl Display for KeypadGeometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.lines(), self.columns())
    }
}

/// The largest number of keys of any supported geometry.
pub const MAX_KEYS: usize = 16;

/// The codes reported for each key of a matrix, row-major.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct KeyMap {
    geometry: KeypadGeometry,
    codes: [u8; MAX_KEYS],
}

impl KeyMap {
    /// Creates a key map for `geometry` from row-major `codes`.
    ///
    /// # Errors
    /// - [DeviceError::InvalidGeometry] if the number of codes doesn't match the geometry.
    /// - [DeviceError::InvalidArgument] if a code is [NO_KEY].
    pub fn new(geometry: KeypadGeometry, codes: &[u8]) -> DeviceResult<Self> {
        if codes.len() != geometry.key_count() {
            return Err(DeviceError::InvalidGeometry);
        }
        if codes.contains(&NO_KEY) {
            return Err(DeviceError::InvalidArgument);
        }

        let mut map = [NO_KEY; MAX_KEYS];
        map[..codes.len()].copy_from_slice(codes);
        Ok(KeyMap {
            geometry,
            codes: map,
        })
    }

    /// Gets the usual layout of a keypad with the given geometry, using hex digit codes for the
    /// letters (`*` is `0xE`, `#` is `0xF`).
    pub fn default_for(geometry: KeypadGeometry) -> Self {
        const KEYS_4X4: [u8; 16] = [
            0x1, 0x2, 0x3, 0xA,
            0x4, 0x5, 0x6, 0xB,
            0x7, 0x8, 0x9, 0xC,
            0xE, 0x0, 0xF, 0xD,
        ];
        const KEYS_4X3: [u8; 12] = [
            0x1, 0x2, 0x3,
            0x4, 0x5, 0x6,
            0x7, 0x8, 0x9,
            0xE, 0x0, 0xF,
        ];
        const KEYS_5X3: [u8; 15] = [
            0xA, 0xB, 0xC,
            0x1, 0x2, 0x3,
            0x4, 0x5, 0x6,
            0x7, 0x8, 0x9,
            0xE, 0x0, 0xF,
        ];

        let codes: &[u8] = match geometry {
            KeypadGeometry::Keypad4x4 => &KEYS_4X4,
            KeypadGeometry::Keypad4x3 => &KEYS_4X3,
            KeypadGeometry::Keypad5x3 => &KEYS_5X3,
        };
        let mut map = [NO_KEY; MAX_KEYS];
        map[..codes.len()].copy_from_slice(codes);
        KeyMap {
            geometry,
            codes: map,
        }
    }

    pub fn geometry(&self) -> KeypadGeometry {
        self.geometry
    }

    pub fn codes(&self) -> &[u8] {
        &self.codes[..self.geometry.key_count()]
    }

    /// Gets the code at a raw row-major index.
    pub fn code(&self, index: usize) -> Option<u8> {
        self.codes().get(index).copied()
    }

    /// Converts a (line, column) position to its code.
    pub fn code_at(&self, line: u8, column: u8) -> Option<u8> {
        if line >= self.geometry.lines() || column >= self.geometry.columns() {
            return None;
        }
        self.code(line as usize * self.geometry.columns() as usize + column as usize)
    }

    /// Finds the (line, column) position of the first key with the given code.
    pub fn position_of(&self, code: u8) -> Option<(u8, u8)> {
        let columns = self.geometry.columns() as usize;
        self.codes()
            .iter()
            .position(|&c| c == code)
            .map(|index| ((index / columns) as u8, (index % columns) as u8))
    }
}

impl Debug for KeyMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMap({}, {:02x?})", self.geometry, self.codes())
    }
}
