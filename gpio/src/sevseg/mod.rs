//! Seven-segment displays.
//!
//! Segment patterns use one bit per segment, LSb first: `a b c d e f g`, with the decimal point in
//! the MSb. A set bit means a lit segment; [DisplayPolarity] maps that to the levels the display
//! needs.
//!
//! ```text
//!    a
//!  f   b
//!    g
//!  e   c
//!    d   dp
//! ```

mod mux;

use crate::DeviceError;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
pub use mux::*;

/// The decimal point bit of a segment pattern.
pub const SEGMENT_DP: u8 = 0b1000_0000;

/// How the segments of a display are wired.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DisplayPolarity {
    /// Segments share the anode, a segment is lit by driving it low.
    #[default]
    CommonAnode,
    /// Segments share the cathode, a segment is lit by driving it high.
    CommonCathode,
}

impl DisplayPolarity {
    /// Converts a segment pattern to the levels to output on the segment bus.
    pub fn apply(&self, segments: u8) -> u8 {
        match self {
            DisplayPolarity::CommonAnode => !segments,
            DisplayPolarity::CommonCathode => segments,
        }
    }
}

impl FromStr for DisplayPolarity {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "common-anode" => Ok(DisplayPolarity::CommonAnode),
            "common-cathode" => Ok(DisplayPolarity::CommonCathode),
            _ => Err(DeviceError::InvalidArgument),
        }
    }
}

impl Display for DisplayPolarity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            DisplayPolarity::CommonAnode => "common-anode",
            DisplayPolarity::CommonCathode => "common-cathode",
        };
        write!(f, "{}", str)
    }
}

/// The characters a seven-segment digit can show.
///
/// Hex digits use their numeric value, letters their ASCII code.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SevenSegmentCode {
    Hex0 = 0x0,
    Hex1 = 0x1,
    Hex2 = 0x2,
    Hex3 = 0x3,
    Hex4 = 0x4,
    Hex5 = 0x5,
    Hex6 = 0x6,
    Hex7 = 0x7,
    Hex8 = 0x8,
    Hex9 = 0x9,
    HexA = 0xA,
    HexB = 0xB,
    HexC = 0xC,
    HexD = 0xD,
    HexE = 0xE,
    HexF = 0xF,
    LetterA = b'A',
    LetterB = b'B',
    LetterC = b'C',
    LetterD = b'D',
    LetterE = b'E',
    LetterF = b'F',
    LetterH = b'H',
    LetterI = b'i',
    LetterJ = b'j',
    LetterL = b'L',
    LetterN = b'n',
    LetterO = b'O',
    LetterP = b'P',
    LetterQ = b'q',
    LetterR = b'r',
    LetterS = b'S',
    LetterT = b't',
    LetterU = b'U',
    LetterY = b'y',
    Dash = b'-',
    /// Every segment lit.
    On = 0xFD,
    /// Every segment off.
    Off = 0xFF,
}

impl SevenSegmentCode {
    /// Converts a raw code to a [SevenSegmentCode].
    pub fn from_u8(code: u8) -> Option<Self> {
        use SevenSegmentCode::*;

        let code = match code {
            0x0 => Hex0,
            0x1 => Hex1,
            0x2 => Hex2,
            0x3 => Hex3,
            0x4 => Hex4,
            0x5 => Hex5,
            0x6 => Hex6,
            0x7 => Hex7,
            0x8 => Hex8,
            0x9 => Hex9,
            0xA => HexA,
            0xB => HexB,
            0xC => HexC,
            0xD => HexD,
            0xE => HexE,
            0xF => HexF,
            b'A' => LetterA,
            b'B' => LetterB,
            b'C' => LetterC,
            b'D' => LetterD,
            b'E' => LetterE,
            b'F' => LetterF,
            b'H' => LetterH,
            b'i' => LetterI,
            b'j' => LetterJ,
            b'L' => LetterL,
            b'n' => LetterN,
            b'O' => LetterO,
            b'P' => LetterP,
            b'q' => LetterQ,
            b'r' => LetterR,
            b'S' => LetterS,
            b't' => LetterT,
            b'U' => LetterU,
            b'y' => LetterY,
            b'-' => Dash,
            0xFD => On,
            0xFF => Off,
            _ => return None,
        };
        Some(code)
    }

    /// Gets the lit segments of the character, without decimal point.
    pub fn segments(self) -> u8 {
        use SevenSegmentCode::*;

        match self {
            Hex0 | LetterO => 0b0011_1111,
            Hex1 => 0b0000_0110,
            Hex2 => 0b0101_1011,
            Hex3 => 0b0100_1111,
            Hex4 => 0b0110_0110,
            Hex5 | LetterS => 0b0110_1101,
            Hex6 => 0b0111_1101,
            Hex7 => 0b0000_0111,
            Hex8 => 0b0111_1111,
            Hex9 => 0b0110_1111,
            HexA | LetterA => 0b0111_0111,
            HexB | LetterB => 0b0111_1100,
            HexC | LetterC => 0b0011_1001,
            HexD | LetterD => 0b0101_1110,
            HexE | LetterE => 0b0111_1001,
            HexF | LetterF => 0b0111_0001,
            LetterH => 0b0111_0110,
            LetterI => 0b0001_0000,
            LetterJ => 0b0000_1110,
            LetterL => 0b0011_1000,
            LetterN => 0b0101_0100,
            LetterP => 0b0111_0011,
            LetterQ => 0b0110_0111,
            LetterR => 0b0101_0000,
            LetterT => 0b0111_1000,
            LetterU => 0b0011_1110,
            LetterY => 0b0110_1110,
            Dash => 0b0100_0000,
            On => 0b0111_1111,
            Off => 0,
        }
    }
}

/// Converts a raw code to the levels to output on the segment bus, decimal point included.
///
/// Returns `None` for codes that have no [SevenSegmentCode].
pub fn encode(code: u8, point: bool, polarity: DisplayPolarity) -> Option<u8> {
    let segments = SevenSegmentCode::from_u8(code)?.segments();
    Some(polarity.apply(segments | if point { SEGMENT_DP } else { 0 }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_digits_use_the_standard_patterns() {
        const PATTERNS: [u8; 16] = [
            0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07,
            0x7F, 0x6F, 0x77, 0x7C, 0x39, 0x5E, 0x79, 0x71,
        ];

        for (digit, &pattern) in PATTERNS.iter().enumerate() {
            assert_eq!(encode(digit as u8, false, DisplayPolarity::CommonCathode), Some(pattern));
        }
    }

    #[test]
    fn common_anode_inverts_every_bit() {
        assert_eq!(encode(3, false, DisplayPolarity::CommonAnode), Some(!0x4F));
        assert_eq!(encode(7, true, DisplayPolarity::CommonAnode), Some(!(0x07 | SEGMENT_DP)));
        assert_eq!(encode(0xFF, false, DisplayPolarity::CommonAnode), Some(0xFF));
    }

    #[test]
    fn special_characters() {
        assert_eq!(encode(b'-', false, DisplayPolarity::CommonCathode), Some(0x40));
        assert_eq!(encode(0xFD, true, DisplayPolarity::CommonCathode), Some(0xFF));
        assert_eq!(encode(0xFF, true, DisplayPolarity::CommonCathode), Some(SEGMENT_DP));
        assert_eq!(encode(b'H', false, DisplayPolarity::CommonCathode), Some(0x76));
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(encode(0x10, false, DisplayPolarity::CommonAnode), None);
        assert_eq!(encode(b'h', false, DisplayPolarity::CommonAnode), None);
        assert_eq!(SevenSegmentCode::from_u8(b'Z'), None);
    }

    #[test]
    fn polarity_names() {
        assert_eq!("common-cathode".parse::<DisplayPolarity>(), Ok(DisplayPolarity::CommonCathode));
        assert_eq!(DisplayPolarity::CommonAnode.to_string(), "common-anode");
        assert!("anode".parse::<DisplayPolarity>().is_err());
    }
}
