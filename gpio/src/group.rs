//! Contiguous blocks of pins on one port.

use crate::{DeviceError, DeviceResult, GpioBias, Port};
use std::fmt::{Debug, Formatter};

/// A contiguous group of pins on one [Port], addressed by offsets relative to its first pin.
///
/// Group-relative masks and values use bit 0 for the first pin of the group.
#[derive(Copy, Clone)]
pub struct LineGroup<'a> {
    port: &'a dyn Port,
    first: u8,
    width: u8,
}

impl<'a> LineGroup<'a> {
    /// Creates a group of `width` pins starting at `first_pin`.
    ///
    /// # Errors
    /// - [DeviceError::PortsNotSet] if the group is empty or does not fit in the 8 pins of the port.
    pub fn new(port: &'a dyn Port, first_pin: u8, width: u8) -> DeviceResult<Self> {
        if width == 0 || first_pin as u16 + width as u16 > 8 {
            return Err(DeviceError::PortsNotSet);
        }

        Ok(LineGroup {
            port,
            first: first_pin,
            width,
        })
    }

    pub fn port(&self) -> &'a dyn Port {
        self.port
    }

    pub fn first_pin(&self) -> u8 {
        self.first
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// Gets the group-relative mask with one bit set per line.
    pub fn lines_mask(&self) -> u8 {
        ((1u16 << self.width) - 1) as u8
    }

    /// Gets the port-level mask of the pins owned by this group.
    pub fn mask(&self) -> u8 {
        self.lines_mask() << self.first
    }

    /// Checks whether both groups share at least one pin of the same port.
    pub fn overlaps(&self, other: &LineGroup<'_>) -> bool {
        std::ptr::addr_eq(self.port, other.port) && self.mask() & other.mask() != 0
    }

    fn to_port(&self, value: u8) -> u8 {
        (value & self.lines_mask()) << self.first
    }

    /// Sets the direction of every line of the group: set bits become outputs, cleared bits inputs.
    pub fn set_direction(&self, mask: u8) {
        let outputs = self.to_port(mask);
        self.port.set_direction(outputs, true);
        self.port.set_direction(self.mask() & !outputs, false);
    }

    /// Sets the bias of the input lines selected by `mask`.
    pub fn set_bias(&self, mask: u8, bias: GpioBias) {
        let mask = self.to_port(mask);
        let value = match bias {
            GpioBias::None => 0,
            GpioBias::PullUp => 0xFF,
        };
        self.port.write_masked(mask, value);
    }

    /// Sets the level of a single line. Offsets outside the group are ignored.
    #[inline]
    pub fn write(&self, offset: u8, level: bool) {
        if offset >= self.width {
            return;
        }

        let bit = 1 << (self.first + offset);
        self.port.write_masked(bit, if level { bit } else { 0 });
    }

    /// Reads the level of a single line. Offsets outside the group read low.
    #[inline]
    pub fn read(&self, offset: u8) -> bool {
        if offset >= self.width {
            return false;
        }

        self.port.read() & (1 << (self.first + offset)) != 0
    }

    /// Sets the levels of all lines at once, LSb first.
    #[inline]
    pub fn write_all(&self, value: u8) {
        self.port.write_masked(self.mask(), self.to_port(value));
    }

    /// Reads the levels of all lines at once, LSb first.
    #[inline]
    pub fn read_all(&self) -> u8 {
        (self.port.read() >> self.first) & self.lines_mask()
    }
}

impl Debug for LineGroup<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}..{}]", self.port, self.first, self.first + self.width)
    }
}
