pub mod debounce;
pub mod group;
pub mod keypad;
pub mod raw;
pub mod sevseg;
pub mod sim;
pub mod tick;

use std::fmt::Debug;
use thiserror::Error;

pub use group::LineGroup;

#[derive(Debug, Error, Eq, PartialEq, Clone, Copy)]
pub enum DeviceError {
    #[error("device used before being configured")]
    NotConfigured,
    #[error("invalid device geometry")]
    InvalidGeometry,
    #[error("ports not set or unusable")]
    PortsNotSet,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        DeviceError::Io(err.kind())
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Specifies the active level of a GPIO line.
///
/// By default, the active level is high.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default] High,
    Low,
}

impl GpioActiveLevel {
    /// Gets the real state that will be outputted on the GPIO pin based on the active level and the value.
    pub fn get_state(&self, value: bool) -> bool {
        match self {
            GpioActiveLevel::High => value,
            GpioActiveLevel::Low => !value,
        }
    }

    /// Gets the byte to output on a group of lines so that the lines set in `values` are active.
    pub fn get_byte(&self, values: u8) -> u8 {
        match self {
            GpioActiveLevel::High => values,
            GpioActiveLevel::Low => !values,
        }
    }
}

/// Specifies the bias of an input pin.
///
/// AVR ports only have pull-up resistors, enabled by writing a one to the output latch of a pin
/// configured as input.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
}

/// An 8-bit I/O port, laid out the way AVR exposes it: a data direction register, an output latch
/// and an input register.
///
/// Every method takes `&self` and every masked update must be indivisible, since the same port
/// may carry lines of the main loop and of the tick handler.
pub trait Port: Debug + Sync {
    /// Configures the pins in `mask` as outputs (`true`) or inputs (`false`).
    fn set_direction(&self, mask: u8, output: bool);

    /// Reads the data direction register. A set bit is an output.
    fn direction(&self) -> u8;

    /// Replaces the output latch bits selected by `mask` with the ones in `value`.
    ///
    /// For pins configured as inputs this toggles the pull-up resistor.
    fn write_masked(&self, mask: u8, value: u8);

    /// Reads the output latch.
    fn latch(&self) -> u8;

    /// Reads the current pin levels.
    fn read(&self) -> u8;
}
