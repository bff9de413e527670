//! Periodic tick sources, standing in for a timer interrupt.

mod thread;

use crate::{DeviceError, DeviceResult};
use std::fmt::Debug;
use std::time::Duration;
pub use thread::*;

/// The handler called on every tick. Allocated once, when it is registered.
pub type TickCallback = Box<dyn FnMut() + Send + 'static>;

/// The `TickSource` trait defines the interface for periodic tick generators.
pub trait TickSource: Debug {
    /// Binds the handler called on every tick, replacing any previous one.
    fn register(&mut self, callback: TickCallback) -> DeviceResult<()>;

    /// Gets the time between two ticks.
    fn period(&self) -> Duration;
}

/// The clock prescaler of an 8-bit AVR timer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Prescaler {
    Direct,
    Div8,
    Div64,
    Div256,
    #[default]
    Div1024,
}

impl Prescaler {
    pub fn divisor(&self) -> u32 {
        match self {
            Prescaler::Direct => 1,
            Prescaler::Div8 => 8,
            Prescaler::Div64 => 64,
            Prescaler::Div256 => 256,
            Prescaler::Div1024 => 1024,
        }
    }

    /// Converts a divisor to a [Prescaler].
    pub fn from_divisor(divisor: u32) -> DeviceResult<Self> {
        match divisor {
            1 => Ok(Prescaler::Direct),
            8 => Ok(Prescaler::Div8),
            64 => Ok(Prescaler::Div64),
            256 => Ok(Prescaler::Div256),
            1024 => Ok(Prescaler::Div1024),
            _ => Err(DeviceError::InvalidArgument),
        }
    }
}

/// The settings of a timer in clear-timer-on-compare mode, which fires every `compare + 1` counts
/// of the prescaled CPU clock.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CtcTiming {
    pub cpu_hz: u32,
    pub prescaler: Prescaler,
    pub compare: u8,
}

impl CtcTiming {
    pub fn frequency_hz(&self) -> f64 {
        self.cpu_hz as f64 / (self.prescaler.divisor() as f64 * (self.compare as f64 + 1.0))
    }

    pub fn period(&self) -> Duration {
        let counts = self.prescaler.divisor() as u64 * (self.compare as u64 + 1);
        Duration::from_nanos(counts * 1_000_000_000 / self.cpu_hz.max(1) as u64)
    }
}

impl Default for CtcTiming {
    /// A 16 MHz part refreshing at about 198 Hz.
    fn default() -> Self {
        CtcTiming {
            cpu_hz: 16_000_000,
            prescaler: Prescaler::Div1024,
            compare: 78,
        }
    }
}
