use crate::debounce::CountedDebounce;
use crate::keypad::{KeyMap, Keypad, KeypadGeometry, NO_KEY};
use crate::{DeviceError, DeviceResult, GpioActiveLevel, GpioBias, LineGroup};
use bitvec::prelude::*;
use log::{debug, trace, warn};
use std::fmt::{Debug, Formatter};
use std::num::NonZeroU8;
use std::thread::sleep;
use std::time::Duration;

/// The debounce threshold used until the keypad is configured.
pub const DEFAULT_DEBOUNCE_THRESHOLD: NonZeroU8 = NonZeroU8::MIN;

/// Snapshot of the scanner state after the last [Keypad::poll].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScanState {
    /// The line driven last.
    pub line: u8,
    /// The code seen by the last scan, [NO_KEY] if nothing was pressed.
    pub candidate: u8,
    /// How many scans in a row have seen `candidate`, saturated at the debounce threshold.
    pub matches: u8,
}

struct KeypadPorts<'a> {
    lines: LineGroup<'a>,
    columns: LineGroup<'a>,
    key_map: KeyMap,
}

/// A matrix keypad scanned through two groups of GPIO lines.
///
/// Lines are driven outputs, active low and idle high. Columns are inputs with pull-ups, so a
/// pressed key pulls its column low while its line is asserted.
pub struct GpioKeypad<'a> {
    ports: Option<KeypadPorts<'a>>,
    debounce: CountedDebounce<u8>,
    line: u8,
    settle_time: Duration,
}

impl<'a> GpioKeypad<'a> {
    const LINE_ACTIVE: GpioActiveLevel = GpioActiveLevel::Low;
    const COLUMN_ACTIVE: GpioActiveLevel = GpioActiveLevel::Low;

    /// Creates an unconfigured keypad. [Keypad::poll] fails until [Self::configure] succeeds.
    pub fn new() -> Self {
        GpioKeypad {
            ports: None,
            debounce: CountedDebounce::new(DEFAULT_DEBOUNCE_THRESHOLD),
            line: 0,
            settle_time: Duration::from_micros(1),
        }
    }

    /// Sets how long each line is held asserted before the columns are read.
    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;
        self
    }

    /// Configures the matrix and takes over its lines.
    ///
    /// `key_map` lists the code of every key, row-major. A key is reported once it has been seen
    /// by `debounce_threshold` scans in a row.
    ///
    /// # Errors
    /// - [DeviceError::InvalidGeometry] if `key_map` doesn't have one code per key.
    /// - [DeviceError::PortsNotSet] if the groups don't match the geometry or overlap.
    /// - [DeviceError::InvalidArgument] if `debounce_threshold` is zero or a code is [NO_KEY].
    pub fn configure(
        &mut self,
        geometry: KeypadGeometry,
        lines: LineGroup<'a>,
        columns: LineGroup<'a>,
        key_map: &[u8],
        debounce_threshold: u8,
    ) -> DeviceResult<()> {
        let key_map = KeyMap::new(geometry, key_map)?;

        if lines.width() != geometry.lines() || columns.width() != geometry.columns() {
            warn!(
                "Keypad {} needs {} lines and {} columns, got {:?} and {:?}",
                geometry, geometry.lines(), geometry.columns(), lines, columns
            );
            return Err(DeviceError::PortsNotSet);
        }
        if lines.overlaps(&columns) {
            warn!("Keypad lines {:?} overlap columns {:?}", lines, columns);
            return Err(DeviceError::PortsNotSet);
        }

        let threshold = NonZeroU8::new(debounce_threshold).ok_or(DeviceError::InvalidArgument)?;

        lines.write_all(Self::LINE_ACTIVE.get_byte(0));
        lines.set_direction(lines.lines_mask());
        columns.set_direction(0);
        columns.set_bias(columns.lines_mask(), GpioBias::PullUp);

        self.ports = Some(KeypadPorts {
            lines,
            columns,
            key_map,
        });
        self.debounce = CountedDebounce::new(threshold);
        self.line = 0;

        debug!("{:?} configured with debounce threshold {}", self, threshold);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.ports.is_some()
    }

    pub fn geometry(&self) -> Option<KeypadGeometry> {
        self.ports.as_ref().map(|ports| ports.key_map.geometry())
    }

    pub fn key_map(&self) -> Option<&KeyMap> {
        self.ports.as_ref().map(|ports| &ports.key_map)
    }

    pub fn scan_state(&self) -> ScanState {
        ScanState {
            line: self.line,
            candidate: self.debounce.candidate().unwrap_or(NO_KEY),
            matches: self.debounce.count(),
        }
    }

    /// Drives every line in turn and returns the row-major index of the first closed switch.
    fn scan(&mut self) -> Option<usize> {
        let ports = self.ports.as_ref()?;
        let geometry = ports.key_map.geometry();
        let columns = geometry.columns() as usize;

        for line in 0..geometry.lines() {
            self.line = line;

            ports.lines.write(line, Self::LINE_ACTIVE.get_state(true));
            if !self.settle_time.is_zero() {
                sleep(self.settle_time);
            }
            let levels = Self::COLUMN_ACTIVE.get_byte(ports.columns.read_all());
            ports.lines.write(line, Self::LINE_ACTIVE.get_state(false));

            if let Some(column) = levels.view_bits::<Lsb0>()[..columns].first_one() {
                trace!("Switch closed at ({}, {})", line, column);
                return Some(line as usize * columns + column);
            }
        }

        None
    }
}

impl Default for GpioKeypad<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for GpioKeypad<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.ports {
            Some(ports) => write!(
                f,
                "GpioKeypad({}, lines {:?}, columns {:?})",
                ports.key_map.geometry(), ports.lines, ports.columns
            ),
            None => write!(f, "GpioKeypad(unconfigured)"),
        }
    }
}

impl Keypad for GpioKeypad<'_> {
    fn poll(&mut self) -> DeviceResult<u8> {
        if self.ports.is_none() {
            return Err(DeviceError::NotConfigured);
        }

        let candidate = self
            .scan()
            .and_then(|index| self.ports.as_ref()?.key_map.code(index))
            .unwrap_or(NO_KEY);

        match self.debounce.update(candidate) {
            Some(code) if code != NO_KEY => {
                debug!("Key {:#04x} pressed", code);
                Ok(code)
            }
            _ => Ok(NO_KEY),
        }
    }
}
