use crate::sevseg::{DisplayPolarity, SevenSegmentCode, SEGMENT_DP};
use crate::{DeviceError, DeviceResult, GpioActiveLevel, LineGroup, Port};
use bitvec::prelude::*;
use critical_section::Mutex;
use log::{debug, trace, warn};
use std::cell::Cell;
use std::fmt::{Debug, Formatter};

pub const MIN_DIGITS: u8 = 2;
pub const MAX_DIGITS: u8 = 8;

/// The contents shown by the display: one segment pattern and decimal point per digit.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Frame {
    segments: [u8; MAX_DIGITS as usize],
    points: BitArr!(for MAX_DIGITS as usize, in u8, Lsb0),
}

impl Frame {
    const BLANK: Frame = Frame {
        segments: [0; MAX_DIGITS as usize],
        points: BitArray::ZERO,
    };
}

/// What the tick handler and [MuxDisplay::update] share. Only touched inside a critical section.
struct DisplayState {
    frame: Cell<Frame>,
    /// The digit the next [MuxDisplay::advance] shows.
    index: Cell<u8>,
}

#[derive(Copy, Clone, Debug)]
struct DisplayConfig {
    digits: u8,
    polarity: DisplayPolarity,
}

#[derive(Copy, Clone, Debug)]
struct DisplayPorts<'a> {
    data: LineGroup<'a>,
    control: &'a dyn Port,
    control_first: u8,
    active_level: GpioActiveLevel,
}

/// A multiplexed seven-segment display: every digit shares the segment bus and has its own select
/// line, and only one digit is lit at a time.
///
/// [Self::advance] must be called periodically, usually from a timer tick, to cycle through the
/// digits. [Self::update] replaces the shown contents and may be called concurrently with it.
pub struct MuxDisplay<'a> {
    config: Option<DisplayConfig>,
    ports: Option<DisplayPorts<'a>>,
    select: Option<LineGroup<'a>>,
    state: Mutex<DisplayState>,
}

impl<'a> MuxDisplay<'a> {
    pub const fn new() -> Self {
        MuxDisplay {
            config: None,
            ports: None,
            select: None,
            state: Mutex::new(DisplayState {
                frame: Cell::new(Frame::BLANK),
                index: Cell::new(0),
            }),
        }
    }

    /// Sets the number of digits and how their segments are wired. Clears the display.
    ///
    /// # Errors
    /// - [DeviceError::InvalidGeometry] if `digit_count` is not between [MIN_DIGITS] and
    ///   [MAX_DIGITS].
    /// - [DeviceError::PortsNotSet] if the ports are already set and the select lines don't fit
    ///   the control port. The display is left unconfigured.
    pub fn configure(&mut self, digit_count: u8, polarity: DisplayPolarity) -> DeviceResult<()> {
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digit_count) {
            warn!("Cannot drive {} digits", digit_count);
            return Err(DeviceError::InvalidGeometry);
        }

        self.config = Some(DisplayConfig {
            digits: digit_count,
            polarity,
        });
        self.state.get_mut().frame.set(Frame::BLANK);

        self.bind().inspect_err(|_| self.config = None)
    }

    /// Sets the segment bus and the digit select lines.
    ///
    /// The segment bus takes the whole `data` port, `a` on pin 0 up to the decimal point on pin 7.
    /// Digit `n` is selected by pin `control_first_pin + n` of `control`, which is active at
    /// `active_level`.
    ///
    /// # Errors
    /// - [DeviceError::PortsNotSet] if `control_first_pin` is not a pin, both ports are the same,
    ///   or the display is configured and its select lines don't fit the control port. The ports
    ///   are left unset.
    pub fn set_ports(
        &mut self,
        data: &'a dyn Port,
        control: &'a dyn Port,
        control_first_pin: u8,
        active_level: GpioActiveLevel,
    ) -> DeviceResult<()> {
        if control_first_pin > 7 || std::ptr::addr_eq(data, control) {
            warn!("Unusable display ports {:?} and {:?}[{}]", data, control, control_first_pin);
            return Err(DeviceError::PortsNotSet);
        }

        self.ports = Some(DisplayPorts {
            data: LineGroup::new(data, 0, 8)?,
            control,
            control_first: control_first_pin,
            active_level,
        });

        self.bind().inspect_err(|_| self.ports = None)
    }

    /// Takes over the pins once both the geometry and the ports are known.
    fn bind(&mut self) -> DeviceResult<()> {
        self.select = None;

        let (Some(config), Some(ports)) = (self.config, self.ports) else {
            return Ok(());
        };

        let select = LineGroup::new(ports.control, ports.control_first, config.digits)?;

        // Deselect and blank before turning the pins into outputs, so nothing flashes.
        select.write_all(ports.active_level.get_byte(0));
        select.set_direction(select.lines_mask());
        ports.data.write_all(config.polarity.apply(0));
        ports.data.set_direction(ports.data.lines_mask());

        self.state.get_mut().index.set(0);
        self.select = Some(select);

        debug!("{:?} bound", self);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.select.is_some()
    }

    pub fn digit_count(&self) -> Option<u8> {
        self.config.map(|config| config.digits)
    }

    pub fn polarity(&self) -> Option<DisplayPolarity> {
        self.config.map(|config| config.polarity)
    }

    /// Gets the digit the next [Self::advance] will show.
    pub fn current_digit(&self) -> u8 {
        critical_section::with(|cs| self.state.borrow(cs).index.get())
    }

    /// Gets the segment pattern and decimal point currently stored for a digit.
    pub fn digit(&self, index: u8) -> Option<(u8, bool)> {
        if index >= self.digit_count()? {
            return None;
        }

        let frame = critical_section::with(|cs| self.state.borrow(cs).frame.get());
        Some((frame.segments[index as usize], frame.points[index as usize]))
    }

    /// Replaces the shown characters. `values` holds one [SevenSegmentCode] per digit, `points`
    /// whether each decimal point is lit.
    ///
    /// The scan restarts from digit 0, so the next digit count calls to [Self::advance] show the
    /// new contents in order.
    ///
    /// # Errors
    /// - [DeviceError::NotConfigured] if [Self::configure] was never called.
    /// - [DeviceError::InvalidArgument] if a slice length doesn't match the number of digits or
    ///   a value is not a known code.
    pub fn update(&self, values: &[u8], points: &[bool]) -> DeviceResult<()> {
        self.store(values, Some(points), |value| {
            SevenSegmentCode::from_u8(value).map(SevenSegmentCode::segments)
        })
    }

    /// Same as [Self::update], with every decimal point off.
    pub fn update_values(&self, values: &[u8]) -> DeviceResult<()> {
        self.store(values, None, |value| {
            SevenSegmentCode::from_u8(value).map(SevenSegmentCode::segments)
        })
    }

    /// Replaces the shown contents with raw segment patterns.
    pub fn update_raw(&self, patterns: &[u8], points: &[bool]) -> DeviceResult<()> {
        self.store(patterns, Some(points), Some)
    }

    fn store(
        &self,
        values: &[u8],
        points: Option<&[bool]>,
        segments: impl Fn(u8) -> Option<u8>,
    ) -> DeviceResult<()> {
        let config = self.config.ok_or(DeviceError::NotConfigured)?;
        let digits = config.digits as usize;

        if values.len() != digits || points.is_some_and(|points| points.len() != digits) {
            warn!("Expected {} digits, got {} values", digits, values.len());
            return Err(DeviceError::InvalidArgument);
        }

        let mut frame = Frame::BLANK;
        for (i, &value) in values.iter().enumerate() {
            frame.segments[i] = segments(value).ok_or(DeviceError::InvalidArgument)?;
            frame.points.set(i, points.is_some_and(|points| points[i]));
        }

        critical_section::with(|cs| {
            let state = self.state.borrow(cs);
            state.frame.set(frame);
            state.index.set(0);
        });
        trace!("Display updated: {:02x?}", &frame.segments[..digits]);
        Ok(())
    }

    /// Shows the next digit. Does nothing until the display is configured and its ports are set.
    ///
    /// Meant to be called from the tick handler: it never blocks and never allocates.
    pub fn advance(&self) {
        let (Some(config), Some(ports), Some(select)) = (&self.config, &self.ports, &self.select)
        else {
            return;
        };

        let (digit, segments, point) = critical_section::with(|cs| {
            let state = self.state.borrow(cs);
            let digit = state.index.get();
            let frame = state.frame.get();
            state.index.set((digit + 1) % config.digits);
            (digit, frame.segments[digit as usize], frame.points[digit as usize])
        });

        // Break before make: no digit may be lit while the segment bus changes.
        select.write_all(ports.active_level.get_byte(0));

        let segments = if point { segments | SEGMENT_DP } else { segments };
        ports.data.write_all(config.polarity.apply(segments));

        select.write(digit, ports.active_level.get_state(true));
    }
}

impl Default for MuxDisplay<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for MuxDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MuxDisplay(")?;
        match self.config {
            Some(config) => write!(f, "{} digits, {}", config.digits, config.polarity)?,
            None => write!(f, "unconfigured")?,
        }
        match (&self.ports, &self.select) {
            (Some(ports), Some(select)) => write!(f, ", data {:?}, select {:?})", ports.data, select),
            (Some(ports), None) => write!(f, ", data {:?})", ports.data),
            _ => write!(f, ", no ports)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sevseg::encode;
    use crate::sim::SimPort;
    use std::sync::Mutex as StdMutex;
    use std::thread;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    enum Bus {
        Data,
        Select,
    }

    /// A port that records the latch after every write, shared by the data and select ports so the
    /// order of writes across both is kept.
    #[derive(Debug)]
    struct TracePort<'a> {
        bus: Bus,
        port: SimPort,
        log: &'a StdMutex<Vec<(Bus, u8)>>,
    }

    impl<'a> TracePort<'a> {
        fn new(bus: Bus, log: &'a StdMutex<Vec<(Bus, u8)>>) -> Self {
            TracePort { bus, port: SimPort::new(), log }
        }
    }

    impl Port for TracePort<'_> {
        fn set_direction(&self, mask: u8, output: bool) {
            self.port.set_direction(mask, output);
        }

        fn direction(&self) -> u8 {
            self.port.direction()
        }

        fn write_masked(&self, mask: u8, value: u8) {
            self.port.write_masked(mask, value);
            self.log.lock().unwrap().push((self.bus, self.port.latch()));
        }

        fn latch(&self) -> u8 {
            self.port.latch()
        }

        fn read(&self) -> u8 {
            self.port.read()
        }
    }

    /// Gets the digits whose select line is active, for select lines starting at pin 0.
    fn selected(latch: u8, digits: u8, active_level: GpioActiveLevel) -> Vec<u8> {
        (0..digits)
            .filter(|&digit| active_level.get_state(latch & (1 << digit) != 0))
            .collect()
    }

    #[test]
    fn rejects_digit_counts_out_of_range() {
        let mut display = MuxDisplay::new();
        assert_eq!(display.configure(1, DisplayPolarity::CommonAnode), Err(DeviceError::InvalidGeometry));
        assert_eq!(display.configure(9, DisplayPolarity::CommonAnode), Err(DeviceError::InvalidGeometry));
        assert_eq!(display.configure(8, DisplayPolarity::CommonAnode), Ok(()));
        assert_eq!(display.digit_count(), Some(8));
    }

    #[test]
    fn rejects_unusable_ports() {
        let data = SimPort::new();
        let control = SimPort::new();
        let mut display = MuxDisplay::new();

        assert_eq!(display.set_ports(&data, &data, 0, GpioActiveLevel::Low), Err(DeviceError::PortsNotSet));
        assert_eq!(display.set_ports(&data, &control, 8, GpioActiveLevel::Low), Err(DeviceError::PortsNotSet));

        display.configure(4, DisplayPolarity::CommonAnode).unwrap();
        assert_eq!(display.set_ports(&data, &control, 5, GpioActiveLevel::Low), Err(DeviceError::PortsNotSet));
        assert!(!display.is_ready());
        assert_eq!(display.set_ports(&data, &control, 4, GpioActiveLevel::Low), Ok(()));
        assert!(display.is_ready());
    }

    #[test]
    fn configure_after_ports_checks_the_fit() {
        let data = SimPort::new();
        let control = SimPort::new();
        let mut display = MuxDisplay::new();

        display.set_ports(&data, &control, 6, GpioActiveLevel::High).unwrap();
        assert!(!display.is_ready());
        assert_eq!(display.configure(3, DisplayPolarity::CommonCathode), Err(DeviceError::PortsNotSet));
        assert_eq!(display.digit_count(), None);
        assert_eq!(display.configure(2, DisplayPolarity::CommonCathode), Ok(()));
        assert!(display.is_ready());
    }

    #[test]
    fn binding_blanks_and_deselects() {
        let data = SimPort::new();
        let control = SimPort::new();
        let mut display = MuxDisplay::new();

        display.set_ports(&data, &control, 2, GpioActiveLevel::Low).unwrap();
        display.configure(3, DisplayPolarity::CommonAnode).unwrap();

        assert_eq!(data.direction(), 0xFF);
        assert_eq!(data.latch(), 0xFF);
        assert_eq!(control.direction(), 0b0001_1100);
        assert_eq!(control.latch(), 0b0001_1100);
    }

    #[test]
    fn advance_without_setup_does_nothing() {
        let data = SimPort::new();
        let control = SimPort::new();
        let mut display = MuxDisplay::new();
        display.advance();

        display.set_ports(&data, &control, 0, GpioActiveLevel::Low).unwrap();
        display.advance();
        assert_eq!(data.latch(), 0);
        assert_eq!(control.latch(), 0);
        assert_eq!(display.current_digit(), 0);
    }

    #[test]
    fn update_checks_its_arguments() {
        let mut display = MuxDisplay::new();
        assert_eq!(display.update(&[1, 2], &[false, false]), Err(DeviceError::NotConfigured));

        display.configure(2, DisplayPolarity::CommonAnode).unwrap();
        assert_eq!(display.update(&[1, 2, 3], &[false, false]), Err(DeviceError::InvalidArgument));
        assert_eq!(display.update(&[1, 2], &[false]), Err(DeviceError::InvalidArgument));
        assert_eq!(display.update(&[1, b'Z'], &[false, false]), Err(DeviceError::InvalidArgument));
        assert_eq!(display.update(&[1, 2], &[false, true]), Ok(()));
        assert_eq!(display.digit(1), Some((0x5B, true)));
        assert_eq!(display.digit(2), None);
    }

    #[test]
    fn raw_patterns_are_shown_as_given() {
        let data = SimPort::new();
        let control = SimPort::new();
        let mut display = MuxDisplay::new();
        display.configure(2, DisplayPolarity::CommonCathode).unwrap();
        display.set_ports(&data, &control, 3, GpioActiveLevel::High).unwrap();

        display.update_raw(&[0b0100_1001, 0], &[false, true]).unwrap();
        display.advance();
        assert_eq!(data.latch(), 0b0100_1001);
        assert_eq!(control.latch(), 0b0000_1000);
        display.advance();
        assert_eq!(data.latch(), SEGMENT_DP);
        assert_eq!(control.latch(), 0b0001_0000);
    }

    #[test]
    fn failed_update_keeps_the_previous_contents() {
        let mut display = MuxDisplay::new();
        display.configure(2, DisplayPolarity::CommonAnode).unwrap();
        display.update_values(&[8, 8]).unwrap();

        assert!(display.update_values(&[1, 0x77]).is_err());
        assert_eq!(display.digit(0), Some((0x7F, false)));
        assert_eq!(display.digit(1), Some((0x7F, false)));
    }

    #[test]
    fn two_digit_common_anode_shows_three_and_seven_point() {
        let data = SimPort::new();
        let control = SimPort::new();
        let mut display = MuxDisplay::new();
        display.set_ports(&data, &control, 0, GpioActiveLevel::Low).unwrap();
        display.configure(2, DisplayPolarity::CommonAnode).unwrap();

        display.update(&[3, 7], &[false, true]).unwrap();

        display.advance();
        assert_eq!(data.latch(), encode(3, false, DisplayPolarity::CommonAnode).unwrap());
        assert_eq!(selected(control.latch(), 2, GpioActiveLevel::Low), vec![0]);

        display.advance();
        assert_eq!(data.latch(), encode(7, true, DisplayPolarity::CommonAnode).unwrap());
        assert_eq!(selected(control.latch(), 2, GpioActiveLevel::Low), vec![1]);

        assert_eq!(display.current_digit(), 0);
    }

    #[test]
    fn update_restarts_the_cycle_at_the_first_digit() {
        let data = SimPort::new();
        let control = SimPort::new();
        let mut display = MuxDisplay::new();
        display.configure(3, DisplayPolarity::CommonCathode).unwrap();
        display.set_ports(&data, &control, 0, GpioActiveLevel::High).unwrap();

        display.update_values(&[1, 2, 3]).unwrap();
        display.advance();
        assert_eq!(display.current_digit(), 1);

        display.update_values(&[4, 5, 6]).unwrap();
        assert_eq!(display.current_digit(), 0);

        let mut shown = Vec::new();
        for _ in 0..3 {
            display.advance();
            shown.push((selected(control.latch(), 3, GpioActiveLevel::High), data.latch()));
        }
        assert_eq!(
            shown,
            vec![(vec![0], 0x66), (vec![1], 0x6D), (vec![2], 0x7D)]
        );
    }

    #[test]
    fn each_digit_is_shown_once_per_cycle_in_order() {
        for digits in MIN_DIGITS..=MAX_DIGITS {
            let log = StdMutex::new(Vec::new());
            let data = TracePort::new(Bus::Data, &log);
            let control = TracePort::new(Bus::Select, &log);
            let mut display = MuxDisplay::new();
            display.configure(digits, DisplayPolarity::CommonCathode).unwrap();
            display.set_ports(&data, &control, 0, GpioActiveLevel::High).unwrap();

            let values: Vec<u8> = (0..digits).map(|digit| 9 - digit).collect();
            let points: Vec<bool> = (0..digits).map(|digit| digit % 2 == 1).collect();
            display.update(&values, &points).unwrap();
            log.lock().unwrap().clear();

            for _ in 0..digits {
                display.advance();
            }

            let mut shown = Vec::new();
            let mut bus = 0;
            for &(port, latch) in log.lock().unwrap().iter() {
                match port {
                    Bus::Data => bus = latch,
                    Bus::Select => {
                        if let [digit] = selected(latch, digits, GpioActiveLevel::High)[..] {
                            shown.push((digit, bus));
                        }
                    }
                }
            }

            let expected: Vec<(u8, u8)> = (0..digits)
                .map(|digit| {
                    let i = digit as usize;
                    (digit, encode(values[i], points[i], DisplayPolarity::CommonCathode).unwrap())
                })
                .collect();
            assert_eq!(shown, expected, "{} digits", digits);
        }
    }

    #[test]
    fn segment_bus_only_changes_while_every_digit_is_off() {
        for active_level in [GpioActiveLevel::High, GpioActiveLevel::Low] {
            let log = StdMutex::new(Vec::new());
            let data = TracePort::new(Bus::Data, &log);
            let control = TracePort::new(Bus::Select, &log);
            let mut display = MuxDisplay::new();
            display.configure(4, DisplayPolarity::CommonAnode).unwrap();
            display.set_ports(&data, &control, 0, active_level).unwrap();
            display.update(&[1, 2, 3, 4], &[true, false, true, false]).unwrap();

            for _ in 0..13 {
                display.advance();
            }

            let mut select = control.latch();
            for &(port, latch) in log.lock().unwrap().iter() {
                match port {
                    Bus::Select => {
                        select = latch;
                        assert!(selected(select, 4, active_level).len() <= 1);
                    }
                    Bus::Data => assert!(selected(select, 4, active_level).is_empty()),
                }
            }
        }
    }

    #[test]
    fn update_and_advance_can_run_concurrently() {
        let data = SimPort::new();
        let control = SimPort::new();
        let mut display = MuxDisplay::new();
        display.configure(4, DisplayPolarity::CommonCathode).unwrap();
        display.set_ports(&data, &control, 0, GpioActiveLevel::High).unwrap();

        let display = &display;
        thread::scope(|scope| {
            let tick = scope.spawn(move || {
                for _ in 0..10_000 {
                    display.advance();
                    assert!(display.current_digit() < 4);
                }
            });

            for round in 0..1_000u32 {
                let value = (round % 10) as u8;
                display.update_values(&[value; 4]).unwrap();
            }

            tick.join().unwrap();
        });

        let last = encode(9, false, DisplayPolarity::CommonCathode).unwrap();
        for digit in 0..4 {
            assert_eq!(display.digit(digit), Some((last, false)));
        }
    }
}
