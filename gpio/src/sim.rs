//! Ports living in host memory, used to run the drivers without hardware.

use crate::Port;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU8, Ordering};

/// A port simulated with atomics.
///
/// Output pins read back their latch. Input pins read high when their pull-up is enabled, unless
/// something outside pulls them low (see [SimPort::set_external_low]). Floating inputs read low.
pub struct SimPort {
    ddr: AtomicU8,
    latch: AtomicU8,
    sink: AtomicU8,
}

impl SimPort {
    pub const fn new() -> Self {
        SimPort {
            ddr: AtomicU8::new(0),
            latch: AtomicU8::new(0),
            sink: AtomicU8::new(0),
        }
    }

    /// Pulls the pins selected by `mask` low from outside the chip, overriding pull-ups.
    pub fn set_external_low(&self, mask: u8) {
        self.sink.store(mask, Ordering::SeqCst);
    }

    fn levels(&self, sink: u8) -> u8 {
        let ddr = self.ddr.load(Ordering::SeqCst);
        let latch = self.latch.load(Ordering::SeqCst);
        (latch & ddr) | (latch & !ddr & !sink)
    }
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SimPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SimPort(ddr={:08b}, latch={:08b})",
            self.ddr.load(Ordering::Relaxed),
            self.latch.load(Ordering::Relaxed)
        )
    }
}

impl Port for SimPort {
    fn set_direction(&self, mask: u8, output: bool) {
        if output {
            self.ddr.fetch_or(mask, Ordering::SeqCst);
        } else {
            self.ddr.fetch_and(!mask, Ordering::SeqCst);
        }
    }

    fn direction(&self) -> u8 {
        self.ddr.load(Ordering::SeqCst)
    }

    fn write_masked(&self, mask: u8, value: u8) {
        // The closure never returns None, so the update cannot fail.
        let _ = self
            .latch
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |latch| {
                Some((latch & !mask) | (value & mask))
            });
    }

    fn latch(&self) -> u8 {
        self.latch.load(Ordering::SeqCst)
    }

    fn read(&self) -> u8 {
        self.levels(self.sink.load(Ordering::SeqCst))
    }
}

/// A simulated port whose inputs are wired to the columns of a key matrix.
///
/// The lines of the matrix live on another port. A pressed key connects its line to its column,
/// so while the line pin reads low the column pin reads low as well.
pub struct MatrixPort<'a> {
    port: SimPort,
    lines: &'a dyn Port,
    lines_first: u8,
    columns_first: u8,
    pressed: [AtomicU8; 8],
}

impl<'a> MatrixPort<'a> {
    /// Creates a port whose column pins start at `columns_first`, wired to the matrix lines starting
    /// at pin `lines_first` of `lines`.
    pub const fn new(lines: &'a dyn Port, lines_first: u8, columns_first: u8) -> Self {
        MatrixPort {
            port: SimPort::new(),
            lines,
            lines_first,
            columns_first,
            pressed: [const { AtomicU8::new(0) }; 8],
        }
    }

    /// Closes the switch at (`line`, `column`). Positions outside the port are ignored.
    pub fn press(&self, line: u8, column: u8) {
        if let Some(row) = self.pressed.get(line as usize) {
            if column < 8 {
                row.fetch_or(1 << column, Ordering::SeqCst);
            }
        }
    }

    /// Opens the switch at (`line`, `column`).
    pub fn release(&self, line: u8, column: u8) {
        if let Some(row) = self.pressed.get(line as usize) {
            if column < 8 {
                row.fetch_and(!(1 << column), Ordering::SeqCst);
            }
        }
    }

    pub fn release_all(&self) {
        for row in &self.pressed {
            row.store(0, Ordering::SeqCst);
        }
    }

    fn shorted_columns(&self) -> u8 {
        let line_levels = self.lines.read() >> self.lines_first;
        let mut columns = 0u8;

        for (line, row) in self.pressed.iter().enumerate() {
            if line + self.lines_first as usize >= 8 {
                break;
            }
            if line_levels & (1 << line) == 0 {
                columns |= row.load(Ordering::SeqCst);
            }
        }

        ((columns as u16) << self.columns_first) as u8
    }
}

impl Debug for MatrixPort<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatrixPort({:?})", self.port)
    }
}

impl Port for MatrixPort<'_> {
    fn set_direction(&self, mask: u8, output: bool) {
        self.port.set_direction(mask, output);
    }

    fn direction(&self) -> u8 {
        self.port.direction()
    }

    fn write_masked(&self, mask: u8, value: u8) {
        self.port.write_masked(mask, value);
    }

    fn latch(&self) -> u8 {
        self.port.latch()
    }

    fn read(&self) -> u8 {
        let sink = self.port.sink.load(Ordering::SeqCst) | self.shorted_columns();
        self.port.levels(sink)
    }
}
