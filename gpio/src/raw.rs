use crate::{DeviceError, DeviceResult, Port};
use std::fmt::{Debug, Formatter};

/// Data-space addresses of the I/O port registers of the ATmega48/88/168/328 family.
pub mod atmega328p {
    pub const PINB: usize = 0x23;
    pub const DDRB: usize = 0x24;
    pub const PORTB: usize = 0x25;
    pub const PINC: usize = 0x26;
    pub const DDRC: usize = 0x27;
    pub const PORTC: usize = 0x28;
    pub const PIND: usize = 0x29;
    pub const DDRD: usize = 0x2A;
    pub const PORTD: usize = 0x2B;
}

/// A port accessed through its memory-mapped registers.
///
/// AVR places the three registers of a port next to each other: `PINx` at the base address,
/// followed by `DDRx` and `PORTx`.
pub struct RawPort {
    base: *mut u8,
}

// SAFETY: the registers are only touched through volatile accesses, and every read-modify-write
// runs inside a critical section.
unsafe impl Send for RawPort {}
unsafe impl Sync for RawPort {}

impl RawPort {
    const PIN: usize = 0;
    const DDR: usize = 1;
    const PORT: usize = 2;

    const SFR_OFFSET: usize = 0x20;

    /// Creates a port from the address of its `PINx` register.
    ///
    /// # Safety
    /// `base` must point to three consecutive, valid and writable port registers (`PINx`, `DDRx`,
    /// `PORTx`) that stay valid for the lifetime of the port.
    pub const unsafe fn new(base: *mut u8) -> Self {
        RawPort { base }
    }

    /// Creates a port from the address of any of its three registers.
    ///
    /// The address is normalized to the `PINx` register of the port it belongs to.
    ///
    /// # Errors
    /// - [DeviceError::PortsNotSet] if the address is not one of the port registers of the
    ///   ATmega48/88/168/328 family.
    ///
    /// # Safety
    /// Must only be called on the target device, where those addresses are mapped registers.
    pub unsafe fn from_register(address: usize) -> DeviceResult<Self> {
        if !(atmega328p::PINB..=atmega328p::PORTD).contains(&address) {
            return Err(DeviceError::PortsNotSet);
        }

        let base = 3 * ((address - Self::SFR_OFFSET) / 3) + Self::SFR_OFFSET;
        Ok(unsafe { Self::new(base as *mut u8) })
    }

    /// Gets the address of the `PINx` register.
    pub fn base_address(&self) -> usize {
        self.base as usize
    }

    fn raw_read(&self, register: usize) -> u8 {
        unsafe { self.base.add(register).read_volatile() }
    }

    fn raw_modify(&self, register: usize, mask: u8, value: u8) {
        critical_section::with(|_| {
            let register_ptr = unsafe { self.base.add(register) };
            let mut register_value = unsafe { register_ptr.read_volatile() };
            register_value &= !mask; // Clear the bits we own
            register_value |= value & mask;
            unsafe { register_ptr.write_volatile(register_value) };
        });
    }
}

impl Debug for RawPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawPort({:#04x})", self.base as usize)
    }
}

impl Port for RawPort {
    fn set_direction(&self, mask: u8, output: bool) {
        self.raw_modify(Self::DDR, mask, if output { 0xFF } else { 0 });
    }

    fn direction(&self) -> u8 {
        self.raw_read(Self::DDR)
    }

    fn write_masked(&self, mask: u8, value: u8) {
        self.raw_modify(Self::PORT, mask, value);
    }

    fn latch(&self) -> u8 {
        self.raw_read(Self::PORT)
    }

    fn read(&self) -> u8 {
        self.raw_read(Self::PIN)
    }
}
