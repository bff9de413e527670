use std::env::var_os;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use segpad_gpio::GpioActiveLevel;
use segpad_gpio::keypad::{KeyMap, KeypadGeometry};
use segpad_gpio::sevseg::DisplayPolarity;
use segpad_gpio::tick::{CtcTiming, Prescaler};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Keypad layout, `"4x4"`, `"4x3"` or `"5x3"`.
    pub geometry: String,
    /// Key codes, row-major.
    pub key_map: Vec<u8>,
    /// Scans in a row a key must be seen for before it is reported.
    pub debounce: u8,
    pub settle_micros: u64,
    pub poll_millis: u64,

    pub digits: u8,
    /// `"common-anode"` or `"common-cathode"`.
    pub polarity: String,
    pub select_active_low: bool,

    pub cpu_hz: u32,
    pub prescaler: u32,
    pub compare: u8,

    /// How long a key typed on stdin stays pressed.
    pub hold_millis: u64,
}

impl Config {
    fn path() -> PathBuf {
        var_os("SEGPAD_CONFIG")
            .unwrap_or_else(|| OsString::from("segpad.json"))
            .into()
    }

    pub fn try_load() -> Option<Self> {
        let config_path = Self::path();
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader).ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let file = std::fs::File::create(Self::path())?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn geometry(&self) -> eyre::Result<KeypadGeometry> {
        Ok(self.geometry.parse()?)
    }

    pub fn key_map(&self) -> eyre::Result<KeyMap> {
        Ok(KeyMap::new(self.geometry()?, &self.key_map)?)
    }

    pub fn polarity(&self) -> eyre::Result<DisplayPolarity> {
        Ok(self.polarity.parse()?)
    }

    pub fn select_active_level(&self) -> GpioActiveLevel {
        if self.select_active_low {
            GpioActiveLevel::Low
        } else {
            GpioActiveLevel::High
        }
    }

    pub fn timing(&self) -> eyre::Result<CtcTiming> {
        Ok(CtcTiming {
            cpu_hz: self.cpu_hz,
            prescaler: Prescaler::from_divisor(self.prescaler)?,
            compare: self.compare,
        })
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_micros(self.settle_micros)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_millis)
    }

    pub fn hold_time(&self) -> Duration {
        Duration::from_millis(self.hold_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        let timing = CtcTiming::default();

        Config {
            geometry: KeypadGeometry::Keypad4x4.to_string(),
            key_map: KeyMap::default_for(KeypadGeometry::Keypad4x4).codes().to_vec(),
            debounce: 10,
            settle_micros: 1,
            poll_millis: 10,
            digits: 2,
            polarity: DisplayPolarity::CommonAnode.to_string(),
            select_active_low: true,
            cpu_hz: timing.cpu_hz,
            prescaler: timing.prescaler.divisor(),
            compare: timing.compare,
            hold_millis: 250,
        }
    }
}
