//! Textual bring-up configuration.
//!
//! Two layers: [`DeviceConfig`] parses one `key=value key=value` device string,
//! [`BringUpConfig`] parses the line-oriented `KEY: value` machine description.

use std::collections::BTreeMap;
use std::str::FromStr;

use tracing::warn;

use crate::api::{CoreConfig, MmioRange, ResetBehavior, UntakenBranch};
use crate::fault::ConfigurationError;
use crate::state::AccumulatorWidth;

/// RAM size used when the `RAM` line carries no `size=` key.
pub const DEFAULT_RAM_SIZE: u32 = 4096;

/// Parses a decimal or `0x`-prefixed hexadecimal 32-bit value.
///
/// Negative decimals down to `i32::MIN` wrap to their two's-complement
/// address, so `-65536` names `0xFFFF0000`.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidValue`] naming `key` when `text` is not a number.
#[allow(clippy::cast_sign_loss)]
pub fn parse_number(key: &str, text: &str) -> Result<u32, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidValue {
        key: key.to_owned(),
        value: text.to_owned(),
    };
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u32::from_str_radix(&hex.replace('_', ""), 16).map_err(|_| invalid());
    }
    let digits = text.replace('_', "");
    if digits.starts_with('-') {
        return digits
            .parse::<i32>()
            .map(|value| value as u32)
            .map_err(|_| invalid());
    }
    digits.parse::<u32>().map_err(|_| invalid())
}

/// Parses `true`/`false`/`1`/`0`, case-insensitively.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidValue`] for anything else.
pub fn parse_flag(key: &str, text: &str) -> Result<bool, ConfigurationError> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigurationError::InvalidValue {
            key: key.to_owned(),
            value: text.to_owned(),
        }),
    }
}

/// One parsed device configuration string.
///
/// `name`, `address` and `range` are mandatory; every other key is kept for
/// the device to interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DeviceConfig {
    name: String,
    address: u32,
    range: u32,
    keys: BTreeMap<String, String>,
    source: String,
}

impl DeviceConfig {
    /// Parses whitespace-separated `key=value` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when a token is not a `key=value` pair,
    /// a mandatory key is absent, or `address`/`range` is not a number.
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        let mut keys = BTreeMap::new();
        for token in text.split_whitespace() {
            let (key, value) =
                token
                    .split_once('=')
                    .ok_or_else(|| ConfigurationError::InvalidValue {
                        key: token.to_owned(),
                        value: String::new(),
                    })?;
            keys.insert(key.to_owned(), value.to_owned());
        }

        let source = text.trim().to_owned();
        let missing = |key: &'static str| ConfigurationError::MissingKey {
            key,
            config: source.clone(),
        };
        let name = keys.remove("name").ok_or_else(|| missing("name"))?;
        let address = keys.remove("address").ok_or_else(|| missing("address"))?;
        let range = keys.remove("range").ok_or_else(|| missing("range"))?;

        Ok(Self {
            name,
            address: parse_number("address", &address)?,
            range: parse_number("range", &range)?,
            keys,
            source,
        })
    }

    /// Device name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Claimed bus range.
    #[must_use]
    pub const fn range(&self) -> MmioRange {
        MmioRange::new(self.address, self.range)
    }

    /// The configuration text this was parsed from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Raw value of a device-specific key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    /// Raw value of a key the device cannot do without.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingKey`] when the key is absent.
    pub fn required(&self, key: &'static str) -> Result<&str, ConfigurationError> {
        self.get(key).ok_or_else(|| ConfigurationError::MissingKey {
            key,
            config: self.source.clone(),
        })
    }

    /// Numeric value of an optional key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidValue`] when present but not a number.
    pub fn number(&self, key: &str) -> Result<Option<u32>, ConfigurationError> {
        self.get(key)
            .map(|value| parse_number(key, value))
            .transpose()
    }

    /// Numeric value of a mandatory key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when the key is absent or not a number.
    pub fn required_number(&self, key: &'static str) -> Result<u32, ConfigurationError> {
        parse_number(key, self.required(key)?)
    }

    /// Boolean value of an optional key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidValue`] when present but not a flag.
    pub fn flag(&self, key: &str) -> Result<Option<bool>, ConfigurationError> {
        self.get(key).map(|value| parse_flag(key, value)).transpose()
    }
}

impl FromStr for DeviceConfig {
    type Err = ConfigurationError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

/// Optional, repeatable peripheral kinds named in a bring-up description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PeripheralKind {
    /// Interval timer raising interrupts.
    Timer,
    /// Line-oriented output sink.
    FileWriter,
    /// Byte stream source.
    FileReader,
}

impl PeripheralKind {
    /// Bring-up key naming this kind.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Timer => "TIMER",
            Self::FileWriter => "FILE_WRITER",
            Self::FileReader => "FILE_READER",
        }
    }
}

/// A peripheral declaration in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PeripheralConfig {
    /// Which device to instantiate.
    pub kind: PeripheralKind,
    /// Its configuration string.
    pub config: DeviceConfig,
}

/// Parsed machine description.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BringUpConfig {
    /// RAM byte-store size.
    pub ram_size: u32,
    /// Cycle counter device.
    pub clock: DeviceConfig,
    /// Program counter window.
    pub program_counter: DeviceConfig,
    /// CPU register window.
    pub cpu: DeviceConfig,
    /// Engine behaviour knobs.
    pub core: CoreConfig,
    /// Optional peripherals in file order.
    pub peripherals: Vec<PeripheralConfig>,
}

impl BringUpConfig {
    /// Parses `KEY: value` lines. Lines starting with `#` and lines without
    /// `": "` are skipped; unknown keys are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when a required component is missing,
    /// declared twice, or any value fails to parse.
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        let mut ram_size = None;
        let mut clock = None;
        let mut program_counter = None;
        let mut cpu = None;
        let mut core = None;
        let mut peripherals = Vec::new();

        for line in text.lines() {
            if line.trim_start().starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(": ") else {
                continue;
            };
            let key = key.trim();
            match key {
                "RAM" => set_once(&mut ram_size, key, parse_ram_size(value)?)?,
                "CLOCK" => set_once(&mut clock, key, DeviceConfig::parse(value)?)?,
                "PC" => set_once(&mut program_counter, key, DeviceConfig::parse(value)?)?,
                "CPU" => set_once(&mut cpu, key, DeviceConfig::parse(value)?)?,
                "CORE" => set_once(&mut core, key, parse_core(value)?)?,
                "TIMER" | "FILE_WRITER" | "FILE_READER" => {
                    let kind = match key {
                        "TIMER" => PeripheralKind::Timer,
                        "FILE_WRITER" => PeripheralKind::FileWriter,
                        _ => PeripheralKind::FileReader,
                    };
                    peripherals.push(PeripheralConfig {
                        kind,
                        config: DeviceConfig::parse(value)?,
                    });
                }
                other => warn!(key = other, "ignoring unknown bring-up key"),
            }
        }

        Ok(Self {
            ram_size: ram_size.ok_or(ConfigurationError::MissingComponent("RAM"))?,
            clock: clock.ok_or(ConfigurationError::MissingComponent("CLOCK"))?,
            program_counter: program_counter
                .ok_or(ConfigurationError::MissingComponent("PC"))?,
            cpu: cpu.ok_or(ConfigurationError::MissingComponent("CPU"))?,
            core: core.unwrap_or_default(),
            peripherals,
        })
    }
}

impl FromStr for BringUpConfig {
    type Err = ConfigurationError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

fn set_once<T>(slot: &mut Option<T>, key: &str, value: T) -> Result<(), ConfigurationError> {
    if slot.is_some() {
        return Err(ConfigurationError::DuplicateComponent(key.to_owned()));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_ram_size(value: &str) -> Result<u32, ConfigurationError> {
    value
        .split_whitespace()
        .find_map(|token| token.strip_prefix("size="))
        .map_or(Ok(DEFAULT_RAM_SIZE), |size| parse_number("size", size))
}

fn parse_core(value: &str) -> Result<CoreConfig, ConfigurationError> {
    let mut core = CoreConfig::default();
    for token in value.split_whitespace() {
        let invalid = || ConfigurationError::InvalidValue {
            key: token.to_owned(),
            value: value.trim().to_owned(),
        };
        let (key, setting) = token.split_once('=').ok_or_else(invalid)?;
        match (key, setting) {
            ("width", "32") => core.accumulator_width = AccumulatorWidth::Truncated32,
            ("width", "64") => core.accumulator_width = AccumulatorWidth::Wide64,
            ("reset", "full") => core.reset_behavior = ResetBehavior::FullReset,
            ("reset", "halt") => core.reset_behavior = ResetBehavior::HaltOnly,
            ("untaken", "skip") => core.untaken_branch = UntakenBranch::SkipImmediate,
            ("untaken", "byte") => core.untaken_branch = UntakenBranch::FallThroughByte,
            _ => return Err(invalid()),
        }
    }
    Ok(core)
}
