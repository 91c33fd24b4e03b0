//! Logger configuration and its validation.
//!
//! The settings arrive already resolved from whatever reads the device's
//! settings file. They can also be persisted as `postcard` bytes.

use alloc::vec::Vec;
use core::num::NonZeroU16;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Maximum number of data fields the registry will accept
pub const MAX_FIELDS: usize = 16;

/// Maximum length of a field name in bytes
pub const MAX_NAME_LEN: usize = 16;

/// Maximum length of a field's units label in bytes
pub const MAX_UNITS_LEN: usize = 8;

/// Errors detected while validating or loading a [`LoggerConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An interval or period was configured as zero
    #[error("{setting} must be greater than zero")]
    ZeroInterval {
        /// Name of the offending setting
        setting: &'static str,
    },

    /// More fields requested than the registry can hold
    #[error("Too many fields: {requested} (max: {max})")]
    TooManyFields { requested: usize, max: usize },

    /// The configured field count disagrees with the fields supplied at setup
    #[error("Field count mismatch: configured {configured}, provided {provided}")]
    FieldCountMismatch { configured: usize, provided: usize },

    /// An averaging window shorter than a single sample period
    #[error("{setting} is shorter than the sample period")]
    WindowTooShort { setting: &'static str },

    /// An averaging window holding more samples than an averager can
    #[error("{setting} spans {samples} samples (max: 65535)")]
    WindowTooLong { setting: &'static str, samples: u32 },

    /// A field name or units label longer than its fixed capacity
    #[error("Label too long: {len} bytes (max: {max})")]
    LabelTooLong { len: usize, max: usize },

    /// A field name or units label that would split its header column
    #[error("Label contains the column delimiter")]
    LabelContainsDelimiter,

    /// Persisted configuration could not be decoded
    #[error("Failed to decode configuration: {0}")]
    Decode(postcard::Error),
}

/// Settings that shape the averaging windows
///
/// All durations are in milliseconds. Window capacities are derived from
/// `interval / sample_period_ms`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Period between samples pushed for each field
    pub sample_period_ms: u32,
    /// Length of the local storage averaging window
    pub storage_interval_ms: u32,
    /// Length of the upload averaging window
    pub upload_interval_ms: u32,
    /// Elapsed time added by each call to `tick()`
    pub tick_period_ms: u32,
    /// Number of fields the registry is set up with
    pub field_count: u8,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: 1000,
            storage_interval_ms: 60_000,
            upload_interval_ms: 300_000,
            tick_period_ms: 1000,
            field_count: 1,
        }
    }
}

impl LoggerConfig {
    /// Check every setting, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        nonzero(self.sample_period_ms, "sample period")?;
        nonzero(self.tick_period_ms, "tick period")?;

        let fields = usize::from(self.field_count);
        if fields > MAX_FIELDS {
            return Err(ConfigError::TooManyFields {
                requested: fields,
                max: MAX_FIELDS,
            });
        }

        self.storage_capacity()?;
        self.upload_capacity()?;
        Ok(())
    }

    /// Capacity and interval of every field's storage window
    pub fn storage_window(&self) -> Result<WindowConfig, ConfigError> {
        Ok(WindowConfig {
            capacity: self.storage_capacity()?,
            interval_ms: self.storage_interval_ms,
        })
    }

    /// Capacity and interval of every field's upload window
    pub fn upload_window(&self) -> Result<WindowConfig, ConfigError> {
        Ok(WindowConfig {
            capacity: self.upload_capacity()?,
            interval_ms: self.upload_interval_ms,
        })
    }

    /// Number of samples held by each field's storage averager
    pub fn storage_capacity(&self) -> Result<NonZeroU16, ConfigError> {
        self.window_capacity(self.storage_interval_ms, "storage interval")
    }

    /// Number of samples held by each field's upload averager
    pub fn upload_capacity(&self) -> Result<NonZeroU16, ConfigError> {
        self.window_capacity(self.upload_interval_ms, "upload interval")
    }

    fn window_capacity(
        &self,
        interval_ms: u32,
        setting: &'static str,
    ) -> Result<NonZeroU16, ConfigError> {
        nonzero(interval_ms, setting)?;
        nonzero(self.sample_period_ms, "sample period")?;

        let samples = interval_ms / self.sample_period_ms;
        let samples = u16::try_from(samples)
            .map_err(|_| ConfigError::WindowTooLong { setting, samples })?;
        NonZeroU16::new(samples).ok_or(ConfigError::WindowTooShort { setting })
    }

    /// True when `tick()` runs less often than the shortest window expires,
    /// which lets window boundaries drift.
    pub fn tick_is_coarse(&self) -> bool {
        self.tick_period_ms > self.storage_interval_ms.min(self.upload_interval_ms)
    }

    /// Decode a configuration previously written with [`LoggerConfig::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(ConfigError::Decode)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }
}

fn nonzero(value: u32, setting: &'static str) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::ZeroInterval { setting })
    } else {
        Ok(())
    }
}

/// Shape of one averaging window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Samples held by the window's averager
    pub capacity: NonZeroU16,
    /// Time between expiries
    pub interval_ms: u32,
}

/// Name and display label of one data field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec<'a> {
    pub name: &'a str,
    /// Units shown next to the name in the header, may be empty
    pub units: &'a str,
}

impl<'a> FieldSpec<'a> {
    pub const fn new(name: &'a str, units: &'a str) -> Self {
        Self { name, units }
    }
}
