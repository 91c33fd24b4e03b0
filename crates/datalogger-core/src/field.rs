//! A single logged channel with independent storage and upload windows.

use core::fmt;

use heapless::String;
use log::debug;

use crate::averager::{Averager, Sample};
use crate::config::{ConfigError, FieldSpec, MAX_NAME_LEN, MAX_UNITS_LEN, WindowConfig};
use crate::format::DELIMITER;

/// Averages captured when a window expires
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowAverage<T> {
    /// Rounded average in the sample domain
    pub average: T,
    /// Unrounded average
    pub float_average: f32,
    /// Number of samples the average was taken over
    pub samples: u16,
}

/// One averaging window: an averager plus the time it last expired
#[derive(Debug, Clone)]
struct Window<T: Sample> {
    averager: Averager<T>,
    interval_ms: u32,
    last_expiry_ms: u32,
}

impl<T: Sample> Window<T> {
    fn new(config: WindowConfig) -> Self {
        Self {
            averager: Averager::new(config.capacity),
            interval_ms: config.interval_ms,
            last_expiry_ms: 0,
        }
    }

    /// Emit and clear the window if `interval_ms` has passed since it last expired.
    fn tick(&mut self, now_ms: u32) -> Option<WindowAverage<T>> {
        // Wrapping keeps expiry correct across the u32 millisecond rollover
        if now_ms.wrapping_sub(self.last_expiry_ms) < self.interval_ms {
            return None;
        }

        let result = WindowAverage {
            average: self.averager.average(),
            float_average: self.averager.float_average(),
            samples: self.averager.n(),
        };
        self.averager.reset(None);
        self.last_expiry_ms = now_ms;
        Some(result)
    }
}

/// A logical data channel averaged over two independent windows.
///
/// Every sample goes to both windows. Each window expires on its own interval
/// and is reset only when it expires, so the storage cadence never disturbs
/// the upload average and vice versa.
#[derive(Debug, Clone)]
pub struct NumericDataField<T: Sample> {
    index: usize,
    name: String<MAX_NAME_LEN>,
    units: String<MAX_UNITS_LEN>,
    storage: Window<T>,
    upload: Window<T>,
}

impl<T: Sample> NumericDataField<T> {
    pub fn new(
        index: usize,
        spec: &FieldSpec<'_>,
        storage: WindowConfig,
        upload: WindowConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            index,
            name: label(spec.name)?,
            units: label(spec.units)?,
            storage: Window::new(storage),
            upload: Window::new(upload),
        })
    }

    /// Feed a sample to both windows.
    pub fn new_sample(&mut self, value: T) {
        self.storage.averager.new_data(value);
        self.upload.averager.new_data(value);
    }

    /// Check the storage window against `now_ms`, emitting its average on expiry.
    pub fn tick_storage(&mut self, now_ms: u32) -> Option<WindowAverage<T>> {
        let result = self.storage.tick(now_ms);
        if let Some(window) = &result {
            debug!(
                "Field {} ({}) storage window expired: {} over {} samples",
                self.index, self.name, window.average, window.samples
            );
        }
        result
    }

    /// Check the upload window against `now_ms`, emitting its average on expiry.
    pub fn tick_upload(&mut self, now_ms: u32) -> Option<WindowAverage<T>> {
        let result = self.upload.tick(now_ms);
        if let Some(window) = &result {
            debug!(
                "Field {} ({}) upload window expired: {} over {} samples",
                self.index, self.name, window.float_average, window.samples
            );
        }
        result
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    /// The averager behind the storage window
    pub fn storage(&self) -> &Averager<T> {
        &self.storage.averager
    }

    /// The averager behind the upload window
    pub fn upload(&self) -> &Averager<T> {
        &self.upload.averager
    }

    pub fn storage_interval_ms(&self) -> u32 {
        self.storage.interval_ms
    }

    pub fn upload_interval_ms(&self) -> u32 {
        self.upload.interval_ms
    }
}

/// Header column text: `name`, or `name (units)` when units are set
impl<T: Sample> fmt::Display for NumericDataField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.units.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.units)
        }
    }
}

fn label<const N: usize>(s: &str) -> Result<String<N>, ConfigError> {
    if s.contains(DELIMITER) {
        return Err(ConfigError::LabelContainsDelimiter);
    }
    let mut out = String::new();
    out.push_str(s).map_err(|_| ConfigError::LabelTooLong {
        len: s.len(),
        max: N,
    })?;
    Ok(out)
}
