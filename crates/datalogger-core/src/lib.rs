//! Hardware-independent averaging core for the datalogger
//!
//! This crate holds the platform-agnostic part of the logger: the generic
//! running-average [`averager`], per-channel dual-window [`field`]s, and the
//! [`registry`] whose `tick()` decides when each window's average is handed
//! to storage or upload.
//!
//! Sampling hardware, the settings file parser, the SD card, and the modem
//! stay outside; they meet the core through [`config::LoggerConfig`] and the
//! [`sink`] traits.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod averager;
pub mod config;
pub mod field;
pub mod format;
pub mod registry;
pub mod sink;

pub use averager::{Averager, Sample};
pub use config::{ConfigError, FieldSpec, LoggerConfig, MAX_FIELDS};
pub use field::{NumericDataField, WindowAverage};
pub use registry::{DataError, DataFieldRegistry};
pub use sink::{ChannelSink, EventChannel, LogEvent, SinkError, StorageSink, UploadSink};
