//! Destinations for emitted averages.
//!
//! The registry hands storage rows to a [`StorageSink`] (the SD card writer on
//! the device) and upload values to an [`UploadSink`] (the network task).
//! [`ChannelSink`] implements both by queueing [`LogEvent`]s on an
//! `embassy-sync` channel, so the tasks that own the card and the modem can
//! drain them at their own pace.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::String;
use thiserror_no_std::Error;

use crate::config::{MAX_FIELDS, MAX_NAME_LEN, MAX_UNITS_LEN};

/// Longest storage row: every column holding `i32::MIN` plus a delimiter
pub const ROW_LEN: usize = MAX_FIELDS * 12;

/// Longest header: every column as `name (units)` plus a delimiter
pub const HEADER_LEN: usize = MAX_FIELDS * (MAX_NAME_LEN + MAX_UNITS_LEN + 4);

/// Longest formatted upload value
pub const VALUE_LEN: usize = 24;

/// Channel capacity for log events
/// Sized to absorb one storage row plus an upload per field between drains
pub const EVENT_CHANNEL_CAPACITY: usize = MAX_FIELDS + 2;

/// Errors reported by sinks
#[derive(Debug, Error)]
pub enum SinkError {
    /// The event channel has no free slot
    #[error("Event channel full")]
    ChannelFull,

    /// The line does not fit in the sink's buffer
    #[error("Line exceeds {max} bytes")]
    TooLong { max: usize },

    /// The underlying storage or link refused the write
    #[error("Sink rejected write")]
    Rejected,
}

/// Receives the header once, then one row per storage window expiry
pub trait StorageSink {
    fn write_header(&mut self, header: &str) -> Result<(), SinkError>;

    fn write_row(&mut self, row: &str) -> Result<(), SinkError>;
}

/// Receives one formatted value per upload window expiry
pub trait UploadSink {
    fn upload(&mut self, field: &str, value: &str) -> Result<(), SinkError>;
}

/// Events queued by a [`ChannelSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// Column names, written once at setup
    Header(String<HEADER_LEN>),
    /// One storage window's averages
    Row(String<ROW_LEN>),
    /// One field's upload window average
    Upload {
        field: String<MAX_NAME_LEN>,
        value: String<VALUE_LEN>,
    },
}

pub type EventChannel = Channel<CriticalSectionRawMutex, LogEvent, EVENT_CHANNEL_CAPACITY>;

/// Sink that queues everything it receives on an [`EventChannel`]
///
/// ## Usage
///
/// ```rust,ignore
/// static EVENTS: EventChannel = Channel::new();
///
/// let sink = ChannelSink::new(&EVENTS);
/// let registry = DataFieldRegistry::<i32, _, _>::setup(config, &fields, sink, sink)?;
///
/// while let Ok(event) = EVENTS.try_receive() {
///     // write to card / hand to modem
/// }
/// ```
#[derive(Clone, Copy)]
pub struct ChannelSink<'a> {
    channel: &'a EventChannel,
}

impl<'a> ChannelSink<'a> {
    pub const fn new(channel: &'a EventChannel) -> Self {
        Self { channel }
    }

    fn send(&self, event: LogEvent) -> Result<(), SinkError> {
        self.channel
            .try_send(event)
            .map_err(|_| SinkError::ChannelFull)
    }
}

fn copy_str<const N: usize>(s: &str) -> Result<String<N>, SinkError> {
    let mut out = String::new();
    out.push_str(s).map_err(|_| SinkError::TooLong { max: N })?;
    Ok(out)
}

impl StorageSink for ChannelSink<'_> {
    fn write_header(&mut self, header: &str) -> Result<(), SinkError> {
        self.send(LogEvent::Header(copy_str(header)?))
    }

    fn write_row(&mut self, row: &str) -> Result<(), SinkError> {
        self.send(LogEvent::Row(copy_str(row)?))
    }
}

impl UploadSink for ChannelSink<'_> {
    fn upload(&mut self, field: &str, value: &str) -> Result<(), SinkError> {
        self.send(LogEvent::Upload {
            field: copy_str(field)?,
            value: copy_str(value)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        static EVENTS: EventChannel = Channel::new();
        let mut sink = ChannelSink::new(&EVENTS);

        sink.write_header("temp,light").unwrap();
        sink.write_row("21,310").unwrap();
        sink.upload("temp", "21.25").unwrap();

        match EVENTS.try_receive() {
            Ok(LogEvent::Header(header)) => assert_eq!(header.as_str(), "temp,light"),
            other => panic!("expected header, got {other:?}"),
        }
        match EVENTS.try_receive() {
            Ok(LogEvent::Row(row)) => assert_eq!(row.as_str(), "21,310"),
            other => panic!("expected row, got {other:?}"),
        }
        match EVENTS.try_receive() {
            Ok(LogEvent::Upload { field, value }) => {
                assert_eq!(field.as_str(), "temp");
                assert_eq!(value.as_str(), "21.25");
            }
            other => panic!("expected upload, got {other:?}"),
        }
        assert!(EVENTS.try_receive().is_err());
    }

    #[test]
    fn test_full_channel_is_reported() {
        static EVENTS: EventChannel = Channel::new();
        let mut sink = ChannelSink::new(&EVENTS);

        for _ in 0..EVENT_CHANNEL_CAPACITY {
            sink.write_row("1").unwrap();
        }
        assert!(matches!(sink.write_row("1"), Err(SinkError::ChannelFull)));

        // Draining frees a slot again
        assert!(EVENTS.try_receive().is_ok());
        assert!(sink.write_row("2").is_ok());
    }

    #[test]
    fn test_oversized_field_name_is_rejected() {
        static EVENTS: EventChannel = Channel::new();
        let mut sink = ChannelSink::new(&EVENTS);

        let result = sink.upload("a_field_name_well_past_capacity", "1.00");
        assert!(matches!(
            result,
            Err(SinkError::TooLong { max: MAX_NAME_LEN })
        ));
        assert!(EVENTS.try_receive().is_err());
    }
}
