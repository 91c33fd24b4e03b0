//! Field registry and the periodic tick that drives window expiry.

use alloc::vec::Vec;
use core::fmt::Write;

use heapless::String;
use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::averager::Sample;
use crate::config::{ConfigError, FieldSpec, LoggerConfig};
use crate::field::{NumericDataField, WindowAverage};
use crate::format::ColumnWriter;
use crate::sink::{HEADER_LEN, ROW_LEN, StorageSink, UploadSink, VALUE_LEN};

/// Errors raised while routing samples
#[derive(Debug, Error)]
pub enum DataError {
    /// A sample addressed a field that does not exist
    #[error("Field index {index} out of range (fields: {count})")]
    FieldIndexOutOfRange { index: usize, count: usize },
}

/// Ordered collection of data fields plus the sinks their averages go to.
///
/// Registration order is column order: the header, every storage row, and
/// field indices all follow the order of the [`FieldSpec`]s given to
/// [`DataFieldRegistry::setup`].
///
/// ## Scheduling
///
/// [`DataFieldRegistry::tick`] must be called by the host loop every
/// `tick_period_ms`. Each call advances the registry's elapsed time and checks
/// both windows of every field:
///
/// - Storage expiries are collected into one row and written to the storage sink
/// - Each upload expiry is sent to the upload sink on its own
///
/// Sink failures are logged and dropped; they never stop the tick.
pub struct DataFieldRegistry<T, S, U>
where
    T: Sample,
    S: StorageSink,
    U: UploadSink,
{
    fields: Vec<NumericDataField<T>>,
    config: LoggerConfig,
    /// Milliseconds advanced by all ticks so far (wrapping)
    elapsed_ms: u32,
    /// Samples dropped because their field index was out of range
    rejected_samples: u32,
    storage_sink: S,
    upload_sink: U,
}

impl<T, S, U> DataFieldRegistry<T, S, U>
where
    T: Sample,
    S: StorageSink,
    U: UploadSink,
{
    /// Validate `config`, build one field per [`FieldSpec`] and write the header.
    ///
    /// The field collection is allocated here and never resized afterwards.
    pub fn setup(
        config: LoggerConfig,
        fields: &[FieldSpec<'_>],
        storage_sink: S,
        upload_sink: U,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let configured = usize::from(config.field_count);
        if fields.len() != configured {
            return Err(ConfigError::FieldCountMismatch {
                configured,
                provided: fields.len(),
            });
        }

        let storage = config.storage_window()?;
        let upload = config.upload_window()?;

        if config.tick_is_coarse() {
            warn!(
                "Tick period {} ms is longer than the shortest averaging window; window boundaries will drift",
                config.tick_period_ms
            );
        }

        let fields = fields
            .iter()
            .enumerate()
            .map(|(index, spec)| NumericDataField::new(index, spec, storage, upload))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Data registry ready: {} fields, storage {} samples / {} ms, upload {} samples / {} ms",
            fields.len(),
            storage.capacity,
            storage.interval_ms,
            upload.capacity,
            upload.interval_ms
        );

        let mut registry = Self {
            fields,
            config,
            elapsed_ms: 0,
            rejected_samples: 0,
            storage_sink,
            upload_sink,
        };

        let header = registry.header();
        if let Err(e) = registry.storage_sink.write_header(&header) {
            error!("Failed to write header: {:?}", e);
        }

        Ok(registry)
    }

    /// Route a sample to the field at `field_index`.
    ///
    /// An out-of-range index is counted, logged and reported, and leaves every
    /// field untouched.
    pub fn new_data(&mut self, value: T, field_index: usize) -> Result<(), DataError> {
        let count = self.fields.len();
        match self.fields.get_mut(field_index) {
            Some(field) => {
                field.new_sample(value);
                Ok(())
            }
            None => {
                self.rejected_samples = self.rejected_samples.saturating_add(1);
                warn!(
                    "Dropping sample {} for field {} (only {} fields)",
                    value, field_index, count
                );
                Err(DataError::FieldIndexOutOfRange {
                    index: field_index,
                    count,
                })
            }
        }
    }

    /// Write the comma-separated field labels into `buffer`.
    ///
    /// If the full header does not fit, output stops after the last complete
    /// column. Returns the number of bytes written.
    pub fn write_headers_to_buffer(&self, buffer: &mut [u8]) -> usize {
        let mut writer = ColumnWriter::new(buffer);
        for field in &self.fields {
            if !writer.push_column(format_args!("{field}")) {
                debug!("Header truncated after {} columns", writer.columns());
                break;
            }
        }
        writer.len()
    }

    /// The complete header row
    pub fn header(&self) -> String<HEADER_LEN> {
        // HEADER_LEN fits every label at its maximum length
        let mut bytes = heapless::Vec::<u8, HEADER_LEN>::from_array([0; HEADER_LEN]);
        let len = self.write_headers_to_buffer(&mut bytes);
        bytes.truncate(len);

        // ColumnWriter only commits whole `&str` writes
        String::from_utf8(bytes).unwrap_or_default()
    }

    pub fn field(&self, index: usize) -> Option<&NumericDataField<T>> {
        self.fields.get(index)
    }

    pub fn number_of_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &NumericDataField<T>> {
        self.fields.iter()
    }

    /// Advance by one configured tick period and process expiries.
    pub fn tick(&mut self) {
        self.tick_by(self.config.tick_period_ms);
    }

    /// Advance by `elapsed_ms` and process expiries.
    ///
    /// For hosts that measure the time between ticks themselves.
    pub fn tick_by(&mut self, elapsed_ms: u32) {
        self.elapsed_ms = self.elapsed_ms.wrapping_add(elapsed_ms);
        let now = self.elapsed_ms;

        let mut buffer = [0u8; ROW_LEN];
        let mut row = ColumnWriter::new(&mut buffer);
        let mut stored = 0;

        for field in self.fields.iter_mut() {
            match field.tick_storage(now) {
                Some(window) => {
                    stored += 1;
                    row.push_column(format_args!("{}", window.average));
                }
                // Keep later columns aligned with the header
                None => {
                    row.push_column(format_args!(""));
                }
            }

            if let Some(window) = field.tick_upload(now) {
                send_upload(&mut self.upload_sink, field, &window);
            }
        }

        if stored > 0 {
            debug!("Storage row at {} ms: {}", now, row.as_str());
            if let Err(e) = self.storage_sink.write_row(row.as_str()) {
                error!("Failed to write storage row: {:?}", e);
            }
        }
    }

    /// Elapsed time in milliseconds since setup, wrapping at `u32::MAX`
    pub fn elapsed_ms(&self) -> u32 {
        self.elapsed_ms
    }

    pub fn rejected_samples(&self) -> u32 {
        self.rejected_samples
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn storage_sink(&self) -> &S {
        &self.storage_sink
    }

    pub fn storage_sink_mut(&mut self) -> &mut S {
        &mut self.storage_sink
    }

    pub fn upload_sink(&self) -> &U {
        &self.upload_sink
    }

    pub fn upload_sink_mut(&mut self) -> &mut U {
        &mut self.upload_sink
    }
}

fn send_upload<T: Sample, U: UploadSink>(
    sink: &mut U,
    field: &NumericDataField<T>,
    window: &WindowAverage<T>,
) {
    let mut value: String<VALUE_LEN> = String::new();
    if write!(value, "{:.2}", window.float_average).is_err() {
        error!("Upload value for {} does not fit", field.name());
        return;
    }

    if let Err(e) = sink.upload(field.name(), &value) {
        error!("Failed to upload {}: {:?}", field.name(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_FIELDS;
    use crate::sink::SinkError;
    use alloc::string::{String, ToString};
    use alloc::vec;

    #[derive(Default)]
    struct RecordingStorage {
        header: Option<String>,
        rows: Vec<String>,
    }

    impl StorageSink for RecordingStorage {
        fn write_header(&mut self, header: &str) -> Result<(), SinkError> {
            self.header = Some(header.to_string());
            Ok(())
        }

        fn write_row(&mut self, row: &str) -> Result<(), SinkError> {
            self.rows.push(row.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingUpload {
        values: Vec<(String, String)>,
        fail: bool,
    }

    impl UploadSink for RecordingUpload {
        fn upload(&mut self, field: &str, value: &str) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Rejected);
            }
            self.values.push((field.to_string(), value.to_string()));
            Ok(())
        }
    }

    type TestRegistry = DataFieldRegistry<i32, RecordingStorage, RecordingUpload>;

    const FIELDS: [FieldSpec<'static>; 3] = [
        FieldSpec::new("temp", "C"),
        FieldSpec::new("humidity", "%"),
        FieldSpec::new("light", ""),
    ];

    fn config() -> LoggerConfig {
        LoggerConfig {
            sample_period_ms: 1000,
            storage_interval_ms: 5000,
            upload_interval_ms: 20_000,
            tick_period_ms: 1000,
            field_count: 3,
        }
    }

    fn registry() -> TestRegistry {
        TestRegistry::setup(
            config(),
            &FIELDS,
            RecordingStorage::default(),
            RecordingUpload::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_setup_writes_header_once() {
        let registry = registry();
        assert_eq!(registry.number_of_fields(), 3);
        assert_eq!(
            registry.storage_sink().header.as_deref(),
            Some("temp (C),humidity (%),light")
        );
        assert_eq!(registry.field(0).unwrap().storage().capacity(), 5);
        assert_eq!(registry.field(0).unwrap().upload().capacity(), 20);
        assert!(registry.field(3).is_none());
    }

    #[test]
    fn test_setup_rejects_bad_config() {
        let too_many = LoggerConfig {
            field_count: 17,
            ..config()
        };
        let result = TestRegistry::setup(
            too_many,
            &FIELDS,
            RecordingStorage::default(),
            RecordingUpload::default(),
        );
        assert!(matches!(result, Err(ConfigError::TooManyFields { .. })));

        let mismatch = LoggerConfig {
            field_count: 2,
            ..config()
        };
        let result = TestRegistry::setup(
            mismatch,
            &FIELDS,
            RecordingStorage::default(),
            RecordingUpload::default(),
        );
        assert!(matches!(
            result,
            Err(ConfigError::FieldCountMismatch {
                configured: 2,
                provided: 3
            })
        ));

        let zero = LoggerConfig {
            upload_interval_ms: 0,
            ..config()
        };
        let result = TestRegistry::setup(
            zero,
            &FIELDS,
            RecordingStorage::default(),
            RecordingUpload::default(),
        );
        assert!(matches!(result, Err(ConfigError::ZeroInterval { .. })));
    }

    #[test]
    fn test_out_of_range_sample_is_rejected() {
        let mut registry = registry();
        registry.new_data(5, 0).unwrap();

        let result = registry.new_data(99, 3);
        assert!(matches!(
            result,
            Err(DataError::FieldIndexOutOfRange { index: 3, count: 3 })
        ));
        assert_eq!(registry.rejected_samples(), 1);

        for field in registry.fields().skip(1) {
            assert_eq!(field.storage().n(), 0);
        }
        assert_eq!(registry.field(0).unwrap().storage().n(), 1);
        assert_eq!(registry.field(0).unwrap().storage().average(), 5);
    }

    #[test]
    fn test_header_truncates_at_field_boundary() {
        let registry = registry();

        let mut buffer = [0u8; 20];
        let len = registry.write_headers_to_buffer(&mut buffer);
        assert_eq!(&buffer[..len], b"temp (C)");

        let mut exact = [0u8; 27];
        let len = registry.write_headers_to_buffer(&mut exact);
        assert_eq!(&exact[..len], b"temp (C),humidity (%),light");

        let mut tiny = [0u8; 3];
        assert_eq!(registry.write_headers_to_buffer(&mut tiny), 0);
    }

    #[test]
    fn test_header_fits_every_field_at_maximum_length() {
        let specs = [FieldSpec::new("abcdefghijklmnop", "units123"); MAX_FIELDS];
        let config = LoggerConfig {
            field_count: MAX_FIELDS as u8,
            ..config()
        };
        let registry = TestRegistry::setup(
            config,
            &specs,
            RecordingStorage::default(),
            RecordingUpload::default(),
        )
        .unwrap();

        // 16 columns of "abcdefghijklmnop (units123)" and 15 delimiters
        let header = registry.header();
        assert_eq!(header.len(), 16 * 27 + 15);
        assert!(header.starts_with("abcdefghijklmnop (units123),"));
        assert!(header.ends_with(",abcdefghijklmnop (units123)"));
        assert_eq!(
            registry.storage_sink().header.as_deref(),
            Some(header.as_str())
        );
    }

    #[test]
    fn test_delimiter_in_label_fails_setup() {
        let specs = [
            FieldSpec::new("temp", "C"),
            FieldSpec::new("humidity,rel", "%"),
            FieldSpec::new("light", ""),
        ];
        let result = TestRegistry::setup(
            config(),
            &specs,
            RecordingStorage::default(),
            RecordingUpload::default(),
        );
        assert!(matches!(result, Err(ConfigError::LabelContainsDelimiter)));
    }

    #[test]
    fn test_storage_rows_follow_registration_order() {
        let mut registry = registry();
        for tick in 1..=5 {
            registry.new_data(tick * 10, 0).unwrap();
            registry.new_data(-tick, 1).unwrap();
            registry.new_data(1000, 2).unwrap();
            registry.tick();
        }

        assert_eq!(registry.elapsed_ms(), 5000);
        assert_eq!(registry.storage_sink().rows, vec!["30,-3,1000".to_string()]);
        assert!(registry.upload_sink().values.is_empty());
    }

    #[test]
    fn test_storage_expiry_does_not_reset_upload() {
        let mut registry = registry();
        for _ in 0..5 {
            registry.new_data(7, 0).unwrap();
            registry.tick();
        }

        let field = registry.field(0).unwrap();
        assert_eq!(field.storage().n(), 0);
        assert_eq!(field.upload().n(), 5);
        assert!(!field.upload().full());
    }

    #[test]
    fn test_upload_values_are_sent_per_field() {
        let mut registry = registry();
        for tick in 0..20 {
            registry.new_data(if tick % 2 == 0 { 2 } else { 3 }, 0).unwrap();
            registry.new_data(-1, 1).unwrap();
            registry.tick();
        }

        assert_eq!(registry.storage_sink().rows.len(), 4);
        assert_eq!(
            registry.upload_sink().values,
            vec![
                ("temp".to_string(), "2.50".to_string()),
                ("humidity".to_string(), "-1.00".to_string()),
                ("light".to_string(), "0.00".to_string()),
            ]
        );

        let field = registry.field(0).unwrap();
        assert_eq!(field.upload().n(), 0);
    }

    #[test]
    fn test_sink_failure_does_not_stop_tick() {
        let mut registry = registry();
        registry.upload_sink_mut().fail = true;
        for _ in 0..20 {
            registry.new_data(1, 0).unwrap();
            registry.tick();
        }
        assert_eq!(registry.storage_sink().rows.len(), 4);
        assert!(registry.upload_sink().values.is_empty());
        assert_eq!(registry.field(0).unwrap().upload().n(), 0);
    }

    #[test]
    fn test_tick_by_accepts_host_elapsed_time() {
        let mut registry = registry();
        registry.new_data(42, 2).unwrap();
        registry.tick_by(2500);
        assert!(registry.storage_sink().rows.is_empty());
        registry.tick_by(2500);
        assert_eq!(registry.storage_sink().rows, vec!["0,0,42".to_string()]);
    }
}
