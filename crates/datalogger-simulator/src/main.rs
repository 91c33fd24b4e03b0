//! Desktop simulator for the datalogger averaging core.
//!
//! Feeds synthetic ADC-style readings into a [`DataFieldRegistry`] at the
//! configured sample rate, ticks it, and logs every header, storage row and
//! upload value that comes out of the event channel.
//!
//! Simulated time runs `TIME_SCALE` times faster than wall-clock time. Set
//! `RUST_LOG=debug` to also see each window expiry.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use datalogger_core::{
    ChannelSink, DataFieldRegistry, EventChannel, FieldSpec, LogEvent, LoggerConfig,
};
use embassy_sync::channel::Channel;
use log::{error, info};

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Total simulated run time.
const SIMULATED_DURATION_MS: u32 = 5 * 60 * 1000;

/// Simulated milliseconds per wall-clock millisecond.
const TIME_SCALE: u32 = 60;

/// Channels logged by the simulated device, in column order.
const FIELDS: [FieldSpec<'static>; 3] = [
    FieldSpec::new("battery", "mV"),
    FieldSpec::new("temperature", "cC"),
    FieldSpec::new("light", "lux"),
];

const BATTERY: usize = 0;
const TEMPERATURE: usize = 1;
const LIGHT: usize = 2;

static EVENTS: EventChannel = Channel::new();

// ---------------------------------------------------------------------------
// Mock data generation
// ---------------------------------------------------------------------------

/// Generates synthetic readings that vary over time.
struct MockSampleGenerator {
    /// Simulated seconds since start.
    elapsed_secs: f64,
}

impl MockSampleGenerator {
    fn new() -> Self {
        Self { elapsed_secs: 0.0 }
    }

    /// Advance the internal clock and return one reading per field.
    fn next_sample(&mut self, dt_secs: f64) -> [i32; FIELDS.len()] {
        self.elapsed_secs += dt_secs;
        let t = self.elapsed_secs;

        // Battery: slow discharge from 4.1 V with a little ripple
        let battery = 4100.0 - t * 0.5 + 15.0 * (t / 7.0).sin();

        // Temperature: 18–24 °C in centi-degrees
        let temperature = 2100.0 + 300.0 * (t / 90.0).sin() + 20.0 * (t / 11.0).cos();

        // Light: clipped at zero for the "night" half of the cycle
        let light = (800.0 * (t / 120.0).sin()).max(0.0) + 5.0 * (t / 3.0).cos().abs();

        let mut values = [0; FIELDS.len()];
        values[BATTERY] = battery.round() as i32;
        values[TEMPERATURE] = temperature.round() as i32;
        values[LIGHT] = light.round() as i32;
        values
    }
}

// ---------------------------------------------------------------------------
// Event output
// ---------------------------------------------------------------------------

/// Log every event queued since the last drain.
fn drain_events() {
    while let Ok(event) = EVENTS.try_receive() {
        match event {
            LogEvent::Header(header) => info!("[storage] header: {}", header),
            LogEvent::Row(row) => info!("[storage] {}", row),
            LogEvent::Upload { field, value } => info!("[upload] {} = {}", field, value),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::init();
    info!("Starting datalogger simulator");

    let config = LoggerConfig {
        sample_period_ms: 1000,
        storage_interval_ms: 10_000,
        upload_interval_ms: 60_000,
        tick_period_ms: 1000,
        field_count: FIELDS.len() as u8,
    };

    let sink = ChannelSink::new(&EVENTS);
    let mut registry = match DataFieldRegistry::<i32, _, _>::setup(config, &FIELDS, sink, sink) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    drain_events();

    let mut generator = MockSampleGenerator::new();
    let tick_period = Duration::from_millis(u64::from(config.tick_period_ms));
    let frame_duration = tick_period / TIME_SCALE;
    let dt_secs = tick_period.as_secs_f64();

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------
    while registry.elapsed_ms() < SIMULATED_DURATION_MS {
        let frame_start = Instant::now();

        // --- Sampling -----------------------------------------------------
        for (index, value) in generator.next_sample(dt_secs).into_iter().enumerate() {
            if let Err(e) = registry.new_data(value, index) {
                error!("{}", e);
            }
        }

        // --- Window expiry ------------------------------------------------
        registry.tick();
        drain_events();

        // --- Pacing -------------------------------------------------------
        let elapsed = frame_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }

    info!(
        "Simulated {} s, {} samples rejected",
        registry.elapsed_ms() / 1000,
        registry.rejected_samples()
    );
    ExitCode::SUCCESS
}
