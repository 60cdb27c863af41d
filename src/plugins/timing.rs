//! Clock and sleep plugin. `sleep` polls the bridge's cancellation signal so
//! a stopped runtime does not keep a worker pinned for the full duration.

use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::Value;
use crate::plugins::{Plugin, PluginExports, RuntimeBridge};
use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(25);

// Anchored on first use, so `elapsed` measures from runtime startup.
static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

pub struct TimingPlugin;

impl Plugin for TimingPlugin {
    fn name(&self) -> &str {
        "timing"
    }

    fn init(&self, bridge: &RuntimeBridge) -> Result<PluginExports, RuntimeError> {
        let sleeper = bridge.clone();
        Lazy::force(&PROCESS_START);
        Ok(PluginExports::new()
            .function("elapsed", |_| {
                Ok(Value::Number(PROCESS_START.elapsed().as_secs_f64()))
            })
            .function("now", |_| {
                let now = chrono::Utc::now();
                let seconds =
                    now.timestamp() as f64 + f64::from(now.timestamp_subsec_millis()) / 1000.0;
                Ok(Value::Number(seconds))
            })
            .function("timestamp", |_| {
                Ok(Value::Str(chrono::Utc::now().to_rfc3339()))
            })
            .function("sleep", move |call| {
                let seconds = call.required(0, "sleep")?.as_number()?;
                if !(0.0..=86_400.0).contains(&seconds) {
                    return Err(RuntimeError::ArgumentError(format!(
                        "sleep() seconds out of range: {seconds}"
                    )));
                }
                let mut remaining = Duration::from_secs_f64(seconds);
                while !remaining.is_zero() {
                    if sleeper.is_cancelled() {
                        return Err(RuntimeError::Cancelled);
                    }
                    let slice = remaining.min(SLEEP_SLICE);
                    std::thread::sleep(slice);
                    remaining -= slice;
                }
                Ok(Value::Null)
            }))
    }
}
