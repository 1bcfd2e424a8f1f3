//! Console output channels.
//!
//! Scripts write through four process-wide channels (log, info, warn,
//! error). By default each one forwards to `tracing`. A run swaps in
//! capturing sinks with [`ChannelOverride`], which puts the previous sinks
//! back when it is dropped, including on unwind.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Log,
    Info,
    Warn,
    Error,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Severity::Log, Severity::Info, Severity::Warn, Severity::Error];

    pub fn label(self) -> &'static str {
        match self {
            Severity::Log => "LOG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// One captured console call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleRecord {
    pub severity: Severity,
    pub message: String,
}

/// Destination of a console channel.
pub trait ConsoleSink: Send + Sync {
    fn write(&self, severity: Severity, message: &str);
}

/// Default sink: console output becomes log events.
pub struct TracingSink;

impl ConsoleSink for TracingSink {
    fn write(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Log | Severity::Info => {
                tracing::info!(target: "playground::console", "{}", message)
            }
            Severity::Warn => tracing::warn!(target: "playground::console", "{}", message),
            Severity::Error => tracing::error!(target: "playground::console", "{}", message),
        }
    }
}

type Channels = [Arc<dyn ConsoleSink>; 4];

fn default_channels() -> Channels {
    let sink: Arc<dyn ConsoleSink> = Arc::new(TracingSink);
    [sink.clone(), sink.clone(), sink.clone(), sink]
}

static CHANNELS: Lazy<RwLock<Channels>> = Lazy::new(|| RwLock::new(default_channels()));

/// Serializes overrides so two captures never interleave their swaps.
static OVERRIDE_SERIAL: Mutex<()> = Mutex::new(());

/// Writes `message` to the channel for `severity`.
pub fn emit(severity: Severity, message: impl AsRef<str>) {
    let sink = {
        let channels = CHANNELS.read().unwrap_or_else(PoisonError::into_inner);
        channels[severity.slot()].clone()
    };
    sink.write(severity, message.as_ref());
}

/// Records everything written to it, then forwards to the sink it replaced.
pub struct CaptureSink {
    records: Arc<Mutex<Vec<ConsoleRecord>>>,
    original: Arc<dyn ConsoleSink>,
}

impl ConsoleSink for CaptureSink {
    fn write(&self, severity: Severity, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ConsoleRecord {
                severity,
                message: message.to_string(),
            });
        self.original.write(severity, message);
    }
}

/// Scoped replacement of all four channels with capturing sinks.
pub struct ChannelOverride {
    saved: Option<Channels>,
    records: Arc<Mutex<Vec<ConsoleRecord>>>,
    _serial: MutexGuard<'static, ()>,
}

impl ChannelOverride {
    pub fn install() -> Self {
        let serial = OVERRIDE_SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        let records = Arc::new(Mutex::new(Vec::new()));
        let mut channels = CHANNELS.write().unwrap_or_else(PoisonError::into_inner);
        let saved = channels.clone();
        for severity in Severity::ALL {
            channels[severity.slot()] = Arc::new(CaptureSink {
                records: records.clone(),
                original: saved[severity.slot()].clone(),
            });
        }
        drop(channels);
        Self {
            saved: Some(saved),
            records,
            _serial: serial,
        }
    }

    /// Everything captured so far, in call order.
    pub fn records(&self) -> Vec<ConsoleRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Drop for ChannelOverride {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *CHANNELS.write().unwrap_or_else(PoisonError::into_inner) = saved;
        }
    }
}

/// Runs `f` with the channels captured.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<ConsoleRecord>) {
    let guard = ChannelOverride::install();
    let result = f();
    let records = guard.records();
    (result, records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_collects_in_order_with_severity() {
        let ((), records) = capture(|| {
            emit(Severity::Log, "one");
            emit(Severity::Warn, "two");
            emit(Severity::Error, "three");
        });
        assert_eq!(
            records,
            vec![
                ConsoleRecord { severity: Severity::Log, message: "one".into() },
                ConsoleRecord { severity: Severity::Warn, message: "two".into() },
                ConsoleRecord { severity: Severity::Error, message: "three".into() },
            ]
        );
    }

    #[test]
    fn channels_are_restored_after_a_panic() {
        let mut first = None;
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let guard = ChannelOverride::install();
            first = Some(guard.records.clone());
            emit(Severity::Info, "before");
            panic!("boom");
        }));
        assert!(outcome.is_err());

        let ((), records) = capture(|| emit(Severity::Info, "after"));
        assert_eq!(records.len(), 1);
        let first = first.expect("override was installed");
        assert_eq!(first.lock().unwrap().len(), 1, "old sinks must be detached");
    }

    #[test]
    fn output_from_other_threads_is_captured() {
        let ((), records) = capture(|| {
            std::thread::spawn(|| emit(Severity::Log, "from a worker"))
                .join()
                .unwrap();
        });
        assert_eq!(records[0].message, "from a worker");
    }

    #[test]
    fn capture_sink_records_before_forwarding() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let inner = CaptureSink {
            records: records.clone(),
            original: Arc::new(TracingSink),
        };
        inner.write(Severity::Warn, "x");
        assert_eq!(records.lock().unwrap().len(), 1);
    }
}
