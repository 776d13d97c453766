//! Output routing for script print/log/error text.
//!
//! Events are pushed onto a FIFO channel by the thread that owns the engine
//! and drained one at a time by a dedicated consumer thread that owns the
//! sink. Emission order is preserved end to end.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::datetime::format_utc_datetime;
use crate::Result;

/// Where an output event came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutputSource {
    /// The shared environment (`log`, shared `print`, shared snippets).
    Shared,
    /// The host itself (lifecycle confirmations, host-level failures).
    System,
    /// A loaded module.
    Module(String),
}

impl fmt::Display for OutputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSource::Shared => write!(f, "shared"),
            OutputSource::System => write!(f, "system"),
            OutputSource::Module(name) => write!(f, "{}", name),
        }
    }
}

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// A single piece of text headed for the output sink.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputEvent {
    pub source: OutputSource,
    pub severity: Severity,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl OutputEvent {
    /// Create an event stamped with the current time.
    pub fn new(source: OutputSource, severity: Severity, text: impl Into<String>) -> Self {
        Self {
            source,
            severity,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn info(source: OutputSource, text: impl Into<String>) -> Self {
        Self::new(source, Severity::Info, text)
    }

    pub fn error(source: OutputSource, text: impl Into<String>) -> Self {
        Self::new(source, Severity::Error, text)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render as `[time][source] text`, or `[source] text` without a time format.
    pub fn format(&self, timezone: &str, time_format: Option<&str>) -> String {
        let text = self.text.trim_end_matches(['\r', '\n']);
        match time_format {
            Some(fmt) => format!(
                "[{}][{}] {}",
                format_utc_datetime(&self.timestamp, timezone, fmt)
                    .unwrap_or_else(|_| self.timestamp.to_rfc3339()),
                self.source,
                text
            ),
            None => format!("[{}] {}", self.source, text),
        }
    }
}

/// Consumer of output events. Runs on the router's consumer thread.
pub trait OutputSink: Send + 'static {
    fn deliver(&mut self, event: OutputEvent);
}

impl<F> OutputSink for F
where
    F: FnMut(OutputEvent) + Send + 'static,
{
    fn deliver(&mut self, event: OutputEvent) {
        self(event)
    }
}

/// Writes info events to stdout and error events to stderr.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    timezone: String,
    time_format: Option<String>,
}

impl ConsoleSink {
    pub fn new(timezone: impl Into<String>, time_format: Option<String>) -> Self {
        Self {
            timezone: timezone.into(),
            time_format,
        }
    }
}

impl OutputSink for ConsoleSink {
    fn deliver(&mut self, event: OutputEvent) {
        let line = event.format(&self.timezone, self.time_format.as_deref());
        match event.severity {
            Severity::Info => println!("{}", line),
            Severity::Error => eprintln!("{}", line),
        }
    }
}

/// Collects events in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<OutputEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event delivered so far, in delivery order.
    pub fn snapshot(&self) -> Vec<OutputEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl OutputSink for MemorySink {
    fn deliver(&mut self, event: OutputEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

/// Messages carried from emitters to the consumer thread.
enum RouterMessage {
    Event(OutputEvent),
    Flush(Sender<()>),
    Shutdown,
}

/// Cloneable emitter side of the router.
///
/// Handed to engine callbacks (`print`, `log`) and to the host's error
/// reporting. Sending never blocks.
#[derive(Clone)]
pub struct OutputHandle {
    tx: Sender<RouterMessage>,
}

impl OutputHandle {
    /// Queue an event for delivery.
    pub fn emit(&self, event: OutputEvent) {
        if let Err(mpsc::SendError(RouterMessage::Event(event))) =
            self.tx.send(RouterMessage::Event(event))
        {
            warn!(source = %event.source, "output router stopped, dropping: {}", event.text);
        }
    }

    pub fn info(&self, source: OutputSource, text: impl Into<String>) {
        self.emit(OutputEvent::info(source, text));
    }

    pub fn error(&self, source: OutputSource, text: impl Into<String>) {
        self.emit(OutputEvent::error(source, text));
    }
}

impl fmt::Debug for OutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputHandle").finish_non_exhaustive()
    }
}

/// Owns the consumer thread that drains events into a sink.
pub struct OutputRouter {
    handle: OutputHandle,
    worker: Option<JoinHandle<()>>,
}

impl OutputRouter {
    /// Start the consumer thread with the given sink.
    pub fn spawn<S: OutputSink>(sink: S) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("modhost-output".to_string())
            .spawn(move || drain(sink, rx))?;
        debug!("output router started");

        Ok(Self {
            handle: OutputHandle { tx },
            worker: Some(worker),
        })
    }

    /// Get an emitter for this router.
    pub fn handle(&self) -> OutputHandle {
        self.handle.clone()
    }

    /// Block until every event emitted before this call has been delivered.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.handle.tx.send(RouterMessage::Flush(ack_tx)).is_ok() {
            // A dead consumer drops the ack sender, so this cannot hang.
            let _ = ack_rx.recv();
        }
    }

    /// Deliver everything queued so far, then stop the consumer thread.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.handle.tx.send(RouterMessage::Shutdown);
            if worker.join().is_err() {
                warn!("output sink panicked");
            }
            debug!("output router stopped");
        }
    }
}

impl Drop for OutputRouter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn drain<S: OutputSink>(mut sink: S, rx: Receiver<RouterMessage>) {
    while let Ok(message) = rx.recv() {
        match message {
            RouterMessage::Event(event) => {
                trace!(target: "script", source = %event.source, severity = ?event.severity, "{}", event.text);
                sink.deliver(event);
            }
            RouterMessage::Flush(ack) => {
                let _ = ack.send(());
            }
            RouterMessage::Shutdown => break,
        }
    }
}
