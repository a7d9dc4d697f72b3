//! Outgoing request accumulation: parameter writes are merged into a single
//! pending batch, coalesced over a short delay window, then serialized as one
//! form-encoded body.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;

use crate::host::DispatchMode;
use crate::widget::WidgetId;

/// Delay window over which bursts of flush triggers collapse into one request.
pub const COALESCE_DELAY_MS: u64 = 60;

/// How long a request may remain unanswered before the busy hint is shown.
pub const BUSY_HINT_DELAY_MS: u64 = 500;

/// Reserved parameter carrying the session/root identifier.
pub const UI_ROOT_PARAMETER: &str = "uiRoot";

/// Reserved parameter pairing a request with its response.
pub const REQUEST_COUNTER_PARAMETER: &str = "requestCounter";

/// Reserved parameter marking a follow-up liveness request.
pub const POLL_PARAMETER: &str = "ui.poll";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(value) => write!(f, "{value}"),
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        // Counters and timestamps fit comfortably; saturate rather than wrap
        // if a value ever exceeds the signed range.
        ParamValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<&WidgetId> for ParamValue {
    fn from(value: &WidgetId) -> Self {
        ParamValue::Text(value.as_str().to_string())
    }
}

/// Insertion-ordered parameter accumulator. A write with an existing name
/// overwrites the value but keeps the first-insertion position, so the
/// serialized order is stable across rewrites.
#[derive(Debug, Default)]
pub struct ParameterBuffer {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterBuffer {
    pub fn write(&mut self, name: &str, value: impl Into<ParamValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(key, _)| key != name);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Serializes as percent-encoded `name=value` pairs in insertion order.
    pub fn encode(&self) -> String {
        let pairs: Vec<String> = self
            .entries
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(name),
                    urlencoding::encode(&value.to_string())
                )
            })
            .collect();
        pairs.join("&")
    }
}

/// Monotonic sequence number pairing requests with responses. `Unset` and
/// `PendingNext` both defer flushing: no traffic may leave without a counter,
/// and a consumed counter cannot be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCounter {
    Unset,
    Ready(u64),
    PendingNext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Batch,
    Poll,
}

/// A serialized request body together with the dispatch mode it must keep
/// through retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    pub body: String,
    pub mode: DispatchMode,
    pub kind: RequestKind,
}

#[derive(Debug, PartialEq, Eq)]
pub enum FlushDecision {
    /// The request counter is not ready; re-arm the deferred flush.
    Defer,
    Send(OutgoingRequest),
}

pub struct RequestBatcher {
    ui_root_id: String,
    pending: RefCell<ParameterBuffer>,
    counter: Cell<RequestCounter>,
    in_delayed_send: Cell<bool>,
    running_request_count: Cell<u32>,
    in_flight: RefCell<Option<OutgoingRequest>>,
}

impl RequestBatcher {
    pub fn new(ui_root_id: impl Into<String>) -> RequestBatcher {
        RequestBatcher {
            ui_root_id: ui_root_id.into(),
            pending: RefCell::new(ParameterBuffer::default()),
            counter: Cell::new(RequestCounter::Unset),
            in_delayed_send: Cell::new(false),
            running_request_count: Cell::new(0),
            in_flight: RefCell::new(None),
        }
    }

    pub fn ui_root_id(&self) -> &str {
        &self.ui_root_id
    }

    /// Overwrites the pending parameter `name` (last-write-wins per batch).
    pub fn write(&self, name: &str, value: impl Into<ParamValue>) {
        self.pending.borrow_mut().write(name, value);
    }

    /// Records an event under its reserved name, valued with the id of the
    /// widget that caused it.
    pub fn write_event(&self, event_type: &str, target: &WidgetId) {
        self.pending.borrow_mut().write(event_type, target);
    }

    pub fn remove(&self, name: &str) {
        self.pending.borrow_mut().remove(name);
    }

    pub fn parameter(&self, name: &str) -> Option<ParamValue> {
        self.pending.borrow().get(name).cloned()
    }

    pub fn set_request_counter(&self, value: u64) {
        self.counter.set(RequestCounter::Ready(value));
    }

    pub fn request_counter(&self) -> RequestCounter {
        self.counter.get()
    }

    /// Claims the single coalescing slot. Returns `true` when the caller must
    /// arm the delay timer; `false` while one is already pending.
    pub fn try_arm_delay(&self) -> bool {
        if self.in_delayed_send.get() {
            false
        } else {
            self.in_delayed_send.set(true);
            true
        }
    }

    /// The real flush step. Injects the reserved parameters after client
    /// writes so they win conflicts, invalidates the counter so a second
    /// flush cannot reuse it, and atomically snapshots and clears the
    /// pending batch.
    pub fn prepare(&self, mode: DispatchMode) -> FlushDecision {
        self.in_delayed_send.set(false);
        match self.counter.get() {
            RequestCounter::Unset | RequestCounter::PendingNext => FlushDecision::Defer,
            RequestCounter::Ready(counter) => {
                let mut pending = self.pending.borrow_mut();
                pending.write(UI_ROOT_PARAMETER, self.ui_root_id.as_str());
                pending.write(REQUEST_COUNTER_PARAMETER, counter);
                self.counter.set(RequestCounter::PendingNext);
                let snapshot = mem::take(&mut *pending);
                FlushDecision::Send(OutgoingRequest {
                    body: snapshot.encode(),
                    mode,
                    kind: RequestKind::Batch,
                })
            }
        }
    }

    /// Builds the follow-up liveness request; it bypasses the counter scheme
    /// and the pending batch entirely.
    pub fn poll_request(&self) -> OutgoingRequest {
        let mut buffer = ParameterBuffer::default();
        buffer.write(UI_ROOT_PARAMETER, self.ui_root_id.as_str());
        buffer.write(POLL_PARAMETER, true);
        OutgoingRequest {
            body: buffer.encode(),
            mode: DispatchMode::Async,
            kind: RequestKind::Poll,
        }
    }

    /// Tracks a transmission; returns the new outstanding count. A request
    /// already in flight is superseded, not joined.
    pub fn begin_transmission(&self, request: OutgoingRequest) -> u32 {
        let running = self.running_request_count.get() + 1;
        self.running_request_count.set(running);
        *self.in_flight.borrow_mut() = Some(request);
        running
    }

    /// Returns the outstanding count after completion.
    pub fn complete_transmission(&self) -> u32 {
        let running = self.running_request_count.get().saturating_sub(1);
        self.running_request_count.set(running);
        running
    }

    pub fn outstanding_requests(&self) -> u32 {
        self.running_request_count.get()
    }

    pub fn in_flight(&self) -> Option<OutgoingRequest> {
        self.in_flight.borrow().clone()
    }
}
