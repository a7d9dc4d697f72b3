//! Host integration seams. The runtime never touches the network, timers or
//! the document directly; the embedding event loop supplies these traits.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::batcher::OutgoingRequest;
use crate::widget::{Widget, WidgetId};

/// Whether a request goes through the event loop or blocks until complete.
/// Synchronous dispatch is an explicit opt-in for lifecycle moments such as
/// final unload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Async,
    Sync,
}

/// What came back from the transport, successful or not. A connection-level
/// failure is encoded in the status code and classified by the injected
/// [`crate::failure::ConnectionErrorPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl TransportReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|content_type| content_type.contains("application/json"))
            .unwrap_or(false)
    }
}

pub type TransportCallback = Box<dyn FnOnce(TransportReply)>;

/// Strictly request/response transport to the single logical server endpoint.
/// Completion re-enters the runtime through the callback; nothing blocks
/// unless the request's mode is [`DispatchMode::Sync`].
pub trait Transport {
    fn dispatch(&self, request: OutgoingRequest, on_complete: TransportCallback);
}

/// One-shot timers and a monotonic clock, both owned by the host event loop.
pub trait Scheduler {
    fn schedule_once(&self, delay_ms: u64, callback: Box<dyn FnOnce()>);
    fn now_millis(&self) -> u64;
}

/// User-visible surfaces the runtime drives but does not render: the busy
/// hint, the retry notice for connection failures, the terminal diagnostic
/// page, and the freeze hooks (stop animation, drop exit confirmation).
pub trait ShellFeedback {
    fn show_busy(&self) {}
    fn hide_busy(&self) {}
    fn show_retry_notice(&self, message: &str);
    fn hide_retry_notice(&self) {}
    fn show_diagnostic_page(&self, content: &str);
    fn freeze(&self) {}
    /// Force any deferred rendering to complete before events resume.
    fn flush_render(&self) {}
}

/// Creates concrete widget instances for server lifecycle instructions.
pub trait WidgetFactory {
    fn create_widget(&self, id: &WidgetId, widget_type: &str) -> Result<Rc<dyn Widget>, String>;
}

/// Deterministic scheduler for headless embeddings and tests: time advances
/// only through [`ManualScheduler::advance`], firing due callbacks in order.
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<u64>,
    queue: RefCell<Vec<(u64, Box<dyn FnOnce()>)>>,
}

impl ManualScheduler {
    pub fn new() -> Rc<ManualScheduler> {
        Rc::new(ManualScheduler::default())
    }

    pub fn pending_timers(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Advances the clock by `delta_ms`, running every callback that comes
    /// due, in due-time order. Callbacks may schedule further timers; those
    /// run too if they fall within the window.
    pub fn advance(&self, delta_ms: u64) {
        let target = self.now.get() + delta_ms;
        loop {
            let next = {
                let queue = self.queue.borrow();
                queue
                    .iter()
                    .enumerate()
                    .filter(|(_, (due, _))| *due <= target)
                    .min_by_key(|(index, (due, _))| (*due, *index))
                    .map(|(index, _)| index)
            };
            let Some(index) = next else {
                break;
            };
            let (due, callback) = self.queue.borrow_mut().remove(index);
            self.now.set(due);
            callback();
        }
        self.now.set(target);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay_ms: u64, callback: Box<dyn FnOnce()>) {
        let due = self.now.get() + delay_ms;
        self.queue.borrow_mut().push((due, callback));
    }

    fn now_millis(&self) -> u64 {
        self.now.get()
    }
}
