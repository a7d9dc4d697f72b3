//! Client-side runtime for a server-driven remote UI protocol.
//!
//! The server owns all application logic; this crate keeps a directory of
//! mirrored widgets, replays the server's batched instructions onto them,
//! translates raw input into protocol events, and accumulates outgoing state
//! changes into coalesced HTTP-style requests. The embedding supplies the
//! actual widgets, transport, timers and shell surfaces through the traits in
//! [`host`].

pub mod batcher;
pub mod directory;
pub mod events;
pub mod failure;
pub mod host;
pub mod properties;
pub mod response;
pub mod widget;

#[cfg(test)]
pub(crate) mod testutil;

use std::rc::Rc;

pub use crate::batcher::{
    BUSY_HINT_DELAY_MS, COALESCE_DELAY_MS, FlushDecision, OutgoingRequest, ParamValue,
    RequestBatcher, RequestKind,
};
pub use crate::directory::WidgetDirectory;
pub use crate::events::{
    DOUBLE_CLICK_TIME_MS, EventDescriptor, EventKind, EventTranslator, Key, Modifiers,
    MouseButton, Platform, PointerInput,
};
pub use crate::failure::{ConnectionErrorPolicy, FailureHandler};
pub use crate::host::{
    DispatchMode, Scheduler, ShellFeedback, Transport, TransportReply, WidgetFactory,
};
pub use crate::response::{ProcessError, process_reply};
pub use crate::widget::{Widget, WidgetId};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Identifier of the UI root, sent with every request.
    pub ui_root_id: String,
    pub platform: Platform,
    /// Whether to originate a follow-up liveness request after each
    /// successfully processed reply.
    pub liveness_poll: bool,
}

impl SessionConfig {
    pub fn new(ui_root_id: impl Into<String>) -> SessionConfig {
        SessionConfig {
            ui_root_id: ui_root_id.into(),
            platform: Platform::Other,
            liveness_poll: true,
        }
    }
}

/// Owns the per-session state and wires the components to the host seams.
/// Single-threaded by construction: every callback handed to the host holds a
/// weak reference, so a dropped session quietly cancels all pending work.
pub struct Session {
    config: SessionConfig,
    directory: WidgetDirectory,
    batcher: RequestBatcher,
    translator: EventTranslator,
    failure: FailureHandler,
    transport: Rc<dyn Transport>,
    scheduler: Rc<dyn Scheduler>,
    shell: Rc<dyn ShellFeedback>,
    factory: Rc<dyn WidgetFactory>,
    started_at: u64,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        policy: ConnectionErrorPolicy,
        transport: Rc<dyn Transport>,
        scheduler: Rc<dyn Scheduler>,
        shell: Rc<dyn ShellFeedback>,
        factory: Rc<dyn WidgetFactory>,
    ) -> Rc<Session> {
        let started_at = scheduler.now_millis();
        Rc::new(Session {
            directory: WidgetDirectory::new(),
            batcher: RequestBatcher::new(config.ui_root_id.clone()),
            translator: EventTranslator::new(config.platform),
            failure: FailureHandler::new(policy),
            config,
            transport,
            scheduler,
            shell,
            factory,
            started_at,
        })
    }

    pub fn directory(&self) -> &WidgetDirectory {
        &self.directory
    }

    pub fn batcher(&self) -> &RequestBatcher {
        &self.batcher
    }

    pub fn translator(&self) -> &EventTranslator {
        &self.translator
    }

    pub fn failure(&self) -> &FailureHandler {
        &self.failure
    }

    pub fn shell(&self) -> &dyn ShellFeedback {
        self.shell.as_ref()
    }

    pub fn factory(&self) -> &dyn WidgetFactory {
        self.factory.as_ref()
    }

    /// Seeds the request counter from the bootstrap handshake.
    pub fn set_request_counter(&self, value: u64) {
        self.batcher.set_request_counter(value);
    }

    /// Requests a flush of the pending batch. Repeated calls within the
    /// coalescing window collapse into a single transmission.
    pub fn flush(self: &Rc<Self>) {
        if !self.batcher.try_arm_delay() {
            return;
        }
        let weak = Rc::downgrade(self);
        self.scheduler.schedule_once(
            COALESCE_DELAY_MS,
            Box::new(move || {
                if let Some(session) = weak.upgrade() {
                    session.flush_now(DispatchMode::Async);
                }
            }),
        );
    }

    /// Flushes immediately, blocking the caller until the reply is handled.
    /// Reserved for lifecycle moments such as final unload.
    pub fn flush_sync(self: &Rc<Self>) {
        self.flush_now(DispatchMode::Sync);
    }

    fn flush_now(self: &Rc<Self>, mode: DispatchMode) {
        match self.batcher.prepare(mode) {
            FlushDecision::Defer => {
                tracing::debug!("request counter not ready; deferring flush");
                self.flush();
            }
            FlushDecision::Send(request) => self.transmit(request),
        }
    }

    fn transmit(self: &Rc<Self>, request: OutgoingRequest) {
        if request.kind == RequestKind::Batch {
            let outstanding = self.batcher.begin_transmission(request.clone());
            if outstanding == 1 {
                let weak = Rc::downgrade(self);
                self.scheduler.schedule_once(
                    BUSY_HINT_DELAY_MS,
                    Box::new(move || {
                        if let Some(session) = weak.upgrade()
                            && session.batcher.outstanding_requests() > 0
                        {
                            session.shell.show_busy();
                        }
                    }),
                );
            }
        }
        tracing::debug!(
            bytes = request.body.len(),
            mode = ?request.mode,
            kind = ?request.kind,
            "transmitting request"
        );
        let weak = Rc::downgrade(self);
        let echo = request.clone();
        self.transport.dispatch(
            request,
            Box::new(move |reply| {
                if let Some(session) = weak.upgrade() {
                    session.handle_reply(echo, reply);
                }
            }),
        );
    }

    fn handle_reply(self: &Rc<Self>, request: OutgoingRequest, reply: TransportReply) {
        if reply.is_success() {
            let outcome = response::process_reply(self, &reply.body);
            self.finish_transmission(&request);
            match outcome {
                Ok(()) => {
                    // The liveness channel is a loop: every processed reply,
                    // including a poll's own, re-arms the next poll.
                    if self.config.liveness_poll {
                        self.originate_poll();
                    }
                }
                Err(error) => {
                    self.failure.processing_failure(
                        &self.translator,
                        self.shell.as_ref(),
                        &error,
                        &request.body,
                    );
                }
            }
        } else if self.failure.is_connection_error(reply.status) {
            self.finish_transmission(&request);
            self.failure
                .connection_lost(self.shell.as_ref(), request, reply.status);
        } else {
            self.finish_transmission(&request);
            self.failure
                .status_failure(&self.translator, self.shell.as_ref(), &reply);
        }
    }

    fn finish_transmission(&self, request: &OutgoingRequest) {
        if request.kind == RequestKind::Batch && self.batcher.complete_transmission() == 0 {
            self.shell.hide_busy();
        }
    }

    /// Replays the stored request after a connection failure, keeping its
    /// body and dispatch mode unchanged.
    pub fn retry(self: &Rc<Self>) {
        let Some(request) = self.failure.take_retry_request() else {
            return;
        };
        tracing::info!("retrying failed request");
        self.shell.hide_retry_notice();
        self.shell.show_busy();
        self.transmit(request);
    }

    fn originate_poll(self: &Rc<Self>) {
        tracing::debug!("originating liveness poll");
        self.transmit(self.batcher.poll_request());
    }

    /// Entry point for raw pointer presses from the widget glue.
    pub fn pointer_down(self: &Rc<Self>, input: &PointerInput) {
        let now = self.elapsed_millis();
        let Some(outcome) = self.translator.pointer_down(&self.directory, input, now) else {
            return;
        };
        for descriptor in &outcome.descriptors {
            descriptor.write_to(&self.batcher);
        }
        if let Some(generation) = outcome.armed_generation {
            let weak = Rc::downgrade(self);
            self.scheduler.schedule_once(
                DOUBLE_CLICK_TIME_MS,
                Box::new(move || {
                    if let Some(session) = weak.upgrade() {
                        session.translator.expire_mouse_down(generation);
                    }
                }),
            );
        }
        self.flush();
    }

    pub fn pointer_up(self: &Rc<Self>, input: &PointerInput) {
        let now = self.elapsed_millis();
        if let Some(descriptor) = self.translator.pointer_up(&self.directory, input, now) {
            descriptor.write_to(&self.batcher);
            self.flush();
        }
    }

    pub fn help_key(self: &Rc<Self>, origin: &WidgetId, key: Key) {
        let now = self.elapsed_millis();
        if let Some(descriptor) = self.translator.help_key(&self.directory, origin, key, now) {
            descriptor.write_to(&self.batcher);
            self.flush();
        }
    }

    pub fn menu_detect_key(self: &Rc<Self>, origin: &WidgetId, key: Key, x: i32, y: i32) {
        let now = self.elapsed_millis();
        if let Some(descriptor) =
            self.translator
                .menu_detect_key(&self.directory, origin, key, x, y, now)
        {
            descriptor.write_to(&self.batcher);
            self.flush();
        }
    }

    pub fn menu_detect_mouse(
        self: &Rc<Self>,
        origin: &WidgetId,
        button: MouseButton,
        x: i32,
        y: i32,
    ) {
        let now = self.elapsed_millis();
        if let Some(descriptor) =
            self.translator
                .menu_detect_mouse(&self.directory, origin, button, x, y, now)
        {
            descriptor.write_to(&self.batcher);
            self.flush();
        }
    }

    /// Focus parameters are written by widget glue; a focus change only
    /// triggers a flush so they reach the server promptly.
    pub fn focus_changed(self: &Rc<Self>) {
        self.flush();
    }

    pub fn set_modifiers(&self, modifiers: Modifiers) {
        self.translator.set_modifiers(modifiers);
    }

    fn elapsed_millis(&self) -> u64 {
        self.scheduler.now_millis().saturating_sub(self.started_at)
    }
}
