//! Shared in-memory fakes for the collaborator seams: widgets, transport,
//! shell surfaces and the widget factory.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use serde_json::Value;

use crate::batcher::OutgoingRequest;
use crate::events::Platform;
use crate::failure::ConnectionErrorPolicy;
use crate::host::{
    ManualScheduler, ShellFeedback, Transport, TransportCallback, TransportReply, WidgetFactory,
};
use crate::widget::{
    BackgroundImage, Color, FontSpec, Gradient, Hosting, ListenerKind, Rect, RoundedBorder,
    Widget, WidgetId,
};
use crate::{Session, SessionConfig};

#[derive(Default)]
pub(crate) struct FakeWidget {
    parent: RefCell<Option<WidgetId>>,
    control: Cell<bool>,
    hosting: Cell<Hosting>,
    visible: Cell<Option<bool>>,
    enabled: Cell<Option<bool>>,
    position: Cell<Option<(i32, i32)>>,
    size: Cell<Option<(i32, i32)>>,
    foreground: Cell<Option<Color>>,
    background: Cell<Option<Color>>,
    gradient: RefCell<Option<Gradient>>,
    image: RefCell<Option<BackgroundImage>>,
    border: Cell<Option<RoundedBorder>>,
    font: RefCell<Option<FontSpec>>,
    tooltip: RefCell<Option<String>>,
    cursor: RefCell<Option<String>>,
    context_menu: RefCell<Option<Rc<dyn Widget>>>,
    generic: RefCell<Vec<(String, Value)>>,
    attached: RefCell<HashSet<ListenerKind>>,
    attach_counts: RefCell<HashMap<ListenerKind, u32>>,
    detach_counts: RefCell<HashMap<ListenerKind, u32>>,
    disposed: Cell<bool>,
    server_events: RefCell<Vec<(String, Value)>>,
}

impl FakeWidget {
    pub fn control(_id: &str) -> Rc<FakeWidget> {
        let widget = FakeWidget::default();
        widget.control.set(true);
        Rc::new(widget)
    }

    pub fn plain(_id: &str) -> Rc<FakeWidget> {
        Rc::new(FakeWidget::default())
    }

    pub fn with_parent(self: Rc<Self>, parent: &str) -> Rc<Self> {
        *self.parent.borrow_mut() = Some(WidgetId::from(parent));
        self
    }

    pub fn hosted(self: Rc<Self>, hosting: Hosting) -> Rc<Self> {
        self.hosting.set(hosting);
        self
    }

    pub fn visible(&self) -> Option<bool> {
        self.visible.get()
    }

    pub fn enabled(&self) -> Option<bool> {
        self.enabled.get()
    }

    pub fn position(&self) -> Option<(i32, i32)> {
        self.position.get()
    }

    pub fn size(&self) -> Option<(i32, i32)> {
        self.size.get()
    }

    pub fn foreground(&self) -> Option<Color> {
        self.foreground.get()
    }

    pub fn background(&self) -> Option<Color> {
        self.background.get()
    }

    pub fn background_image(&self) -> Option<BackgroundImage> {
        self.image.borrow().clone()
    }

    pub fn background_gradient(&self) -> Option<Gradient> {
        self.gradient.borrow().clone()
    }

    pub fn border(&self) -> Option<RoundedBorder> {
        self.border.get()
    }

    pub fn font(&self) -> Option<FontSpec> {
        self.font.borrow().clone()
    }

    pub fn tooltip(&self) -> Option<String> {
        self.tooltip.borrow().clone()
    }

    pub fn cursor(&self) -> Option<String> {
        self.cursor.borrow().clone()
    }

    pub fn context_menu(&self) -> Option<Rc<dyn Widget>> {
        self.context_menu.borrow().clone()
    }

    pub fn generic(&self, name: &str) -> Option<Value> {
        self.generic
            .borrow()
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    pub fn listener_attached(&self, kind: ListenerKind) -> bool {
        self.attached.borrow().contains(&kind)
    }

    pub fn attach_count(&self, kind: ListenerKind) -> u32 {
        self.attach_counts.borrow().get(&kind).copied().unwrap_or(0)
    }

    pub fn detach_count(&self, kind: ListenerKind) -> u32 {
        self.detach_counts.borrow().get(&kind).copied().unwrap_or(0)
    }

    pub fn disposed(&self) -> bool {
        self.disposed.get()
    }

    pub fn server_events(&self) -> Vec<(String, Value)> {
        self.server_events.borrow().clone()
    }
}

impl Widget for FakeWidget {
    fn set_visible(&self, visible: bool) {
        self.visible.set(Some(visible));
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.set(Some(enabled));
    }

    fn set_position(&self, x: i32, y: i32) {
        self.position.set(Some((x, y)));
    }

    fn set_size(&self, width: i32, height: i32) {
        self.size.set(Some((width, height)));
    }

    fn set_foreground(&self, color: Option<Color>) {
        self.foreground.set(color);
    }

    fn set_background(&self, color: Option<Color>) {
        self.background.set(color);
    }

    fn set_background_gradient(&self, gradient: Option<Gradient>) {
        *self.gradient.borrow_mut() = gradient;
    }

    fn set_background_image(&self, image: Option<BackgroundImage>) {
        *self.image.borrow_mut() = image;
    }

    fn set_border(&self, border: Option<RoundedBorder>) {
        self.border.set(border);
    }

    fn set_font(&self, font: Option<FontSpec>) {
        *self.font.borrow_mut() = font;
    }

    fn set_tooltip(&self, text: Option<String>) {
        *self.tooltip.borrow_mut() = text;
    }

    fn set_cursor(&self, cursor: Option<String>) {
        *self.cursor.borrow_mut() = cursor;
    }

    fn set_context_menu(&self, menu: Option<Rc<dyn Widget>>) {
        *self.context_menu.borrow_mut() = menu;
    }

    fn apply_generic(&self, name: &str, value: &Value) {
        self.generic
            .borrow_mut()
            .push((name.to_string(), value.clone()));
    }

    fn attach_input_listener(&self, kind: ListenerKind) {
        self.attached.borrow_mut().insert(kind);
        *self.attach_counts.borrow_mut().entry(kind).or_insert(0) += 1;
    }

    fn detach_input_listener(&self, kind: ListenerKind) {
        self.attached.borrow_mut().remove(&kind);
        *self.detach_counts.borrow_mut().entry(kind).or_insert(0) += 1;
    }

    fn input_listener_attached(&self, kind: ListenerKind) -> bool {
        self.attached.borrow().contains(&kind)
    }

    fn is_control(&self) -> bool {
        self.control.get()
    }

    fn hosting(&self) -> Hosting {
        self.hosting.get()
    }

    fn adjust_tab_bounds(&self, bounds: Rect) -> Rect {
        // Fixed inset standing in for a tab container's content offset.
        Rect {
            x: bounds.x + 2,
            y: bounds.y + 20,
            ..bounds
        }
    }

    fn parent_id(&self) -> Option<WidgetId> {
        self.parent.borrow().clone()
    }

    fn dispatch_server_event(&self, name: &str, payload: &Value) {
        self.server_events
            .borrow_mut()
            .push((name.to_string(), payload.clone()));
    }

    fn dispose(&self) {
        self.disposed.set(true);
    }
}

#[derive(Default)]
pub(crate) struct RecordingTransport {
    pending: RefCell<Vec<(OutgoingRequest, TransportCallback)>>,
}

impl RecordingTransport {
    pub fn new() -> Rc<RecordingTransport> {
        Rc::new(RecordingTransport::default())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn request_bodies(&self) -> Vec<String> {
        self.pending
            .borrow()
            .iter()
            .map(|(request, _)| request.body.clone())
            .collect()
    }

    pub fn next_request(&self) -> Option<OutgoingRequest> {
        self.pending
            .borrow()
            .first()
            .map(|(request, _)| request.clone())
    }

    /// Completes the oldest pending request, re-entering the session through
    /// the completion callback. Returns the request that was answered.
    pub fn complete_next(&self, reply: TransportReply) -> OutgoingRequest {
        let (request, callback) = self.pending.borrow_mut().remove(0);
        callback(reply);
        request
    }
}

impl Transport for RecordingTransport {
    fn dispatch(&self, request: OutgoingRequest, on_complete: TransportCallback) {
        self.pending.borrow_mut().push((request, on_complete));
    }
}

#[derive(Default)]
pub(crate) struct RecordingShell {
    busy_shown: Cell<u32>,
    busy_hidden: Cell<u32>,
    retry_notices: RefCell<Vec<String>>,
    retry_hidden: Cell<u32>,
    pages: RefCell<Vec<String>>,
    frozen: Cell<bool>,
    render_flushes: Cell<u32>,
}

impl RecordingShell {
    pub fn new() -> Rc<RecordingShell> {
        Rc::new(RecordingShell::default())
    }

    pub fn busy_shown(&self) -> u32 {
        self.busy_shown.get()
    }

    pub fn busy_hidden(&self) -> u32 {
        self.busy_hidden.get()
    }

    pub fn retry_notices(&self) -> Vec<String> {
        self.retry_notices.borrow().clone()
    }

    pub fn retry_hidden(&self) -> u32 {
        self.retry_hidden.get()
    }

    pub fn diagnostic_pages(&self) -> Vec<String> {
        self.pages.borrow().clone()
    }

    pub fn frozen(&self) -> bool {
        self.frozen.get()
    }

    pub fn render_flushes(&self) -> u32 {
        self.render_flushes.get()
    }
}

impl ShellFeedback for RecordingShell {
    fn show_busy(&self) {
        self.busy_shown.set(self.busy_shown.get() + 1);
    }

    fn hide_busy(&self) {
        self.busy_hidden.set(self.busy_hidden.get() + 1);
    }

    fn show_retry_notice(&self, message: &str) {
        self.retry_notices.borrow_mut().push(message.to_string());
    }

    fn hide_retry_notice(&self) {
        self.retry_hidden.set(self.retry_hidden.get() + 1);
    }

    fn show_diagnostic_page(&self, content: &str) {
        self.pages.borrow_mut().push(content.to_string());
    }

    fn freeze(&self) {
        self.frozen.set(true);
    }

    fn flush_render(&self) {
        self.render_flushes.set(self.render_flushes.get() + 1);
    }
}

#[derive(Default)]
pub(crate) struct FakeFactory {
    created: RefCell<HashMap<String, Rc<FakeWidget>>>,
}

impl FakeFactory {
    pub fn new() -> Rc<FakeFactory> {
        Rc::new(FakeFactory::default())
    }

    pub fn created(&self, id: &str) -> Option<Rc<FakeWidget>> {
        self.created.borrow().get(id).cloned()
    }
}

impl WidgetFactory for FakeFactory {
    fn create_widget(&self, id: &WidgetId, _widget_type: &str) -> Result<Rc<dyn Widget>, String> {
        let widget = FakeWidget::control(id.as_str());
        self.created
            .borrow_mut()
            .insert(id.as_str().to_string(), widget.clone());
        Ok(widget)
    }
}

pub(crate) struct Fixture {
    pub session: Rc<Session>,
    pub scheduler: Rc<ManualScheduler>,
    pub transport: Rc<RecordingTransport>,
    pub shell: Rc<RecordingShell>,
    pub factory: Rc<FakeFactory>,
}

pub(crate) fn test_session() -> Fixture {
    test_session_with(SessionConfig {
        ui_root_id: "r1".to_string(),
        platform: Platform::Other,
        liveness_poll: false,
    })
}

pub(crate) fn test_session_with(config: SessionConfig) -> Fixture {
    let scheduler = ManualScheduler::new();
    let transport = RecordingTransport::new();
    let shell = RecordingShell::new();
    let factory = FakeFactory::new();
    let session = Session::new(
        config,
        ConnectionErrorPolicy::status_zero(),
        transport.clone(),
        scheduler.clone(),
        shell.clone(),
        factory.clone(),
    );
    Fixture {
        session,
        scheduler,
        transport,
        shell,
        factory,
    }
}
