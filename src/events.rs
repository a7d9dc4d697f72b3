//! Turns raw input-device events into protocol event descriptors: relevance
//! filtering, implicit capture, double-click detection, modifier tracking.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::batcher::RequestBatcher;
use crate::directory::WidgetDirectory;
use crate::widget::WidgetId;

/// Window within which a second left-button press counts as a double-click.
pub const DOUBLE_CLICK_TIME_MS: u64 = 500;

/// Reserved namespace for event parameters in the request body.
pub const EVENT_PREFIX: &str = "ui.events.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Unknown,
    Left,
    Middle,
    Right,
}

impl MouseButton {
    /// Wire code: 0 = unknown, 1 = left, 2 = middle, 3 = right.
    pub fn code(self) -> i64 {
        match self {
            MouseButton::Unknown => 0,
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Mac,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Comma-joined modifier string. The command key counts as ctrl on Mac.
    pub fn encode(&self, platform: Platform) -> String {
        let ctrl = self.ctrl || (platform == Platform::Mac && self.meta);
        let mut encoded = String::new();
        if self.shift {
            encoded.push_str("shift,");
        }
        if ctrl {
            encoded.push_str("ctrl,");
        }
        if self.alt {
            encoded.push_str("alt,");
        }
        encoded
    }
}

/// Keys the translator reacts to on its single-shot paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    F1,
    ContextMenu,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    MouseDown,
    MouseUp,
    MouseDoubleClick,
    Help,
    MenuDetect,
}

impl EventKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            EventKind::MouseDown => "ui.events.mouseDown",
            EventKind::MouseUp => "ui.events.mouseUp",
            EventKind::MouseDoubleClick => "ui.events.mouseDoubleClick",
            EventKind::Help => "ui.events.help",
            EventKind::MenuDetect => "ui.events.menuDetect",
        }
    }
}

/// A fully translated protocol event, ready to be written into a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    pub kind: EventKind,
    pub target: WidgetId,
    pub button: Option<MouseButton>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub time: u64,
    pub modifiers: String,
}

impl EventDescriptor {
    /// Writes the event and its sub-parameters under the event's name prefix.
    pub fn write_to(&self, batcher: &RequestBatcher) {
        let name = self.kind.wire_name();
        batcher.write_event(name, &self.target);
        if let Some(button) = self.button {
            batcher.write(&format!("{name}.button"), button.code());
        }
        if let Some(x) = self.x {
            batcher.write(&format!("{name}.x"), x);
        }
        if let Some(y) = self.y {
            batcher.write(&format!("{name}.y"), y);
        }
        batcher.write(&format!("{name}.time"), self.time);
        if !self.modifiers.is_empty() {
            batcher.write(&format!("{name}.modifier"), self.modifiers.as_str());
        }
    }
}

/// Raw pointer event as delivered by widget glue. `target` is the widget
/// whose listener fired; `original_target` is where the event originated.
#[derive(Debug, Clone)]
pub struct PointerInput {
    pub target: WidgetId,
    pub original_target: WidgetId,
    pub button: MouseButton,
    pub x: i32,
    pub y: i32,
}

/// Transient state for double-click detection. Holds the widget id only, so
/// a destroyed widget is never retained past its removal.
#[derive(Debug, Clone)]
struct MouseDownRecord {
    widget: WidgetId,
    button: MouseButton,
    x: i32,
    y: i32,
    mouse_up_count: u32,
}

#[derive(Debug)]
pub struct PointerDownOutcome {
    pub descriptors: Vec<EventDescriptor>,
    /// Generation to expire after [`DOUBLE_CLICK_TIME_MS`] when a new record
    /// was remembered.
    pub armed_generation: Option<u64>,
}

/// Restores the shared suspend flag when dropped, including on unwind.
pub struct SuspendGuard {
    flag: Rc<Cell<bool>>,
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

pub struct EventTranslator {
    platform: Platform,
    suspended: Rc<Cell<bool>>,
    frozen: Cell<bool>,
    capturing: RefCell<Option<WidgetId>>,
    last_mouse_down: RefCell<Option<MouseDownRecord>>,
    down_generation: Cell<u64>,
    modifiers: Cell<Modifiers>,
}

impl EventTranslator {
    pub fn new(platform: Platform) -> EventTranslator {
        EventTranslator {
            platform,
            suspended: Rc::new(Cell::new(false)),
            frozen: Cell::new(false),
            capturing: RefCell::new(None),
            last_mouse_down: RefCell::new(None),
            down_generation: Cell::new(0),
            modifiers: Cell::new(Modifiers::default()),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.get()
    }

    /// Suspends emission for the lifetime of the guard. Used around response
    /// replay so programmatic UI mutation cannot feed events back.
    pub fn suspend_scope(&self) -> SuspendGuard {
        self.suspended.set(true);
        SuspendGuard {
            flag: self.suspended.clone(),
        }
    }

    /// Terminal input detach; used when the UI is frozen after a failure.
    pub fn freeze(&self) {
        self.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    pub fn set_modifiers(&self, modifiers: Modifiers) {
        self.modifiers.set(modifiers);
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers.get()
    }

    fn emission_blocked(&self) -> bool {
        self.suspended.get() || self.frozen.get()
    }

    fn encoded_modifiers(&self) -> String {
        self.modifiers.get().encode(self.platform)
    }

    /// An event is relevant to `target` when it originated there, when the
    /// target holds implicit capture, or when the origin resolves to the
    /// target through the directory's control walk.
    fn is_relevant(&self, directory: &WidgetDirectory, input: &PointerInput) -> bool {
        if input.target == input.original_target {
            return true;
        }
        if self.capturing.borrow().as_ref() == Some(&input.target) {
            return true;
        }
        directory
            .find_control(&input.original_target)
            .map(|(id, _)| id == input.target)
            .unwrap_or(false)
    }

    fn is_double_click(&self, input: &PointerInput) -> bool {
        let record = self.last_mouse_down.borrow();
        match record.as_ref() {
            Some(record) => {
                record.mouse_up_count == 1
                    && record.widget == input.target
                    && record.button == MouseButton::Left
                    && record.button == input.button
            }
            None => false,
        }
    }

    pub fn pointer_down(
        &self,
        directory: &WidgetDirectory,
        input: &PointerInput,
        now: u64,
    ) -> Option<PointerDownOutcome> {
        if self.emission_blocked() || !self.is_relevant(directory, input) {
            return None;
        }
        *self.capturing.borrow_mut() = Some(input.target.clone());

        let modifiers = self.encoded_modifiers();
        let descriptor = |kind: EventKind| EventDescriptor {
            kind,
            target: input.target.clone(),
            button: Some(input.button),
            x: Some(input.x),
            y: Some(input.y),
            time: now,
            modifiers: modifiers.clone(),
        };

        if self.is_double_click(input) {
            *self.last_mouse_down.borrow_mut() = None;
            Some(PointerDownOutcome {
                descriptors: vec![descriptor(EventKind::MouseDoubleClick)],
                armed_generation: None,
            })
        } else {
            *self.last_mouse_down.borrow_mut() = Some(MouseDownRecord {
                widget: input.target.clone(),
                button: input.button,
                x: input.x,
                y: input.y,
                mouse_up_count: 0,
            });
            let generation = self.down_generation.get() + 1;
            self.down_generation.set(generation);
            Some(PointerDownOutcome {
                descriptors: vec![descriptor(EventKind::MouseDown)],
                armed_generation: Some(generation),
            })
        }
    }

    pub fn pointer_up(
        &self,
        directory: &WidgetDirectory,
        input: &PointerInput,
        now: u64,
    ) -> Option<EventDescriptor> {
        if self.emission_blocked() || !self.is_relevant(directory, input) {
            return None;
        }
        *self.capturing.borrow_mut() = None;
        if let Some(record) = self.last_mouse_down.borrow_mut().as_mut() {
            record.mouse_up_count += 1;
        }
        Some(EventDescriptor {
            kind: EventKind::MouseUp,
            target: input.target.clone(),
            button: Some(input.button),
            x: Some(input.x),
            y: Some(input.y),
            time: now,
            modifiers: self.encoded_modifiers(),
        })
    }

    /// Expires the remembered mouse-down. The timer cannot be cancelled, so
    /// a stale generation fires as a no-op instead of clearing a newer record.
    pub fn expire_mouse_down(&self, generation: u64) {
        if self.down_generation.get() == generation {
            *self.last_mouse_down.borrow_mut() = None;
        }
    }

    /// Help request: F1 only, targeted at the nearest control ancestor.
    pub fn help_key(
        &self,
        directory: &WidgetDirectory,
        origin: &WidgetId,
        key: Key,
        now: u64,
    ) -> Option<EventDescriptor> {
        if key != Key::F1 || self.emission_blocked() {
            return None;
        }
        let (target, _) = directory.find_control(origin)?;
        Some(EventDescriptor {
            kind: EventKind::Help,
            target,
            button: None,
            x: None,
            y: None,
            time: now,
            modifiers: self.encoded_modifiers(),
        })
    }

    /// Menu detection via the context-menu key.
    pub fn menu_detect_key(
        &self,
        directory: &WidgetDirectory,
        origin: &WidgetId,
        key: Key,
        x: i32,
        y: i32,
        now: u64,
    ) -> Option<EventDescriptor> {
        if key != Key::ContextMenu {
            return None;
        }
        self.menu_detect(directory, origin, x, y, now)
    }

    /// Menu detection via the right mouse button.
    pub fn menu_detect_mouse(
        &self,
        directory: &WidgetDirectory,
        origin: &WidgetId,
        button: MouseButton,
        x: i32,
        y: i32,
        now: u64,
    ) -> Option<EventDescriptor> {
        if button != MouseButton::Right {
            return None;
        }
        self.menu_detect(directory, origin, x, y, now)
    }

    fn menu_detect(
        &self,
        directory: &WidgetDirectory,
        origin: &WidgetId,
        x: i32,
        y: i32,
        now: u64,
    ) -> Option<EventDescriptor> {
        if self.emission_blocked() {
            return None;
        }
        let (target, _) = directory.find_control(origin)?;
        Some(EventDescriptor {
            kind: EventKind::MenuDetect,
            target,
            button: None,
            x: Some(x),
            y: Some(y),
            time: now,
            modifiers: self.encoded_modifiers(),
        })
    }
}
