use std::fmt;
use std::rc::Rc;

use serde_json::Value;

/// Opaque, server-assigned identifier for a widget instance. Unique for the
/// session lifetime; never reused while the widget is alive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(String);

impl WidgetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WidgetId {
    fn from(value: &str) -> Self {
        WidgetId(value.to_string())
    }
}

impl From<String> for WidgetId {
    fn from(value: String) -> Self {
        WidgetId(value)
    }
}

/// RGBA color decoded from the wire. An alpha channel of zero means fully
/// transparent regardless of the RGB components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color {
        red: 0,
        green: 0,
        blue: 0,
        alpha: 0,
    };

    pub fn opaque(red: u8, green: u8, blue: u8) -> Color {
        Color {
            red,
            green,
            blue,
            alpha: 255,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.alpha == 0
    }
}

/// One stop of a background gradient, with the position normalized to 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub position: f32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub stops: Vec<GradientStop>,
    pub horizontal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundedBorder {
    pub width: i32,
    pub color: Color,
    /// Corner radii in top-left, top-right, bottom-right, bottom-left order.
    pub radii: [i32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: Vec<String>,
    pub size: i32,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundImage {
    pub source: String,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// How a widget is hosted by its container, as far as bounds application is
/// concerned. Content panes of scroll containers do not own their position;
/// tab-hosted widgets get a container-specific bounds transform first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hosting {
    #[default]
    Plain,
    ScrollContent,
    TabItem,
}

/// Input listener toggles the server may enable or disable per widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Focus,
    Mouse,
    Key,
    Traverse,
    MenuDetect,
    Help,
    Activate,
}

impl ListenerKind {
    pub fn parse(name: &str) -> Option<ListenerKind> {
        match name {
            "focus" => Some(ListenerKind::Focus),
            "mouse" => Some(ListenerKind::Mouse),
            "key" => Some(ListenerKind::Key),
            "traverse" => Some(ListenerKind::Traverse),
            "menuDetect" => Some(ListenerKind::MenuDetect),
            "help" => Some(ListenerKind::Help),
            "activate" => Some(ListenerKind::Activate),
            _ => None,
        }
    }
}

/// The narrow interface through which the runtime drives live widget
/// instances. Concrete widgets, rendering and layout live on the host side;
/// setters take `Option` values where `None` means "reset to default".
pub trait Widget {
    fn set_visible(&self, visible: bool);
    fn set_enabled(&self, enabled: bool);
    fn set_position(&self, x: i32, y: i32);
    fn set_size(&self, width: i32, height: i32);
    fn set_foreground(&self, color: Option<Color>);
    fn set_background(&self, color: Option<Color>);
    fn set_background_gradient(&self, gradient: Option<Gradient>);
    fn set_background_image(&self, image: Option<BackgroundImage>);
    fn set_border(&self, border: Option<RoundedBorder>);
    fn set_font(&self, font: Option<FontSpec>);
    fn set_tooltip(&self, text: Option<String>);
    fn set_cursor(&self, cursor: Option<String>);
    fn set_context_menu(&self, menu: Option<Rc<dyn Widget>>);

    /// Fallback for the open extension set of generic properties (z-order,
    /// tab index, custom styling variants). Implementors follow the
    /// set-if-non-null / reset-if-null convention.
    fn apply_generic(&self, name: &str, value: &Value);

    fn attach_input_listener(&self, kind: ListenerKind);
    fn detach_input_listener(&self, kind: ListenerKind);
    fn input_listener_attached(&self, kind: ListenerKind) -> bool;

    /// Whether this widget is a "control" in the protocol sense, i.e. a valid
    /// target for help and menu-detect emission and for relevance walks.
    fn is_control(&self) -> bool;

    fn hosting(&self) -> Hosting {
        Hosting::Plain
    }

    /// Container-specific bounds transform for tab-hosted widgets. Identity
    /// unless the host container needs an adjustment.
    fn adjust_tab_bounds(&self, bounds: Rect) -> Rect {
        bounds
    }

    fn parent_id(&self) -> Option<WidgetId>;

    /// Server-originated event mirrored back to the client.
    fn dispatch_server_event(&self, _name: &str, _payload: &Value) {}

    fn dispose(&self);
}
