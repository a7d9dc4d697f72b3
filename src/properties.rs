//! Property dispatch: protocol property names resolved to typed apply
//! functions, with a generic fallback for the open extension set and
//! idempotent listener toggles.

use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;

use crate::directory::WidgetDirectory;
use crate::widget::{
    BackgroundImage, Color, FontSpec, Gradient, GradientStop, Hosting, ListenerKind, Rect,
    RoundedBorder, Widget, WidgetId,
};

#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("malformed payload for property '{property}': {reason}")]
    Malformed { property: String, reason: String },
    #[error("unknown listener '{0}'")]
    UnknownListener(String),
}

fn malformed(property: &str, reason: impl Into<String>) -> PropertyError {
    PropertyError::Malformed {
        property: property.to_string(),
        reason: reason.into(),
    }
}

/// The finite set of property names with dedicated handlers. Anything else
/// belongs to the open extension set and falls through to
/// [`Widget::apply_generic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyName {
    Visibility,
    Enabled,
    Foreground,
    Background,
    BackgroundImage,
    BackgroundGradient,
    RoundedBorder,
    Cursor,
    Bounds,
    Font,
    ToolTip,
    Menu,
}

impl PropertyName {
    pub fn parse(name: &str) -> Option<PropertyName> {
        match name {
            "visibility" => Some(PropertyName::Visibility),
            "enabled" => Some(PropertyName::Enabled),
            "foreground" => Some(PropertyName::Foreground),
            "background" => Some(PropertyName::Background),
            "backgroundImage" => Some(PropertyName::BackgroundImage),
            "backgroundGradient" => Some(PropertyName::BackgroundGradient),
            "roundedBorder" => Some(PropertyName::RoundedBorder),
            "cursor" => Some(PropertyName::Cursor),
            "bounds" => Some(PropertyName::Bounds),
            "font" => Some(PropertyName::Font),
            "toolTip" => Some(PropertyName::ToolTip),
            "menu" => Some(PropertyName::Menu),
            _ => None,
        }
    }
}

/// Applies one named property to a live widget. Unknown names get the generic
/// set-if-non-null / reset-if-null treatment through the widget itself.
pub fn apply_property(
    directory: &WidgetDirectory,
    widget: &Rc<dyn Widget>,
    name: &str,
    value: &Value,
) -> Result<(), PropertyError> {
    let Some(property) = PropertyName::parse(name) else {
        widget.apply_generic(name, value);
        return Ok(());
    };
    match property {
        PropertyName::Visibility => widget.set_visible(decode_flag(name, value, true)?),
        PropertyName::Enabled => widget.set_enabled(decode_flag(name, value, true)?),
        PropertyName::Foreground => widget.set_foreground(decode_optional_color(name, value)?),
        PropertyName::Background => match decode_optional_color(name, value)? {
            Some(color) => {
                widget.set_background_gradient(None);
                let color = if color.is_transparent() {
                    Color::TRANSPARENT
                } else {
                    color
                };
                widget.set_background(Some(color));
            }
            None => {
                widget.set_background(None);
                widget.set_background_gradient(None);
            }
        },
        PropertyName::BackgroundImage => {
            widget.set_background_image(decode_background_image(name, value)?)
        }
        PropertyName::BackgroundGradient => {
            widget.set_background_gradient(decode_gradient(name, value)?)
        }
        PropertyName::RoundedBorder => widget.set_border(decode_rounded_border(name, value)?),
        PropertyName::Cursor => widget.set_cursor(decode_optional_text(name, value)?),
        PropertyName::Bounds => apply_bounds(widget, decode_rect(name, value)?),
        PropertyName::Font => widget.set_font(decode_font(name, value)?),
        PropertyName::ToolTip => {
            // The empty string resets, same as null.
            let text = decode_optional_text(name, value)?.filter(|text| !text.is_empty());
            widget.set_tooltip(text);
        }
        PropertyName::Menu => apply_menu(directory, widget, name, value)?,
    }
    Ok(())
}

/// Maps a listener-toggle boolean to attach/detach of the translator hook.
/// Re-applying the same value is idempotent.
pub fn apply_listener(
    widget: &Rc<dyn Widget>,
    name: &str,
    enabled: bool,
) -> Result<(), PropertyError> {
    let kind =
        ListenerKind::parse(name).ok_or_else(|| PropertyError::UnknownListener(name.to_string()))?;
    let attached = widget.input_listener_attached(kind);
    if enabled && !attached {
        widget.attach_input_listener(kind);
    } else if !enabled && attached {
        widget.detach_input_listener(kind);
    }
    Ok(())
}

/// Geometry application is categorized by hosting: scroll-content position is
/// owned by the container, tab-hosted bounds go through the container
/// transform first.
fn apply_bounds(widget: &Rc<dyn Widget>, bounds: Rect) {
    let bounds = match widget.hosting() {
        Hosting::TabItem => widget.adjust_tab_bounds(bounds),
        Hosting::Plain | Hosting::ScrollContent => bounds,
    };
    if widget.hosting() != Hosting::ScrollContent {
        widget.set_position(bounds.x, bounds.y);
    }
    widget.set_size(bounds.width, bounds.height);
}

/// The menu target may not exist yet; resolution is deferred through the
/// directory and settles when the menu widget registers, or with `None` when
/// the id is cancelled.
fn apply_menu(
    directory: &WidgetDirectory,
    widget: &Rc<dyn Widget>,
    name: &str,
    value: &Value,
) -> Result<(), PropertyError> {
    match value {
        Value::Null => {
            widget.set_context_menu(None);
            Ok(())
        }
        Value::String(menu_id) => {
            let target = widget.clone();
            directory.resolve(&WidgetId::from(menu_id.as_str()), move |menu| {
                target.set_context_menu(menu);
            });
            Ok(())
        }
        other => Err(malformed(name, format!("expected id string, got {other}"))),
    }
}

fn decode_flag(property: &str, value: &Value, default: bool) -> Result<bool, PropertyError> {
    match value {
        Value::Null => Ok(default),
        Value::Bool(flag) => Ok(*flag),
        other => Err(malformed(property, format!("expected boolean, got {other}"))),
    }
}

fn decode_optional_text(property: &str, value: &Value) -> Result<Option<String>, PropertyError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        other => Err(malformed(property, format!("expected string, got {other}"))),
    }
}

fn decode_i32(property: &str, value: &Value) -> Result<i32, PropertyError> {
    value
        .as_i64()
        .and_then(|wide| i32::try_from(wide).ok())
        .ok_or_else(|| malformed(property, format!("expected integer, got {value}")))
}

fn decode_u8(property: &str, value: &Value) -> Result<u8, PropertyError> {
    value
        .as_i64()
        .and_then(|wide| u8::try_from(wide).ok())
        .ok_or_else(|| malformed(property, format!("expected channel byte, got {value}")))
}

/// Colors arrive as `[red, green, blue]` or `[red, green, blue, alpha]`.
fn decode_color(property: &str, value: &Value) -> Result<Color, PropertyError> {
    let channels = value
        .as_array()
        .ok_or_else(|| malformed(property, "expected color array"))?;
    if channels.len() != 3 && channels.len() != 4 {
        return Err(malformed(
            property,
            format!("expected 3 or 4 channels, got {}", channels.len()),
        ));
    }
    Ok(Color {
        red: decode_u8(property, &channels[0])?,
        green: decode_u8(property, &channels[1])?,
        blue: decode_u8(property, &channels[2])?,
        alpha: match channels.get(3) {
            Some(alpha) => decode_u8(property, alpha)?,
            None => 255,
        },
    })
}

fn decode_optional_color(property: &str, value: &Value) -> Result<Option<Color>, PropertyError> {
    match value {
        Value::Null => Ok(None),
        other => decode_color(property, other).map(Some),
    }
}

/// Gradients arrive as `[colors, percents, vertical]` and are normalized to
/// stops with 0..=1 positions.
fn decode_gradient(property: &str, value: &Value) -> Result<Option<Gradient>, PropertyError> {
    let fields = match value {
        Value::Null => return Ok(None),
        other => other
            .as_array()
            .ok_or_else(|| malformed(property, "expected gradient array"))?,
    };
    if fields.len() != 3 {
        return Err(malformed(
            property,
            format!("expected [colors, percents, vertical], got {} fields", fields.len()),
        ));
    }
    let colors = fields[0]
        .as_array()
        .ok_or_else(|| malformed(property, "expected color list"))?;
    let percents = fields[1]
        .as_array()
        .ok_or_else(|| malformed(property, "expected percent list"))?;
    let vertical = fields[2]
        .as_bool()
        .ok_or_else(|| malformed(property, "expected vertical flag"))?;
    if colors.len() != percents.len() {
        return Err(malformed(
            property,
            format!("{} colors vs {} percents", colors.len(), percents.len()),
        ));
    }
    let mut stops = Vec::with_capacity(colors.len());
    for (color, percent) in colors.iter().zip(percents) {
        let position = percent
            .as_f64()
            .ok_or_else(|| malformed(property, "expected numeric percent"))?;
        stops.push(GradientStop {
            position: (position / 100.0) as f32,
            color: decode_color(property, color)?,
        });
    }
    Ok(Some(Gradient {
        stops,
        horizontal: !vertical,
    }))
}

/// Rounded borders arrive as `[width, color, tl, tr, br, bl]`.
fn decode_rounded_border(
    property: &str,
    value: &Value,
) -> Result<Option<RoundedBorder>, PropertyError> {
    let fields = match value {
        Value::Null => return Ok(None),
        other => other
            .as_array()
            .ok_or_else(|| malformed(property, "expected border array"))?,
    };
    if fields.len() != 6 {
        return Err(malformed(
            property,
            format!("expected 6 border fields, got {}", fields.len()),
        ));
    }
    Ok(Some(RoundedBorder {
        width: decode_i32(property, &fields[0])?,
        color: decode_color(property, &fields[1])?,
        radii: [
            decode_i32(property, &fields[2])?,
            decode_i32(property, &fields[3])?,
            decode_i32(property, &fields[4])?,
            decode_i32(property, &fields[5])?,
        ],
    }))
}

/// Fonts arrive as `[families, size, bold, italic]`.
fn decode_font(property: &str, value: &Value) -> Result<Option<FontSpec>, PropertyError> {
    let fields = match value {
        Value::Null => return Ok(None),
        other => other
            .as_array()
            .ok_or_else(|| malformed(property, "expected font array"))?,
    };
    if fields.len() != 4 {
        return Err(malformed(
            property,
            format!("expected 4 font fields, got {}", fields.len()),
        ));
    }
    let families = fields[0]
        .as_array()
        .ok_or_else(|| malformed(property, "expected family list"))?;
    let mut family = Vec::with_capacity(families.len());
    for entry in families {
        family.push(
            entry
                .as_str()
                .ok_or_else(|| malformed(property, "expected family name"))?
                .to_string(),
        );
    }
    Ok(Some(FontSpec {
        family,
        size: decode_i32(property, &fields[1])?,
        bold: fields[2]
            .as_bool()
            .ok_or_else(|| malformed(property, "expected bold flag"))?,
        italic: fields[3]
            .as_bool()
            .ok_or_else(|| malformed(property, "expected italic flag"))?,
    }))
}

/// Background images arrive as `[source, width, height]`.
fn decode_background_image(
    property: &str,
    value: &Value,
) -> Result<Option<BackgroundImage>, PropertyError> {
    let fields = match value {
        Value::Null => return Ok(None),
        other => other
            .as_array()
            .ok_or_else(|| malformed(property, "expected image array"))?,
    };
    if fields.len() != 3 {
        return Err(malformed(
            property,
            format!("expected 3 image fields, got {}", fields.len()),
        ));
    }
    Ok(Some(BackgroundImage {
        source: fields[0]
            .as_str()
            .ok_or_else(|| malformed(property, "expected source string"))?
            .to_string(),
        width: decode_i32(property, &fields[1])?,
        height: decode_i32(property, &fields[2])?,
    }))
}

fn decode_rect(property: &str, value: &Value) -> Result<Rect, PropertyError> {
    let fields = value
        .as_array()
        .ok_or_else(|| malformed(property, "expected bounds array"))?;
    if fields.len() != 4 {
        return Err(malformed(
            property,
            format!("expected [x, y, width, height], got {} fields", fields.len()),
        ));
    }
    Ok(Rect {
        x: decode_i32(property, &fields[0])?,
        y: decode_i32(property, &fields[1])?,
        width: decode_i32(property, &fields[2])?,
        height: decode_i32(property, &fields[3])?,
    })
}
