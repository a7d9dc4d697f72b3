//! Decodes the server's batched instruction messages and replays them through
//! the property dispatch table and the widget directory.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::Session;
use crate::properties::{PropertyError, apply_listener, apply_property};
use crate::widget::WidgetId;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("malformed server message: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown widget id '{0}'")]
    UnknownWidget(WidgetId),
    #[error("widget creation failed for '{id}': {reason}")]
    Create { id: WidgetId, reason: String },
    #[error(transparent)]
    Property(#[from] PropertyError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    #[serde(default, rename = "requestCounter")]
    pub request_counter: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One server instruction. Applied strictly in document order.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op")]
pub enum Operation {
    #[serde(rename = "create")]
    Create {
        target: String,
        #[serde(rename = "type")]
        widget_type: String,
        #[serde(default)]
        properties: serde_json::Map<String, Value>,
    },
    #[serde(rename = "set")]
    Set {
        target: String,
        properties: serde_json::Map<String, Value>,
    },
    #[serde(rename = "listen")]
    Listen {
        target: String,
        events: serde_json::Map<String, Value>,
    },
    #[serde(rename = "destroy")]
    Destroy { target: String },
    #[serde(rename = "event")]
    Event {
        target: String,
        kind: String,
        #[serde(default)]
        payload: Value,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerMessage {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

/// Error replies may carry a structured message under `meta.message`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub meta: Meta,
}

/// Replays a successful reply. Event translation is suspended for the whole
/// replay so programmatic mutation cannot feed events back; the guard restores
/// the flag on the error path as well.
pub fn process_reply(session: &Session, body: &str) -> Result<(), ProcessError> {
    let message: ServerMessage = serde_json::from_str(body)?;
    let _suspend = session.translator().suspend_scope();
    if let Some(counter) = message.meta.request_counter {
        session.batcher().set_request_counter(counter);
    }
    for operation in &message.operations {
        apply_operation(session, operation)?;
    }
    session.shell().flush_render();
    Ok(())
}

fn apply_operation(session: &Session, operation: &Operation) -> Result<(), ProcessError> {
    let directory = session.directory();
    match operation {
        Operation::Create {
            target,
            widget_type,
            properties,
        } => {
            let id = WidgetId::from(target.as_str());
            let widget = session
                .factory()
                .create_widget(&id, widget_type)
                .map_err(|reason| ProcessError::Create {
                    id: id.clone(),
                    reason,
                })?;
            tracing::debug!(id = %id, widget_type, "widget created");
            directory.register(id, widget.clone());
            for (name, value) in properties {
                apply_property(directory, &widget, name, value)?;
            }
        }
        Operation::Set { target, properties } => {
            let id = WidgetId::from(target.as_str());
            let widget = directory
                .find(&id)
                .ok_or(ProcessError::UnknownWidget(id))?;
            for (name, value) in properties {
                apply_property(directory, &widget, name, value)?;
            }
        }
        Operation::Listen { target, events } => {
            let id = WidgetId::from(target.as_str());
            let widget = directory
                .find(&id)
                .ok_or(ProcessError::UnknownWidget(id))?;
            for (name, value) in events {
                apply_listener(&widget, name, value.as_bool().unwrap_or(false))?;
            }
        }
        Operation::Destroy { target } => {
            let id = WidgetId::from(target.as_str());
            directory.cancel_pending(&id);
            if let Some(widget) = directory.unregister(&id) {
                widget.dispose();
            }
            tracing::debug!(id = %target, "widget destroyed");
        }
        Operation::Event {
            target,
            kind,
            payload,
        } => {
            let id = WidgetId::from(target.as_str());
            let widget = directory
                .find(&id)
                .ok_or(ProcessError::UnknownWidget(id))?;
            widget.dispatch_server_event(kind, payload);
        }
    }
    Ok(())
}
