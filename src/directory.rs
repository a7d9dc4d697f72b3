//! Maps stable widget identifiers to live widget instances, with deferred
//! lookup for targets the server references before creating.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::widget::{Widget, WidgetId};

type Continuation = Box<dyn FnOnce(Option<Rc<dyn Widget>>)>;

#[derive(Default)]
pub struct WidgetDirectory {
    widgets: RefCell<HashMap<WidgetId, Rc<dyn Widget>>>,
    pending: RefCell<HashMap<WidgetId, Vec<Continuation>>>,
}

impl WidgetDirectory {
    pub fn new() -> WidgetDirectory {
        WidgetDirectory::default()
    }

    /// Registers a live instance under `id` and synchronously drains every
    /// continuation queued for that id, invoking each exactly once.
    pub fn register(&self, id: WidgetId, widget: Rc<dyn Widget>) {
        self.widgets.borrow_mut().insert(id.clone(), widget.clone());
        let drained = self.pending.borrow_mut().remove(&id);
        if let Some(continuations) = drained {
            for continuation in continuations {
                continuation(Some(widget.clone()));
            }
        }
    }

    pub fn unregister(&self, id: &WidgetId) -> Option<Rc<dyn Widget>> {
        self.widgets.borrow_mut().remove(id)
    }

    pub fn find(&self, id: &WidgetId) -> Option<Rc<dyn Widget>> {
        self.widgets.borrow().get(id).cloned()
    }

    /// Reverse lookup by instance identity.
    pub fn find_id(&self, widget: &Rc<dyn Widget>) -> Option<WidgetId> {
        self.widgets
            .borrow()
            .iter()
            .find(|(_, candidate)| Rc::ptr_eq(candidate, widget))
            .map(|(id, _)| id.clone())
    }

    /// Calls `continuation` with the widget synchronously if it is already
    /// registered; otherwise queues it until `register` or `cancel_pending`
    /// settles the id.
    pub fn resolve(
        &self,
        id: &WidgetId,
        continuation: impl FnOnce(Option<Rc<dyn Widget>>) + 'static,
    ) {
        if let Some(widget) = self.find(id) {
            continuation(Some(widget));
        } else {
            self.pending
                .borrow_mut()
                .entry(id.clone())
                .or_default()
                .push(Box::new(continuation));
        }
    }

    /// Removes queued continuations for a destroyed id, invoking each with
    /// `None` so callers can drop their references.
    pub fn cancel_pending(&self, id: &WidgetId) {
        let drained = self.pending.borrow_mut().remove(id);
        if let Some(continuations) = drained {
            for continuation in continuations {
                continuation(None);
            }
        }
    }

    pub fn has_pending(&self, id: &WidgetId) -> bool {
        self.pending.borrow().contains_key(id)
    }

    /// Walks parent links from `start` to the nearest widget that is a
    /// control, including `start` itself.
    pub fn find_control(&self, start: &WidgetId) -> Option<(WidgetId, Rc<dyn Widget>)> {
        let mut current = Some(start.clone());
        while let Some(id) = current {
            let widget = self.find(&id)?;
            if widget.is_control() {
                return Some((id, widget));
            }
            current = widget.parent_id();
        }
        None
    }
}
