//! Button event handlers.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::event::ButtonEvent;

/// Receives decoded button events from the listening task.
///
/// Handlers run on the listener task itself, so a slow handler delays the
/// next poll.
pub trait ButtonHandler: Send + Sync {
    fn on_button_event(&self, event: &ButtonEvent);
}

impl<F> ButtonHandler for F
where
    F: Fn(&ButtonEvent) + Send + Sync,
{
    fn on_button_event(&self, event: &ButtonEvent) {
        self(event)
    }
}

/// Ordered list of handlers shared between the controller and its listener.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<Vec<Arc<dyn ButtonHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn ButtonHandler>) {
        self.handlers.write().push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Call every handler in registration order.
    pub fn dispatch(&self, event: &ButtonEvent) {
        // Snapshot so a handler can register another without deadlocking.
        let handlers = self.handlers.read().clone();
        for handler in handlers {
            handler.on_button_event(event);
        }
    }
}
