//! Event registration and delivery

use parking_lot::RwLock;
use std::sync::Arc;

/// A registered event callback
pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Anything handlers can be attached to
pub trait EventSource<E> {
    /// Register a handler. Handlers are never deduplicated: registering the
    /// same logic twice delivers every event to it twice.
    fn on(&self, handler: Handler<E>);
}

impl<E, T: EventSource<E> + ?Sized> EventSource<E> for Arc<T> {
    fn on(&self, handler: Handler<E>) {
        (**self).on(handler)
    }
}

/// In-process emitter that broker and listener implementations can embed.
///
/// Handlers run inline on the emitting task, in registration order, so the
/// emitter preserves whatever ordering the caller emits in.
pub struct EventEmitter<E> {
    handlers: RwLock<Vec<Handler<E>>>,
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Deliver an event to every registered handler
    pub fn emit(&self, event: &E) {
        // Snapshot so a handler may register further handlers without deadlocking
        let handlers = self.handlers.read().clone();
        for handler in handlers.iter() {
            handler(event);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventSource<E> for EventEmitter<E> {
    fn on(&self, handler: Handler<E>) {
        self.handlers.write().push(handler);
    }
}

impl<E> std::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_handlers_run_in_registration_order() {
        let emitter = EventEmitter::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = seen.clone();
            emitter.on(Arc::new(move |n: &u32| seen.lock().push((tag, *n))));
        }

        emitter.emit(&1);
        emitter.emit(&2);

        assert_eq!(
            *seen.lock(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[test]
    fn test_emit_without_handlers_is_noop() {
        let emitter = EventEmitter::<()>::default();
        emitter.emit(&());
        assert_eq!(emitter.handler_count(), 0);
    }

    #[test]
    fn test_handler_may_register_during_emit() {
        let emitter = Arc::new(EventEmitter::<()>::new());
        let inner = emitter.clone();
        (*emitter).on(Arc::new(move |_: &()| (*inner).on(Arc::new(|_: &()| {}))));

        emitter.emit(&());
        assert_eq!(emitter.handler_count(), 2);
    }
}
