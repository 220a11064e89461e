use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A zero-argument observer of authentication-state transitions.
///
/// Identity is the `Arc` allocation: clone the same `Arc` to add or remove it.
pub type AuthListener = Arc<dyn Fn() + Send + Sync>;

fn same_listener(a: &AuthListener, b: &AuthListener) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Ordered set of auth listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<AuthListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<AuthListener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `listener`, replacing an earlier registration of the same one.
    pub fn add(&self, listener: &AuthListener) {
        let mut listeners = self.listeners();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.push(Arc::clone(listener));
    }

    pub fn remove(&self, listener: &AuthListener) {
        self.listeners().retain(|l| !same_listener(l, listener));
    }

    pub fn len(&self) -> usize {
        self.listeners().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every listener in registration order. The lock is released
    /// first, so a listener may (de)register listeners itself.
    pub fn notify(&self) {
        let snapshot: Vec<AuthListener> = self.listeners().clone();
        for listener in snapshot {
            listener();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener() -> (AuthListener, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let listener: AuthListener = Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (listener, count)
    }

    #[test]
    fn duplicate_registration_fires_once() {
        let registry = ListenerRegistry::new();
        let (listener, count) = counting_listener();

        registry.add(&listener);
        registry.add(&listener);
        registry.notify();

        assert_eq!(registry.len(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_closures_are_distinct_listeners() {
        let registry = ListenerRegistry::new();
        let (first, first_count) = counting_listener();
        let (second, second_count) = counting_listener();

        registry.add(&first);
        registry.add(&second);
        registry.notify();

        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_listener_is_not_notified() {
        let registry = ListenerRegistry::new();
        let (listener, count) = counting_listener();

        registry.add(&listener);
        registry.remove(&listener);
        registry.notify();

        assert!(registry.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn re_adding_moves_listener_to_the_end() {
        let registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let log_a = Arc::clone(&order);
        let a: AuthListener = Arc::new(move || log_a.lock().unwrap().push("a"));
        let log_b = Arc::clone(&order);
        let b: AuthListener = Arc::new(move || log_b.lock().unwrap().push("b"));

        registry.add(&a);
        registry.add(&b);
        registry.add(&a);
        registry.notify();

        assert_eq!(*order.lock().unwrap(), vec!["b", "a"]);
    }
}
