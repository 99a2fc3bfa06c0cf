//! Synchronous publish/subscribe primitive used for every output stream
//! (position, heading, step_count, path_changed) and for sensor ingress.
//!
//! Dispatch is a synchronous fan-out over a plain `Vec` of closures — there
//! is no async runtime underneath this, matching the single-threaded
//! cooperative scheduling model the engine assumes. A `Subject<T>` also
//! caches the most recently published value so a subscriber registered
//! after publication has already begun still sees the latest one
//! immediately, mirroring `BehaviorSubject` semantics.

pub struct Subject<T: Clone> {
    latest: Option<T>,
    subscribers: Vec<Box<dyn FnMut(&T)>>,
}

impl<T: Clone> Subject<T> {
    pub fn new() -> Self {
        Subject {
            latest: None,
            subscribers: Vec::new(),
        }
    }

    /// Registers a subscriber. If a value has already been published, the
    /// subscriber is invoked immediately with the latest one.
    pub fn subscribe(&mut self, mut f: impl FnMut(&T) + 'static) {
        if let Some(value) = &self.latest {
            f(value);
        }
        self.subscribers.push(Box::new(f));
    }

    /// Publishes a new value: caches it, then fans it out to every
    /// subscriber in registration order.
    pub fn publish(&mut self, value: T) {
        for sub in self.subscribers.iter_mut() {
            sub(&value);
        }
        self.latest = Some(value);
    }

    pub fn latest(&self) -> Option<&T> {
        self.latest.as_ref()
    }

    /// Clears the cached latest value without touching subscribers. Used by
    /// ingress on stop, so a subsequent start begins from a clean slate.
    pub fn clear_latest(&mut self) {
        self.latest = None;
    }

    pub fn close(&mut self) {
        self.subscribers.clear();
    }
}

impl<T: Clone> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn late_subscriber_gets_latest_value() {
        let mut subject: Subject<i32> = Subject::new();
        subject.publish(7);

        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        subject.subscribe(move |v| *seen2.borrow_mut() = Some(*v));

        assert_eq!(*seen.borrow(), Some(7));
    }

    #[test]
    fn publish_fans_out_to_all_subscribers_in_order() {
        let mut subject: Subject<i32> = Subject::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o1 = order.clone();
        subject.subscribe(move |v| o1.borrow_mut().push(("a", *v)));
        let o2 = order.clone();
        subject.subscribe(move |v| o2.borrow_mut().push(("b", *v)));

        subject.publish(1);
        assert_eq!(*order.borrow(), vec![("a", 1), ("b", 1)]);
    }

    #[test]
    fn clear_latest_does_not_notify() {
        let mut subject: Subject<i32> = Subject::new();
        subject.publish(5);
        subject.clear_latest();
        assert!(subject.latest().is_none());
    }
}
