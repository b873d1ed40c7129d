//! Minimal single-threaded observable cells.

use std::cell::RefCell;
use std::rc::Rc;

/// Handle for removing a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(usize);

struct AtomInner<T> {
    value: RefCell<T>,
    subscribers: RefCell<Vec<(usize, Rc<dyn Fn(&T)>)>>,
    next_id: RefCell<usize>,
}

/// An observable value cell. Cloning an `Atom` clones the handle, not
/// the value; all clones share state and subscribers.
pub struct Atom<T> {
    inner: Rc<AtomInner<T>>,
}

impl<T> Clone for Atom<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Atom<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(AtomInner {
                value: RefCell::new(value),
                subscribers: RefCell::new(Vec::new()),
                next_id: RefCell::new(0),
            }),
        }
    }

    /// Clone the current value out.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Read through a borrow without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.notify();
    }

    /// Mutate in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.notify();
    }

    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> SubscriptionId {
        let mut next = self.inner.next_id.borrow_mut();
        let id = *next;
        *next += 1;
        self.inner.subscribers.borrow_mut().push((id, Rc::new(f)));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner
            .subscribers
            .borrow_mut()
            .retain(|(sid, _)| *sid != id.0);
    }

    /// Notify with a cloned value and a cloned callback list, so a
    /// callback reading (or even re-setting) this atom never trips over
    /// a live borrow.
    fn notify(&self) {
        let snapshot = self.get();
        let callbacks: Vec<Rc<dyn Fn(&T)>> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, f)| Rc::clone(f))
            .collect();
        for cb in callbacks {
            cb(&snapshot);
        }
    }
}

/// A derived cell: re-computes from its upstream atom on every change and
/// is itself observable. Dropping the `Computed` keeps the upstream
/// subscription alive for the life of the upstream atom; sessions own
/// their computed cells for their whole lifetime, so no teardown plumbing
/// exists.
pub struct Computed<T> {
    output: Atom<T>,
}

impl<T: Clone + 'static> Computed<T> {
    pub fn new<U: Clone + 'static>(upstream: &Atom<U>, derive: impl Fn(&U) -> T + 'static) -> Self {
        let output = Atom::new(upstream.with(&derive));
        let out = output.clone();
        upstream.subscribe(move |u| out.set(derive(u)));
        Self { output }
    }

    pub fn get(&self) -> T {
        self.output.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.output.with(f)
    }

    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> SubscriptionId {
        self.output.subscribe(f)
    }
}
