//! Synchronous notification channels.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Handle returned when a listener is attached; used to detach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

type Listener<T> = Rc<dyn Fn(&T)>;

/// Ordered list of listeners invoked synchronously on [`emit`](Self::emit).
///
/// Listeners may attach or detach other listeners while an emission is in
/// progress; the emission works on a snapshot taken before the first call.
pub struct Emitter<T> {
	listeners: RefCell<Vec<(ListenerId, Listener<T>)>>,
	next_id: Cell<u64>,
}

impl<T> Default for Emitter<T> {
	fn default() -> Self {
		Self {
			listeners: RefCell::new(Vec::new()),
			next_id: Cell::new(0),
		}
	}
}

impl<T> fmt::Debug for Emitter<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Emitter")
			.field("listeners", &self.listeners.borrow().len())
			.finish()
	}
}

impl<T> Emitter<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Attaches a listener.
	pub fn add_listener(&self, listener: impl Fn(&T) + 'static) -> ListenerId {
		let id = ListenerId(self.next_id.get());
		self.next_id.set(id.0 + 1);
		self.listeners.borrow_mut().push((id, Rc::new(listener)));
		id
	}

	/// Detaches a listener. Returns false if it was not attached.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		let mut listeners = self.listeners.borrow_mut();
		let before = listeners.len();
		listeners.retain(|(lid, _)| *lid != id);
		listeners.len() != before
	}

	pub fn listener_count(&self) -> usize {
		self.listeners.borrow().len()
	}

	/// Calls every listener in attachment order.
	pub fn emit(&self, value: &T) {
		let snapshot: Vec<Listener<T>> = self
			.listeners
			.borrow()
			.iter()
			.map(|(_, l)| Rc::clone(l))
			.collect();
		for listener in snapshot {
			listener(value);
		}
	}

	pub fn dispose(&self) {
		self.listeners.borrow_mut().clear();
	}
}

/// Observable value that emits `(new, old)` when it changes.
pub struct Property<T> {
	value: RefCell<T>,
	changed: Emitter<(T, T)>,
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Property")
			.field("value", &self.value.borrow())
			.finish()
	}
}

impl<T: Clone + PartialEq> Property<T> {
	pub fn new(value: T) -> Self {
		Self {
			value: RefCell::new(value),
			changed: Emitter::new(),
		}
	}

	pub fn get(&self) -> T {
		self.value.borrow().clone()
	}

	/// Stores `value`, notifying listeners only if it differs.
	pub fn set(&self, value: T) {
		let old = self.value.replace(value.clone());
		if old != value {
			self.changed.emit(&(value, old));
		}
	}

	/// Attaches a `(new, old)` change listener.
	pub fn link(&self, listener: impl Fn(&T, &T) + 'static) -> ListenerId {
		self.changed.add_listener(move |(new, old)| listener(new, old))
	}

	pub fn unlink(&self, id: ListenerId) -> bool {
		self.changed.remove_listener(id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_emit_in_attachment_order() {
		let emitter = Emitter::<u32>::new();
		let log = Rc::new(RefCell::new(Vec::new()));
		let a = Rc::clone(&log);
		emitter.add_listener(move |v| a.borrow_mut().push(("a", *v)));
		let b = Rc::clone(&log);
		emitter.add_listener(move |v| b.borrow_mut().push(("b", *v)));

		emitter.emit(&7);
		assert_eq!(*log.borrow(), vec![("a", 7), ("b", 7)]);
	}

	#[test]
	fn test_remove_listener() {
		let emitter = Emitter::<()>::new();
		let hits = Rc::new(Cell::new(0));
		let h = Rc::clone(&hits);
		let id = emitter.add_listener(move |_| h.set(h.get() + 1));
		emitter.emit(&());
		assert!(emitter.remove_listener(id));
		assert!(!emitter.remove_listener(id));
		emitter.emit(&());
		assert_eq!(hits.get(), 1);
	}

	#[test]
	fn test_property_only_notifies_on_change() {
		let count = Property::new(0usize);
		let seen = Rc::new(RefCell::new(Vec::new()));
		let s = Rc::clone(&seen);
		count.link(move |new, old| s.borrow_mut().push((*new, *old)));
		count.set(0);
		count.set(2);
		count.set(2);
		count.set(1);
		assert_eq!(*seen.borrow(), vec![(2, 0), (1, 2)]);
	}
}
