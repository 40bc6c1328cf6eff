//! Dependency channels
//!
//! A [`Dep`] exists for every tracked property and for every observed
//! container. It holds the subscribers that read it during their last run and
//! tells them when the value behind it changes.

use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

extern crate alloc;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;

use crate::runtime::current_target;
use crate::subscriber::{Subscriber, SubscriberId};

/// Identity of a dependency channel. Used for dedup only, never for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepId(usize);

impl DepId {
	fn next() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

/// A per-property (or per-container) change broadcaster
///
/// Subscribers are held weakly: a computation that is dropped stops receiving
/// notifications without having to unsubscribe first.
pub struct Dep {
	id: DepId,
	subs: RefCell<Vec<(SubscriberId, Weak<dyn Subscriber>)>>,
}

impl Dep {
	pub fn new() -> Rc<Self> {
		Rc::new(Self {
			id: DepId::next(),
			subs: RefCell::new(Vec::new()),
		})
	}

	pub fn id(&self) -> DepId {
		self.id
	}

	/// Append a subscriber. Duplicate suppression is the caller's job.
	pub fn add_sub(&self, sub: Weak<dyn Subscriber>) {
		if let Some(strong) = sub.upgrade() {
			self.subs.borrow_mut().push((strong.id(), sub));
		}
	}

	/// Remove the first subscription held by `id`
	pub fn remove_sub(&self, id: SubscriberId) {
		let mut subs = self.subs.borrow_mut();
		if let Some(pos) = subs.iter().position(|(sub_id, _)| *sub_id == id) {
			subs.remove(pos);
		}
	}

	/// Register this channel with the active computation, if any
	pub fn depend(self: &Rc<Self>) {
		if let Some(target) = current_target() {
			target.add_dep(self);
		}
	}

	/// Tell every subscriber, in subscription order, that the value changed
	///
	/// Works on a snapshot so subscribers may subscribe or unsubscribe while
	/// being notified.
	pub fn notify(&self) {
		let subs: Vec<Rc<dyn Subscriber>> = {
			let mut subs = self.subs.borrow_mut();
			subs.retain(|(_, sub)| sub.strong_count() > 0);
			subs.iter().filter_map(|(_, sub)| sub.upgrade()).collect()
		};
		for sub in subs {
			sub.update();
		}
	}

	/// Ids of live subscribers, in subscription order
	pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
		self.subs
			.borrow()
			.iter()
			.filter(|(_, sub)| sub.strong_count() > 0)
			.map(|(id, _)| *id)
			.collect()
	}

	/// Number of live subscribers
	pub fn subscriber_count(&self) -> usize {
		self.subs
			.borrow()
			.iter()
			.filter(|(_, sub)| sub.strong_count() > 0)
			.count()
	}
}

impl fmt::Debug for Dep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Dep")
			.field("id", &self.id)
			.field("subscribers", &self.subscriber_ids())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::runtime::{pop_target, push_target};
	use core::cell::Cell;
	use serial_test::serial;

	struct Counter {
		id: SubscriberId,
		this: Weak<Counter>,
		updates: Cell<usize>,
	}

	impl Counter {
		fn new() -> Rc<Self> {
			Rc::new_cyclic(|this| Self {
				id: SubscriberId::new(),
				this: this.clone(),
				updates: Cell::new(0),
			})
		}
	}

	impl Subscriber for Counter {
		fn id(&self) -> SubscriberId {
			self.id
		}
		fn add_dep(&self, dep: &Rc<Dep>) {
			let this: Weak<dyn Subscriber> = self.this.clone();
			dep.add_sub(this);
		}
		fn update(&self) {
			self.updates.set(self.updates.get() + 1);
		}
		fn run(&self) {}
	}

	#[test]
	#[serial]
	fn test_dep_ids_unique() {
		let a = Dep::new();
		let b = Dep::new();
		assert_ne!(a.id(), b.id());
	}

	#[test]
	#[serial]
	fn test_depend_without_target_is_noop() {
		let dep = Dep::new();
		dep.depend();
		assert_eq!(dep.subscriber_count(), 0);
	}

	#[test]
	#[serial]
	fn test_depend_registers_active_target() {
		let dep = Dep::new();
		let counter = Counter::new();

		push_target(Some(counter.clone() as Rc<dyn Subscriber>));
		dep.depend();
		pop_target();

		assert_eq!(dep.subscriber_ids(), vec![counter.id()]);
	}

	#[test]
	#[serial]
	fn test_notify_reaches_every_subscriber_in_order() {
		let dep = Dep::new();
		let first = Counter::new();
		let second = Counter::new();
		first.add_dep(&dep);
		second.add_dep(&dep);

		dep.notify();

		assert_eq!(first.updates.get(), 1);
		assert_eq!(second.updates.get(), 1);
		assert_eq!(dep.subscriber_ids(), vec![first.id(), second.id()]);
	}

	#[test]
	#[serial]
	fn test_remove_sub() {
		let dep = Dep::new();
		let counter = Counter::new();
		counter.add_dep(&dep);

		dep.remove_sub(counter.id());
		dep.notify();

		assert_eq!(counter.updates.get(), 0);
		assert_eq!(dep.subscriber_count(), 0);
	}

	#[test]
	#[serial]
	fn test_dropped_subscriber_is_pruned() {
		let dep = Dep::new();
		{
			let counter = Counter::new();
			counter.add_dep(&dep);
			assert_eq!(dep.subscriber_count(), 1);
		}
		dep.notify();
		assert_eq!(dep.subscriber_count(), 0);
	}
}
