//! Subscriber and Owner interfaces
//!
//! The observer system does not define what a computation *is*. It consumes
//! anything implementing [`Subscriber`]: a unit of reactive work with a stable
//! identity, a re-evaluation routine, and an optional [`Owner`] that receives
//! lifecycle hooks after a flush. [`crate::watcher::Watcher`] is the bundled
//! implementation.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

extern crate alloc;
use alloc::rc::Rc;
use alloc::string::String;

use crate::dep::Dep;

/// Identity of a subscriber.
///
/// Ids are handed out in creation order. The scheduler relies on that order:
/// parents are created before children, and an owner's auxiliary computations
/// are created before its primary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(usize);

impl SubscriberId {
	/// Allocate the next id
	pub fn new() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(1);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}

	/// Wrap a raw id chosen by the caller.
	///
	/// Callers mixing raw ids with [`SubscriberId::new`] are responsible for
	/// keeping them unique.
	pub const fn from_raw(raw: usize) -> Self {
		Self(raw)
	}

	pub const fn as_raw(self) -> usize {
		self.0
	}
}

impl Default for SubscriberId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for SubscriberId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Lifecycle notifications delivered to an [`Owner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleHook {
	/// The owner's primary computation re-ran during a flush
	Updated,
	/// The owner was re-attached to a live tree
	Activated,
}

/// The component-like owner of one or more subscribers
pub trait Owner {
	/// Whether the owner completed its first run
	fn is_mounted(&self) -> bool;

	/// Flag the owner as part of an inactive (kept-alive) subtree
	fn set_inactive(&self, inactive: bool);

	/// The id of the computation that produces this owner's output
	fn primary_subscriber(&self) -> Option<SubscriberId>;

	/// Activation collaborator, run once the whole tree has been patched
	fn activate(&self);

	/// Invoke a lifecycle hook
	fn call_hook(&self, hook: LifecycleHook);
}

/// A unit of reactive work
pub trait Subscriber {
	/// Unique, creation-ordered identity
	fn id(&self) -> SubscriberId;

	/// Record that `dep` was read during the current tracking pass.
	///
	/// Implementations must ignore channels already recorded in this pass and
	/// call [`Dep::add_sub`] only for channels they were not subscribed to.
	fn add_dep(&self, dep: &Rc<Dep>);

	/// Called by a channel on notify; usually hands itself to
	/// [`crate::scheduler::queue_watcher`]
	fn update(&self);

	/// Re-evaluate and re-collect dependencies
	fn run(&self);

	/// Hook run by the scheduler right before [`Subscriber::run`]
	fn before(&self) {}

	/// Whether this is a user-authored watcher (affects diagnostics only)
	fn is_user(&self) -> bool {
		false
	}

	/// Human-readable description used in diagnostics
	fn expression(&self) -> Option<String> {
		None
	}

	fn owner(&self) -> Option<Rc<dyn Owner>> {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serial_test::serial;

	#[test]
	#[serial]
	fn test_subscriber_id_monotonic() {
		let id1 = SubscriberId::new();
		let id2 = SubscriberId::new();
		let id3 = SubscriberId::new();

		assert!(id1 < id2);
		assert!(id2 < id3);
	}

	#[test]
	fn test_subscriber_id_raw_roundtrip() {
		let id = SubscriberId::from_raw(10);
		assert_eq!(id.as_raw(), 10);
		assert_eq!(id.to_string(), "#10");
	}
}
