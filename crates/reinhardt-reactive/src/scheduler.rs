//! Update scheduler
//!
//! Subscribers dirtied during one synchronous burst are collected here and run
//! together in a single flush, handed to the next-tick primitive the first
//! time something is queued.
//!
//! ## Ordering
//!
//! The queue is sorted by subscriber id before flushing. Ids follow creation
//! order, so:
//!
//! 1. Parents update before their children.
//! 2. An owner's auxiliary watchers run before its primary computation.
//!
//! Subscribers queued while a flush is running are spliced into the unprocessed
//! part of the queue at their id position, so they still run in this flush.
//!
//! ## Lifecycle hooks
//!
//! After the queue drains, activated owners receive their activation hook in
//! queue order, then owners whose primary computation ran receive
//! [`LifecycleHook::Updated`] in reverse order.

use core::mem;

extern crate alloc;
use alloc::rc::Rc;
use alloc::vec::Vec;
use std::collections::{HashMap, HashSet};

use crate::error::ReactiveError;
use crate::runtime::{self, with_runtime};
use crate::subscriber::{LifecycleHook, Owner, Subscriber, SubscriberId};

/// Default number of times one subscriber may re-queue itself within a flush
pub const MAX_UPDATE_COUNT: usize = 100;

/// Queue state, reset after every flush
#[derive(Default)]
pub(crate) struct SchedulerState {
	queue: Vec<Rc<dyn Subscriber>>,
	activated_children: Vec<Rc<dyn Owner>>,
	has: HashSet<SubscriberId>,
	circular: HashMap<SubscriberId, usize>,
	/// A flush has been handed to the next-tick primitive
	waiting: bool,
	flushing: bool,
	/// Flush cursor
	index: usize,
}

impl SchedulerState {
	fn reset(&mut self) {
		self.queue.clear();
		self.activated_children.clear();
		self.has.clear();
		self.circular.clear();
		self.waiting = false;
		self.flushing = false;
		self.index = 0;
	}

	/// Position for a subscriber queued mid-flush: after every queued entry
	/// with a smaller or equal id, never before the cursor
	fn insert_position(&self, id: SubscriberId) -> usize {
		let mut i = self.queue.len();
		while i > self.index + 1 && self.queue[i - 1].id() > id {
			i -= 1;
		}
		i
	}
}

/// Queue `watcher` for the next flush.
///
/// A subscriber already waiting in the queue is not added again, so it runs
/// once per flush against its latest state.
pub fn queue_watcher(watcher: Rc<dyn Subscriber>) {
	let id = watcher.id();
	let schedule = with_runtime(|rt| {
		let mut state = rt.scheduler.borrow_mut();
		if !state.has.insert(id) {
			return false;
		}
		if state.flushing {
			let position = state.insert_position(id);
			state.queue.insert(position, watcher);
		} else {
			state.queue.push(watcher);
		}
		tracing::trace!(subscriber = %id, queued = state.queue.len(), "subscriber queued");
		!mem::replace(&mut state.waiting, true)
	});
	if schedule {
		with_runtime(|rt| rt.schedule_flush());
	}
}

/// Queue an owner re-attached during a patch.
///
/// It is marked active right away, so rendering can rely on the flag, and
/// receives its activation hook once the whole tree has been flushed.
pub fn queue_activated_component(owner: Rc<dyn Owner>) {
	owner.set_inactive(false);
	with_runtime(|rt| rt.scheduler.borrow_mut().activated_children.push(owner));
}

/// Run every queued subscriber, then the post-flush lifecycle hooks.
///
/// Called by the next-tick primitive, or directly when none is installed.
/// With diagnostics enabled, a subscriber that re-queues itself more than
/// `max_update_count` times aborts the loop; the rest of the queue is
/// dropped, the hooks still run, and the diagnostic is returned.
pub fn flush_scheduler_queue() -> Result<(), ReactiveError> {
	let config = runtime::config();
	let started = with_runtime(|rt| {
		let mut state = rt.scheduler.borrow_mut();
		if state.flushing {
			return false;
		}
		state.flushing = true;
		state.queue.sort_by_key(|watcher| watcher.id());
		tracing::debug!(queued = state.queue.len(), "flush started");
		true
	});
	if !started {
		return Ok(());
	}

	let mut outcome = Ok(());
	let mut index = 0;
	loop {
		let next = with_runtime(|rt| {
			let mut state = rt.scheduler.borrow_mut();
			state.index = index;
			state.queue.get(index).cloned()
		});
		let Some(watcher) = next else {
			break;
		};

		watcher.before();
		let id = watcher.id();
		with_runtime(|rt| rt.scheduler.borrow_mut().has.remove(&id));
		watcher.run();

		if config.diagnostics {
			let count = with_runtime(|rt| {
				let mut state = rt.scheduler.borrow_mut();
				if !state.has.contains(&id) {
					return 0;
				}
				let count = state.circular.entry(id).or_insert(0);
				*count += 1;
				*count
			});
			if count > config.max_update_count {
				let error = ReactiveError::InfiniteUpdateLoop {
					id,
					user: watcher.is_user(),
					expression: watcher.expression(),
				};
				runtime::warn(error.clone());
				outcome = Err(error);
				break;
			}
		}
		index += 1;
	}

	let (activated_queue, updated_queue) = with_runtime(|rt| {
		let mut state = rt.scheduler.borrow_mut();
		let activated = mem::take(&mut state.activated_children);
		let updated = mem::take(&mut state.queue);
		state.reset();
		(activated, updated)
	});
	tracing::debug!(
		ran = index,
		activated = activated_queue.len(),
		"flush finished"
	);

	call_activated_hooks(&activated_queue);
	call_updated_hooks(&updated_queue);

	if config.devtools {
		let listener = with_runtime(|rt| rt.flush_listener.borrow().clone());
		if let Some(listener) = listener {
			listener();
		}
	}

	outcome
}

fn call_activated_hooks(queue: &[Rc<dyn Owner>]) {
	for owner in queue {
		owner.set_inactive(true);
		owner.activate();
	}
}

fn call_updated_hooks(queue: &[Rc<dyn Subscriber>]) {
	for watcher in queue.iter().rev() {
		let Some(owner) = watcher.owner() else {
			continue;
		};
		if owner.primary_subscriber() == Some(watcher.id()) && owner.is_mounted() {
			owner.call_hook(LifecycleHook::Updated);
		}
	}
}

/// Install a listener for the "flush" signal (delivered while `devtools` is on)
pub fn set_flush_listener<F>(listener: F)
where
	F: Fn() + 'static,
{
	with_runtime(|rt| *rt.flush_listener.borrow_mut() = Some(Rc::new(listener)));
}

pub fn clear_flush_listener() {
	with_runtime(|rt| {
		rt.flush_listener.borrow_mut().take();
	});
}

/// Whether a flush has been scheduled and not yet completed
pub fn is_flush_pending() -> bool {
	with_runtime(|rt| rt.scheduler.borrow().waiting)
}

pub fn is_flushing() -> bool {
	with_runtime(|rt| rt.scheduler.borrow().flushing)
}

/// Ids currently in the queue, in queue order
pub fn queued_ids() -> Vec<SubscriberId> {
	with_runtime(|rt| {
		rt.scheduler
			.borrow()
			.queue
			.iter()
			.map(|watcher| watcher.id())
			.collect()
	})
}
