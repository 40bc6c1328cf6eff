//! Reactive Runtime
//!
//! This module provides the per-thread runtime that backs the observer system:
//! the active-computation registry, the observation switch, the next-tick hook
//! used by the scheduler, the warning sink, and the active configuration.
//!
//! ## Architecture
//!
//! 1. **Target Stack**: Tracks the computation currently collecting dependencies
//! 2. **Observation Switch**: Lets internal passes suspend wrapping of new values
//! 3. **Next Tick**: Schedules exactly one asynchronous flush per burst of mutations
//! 4. **Diagnostics**: Routes misuse warnings to `tracing` and an optional handler
//!
//! All state is confined to the thread that owns it. Reads and writes performed on
//! one thread never attribute dependencies to a computation running on another.
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_reactive::runtime::{set_next_tick, with_runtime};
//!
//! // In WASM environment
//! set_next_tick(|task| {
//!     wasm_bindgen_futures::spawn_local(async move { task() });
//! });
//!
//! assert!(with_runtime(|rt| rt.current_target()).is_none());
//! ```

use core::cell::{Cell, RefCell};

extern crate alloc;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::config::ReactiveConfig;
use crate::error::ReactiveError;
use crate::scheduler::{self, SchedulerState};
use crate::subscriber::Subscriber;

/// Task handed to the next-tick primitive
pub type Task = Box<dyn FnOnce() + 'static>;

type NextTickFn = Rc<dyn Fn(Task)>;
type WarnHandler = Rc<dyn Fn(&ReactiveError)>;
type FlushListener = Rc<dyn Fn()>;

/// Per-thread reactive runtime
///
/// This struct owns every piece of process-wide mutable state the observer system
/// relies on. It lives in thread-local storage and is reached through
/// [`with_runtime`].
pub struct Runtime {
	/// Computation currently collecting dependencies
	target: RefCell<Option<Rc<dyn Subscriber>>>,
	/// Previously active computations, restored by `pop_target`
	target_stack: RefCell<Vec<Option<Rc<dyn Subscriber>>>>,
	/// Whether `observe` may create new observers
	should_observe: Cell<bool>,
	config: RefCell<ReactiveConfig>,
	next_tick: RefCell<Option<NextTickFn>>,
	warn_handler: RefCell<Option<WarnHandler>>,
	pub(crate) flush_listener: RefCell<Option<FlushListener>>,
	pub(crate) scheduler: RefCell<SchedulerState>,
}

impl Runtime {
	/// Create a new Runtime instance
	pub fn new() -> Self {
		Self {
			target: RefCell::new(None),
			target_stack: RefCell::new(Vec::new()),
			should_observe: Cell::new(true),
			config: RefCell::new(ReactiveConfig::default()),
			next_tick: RefCell::new(None),
			warn_handler: RefCell::new(None),
			flush_listener: RefCell::new(None),
			scheduler: RefCell::new(SchedulerState::default()),
		}
	}

	/// Get the computation currently being evaluated
	pub fn current_target(&self) -> Option<Rc<dyn Subscriber>> {
		self.target.borrow().clone()
	}

	/// Whether a computation is currently collecting dependencies
	pub fn has_target(&self) -> bool {
		self.target.borrow().is_some()
	}

	/// Make `target` the active computation, remembering the previous one
	///
	/// Every call must be balanced by exactly one [`Runtime::pop_target`].
	/// Pushing `None` suspends tracking until the matching pop.
	pub fn push_target(&self, target: Option<Rc<dyn Subscriber>>) {
		let previous = self.target.replace(target);
		self.target_stack.borrow_mut().push(previous);
	}

	/// Restore the computation that was active before the last push
	pub fn pop_target(&self) -> Option<Rc<dyn Subscriber>> {
		let previous = self.target_stack.borrow_mut().pop().flatten();
		self.target.replace(previous)
	}

	/// Number of saved targets (for testing)
	pub fn target_depth(&self) -> usize {
		self.target_stack.borrow().len()
	}

	/// Whether `observe` is currently allowed to wrap new values
	pub fn should_observe(&self) -> bool {
		self.should_observe.get()
	}

	/// Enable or disable wrapping of new values
	pub fn set_observing(&self, value: bool) {
		self.should_observe.set(value);
	}

	/// Get a copy of the active configuration
	pub fn config(&self) -> ReactiveConfig {
		self.config.borrow().clone()
	}

	/// Replace the active configuration
	pub fn set_config(&self, config: ReactiveConfig) {
		*self.config.borrow_mut() = config;
	}

	/// Whether diagnostics (warnings, custom setters, circular guard) are enabled
	pub fn diagnostics(&self) -> bool {
		self.config.borrow().diagnostics
	}

	/// Whether the runtime is in one-shot server rendering mode
	pub fn is_server_rendering(&self) -> bool {
		self.config.borrow().server_rendering
	}

	/// Install the next-tick primitive used to schedule flushes
	pub fn set_next_tick(&self, next_tick: NextTickFn) {
		*self.next_tick.borrow_mut() = Some(next_tick);
	}

	/// Remove the next-tick primitive. Flushes must then be run manually.
	pub fn clear_next_tick(&self) {
		self.next_tick.borrow_mut().take();
	}

	/// Install a handler that receives every diagnostic
	pub fn set_warn_handler(&self, handler: WarnHandler) {
		*self.warn_handler.borrow_mut() = Some(handler);
	}

	/// Remove the diagnostic handler
	pub fn clear_warn_handler(&self) {
		self.warn_handler.borrow_mut().take();
	}

	/// Hand one flush to the next-tick primitive
	///
	/// If no primitive is installed, the flush must be run manually with
	/// [`scheduler::flush_scheduler_queue`]. This is the case in tests and
	/// in hosts that drive their own event loop.
	pub(crate) fn schedule_flush(&self) {
		let next_tick = self.next_tick.borrow().clone();
		match next_tick {
			Some(next_tick) => next_tick(Box::new(|| {
				// Diagnostics were already reported by the flush itself
				let _ = scheduler::flush_scheduler_queue();
			})),
			None => tracing::trace!("no next-tick installed; flush must be run manually"),
		}
	}

	/// Report a diagnostic when diagnostics are enabled
	pub(crate) fn warn(&self, error: &ReactiveError) {
		if !self.diagnostics() {
			return;
		}
		tracing::warn!(%error, "reactive diagnostic");
		let handler = self.warn_handler.borrow().clone();
		if let Some(handler) = handler {
			handler(error);
		}
	}
}

impl Default for Runtime {
	fn default() -> Self {
		Self::new()
	}
}

// Thread-local runtime instance
//
// In WASM, there is only one thread, so this effectively provides a global runtime.
// On non-WASM platforms, each thread gets its own runtime instance.
thread_local! {
	static RUNTIME: Runtime = Runtime::new();
}

/// Get a reference to the current thread's runtime
///
/// # Example
///
/// ```ignore
/// use reinhardt_reactive::runtime::with_runtime;
///
/// let tracking = with_runtime(|rt| rt.has_target());
/// ```
pub fn with_runtime<F, R>(f: F) -> R
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.with(f)
}

/// Try to access the runtime (safe version for Drop implementations)
///
/// Returns None if the thread-local storage has been destroyed.
pub fn try_with_runtime<F, R>(f: F) -> Option<R>
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.try_with(f).ok()
}

/// Make `target` the active computation. See [`Runtime::push_target`].
pub fn push_target(target: Option<Rc<dyn Subscriber>>) {
	with_runtime(|rt| rt.push_target(target));
}

/// Restore the previously active computation. See [`Runtime::pop_target`].
pub fn pop_target() {
	with_runtime(|rt| {
		rt.pop_target();
	});
}

/// Get the computation currently collecting dependencies
pub fn current_target() -> Option<Rc<dyn Subscriber>> {
	with_runtime(|rt| rt.current_target())
}

/// Whether a computation is currently collecting dependencies
pub fn has_target() -> bool {
	with_runtime(|rt| rt.has_target())
}

/// Run `f` with dependency tracking suspended
///
/// Reads performed inside `f` are not attributed to the active computation.
pub fn untracked<F, R>(f: F) -> R
where
	F: FnOnce() -> R,
{
	push_target(None);
	let result = f();
	pop_target();
	result
}

/// Enable or disable wrapping of new values by `observe`
///
/// Existing observers keep working while observation is disabled.
pub fn toggle_observing(value: bool) {
	with_runtime(|rt| rt.set_observing(value));
}

/// Whether `observe` is currently allowed to wrap new values
pub fn should_observe() -> bool {
	with_runtime(|rt| rt.should_observe())
}

/// Install `config` on the current thread's runtime
pub fn configure(config: ReactiveConfig) {
	with_runtime(|rt| rt.set_config(config));
}

/// Get a copy of the current thread's configuration
pub fn config() -> ReactiveConfig {
	with_runtime(|rt| rt.config())
}

/// Set the next-tick primitive used to schedule flushes.
///
/// The primitive must run the task once, after the current synchronous work.
///
/// # Example
///
/// ```ignore
/// reinhardt_reactive::runtime::set_next_tick(|task| {
///     tokio::task::spawn_local(async move { task() });
/// });
/// ```
pub fn set_next_tick<F>(next_tick: F)
where
	F: Fn(Task) + 'static,
{
	with_runtime(|rt| rt.set_next_tick(Rc::new(next_tick)));
}

/// Remove the next-tick primitive
pub fn clear_next_tick() {
	with_runtime(|rt| rt.clear_next_tick());
}

/// Install a handler that receives every diagnostic while diagnostics are enabled
pub fn set_warn_handler<F>(handler: F)
where
	F: Fn(&ReactiveError) + 'static,
{
	with_runtime(|rt| rt.set_warn_handler(Rc::new(handler)));
}

/// Remove the diagnostic handler
pub fn clear_warn_handler() {
	with_runtime(|rt| rt.clear_warn_handler());
}

pub(crate) fn warn(error: ReactiveError) {
	with_runtime(|rt| rt.warn(&error));
}
