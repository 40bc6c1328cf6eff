//! Watcher - Reactive Computations
//!
//! `Watcher` is the bundled [`Subscriber`]: a computation that records every
//! tracked property and container it reads, re-runs when one of them changes,
//! and hands its new and previous results to an optional callback.
//!
//! ## Key Features
//!
//! - **Automatic Dependency Tracking**: reads performed by the getter register the watcher
//! - **Dependency Cleanup**: channels not read during the latest run are unsubscribed
//! - **Batched Re-execution**: updates go through the scheduler unless the watcher is `sync`
//! - **Lazy Evaluation**: `lazy` watchers only mark themselves dirty, computed-style
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_reactive::{Object, Value, Watcher, WatcherOptions, observe};
//!
//! let state = Object::from_entries([("count", 0)]);
//! observe(&Value::from(state.clone()), true);
//!
//! let source = state.clone();
//! let watcher = Watcher::with_callback(
//!     move || source.get("count"),
//!     |new, old| println!("count: {old:?} -> {new:?}"),
//!     WatcherOptions::default().with_sync(true),
//! );
//!
//! state.set("count", 1); // Prints: "count: Number(0) -> Number(1)"
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;

extern crate alloc;
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use std::collections::HashSet;

use crate::dep::{Dep, DepId};
use crate::runtime::{has_target, pop_target, push_target};
use crate::scheduler::queue_watcher;
use crate::subscriber::{Owner, Subscriber, SubscriberId};
use crate::value::{PropertyKey, Value};

/// Type alias for watcher getters
type GetterFn = Box<dyn FnMut() -> Value + 'static>;

/// Type alias for change callbacks, invoked with `(new, old)`
type CallbackFn = Box<dyn FnMut(&Value, &Value) + 'static>;

/// Options controlling how a [`Watcher`] reacts to changes
#[derive(Clone, Default)]
pub struct WatcherOptions {
	/// User-authored watcher; reported as such in loop diagnostics
	pub user: bool,
	/// Mark dirty on change instead of re-running
	pub lazy: bool,
	/// Re-run inline on change, bypassing the scheduler
	pub sync: bool,
	/// Also read every nested property of the result
	pub deep: bool,
	/// Called by the scheduler right before this watcher runs
	pub before: Option<Rc<dyn Fn()>>,
	/// Source expression, for diagnostics
	pub expression: Option<String>,
	pub owner: Option<Rc<dyn Owner>>,
}

impl WatcherOptions {
	pub fn with_user(mut self, user: bool) -> Self {
		self.user = user;
		self
	}

	pub fn with_lazy(mut self, lazy: bool) -> Self {
		self.lazy = lazy;
		self
	}

	pub fn with_sync(mut self, sync: bool) -> Self {
		self.sync = sync;
		self
	}

	pub fn with_deep(mut self, deep: bool) -> Self {
		self.deep = deep;
		self
	}

	pub fn with_before<F>(mut self, before: F) -> Self
	where
		F: Fn() + 'static,
	{
		self.before = Some(Rc::new(before));
		self
	}

	pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
		self.expression = Some(expression.into());
		self
	}

	pub fn with_owner(mut self, owner: Rc<dyn Owner>) -> Self {
		self.owner = Some(owner);
		self
	}
}

impl fmt::Debug for WatcherOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WatcherOptions")
			.field("user", &self.user)
			.field("lazy", &self.lazy)
			.field("sync", &self.sync)
			.field("deep", &self.deep)
			.field("before", &self.before.is_some())
			.field("expression", &self.expression)
			.field("owner", &self.owner.is_some())
			.finish()
	}
}

/// A reactive computation
///
/// Watchers are always handled through `Rc`; the constructors return one.
/// A non-lazy watcher evaluates its getter once on creation.
///
/// Dropping the last `Rc` stops all notifications, since channels hold their
/// subscribers weakly. [`Watcher::teardown`] does the same eagerly.
pub struct Watcher {
	id: SubscriberId,
	this: Weak<Watcher>,
	getter: RefCell<GetterFn>,
	callback: RefCell<Option<CallbackFn>>,
	options: WatcherOptions,
	value: RefCell<Value>,
	active: Cell<bool>,
	dirty: Cell<bool>,
	/// Channels read during the previous run
	deps: RefCell<Vec<Rc<Dep>>>,
	dep_ids: RefCell<HashSet<DepId>>,
	/// Channels read during the current run
	new_deps: RefCell<Vec<Rc<Dep>>>,
	new_dep_ids: RefCell<HashSet<DepId>>,
}

impl Watcher {
	/// Create a watcher without a change callback
	pub fn new<G>(getter: G, options: WatcherOptions) -> Rc<Self>
	where
		G: FnMut() -> Value + 'static,
	{
		Self::build(Box::new(getter), None, options)
	}

	/// Create a watcher whose callback receives `(new, old)` after each
	/// re-run that produced a different value (or any object or array)
	pub fn with_callback<G, C>(getter: G, callback: C, options: WatcherOptions) -> Rc<Self>
	where
		G: FnMut() -> Value + 'static,
		C: FnMut(&Value, &Value) + 'static,
	{
		Self::build(Box::new(getter), Some(Box::new(callback)), options)
	}

	/// Watch a dotted path such as `"user.address.city"` below `root`.
	///
	/// Segments address object keys or array indices. A path that runs into a
	/// primitive reads as `Undefined`. The path is recorded as the watcher's
	/// expression.
	pub fn watch_path<C>(root: &Value, path: &str, callback: C, options: WatcherOptions) -> Rc<Self>
	where
		C: FnMut(&Value, &Value) + 'static,
	{
		let root = root.clone();
		let segments: Vec<String> = path.split('.').map(String::from).collect();
		let options = WatcherOptions {
			expression: Some(path.into()),
			..options
		};
		Self::with_callback(move || read_path(&root, &segments), callback, options)
	}

	fn build(getter: GetterFn, callback: Option<CallbackFn>, options: WatcherOptions) -> Rc<Self> {
		let lazy = options.lazy;
		let watcher = Rc::new_cyclic(|this| Self {
			id: SubscriberId::new(),
			this: this.clone(),
			getter: RefCell::new(getter),
			callback: RefCell::new(callback),
			options,
			value: RefCell::new(Value::Undefined),
			active: Cell::new(true),
			dirty: Cell::new(lazy),
			deps: RefCell::new(Vec::new()),
			dep_ids: RefCell::new(HashSet::new()),
			new_deps: RefCell::new(Vec::new()),
			new_dep_ids: RefCell::new(HashSet::new()),
		});
		if !lazy {
			let value = watcher.get();
			watcher.value.replace(value);
		}
		tracing::trace!(watcher = %watcher.id, lazy, "watcher created");
		watcher
	}

	/// Evaluate the getter with this watcher as the active target, then drop
	/// subscriptions to every channel the getter no longer reads.
	pub fn get(&self) -> Value {
		let Some(this) = self.this.upgrade() else {
			return Value::Undefined;
		};
		let this: Rc<dyn Subscriber> = this;
		push_target(Some(this));
		let value = match self.getter.try_borrow_mut() {
			Ok(mut getter) => getter(),
			Err(_) => {
				// The outer pass still owns the pending dependency set
				tracing::warn!(watcher = %self.id, "watcher getter re-entered itself; keeping previous value");
				pop_target();
				return self.value.borrow().clone();
			}
		};
		if self.options.deep {
			traverse(&value, &mut HashSet::new());
		}
		pop_target();
		self.cleanup_deps();
		value
	}

	fn cleanup_deps(&self) {
		{
			let new_dep_ids = self.new_dep_ids.borrow();
			for dep in self.deps.borrow().iter() {
				if !new_dep_ids.contains(&dep.id()) {
					dep.remove_sub(self.id);
				}
			}
		}
		self.dep_ids.swap(&self.new_dep_ids);
		self.new_dep_ids.borrow_mut().clear();
		self.deps.swap(&self.new_deps);
		self.new_deps.borrow_mut().clear();
	}

	/// Recompute a lazy watcher's value and clear its dirty flag
	pub fn evaluate(&self) {
		let value = self.get();
		self.value.replace(value);
		self.dirty.set(false);
	}

	/// Register every channel this watcher depends on with the active target
	pub fn depend(&self) {
		let deps = self.deps.borrow().clone();
		for dep in &deps {
			dep.depend();
		}
	}

	/// Read the watcher the way a computed property is read: re-evaluate if
	/// dirty, forward its dependencies to the active target, return the value.
	pub fn computed(&self) -> Value {
		if self.dirty.get() {
			self.evaluate();
		}
		if has_target() {
			self.depend();
		}
		self.value()
	}

	/// Unsubscribe from every channel and stop reacting
	pub fn teardown(&self) {
		if !self.active.replace(false) {
			return;
		}
		for dep in self.deps.borrow().iter() {
			dep.remove_sub(self.id);
		}
		tracing::trace!(watcher = %self.id, "watcher torn down");
	}

	/// Last computed value
	pub fn value(&self) -> Value {
		self.value.borrow().clone()
	}

	pub fn is_dirty(&self) -> bool {
		self.dirty.get()
	}

	pub fn is_active(&self) -> bool {
		self.active.get()
	}

	pub fn options(&self) -> &WatcherOptions {
		&self.options
	}

	/// Ids of the channels read during the latest run
	pub fn dep_ids(&self) -> Vec<DepId> {
		self.deps.borrow().iter().map(|dep| dep.id()).collect()
	}
}

impl Subscriber for Watcher {
	fn id(&self) -> SubscriberId {
		self.id
	}

	fn add_dep(&self, dep: &Rc<Dep>) {
		let id = dep.id();
		if !self.new_dep_ids.borrow_mut().insert(id) {
			return;
		}
		self.new_deps.borrow_mut().push(dep.clone());
		if !self.dep_ids.borrow().contains(&id) {
			let this: Weak<dyn Subscriber> = self.this.clone();
			dep.add_sub(this);
		}
	}

	fn update(&self) {
		if self.options.lazy {
			self.dirty.set(true);
		} else if self.options.sync {
			self.run();
		} else if let Some(this) = self.this.upgrade() {
			queue_watcher(this);
		}
	}

	fn run(&self) {
		if !self.active.get() {
			return;
		}
		let value = self.get();
		let old = self.value.borrow().clone();
		if !value.same_value(&old) || value.is_object_like() || self.options.deep {
			self.value.replace(value.clone());
			match self.callback.try_borrow_mut() {
				Ok(mut callback) => {
					if let Some(callback) = callback.as_mut() {
						callback(&value, &old);
					}
				}
				Err(_) => {
					tracing::warn!(watcher = %self.id, "watcher callback re-entered itself; skipped");
				}
			}
		}
	}

	fn before(&self) {
		if let Some(before) = &self.options.before {
			before();
		}
	}

	fn is_user(&self) -> bool {
		self.options.user
	}

	fn expression(&self) -> Option<String> {
		self.options.expression.clone()
	}

	fn owner(&self) -> Option<Rc<dyn Owner>> {
		self.options.owner.clone()
	}
}

impl fmt::Debug for Watcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Watcher")
			.field("id", &self.id)
			.field("active", &self.active.get())
			.field("dirty", &self.dirty.get())
			.field("deps", &self.deps.borrow().len())
			.finish()
	}
}

fn read_path(root: &Value, segments: &[String]) -> Value {
	let mut current = root.clone();
	for segment in segments {
		current = match &current {
			Value::Object(obj) => obj.get(segment),
			Value::Array(arr) => match PropertyKey::from(segment.as_str()).as_index() {
				Some(index) => arr.get(index),
				None => Value::Undefined,
			},
			_ => return Value::Undefined,
		};
	}
	current
}

/// Read every nested property so each one registers with the active target
fn traverse(value: &Value, seen: &mut HashSet<DepId>) {
	if let Some(ob) = value.observer()
		&& !seen.insert(ob.dep().id())
	{
		return;
	}
	match value {
		Value::Object(obj) => {
			for key in obj.keys() {
				traverse(&obj.get(&key), seen);
			}
		}
		Value::Array(arr) => {
			for item in arr.to_vec() {
				traverse(&item, seen);
			}
		}
		_ => {}
	}
}
