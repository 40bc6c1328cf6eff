//! # Reinhardt Observer
//!
//! Facade crate for the Reinhardt observer system.
//!
//! Everything is implemented in `reinhardt-reactive` and re-exported here, so
//! applications depend on a single crate.
//!
//! ## Modules
//!
//! - [`reactive`]: the full engine, module by module
//! - [`prelude`]: the types and functions most applications need
//!
//! ## Quick Start
//!
//! ```ignore
//! use reinhardt_observer::prelude::*;
//!
//! set_next_tick(|task| {
//!     tokio::task::spawn_local(async move { task() });
//! });
//!
//! let todos = Array::new();
//! let state = Object::from_entries([("todos", Value::from(todos.clone()))]);
//! observe(&Value::from(state.clone()), true);
//!
//! let source = state.clone();
//! let _view = Watcher::with_callback(
//!     move || source.get("todos"),
//!     |todos, _| println!("{} todo(s)", todos.as_array().map_or(0, Array::len)),
//!     WatcherOptions::default(),
//! );
//!
//! todos.push(["write docs"]);
//! ```

pub use reinhardt_reactive as reactive;

pub use reinhardt_reactive::{
	Array, Object, ReactiveConfig, ReactiveError, Value, Watcher, WatcherOptions, del,
	flush_scheduler_queue, observe, set,
};

/// Commonly used items
pub mod prelude {
	pub use reinhardt_reactive::{
		Array, LifecycleHook, Object, Owner, PropertyKey, ReactiveConfig, ReactiveError,
		Subscriber, SubscriberId, Value, Watcher, WatcherOptions, configure, del,
		flush_scheduler_queue, observe, set, set_next_tick, untracked,
	};
}
