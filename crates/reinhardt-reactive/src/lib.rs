//! # Reinhardt Reactive
//!
//! Fine-grained reactivity for plain state trees.
//!
//! Ordinary objects and arrays are turned into *observed* state: every property
//! read made by a running computation is recorded, and every write notifies
//! exactly the computations that read it. Notifications are batched by a
//! scheduler that runs each dirty computation once, in creation order, on the
//! next tick.
//!
//! ## Architecture
//!
//! - [`observe`] attaches an [`Observer`] to an [`Object`] or [`Array`] and
//!   rewrites its properties into tracked accessors ([`define_reactive`]).
//! - Every tracked property, and every observed container, owns a [`Dep`]
//!   that collects subscribers while a computation is active.
//! - Array mutators (`push`, `splice`, ...) notify the array's own channel.
//! - [`set`] / [`del`] add and remove keys in a way subscribers can see.
//! - [`queue_watcher`] and [`flush_scheduler_queue`] batch re-runs.
//! - [`Watcher`] is the bundled [`Subscriber`].
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_reactive::{Object, Value, Watcher, WatcherOptions, flush_scheduler_queue, observe};
//!
//! let state = Object::from_entries([("count", 0)]);
//! observe(&Value::from(state.clone()), true);
//!
//! let source = state.clone();
//! let _watcher = Watcher::with_callback(
//!     move || source.get("count"),
//!     |new, _| println!("count is now {new:?}"),
//!     WatcherOptions::default(),
//! );
//!
//! state.set("count", 1);
//! state.set("count", 2);
//! flush_scheduler_queue()?; // Prints once: "count is now Number(2)"
//! ```
//!
//! ## Threading
//!
//! All state is `!Send` and lives on the thread that created it. Each thread has
//! its own [`runtime::Runtime`], configuration, and update queue.

pub mod array;
pub mod config;
pub mod dep;
pub mod error;
pub mod object;
pub mod observer;
pub mod runtime;
pub mod scheduler;
pub mod subscriber;
pub mod value;
pub mod watcher;

pub use array::Array;
pub use config::ReactiveConfig;
pub use dep::{Dep, DepId};
pub use error::ReactiveError;
pub use object::{Getter, Object, PropertyDescriptor, PropertyKind, Setter};
pub use observer::{CustomSetter, Observer, del, define_reactive, depend_array, observe, set};
pub use runtime::{
	Task, clear_next_tick, clear_warn_handler, config, configure, set_next_tick, set_warn_handler,
	should_observe, toggle_observing, untracked, with_runtime,
};
pub use scheduler::{
	MAX_UPDATE_COUNT, clear_flush_listener, flush_scheduler_queue, queue_activated_component,
	queue_watcher, set_flush_listener,
};
pub use subscriber::{LifecycleHook, Owner, Subscriber, SubscriberId};
pub use value::{PropertyKey, Value};
pub use watcher::{Watcher, WatcherOptions};
