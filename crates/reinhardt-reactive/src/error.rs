//! Diagnostics raised by the observer system
//!
//! Misuse diagnostics are never returned to the caller of `set`/`del`; they are
//! routed to `tracing` and the optional warn handler while diagnostics are
//! enabled. Only a flush aborted by the circular-update guard and an invalid
//! configuration surface as `Err`.

extern crate alloc;
use alloc::string::String;

use crate::subscriber::SubscriberId;

/// Error type for reactive diagnostics
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactiveError {
	/// `set` was called on undefined, null, or a primitive
	#[error("cannot set reactive property on undefined, null, or primitive value: {value}")]
	SetOnPrimitive {
		/// Display form of the target
		value: String,
	},

	/// `del` was called on undefined, null, or a primitive
	#[error("cannot delete reactive property on undefined, null, or primitive value: {value}")]
	DeleteOnPrimitive {
		/// Display form of the target
		value: String,
	},

	/// A new key was added to root state or a framework-internal instance
	#[error(
		"avoid adding reactive property `{key}` to a framework instance or its root state at runtime; declare it upfront"
	)]
	RootDataAddition {
		/// Key that was rejected
		key: String,
	},

	/// A key was deleted from root state or a framework-internal instance
	#[error(
		"avoid deleting property `{key}` on a framework instance or its root state; set it to null instead"
	)]
	RootDataDeletion {
		/// Key that was rejected
		key: String,
	},

	/// `set` was called on an array with a key that is not a valid index
	#[error("cannot set non-index key `{key}` on an array")]
	NonIndexArrayKey {
		/// Key that was rejected
		key: String,
	},

	/// A subscriber kept re-queuing itself during one flush
	#[error("you may have an infinite update loop {}", loop_origin(.user, .expression))]
	InfiniteUpdateLoop {
		/// Offending subscriber
		id: SubscriberId,
		/// Whether it is a user-authored watcher
		user: bool,
		/// Its expression, if known
		expression: Option<String>,
	},

	/// Configuration could not be parsed
	#[error("invalid reactive configuration: {0}")]
	InvalidConfig(String),
}

fn loop_origin(user: &bool, expression: &Option<String>) -> String {
	match (user, expression) {
		(true, Some(expression)) => alloc::format!("in watcher with expression \"{expression}\""),
		(true, None) => String::from("in a user watcher"),
		(false, _) => String::from("in a component render function"),
	}
}
