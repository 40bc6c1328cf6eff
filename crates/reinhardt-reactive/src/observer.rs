//! Observers - reactive wrapping of objects and arrays
//!
//! [`observe`] attaches an [`Observer`] to a plain [`Object`] or [`Array`],
//! in place. For objects, every enumerable property is turned into a tracked
//! accessor pair by [`define_reactive`]; for arrays, the mutating operations
//! start notifying the observer's structural channel. Nested values are
//! observed recursively.
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_reactive::{Object, Value, observe};
//!
//! let state = Value::from(Object::from_entries([("count", 0)]));
//! observe(&state, true);
//!
//! // Reads inside a watcher are tracked; this write re-queues those watchers.
//! state.as_object().unwrap().set("count", 1);
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;

extern crate alloc;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;

use crate::array::{Array, ArrayData};
use crate::dep::Dep;
use crate::error::ReactiveError;
use crate::object::{Getter, Object, ObjectData, PropertyDescriptor, Setter};
use crate::runtime::{self, has_target, with_runtime};
use crate::value::{PropertyKey, Value};

/// Hook run before a tracked property accepts a new value (diagnostics only)
pub type CustomSetter = Rc<dyn Fn()>;

enum Target {
	Object(Weak<RefCell<ObjectData>>),
	Array(Weak<RefCell<ArrayData>>),
}

/// The wrapper attached to every observed container
///
/// At most one observer exists per container; [`observe`] returns the
/// existing one on repeated calls.
pub struct Observer {
	value: Target,
	/// Structural channel: entries added or removed
	dep: Rc<Dep>,
	/// Number of times the value was observed as root state
	vm_count: Cell<usize>,
}

impl Observer {
	fn attach_object(obj: &Object) -> Rc<Self> {
		let ob = Rc::new(Self {
			value: Target::Object(obj.downgrade()),
			dep: Dep::new(),
			vm_count: Cell::new(0),
		});
		// Marker goes on first so self-referencing graphs terminate
		obj.set_observer(ob.clone());
		ob.walk(obj);
		ob
	}

	fn attach_array(arr: &Array) -> Rc<Self> {
		let ob = Rc::new(Self {
			value: Target::Array(arr.downgrade()),
			dep: Dep::new(),
			vm_count: Cell::new(0),
		});
		arr.set_observer(ob.clone());
		ob.observe_array(&arr.to_vec());
		ob
	}

	/// The observed container, while it is alive
	pub fn value(&self) -> Option<Value> {
		match &self.value {
			Target::Object(weak) => weak.upgrade().map(|inner| Value::Object(Object::from_inner(inner))),
			Target::Array(weak) => weak.upgrade().map(|inner| Value::Array(Array::from_inner(inner))),
		}
	}

	/// The structural channel
	pub fn dep(&self) -> &Rc<Dep> {
		&self.dep
	}

	pub fn vm_count(&self) -> usize {
		self.vm_count.get()
	}

	/// Whether the value serves as root state somewhere
	pub fn is_root(&self) -> bool {
		self.vm_count.get() > 0
	}

	/// Convert every enumerable property of `obj` into a tracked accessor
	pub fn walk(&self, obj: &Object) {
		for key in obj.keys() {
			define_reactive(obj, &key, None, None, false);
		}
	}

	/// Observe each of `items`
	pub fn observe_array(&self, items: &[Value]) {
		for item in items {
			observe(item, false);
		}
	}
}

impl fmt::Debug for Observer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Observer")
			.field("dep", &self.dep.id())
			.field("vm_count", &self.vm_count.get())
			.finish()
	}
}

/// Attach an observer to `value`, or return the one it already has.
///
/// Returns `None` for primitives, and when wrapping is refused: observation is
/// toggled off, the runtime is in server rendering mode, the value is
/// non-extensible, or it is a framework-internal instance. `as_root` counts
/// the value as root state, which forbids adding or deleting its keys through
/// [`set`] and [`del`].
pub fn observe(value: &Value, as_root: bool) -> Option<Rc<Observer>> {
	let ob = match value {
		Value::Object(obj) => match obj.observer() {
			Some(ob) => Some(ob),
			None if can_wrap() && obj.is_extensible() && !obj.is_internal() => {
				Some(Observer::attach_object(obj))
			}
			None => None,
		},
		Value::Array(arr) => match arr.observer() {
			Some(ob) => Some(ob),
			None if can_wrap() && arr.is_extensible() => Some(Observer::attach_array(arr)),
			None => None,
		},
		_ => return None,
	};
	if as_root && let Some(ob) = &ob {
		ob.vm_count.set(ob.vm_count.get() + 1);
	}
	ob
}

fn can_wrap() -> bool {
	with_runtime(|rt| rt.should_observe() && !rt.is_server_rendering())
}

struct Slot {
	value: RefCell<Value>,
	child: RefCell<Option<Rc<Observer>>>,
}

/// Turn `key` of `obj` into a tracked accessor pair.
///
/// With `val` omitted the current value of the property is used. An existing
/// getter/setter pair is kept and delegated through; a non-configurable
/// property is left alone. Unless `shallow`, the value and every value later
/// assigned are observed too.
pub fn define_reactive(
	obj: &Object,
	key: &str,
	val: Option<Value>,
	custom_setter: Option<CustomSetter>,
	shallow: bool,
) {
	let dep = Dep::new();

	let property = obj.own_descriptor(key);
	if property.as_ref().is_some_and(|p| !p.configurable) {
		return;
	}

	let (getter, setter) = property
		.as_ref()
		.map(PropertyDescriptor::accessor_pair)
		.unwrap_or((None, None));

	let initial = match val {
		Some(val) => val,
		None if getter.is_none() || setter.is_some() => obj.get(key),
		None => Value::Undefined,
	};

	let child = if shallow { None } else { observe(&initial, false) };
	let slot = Rc::new(Slot {
		value: RefCell::new(initial),
		child: RefCell::new(child),
	});

	let get: Getter = {
		let dep = dep.clone();
		let slot = slot.clone();
		let getter = getter.clone();
		Rc::new(move |this: &Object| {
			let value = match &getter {
				Some(getter) => getter(this),
				None => slot.value.borrow().clone(),
			};
			if has_target() {
				dep.depend();
				let child = slot.child.borrow().clone();
				if let Some(child) = child {
					child.dep().depend();
					if let Value::Array(arr) = &value {
						depend_array(arr);
					}
				}
			}
			value
		})
	};

	let set: Setter = Rc::new(move |this: &Object, new_val: Value| {
		let value = match &getter {
			Some(getter) => getter(this),
			None => slot.value.borrow().clone(),
		};
		if new_val.same_value(&value) {
			return;
		}
		if let Some(hook) = &custom_setter
			&& with_runtime(|rt| rt.diagnostics())
		{
			hook();
		}
		match &setter {
			Some(setter) => setter(this, new_val.clone()),
			None => *slot.value.borrow_mut() = new_val.clone(),
		}
		let child = if shallow { None } else { observe(&new_val, false) };
		*slot.child.borrow_mut() = child;
		dep.notify();
	});

	obj.define_property(key, PropertyDescriptor::accessor(Some(get), Some(set)));
}

/// Assign `key` on `target`, making the key reactive if it is new.
///
/// - Arrays with a valid index grow as needed and are written through the
///   intercepted `splice`, so the write is seen.
/// - Existing object keys are assigned normally.
/// - New keys on observed objects become tracked and the object's structural
///   channel is notified. New keys on root state or framework-internal
///   instances are refused with a diagnostic.
///
/// Returns `val`.
pub fn set(target: &Value, key: impl Into<PropertyKey>, val: impl Into<Value>) -> Value {
	let key = key.into();
	let val = val.into();
	match target {
		Value::Array(arr) => {
			match key.as_index() {
				Some(index) => {
					arr.set_len(arr.len().max(index));
					arr.splice(index, 1, [val.clone()]);
				}
				None => runtime::warn(ReactiveError::NonIndexArrayKey { key: key.to_name() }),
			}
			val
		}
		Value::Object(obj) => {
			let name = key.to_name();
			if obj.has_own(&name) {
				obj.set(&name, val.clone());
				return val;
			}
			let ob = obj.observer();
			if obj.is_internal() || ob.as_ref().is_some_and(|ob| ob.is_root()) {
				runtime::warn(ReactiveError::RootDataAddition { key: name });
				return val;
			}
			let Some(ob) = ob else {
				obj.set(&name, val.clone());
				return val;
			};
			define_reactive(obj, &name, Some(val.clone()), None, false);
			ob.dep().notify();
			val
		}
		primitive => {
			runtime::warn(ReactiveError::SetOnPrimitive {
				value: primitive.to_display_string(),
			});
			val
		}
	}
}

/// Delete `key` from `target`, notifying observers when something was removed.
///
/// Root state and framework-internal instances refuse deletion with a
/// diagnostic.
pub fn del(target: &Value, key: impl Into<PropertyKey>) {
	let key = key.into();
	match target {
		Value::Array(arr) => {
			if let Some(index) = key.as_index() {
				arr.splice(index, 1, Vec::<Value>::new());
			}
		}
		Value::Object(obj) => {
			let name = key.to_name();
			let ob = obj.observer();
			if obj.is_internal() || ob.as_ref().is_some_and(|ob| ob.is_root()) {
				runtime::warn(ReactiveError::RootDataDeletion { key: name });
				return;
			}
			if !obj.has_own(&name) || !obj.remove(&name) {
				return;
			}
			if let Some(ob) = ob {
				ob.dep().notify();
			}
		}
		primitive => runtime::warn(ReactiveError::DeleteOnPrimitive {
			value: primitive.to_display_string(),
		}),
	}
}

/// Register the structural channel of every observed element, recursively.
///
/// Element access cannot be intercepted, so reading an array through a
/// tracked property subscribes to its elements' containers as well.
pub fn depend_array(arr: &Array) {
	for item in arr.to_vec() {
		if let Some(ob) = item.observer() {
			ob.dep().depend();
		}
		if let Value::Array(inner) = &item {
			depend_array(inner);
		}
	}
}
