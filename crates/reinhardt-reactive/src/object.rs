//! Objects with an explicit property table
//!
//! An [`Object`] keeps its properties in insertion order, each described by a
//! [`PropertyDescriptor`] holding either a plain value or a getter/setter pair.
//! Observing an object replaces its enumerable data properties with accessor
//! pairs that track reads and announce writes, so callers keep using plain
//! [`Object::get`] / [`Object::set`].
//!
//! Accessors are always invoked with no borrow held on the object, so a getter
//! or setter may freely read and write the object it belongs to.

use core::cell::RefCell;
use core::fmt;

extern crate alloc;
use alloc::rc::{Rc, Weak};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use indexmap::IndexMap;

use crate::observer::Observer;
use crate::value::Value;

/// Property getter, invoked with the object that owns the property
pub type Getter = Rc<dyn Fn(&Object) -> Value>;

/// Property setter, invoked with the object that owns the property
pub type Setter = Rc<dyn Fn(&Object, Value)>;

/// What a property holds
#[derive(Clone)]
pub enum PropertyKind {
	Data(Value),
	Accessor {
		get: Option<Getter>,
		set: Option<Setter>,
	},
}

/// A property and its attributes
#[derive(Clone)]
pub struct PropertyDescriptor {
	pub kind: PropertyKind,
	/// Whether the property is listed by [`Object::keys`] and observed by `observe`
	pub enumerable: bool,
	/// Whether the property may be redefined or deleted
	pub configurable: bool,
}

impl PropertyDescriptor {
	/// An enumerable, configurable data property
	pub fn data(value: impl Into<Value>) -> Self {
		Self {
			kind: PropertyKind::Data(value.into()),
			enumerable: true,
			configurable: true,
		}
	}

	/// An enumerable, configurable accessor property
	pub fn accessor(get: Option<Getter>, set: Option<Setter>) -> Self {
		Self {
			kind: PropertyKind::Accessor { get, set },
			enumerable: true,
			configurable: true,
		}
	}

	pub fn with_enumerable(mut self, enumerable: bool) -> Self {
		self.enumerable = enumerable;
		self
	}

	pub fn with_configurable(mut self, configurable: bool) -> Self {
		self.configurable = configurable;
		self
	}

	/// The getter/setter pair, if this is an accessor property
	pub fn accessor_pair(&self) -> (Option<Getter>, Option<Setter>) {
		match &self.kind {
			PropertyKind::Accessor { get, set } => (get.clone(), set.clone()),
			PropertyKind::Data(_) => (None, None),
		}
	}

	pub fn is_accessor(&self) -> bool {
		matches!(self.kind, PropertyKind::Accessor { .. })
	}
}

impl fmt::Debug for PropertyDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut s = f.debug_struct("PropertyDescriptor");
		match &self.kind {
			PropertyKind::Data(value) => s.field("value", value),
			PropertyKind::Accessor { get, set } => s
				.field("get", &get.is_some())
				.field("set", &set.is_some()),
		};
		s.field("enumerable", &self.enumerable)
			.field("configurable", &self.configurable)
			.finish()
	}
}

pub(crate) struct ObjectData {
	props: IndexMap<String, PropertyDescriptor>,
	extensible: bool,
	/// Framework-internal instances are never observed
	internal: bool,
	/// Hidden marker recording that this object was observed
	observer: Option<Rc<Observer>>,
}

/// A shared, mutable object
///
/// Cloning an `Object` yields another handle to the same instance.
#[derive(Clone)]
pub struct Object(Rc<RefCell<ObjectData>>);

impl Object {
	pub fn new() -> Self {
		Self::with_flags(false)
	}

	/// Create a framework-internal instance. `observe` refuses it, and
	/// `set`/`del` treat it like root state.
	pub fn new_internal() -> Self {
		Self::with_flags(true)
	}

	fn with_flags(internal: bool) -> Self {
		Self(Rc::new(RefCell::new(ObjectData {
			props: IndexMap::new(),
			extensible: true,
			internal,
			observer: None,
		})))
	}

	/// Build an object from key/value pairs, in iteration order
	pub fn from_entries<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<Value>,
	{
		let obj = Self::new();
		{
			let mut data = obj.0.borrow_mut();
			for (key, value) in entries {
				data.props
					.insert(key.into(), PropertyDescriptor::data(value));
			}
		}
		obj
	}

	/// Read a property, invoking its getter if it has one
	///
	/// Missing keys read as [`Value::Undefined`].
	pub fn get(&self, key: &str) -> Value {
		let kind = self.0.borrow().props.get(key).map(|p| p.kind.clone());
		match kind {
			Some(PropertyKind::Data(value)) => value,
			Some(PropertyKind::Accessor { get: Some(get), .. }) => get(self),
			Some(PropertyKind::Accessor { get: None, .. }) | None => Value::Undefined,
		}
	}

	/// Assign a property, invoking its setter if it has one
	///
	/// Accessors without a setter ignore the write. A missing key is added as
	/// a plain data property unless the object is non-extensible.
	pub fn set(&self, key: &str, value: impl Into<Value>) {
		let value = value.into();
		let setter = {
			let mut data = self.0.borrow_mut();
			let extensible = data.extensible;
			match data.props.get_mut(key) {
				Some(PropertyDescriptor {
					kind: PropertyKind::Data(slot),
					..
				}) => {
					*slot = value;
					return;
				}
				Some(PropertyDescriptor {
					kind: PropertyKind::Accessor { set, .. },
					..
				}) => set.clone(),
				None => {
					if extensible {
						data.props
							.insert(key.to_string(), PropertyDescriptor::data(value));
					}
					return;
				}
			}
		};
		if let Some(setter) = setter {
			setter(self, value);
		}
	}

	/// Define or redefine a property.
	///
	/// Returns `false` when an existing property is non-configurable, or when
	/// the key is new and the object is non-extensible.
	pub fn define_property(&self, key: &str, descriptor: PropertyDescriptor) -> bool {
		let mut data = self.0.borrow_mut();
		let extensible = data.extensible;
		match data.props.get_mut(key) {
			Some(existing) if !existing.configurable => false,
			Some(existing) => {
				*existing = descriptor;
				true
			}
			None if extensible => {
				data.props.insert(key.to_string(), descriptor);
				true
			}
			None => false,
		}
	}

	/// Delete a property. Non-configurable properties are kept.
	pub fn remove(&self, key: &str) -> bool {
		let mut data = self.0.borrow_mut();
		match data.props.get(key) {
			Some(existing) if !existing.configurable => false,
			Some(_) => {
				data.props.shift_remove(key);
				true
			}
			None => true,
		}
	}

	pub fn own_descriptor(&self, key: &str) -> Option<PropertyDescriptor> {
		self.0.borrow().props.get(key).cloned()
	}

	pub fn has_own(&self, key: &str) -> bool {
		self.0.borrow().props.contains_key(key)
	}

	/// Enumerable own keys, in insertion order
	pub fn keys(&self) -> Vec<String> {
		self.0
			.borrow()
			.props
			.iter()
			.filter(|(_, p)| p.enumerable)
			.map(|(key, _)| key.clone())
			.collect()
	}

	/// Number of own properties, enumerable or not
	pub fn len(&self) -> usize {
		self.0.borrow().props.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Forbid adding new properties
	pub fn prevent_extensions(&self) {
		self.0.borrow_mut().extensible = false;
	}

	pub fn is_extensible(&self) -> bool {
		self.0.borrow().extensible
	}

	pub fn is_internal(&self) -> bool {
		self.0.borrow().internal
	}

	/// The observer attached to this object, if it was observed
	pub fn observer(&self) -> Option<Rc<Observer>> {
		self.0.borrow().observer.clone()
	}

	pub(crate) fn set_observer(&self, observer: Rc<Observer>) {
		self.0.borrow_mut().observer = Some(observer);
	}

	/// Whether both handles refer to the same instance
	pub fn ptr_eq(&self, other: &Object) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub(crate) fn addr(&self) -> usize {
		Rc::as_ptr(&self.0) as *const () as usize
	}

	pub(crate) fn downgrade(&self) -> Weak<RefCell<ObjectData>> {
		Rc::downgrade(&self.0)
	}

	pub(crate) fn from_inner(inner: Rc<RefCell<ObjectData>>) -> Self {
		Self(inner)
	}
}

impl Default for Object {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Object {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Object")
			.field("keys", &self.keys())
			.field("observed", &self.observer().is_some())
			.finish()
	}
}
