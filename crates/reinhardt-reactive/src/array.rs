//! Reactive sequences
//!
//! An [`Array`] behaves like a plain vector until it is observed. From then on
//! its seven mutating operations (`push`, `pop`, `shift`, `unshift`, `splice`,
//! `sort`, `reverse`) are intercepted: inserted elements are observed and the
//! array's structural channel is notified once per call.
//!
//! Element reads and [`Array::set_index`] are not intercepted. Writing an
//! element in place does not notify anyone; use [`crate::observer::set`] (or
//! `splice`) when a write must be seen.

use core::cell::RefCell;
use core::cmp::Ordering;
use core::fmt;

extern crate alloc;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;

use crate::observer::Observer;
use crate::value::Value;

pub(crate) struct ArrayData {
	items: Vec<Value>,
	extensible: bool,
	/// Hidden marker; its presence switches on interception
	observer: Option<Rc<Observer>>,
}

/// A shared, mutable sequence
///
/// Cloning an `Array` yields another handle to the same instance.
#[derive(Clone)]
pub struct Array(Rc<RefCell<ArrayData>>);

impl Array {
	pub fn new() -> Self {
		Self::from_vec(Vec::new())
	}

	pub fn from_vec(items: Vec<Value>) -> Self {
		Self(Rc::new(RefCell::new(ArrayData {
			items,
			extensible: true,
			observer: None,
		})))
	}

	pub fn len(&self) -> usize {
		self.0.borrow().items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Element at `index`, or `Undefined` when out of bounds
	pub fn get(&self, index: usize) -> Value {
		self.0.borrow().items.get(index).cloned().unwrap_or_default()
	}

	/// Overwrite the element at `index`, padding with `Undefined` if needed.
	///
	/// Not intercepted: no channel is notified and the value is not observed.
	pub fn set_index(&self, index: usize, value: impl Into<Value>) {
		let mut data = self.0.borrow_mut();
		if index >= data.items.len() {
			data.items.resize(index + 1, Value::Undefined);
		}
		data.items[index] = value.into();
	}

	/// Truncate or pad with `Undefined` to exactly `len` elements. Not intercepted.
	pub fn set_len(&self, len: usize) {
		self.0.borrow_mut().items.resize(len, Value::Undefined);
	}

	/// Snapshot of the elements
	pub fn to_vec(&self) -> Vec<Value> {
		self.0.borrow().items.clone()
	}

	/// Append elements; returns the new length
	pub fn push<I>(&self, items: I) -> usize
	where
		I: IntoIterator,
		I::Item: Into<Value>,
	{
		let inserted: Vec<Value> = items.into_iter().map(Into::into).collect();
		let len = {
			let mut data = self.0.borrow_mut();
			data.items.extend(inserted.iter().cloned());
			data.items.len()
		};
		self.mutated(&inserted);
		len
	}

	/// Remove and return the last element
	pub fn pop(&self) -> Value {
		let removed = self.0.borrow_mut().items.pop().unwrap_or_default();
		self.mutated(&[]);
		removed
	}

	/// Remove and return the first element
	pub fn shift(&self) -> Value {
		let removed = {
			let mut data = self.0.borrow_mut();
			if data.items.is_empty() {
				Value::Undefined
			} else {
				data.items.remove(0)
			}
		};
		self.mutated(&[]);
		removed
	}

	/// Prepend elements, keeping their order; returns the new length
	pub fn unshift<I>(&self, items: I) -> usize
	where
		I: IntoIterator,
		I::Item: Into<Value>,
	{
		let inserted: Vec<Value> = items.into_iter().map(Into::into).collect();
		let len = {
			let mut data = self.0.borrow_mut();
			data.items.splice(0..0, inserted.iter().cloned());
			data.items.len()
		};
		self.mutated(&inserted);
		len
	}

	/// Remove `delete_count` elements at `start` and insert `items` there.
	///
	/// `start` and `delete_count` are clamped to the array bounds. Returns the
	/// removed elements.
	pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Vec<Value>
	where
		I: IntoIterator,
		I::Item: Into<Value>,
	{
		let inserted: Vec<Value> = items.into_iter().map(Into::into).collect();
		let removed = {
			let mut data = self.0.borrow_mut();
			let start = start.min(data.items.len());
			let end = start + delete_count.min(data.items.len() - start);
			data.items
				.splice(start..end, inserted.iter().cloned())
				.collect()
		};
		self.mutated(&inserted);
		removed
	}

	/// Sort by string form, `Undefined` last
	pub fn sort(&self) {
		self.sort_by(default_order);
	}

	/// Stable sort with a caller-provided ordering
	///
	/// The comparator runs with the array released, so it may read the array.
	pub fn sort_by<F>(&self, compare: F)
	where
		F: FnMut(&Value, &Value) -> Ordering,
	{
		let mut items = core::mem::take(&mut self.0.borrow_mut().items);
		items.sort_by(compare);
		self.0.borrow_mut().items = items;
		self.mutated(&[]);
	}

	pub fn reverse(&self) {
		self.0.borrow_mut().items.reverse();
		self.mutated(&[]);
	}

	/// Forbid growth through observation; `observe` refuses non-extensible arrays
	pub fn prevent_extensions(&self) {
		self.0.borrow_mut().extensible = false;
	}

	pub fn is_extensible(&self) -> bool {
		self.0.borrow().extensible
	}

	/// The observer attached to this array, if it was observed
	pub fn observer(&self) -> Option<Rc<Observer>> {
		self.0.borrow().observer.clone()
	}

	pub(crate) fn set_observer(&self, observer: Rc<Observer>) {
		self.0.borrow_mut().observer = Some(observer);
	}

	pub fn ptr_eq(&self, other: &Array) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub(crate) fn addr(&self) -> usize {
		Rc::as_ptr(&self.0) as *const () as usize
	}

	pub(crate) fn downgrade(&self) -> Weak<RefCell<ArrayData>> {
		Rc::downgrade(&self.0)
	}

	pub(crate) fn from_inner(inner: Rc<RefCell<ArrayData>>) -> Self {
		Self(inner)
	}

	/// Interception tail shared by every mutating operation
	fn mutated(&self, inserted: &[Value]) {
		let Some(ob) = self.observer() else {
			return;
		};
		ob.observe_array(inserted);
		ob.dep().notify();
	}
}

fn default_order(a: &Value, b: &Value) -> Ordering {
	match (a, b) {
		(Value::Undefined, Value::Undefined) => Ordering::Equal,
		(Value::Undefined, _) => Ordering::Greater,
		(_, Value::Undefined) => Ordering::Less,
		_ => a.to_display_string().cmp(&b.to_display_string()),
	}
}

impl Default for Array {
	fn default() -> Self {
		Self::new()
	}
}

impl FromIterator<Value> for Array {
	fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
		Self::from_vec(iter.into_iter().collect())
	}
}

impl From<Vec<Value>> for Array {
	fn from(items: Vec<Value>) -> Self {
		Self::from_vec(items)
	}
}

impl fmt::Debug for Array {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Array")
			.field("len", &self.len())
			.field("observed", &self.observer().is_some())
			.finish()
	}
}
