//! Dynamic values
//!
//! [`Value`] is the shape of state the observer system can wrap: primitives
//! plus shared, mutable [`Object`] and [`Array`] handles. Cloning a `Value`
//! never copies a container; both clones refer to the same instance.

use core::fmt;

extern crate alloc;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use std::collections::HashSet;

use crate::array::Array;
use crate::object::Object;
use crate::observer::Observer;
use crate::runtime::untracked;

/// A dynamically typed value
#[derive(Clone, Default)]
pub enum Value {
	#[default]
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	String(Rc<str>),
	Object(Object),
	Array(Array),
}

impl Value {
	/// Whether this is an object or an array
	pub fn is_object_like(&self) -> bool {
		matches!(self, Value::Object(_) | Value::Array(_))
	}

	pub fn is_nullish(&self) -> bool {
		matches!(self, Value::Undefined | Value::Null)
	}

	pub fn as_object(&self) -> Option<&Object> {
		match self {
			Value::Object(obj) => Some(obj),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&Array> {
		match self {
			Value::Array(arr) => Some(arr),
			_ => None,
		}
	}

	pub fn as_number(&self) -> Option<f64> {
		match self {
			Value::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	/// The observer attached to this value, if it is an observed container
	pub fn observer(&self) -> Option<Rc<Observer>> {
		match self {
			Value::Object(obj) => obj.observer(),
			Value::Array(arr) => arr.observer(),
			_ => None,
		}
	}

	/// Identity-or-value equality used to suppress redundant notifications.
	///
	/// Containers compare by identity, primitives by value, and NaN is equal
	/// to itself.
	pub fn same_value(&self, other: &Value) -> bool {
		match (self, other) {
			(Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
			(Value::String(a), Value::String(b)) => a == b,
			(Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
			(Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
			_ => false,
		}
	}

	/// String form used by diagnostics and the default array sort
	///
	/// An array nested inside itself renders as an empty string at the
	/// repeated reference.
	pub fn to_display_string(&self) -> String {
		self.to_display_inner(&mut HashSet::new())
	}

	fn to_display_inner(&self, seen: &mut HashSet<usize>) -> String {
		match self {
			Value::Undefined => "undefined".into(),
			Value::Null => "null".into(),
			Value::Bool(b) => b.to_string(),
			Value::Number(n) => format_number(*n),
			Value::String(s) => s.to_string(),
			Value::Object(_) => "[object Object]".into(),
			Value::Array(arr) => {
				if !seen.insert(arr.addr()) {
					return String::new();
				}
				let joined = arr
					.to_vec()
					.iter()
					.map(|item| {
						if item.is_nullish() {
							String::new()
						} else {
							item.to_display_inner(seen)
						}
					})
					.collect::<Vec<_>>()
					.join(",");
				seen.remove(&arr.addr());
				joined
			}
		}
	}

	/// Snapshot this value as JSON without registering any dependency.
	///
	/// `Undefined` and NaN/infinite numbers become `null`. A container that
	/// contains itself is cut at the repeated reference.
	pub fn to_json(&self) -> serde_json::Value {
		untracked(|| self.to_json_inner(&mut HashSet::new()))
	}

	fn to_json_inner(&self, seen: &mut HashSet<usize>) -> serde_json::Value {
		match self {
			Value::Undefined | Value::Null => serde_json::Value::Null,
			Value::Bool(b) => serde_json::Value::Bool(*b),
			Value::Number(n) => json_number(*n)
				.map(serde_json::Value::Number)
				.unwrap_or(serde_json::Value::Null),
			Value::String(s) => serde_json::Value::String(s.to_string()),
			Value::Object(obj) => {
				if !seen.insert(obj.addr()) {
					return serde_json::Value::Null;
				}
				let map = obj
					.keys()
					.into_iter()
					.map(|key| {
						let value = obj.get(&key).to_json_inner(seen);
						(key, value)
					})
					.collect();
				seen.remove(&obj.addr());
				serde_json::Value::Object(map)
			}
			Value::Array(arr) => {
				if !seen.insert(arr.addr()) {
					return serde_json::Value::Null;
				}
				let items = arr.to_vec().iter().map(|item| item.to_json_inner(seen)).collect();
				seen.remove(&arr.addr());
				serde_json::Value::Array(items)
			}
		}
	}
}

fn format_number(n: f64) -> String {
	if n.is_nan() {
		"NaN".into()
	} else if n.is_infinite() {
		if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
	} else if n == 0.0 {
		"0".into()
	} else if n.fract() == 0.0 && n.abs() < 1e21 {
		alloc::format!("{n:.0}")
	} else {
		n.to_string()
	}
}

/// Whole numbers in `i64` range stay JSON integers
fn json_number(n: f64) -> Option<serde_json::Number> {
	if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
		Some(serde_json::Number::from(n as i64))
	} else {
		serde_json::Number::from_f64(n)
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		self.same_value(other)
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Undefined => f.write_str("Undefined"),
			Value::Null => f.write_str("Null"),
			Value::Bool(b) => write!(f, "Bool({b})"),
			Value::Number(n) => write!(f, "Number({n})"),
			Value::String(s) => write!(f, "String({s:?})"),
			Value::Object(obj) => fmt::Debug::fmt(obj, f),
			Value::Array(arr) => fmt::Debug::fmt(arr, f),
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Number(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Number(f64::from(value))
	}
}

impl From<u32> for Value {
	fn from(value: u32) -> Self {
		Value::Number(f64::from(value))
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Number(value as f64)
	}
}

impl From<usize> for Value {
	fn from(value: usize) -> Self {
		Value::Number(value as f64)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::String(Rc::from(value))
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::String(Rc::from(value))
	}
}

impl From<Object> for Value {
	fn from(value: Object) -> Self {
		Value::Object(value)
	}
}

impl From<Array> for Value {
	fn from(value: Array) -> Self {
		Value::Array(value)
	}
}

impl From<Vec<Value>> for Value {
	fn from(value: Vec<Value>) -> Self {
		Value::Array(Array::from_vec(value))
	}
}

impl From<serde_json::Value> for Value {
	fn from(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(b),
			serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
			serde_json::Value::String(s) => Value::from(s),
			serde_json::Value::Array(items) => {
				Value::Array(items.into_iter().map(Value::from).collect())
			}
			serde_json::Value::Object(map) => Value::Object(Object::from_entries(
				map.into_iter().map(|(key, value)| (key, Value::from(value))),
			)),
		}
	}
}

/// A property key: a name, or an array index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
	Index(usize),
	Name(String),
}

impl PropertyKey {
	/// The key as a valid array index, if it is one.
	///
	/// Names qualify only in canonical decimal form (`"3"`, not `"03"` or `"3.0"`).
	pub fn as_index(&self) -> Option<usize> {
		match self {
			PropertyKey::Index(index) => Some(*index),
			PropertyKey::Name(name) => name
				.parse::<usize>()
				.ok()
				.filter(|index| index.to_string() == *name),
		}
	}

	/// The key as a property name
	pub fn to_name(&self) -> String {
		match self {
			PropertyKey::Index(index) => index.to_string(),
			PropertyKey::Name(name) => name.clone(),
		}
	}
}

impl fmt::Display for PropertyKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_name())
	}
}

impl From<&str> for PropertyKey {
	fn from(value: &str) -> Self {
		PropertyKey::Name(value.to_string())
	}
}

impl From<String> for PropertyKey {
	fn from(value: String) -> Self {
		PropertyKey::Name(value)
	}
}

impl From<usize> for PropertyKey {
	fn from(value: usize) -> Self {
		PropertyKey::Index(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case(Value::from(1), Value::from(1), true)]
	#[case(Value::from(1), Value::from(2), false)]
	#[case(Value::from(f64::NAN), Value::from(f64::NAN), true)]
	#[case(Value::from(0.0), Value::from(-0.0), true)]
	#[case(Value::from("a"), Value::from("a"), true)]
	#[case(Value::Null, Value::Undefined, false)]
	#[case(Value::from(1), Value::from("1"), false)]
	fn test_same_value_primitives(#[case] a: Value, #[case] b: Value, #[case] expected: bool) {
		assert_eq!(a.same_value(&b), expected);
	}

	#[test]
	fn test_same_value_containers_by_identity() {
		let a = Object::new();
		let b = Object::new();
		assert!(Value::from(a.clone()).same_value(&Value::from(a)));
		assert!(!Value::from(Object::new()).same_value(&Value::from(b)));
	}

	#[rstest]
	#[case("3", Some(3))]
	#[case("0", Some(0))]
	#[case("03", None)]
	#[case("-1", None)]
	#[case("1.5", None)]
	#[case("name", None)]
	fn test_property_key_index(#[case] name: &str, #[case] expected: Option<usize>) {
		assert_eq!(PropertyKey::from(name).as_index(), expected);
	}

	#[rstest]
	#[case(Value::from(3), "3")]
	#[case(Value::from(1.5), "1.5")]
	#[case(Value::from(f64::NAN), "NaN")]
	#[case(Value::Undefined, "undefined")]
	#[case(Value::from(vec![Value::from(1), Value::Null, Value::from("x")]), "1,,x")]
	#[case(Value::from(1e20), "100000000000000000000")]
	#[case(Value::from(-1e19), "-10000000000000000000")]
	#[case(Value::from(-0.0), "0")]
	fn test_display_string(#[case] value: Value, #[case] expected: &str) {
		assert_eq!(value.to_display_string(), expected);
	}

	#[test]
	fn test_json_interop() {
		let source = json!({"a": 1, "b": {"c": [true, null, "s"]}});
		let value = Value::from(source.clone());
		assert_eq!(value.to_json(), source);
	}

	#[test]
	fn test_json_keeps_fractions() {
		let value = Value::from(json!({"x": 2.5, "n": -3}));
		assert_eq!(value.to_json(), json!({"x": 2.5, "n": -3}));
	}

	#[test]
	fn test_display_string_of_cyclic_array() {
		let inner = Array::new();
		inner.push([Value::from(inner.clone())]);
		let outer = Value::from(vec![Value::from(inner.clone()), Value::from(1)]);
		assert_eq!(Value::from(inner).to_display_string(), "");
		assert_eq!(outer.to_display_string(), ",1");
	}

	#[test]
	fn test_json_self_reference_is_cut() {
		let obj = Object::new();
		obj.set("me", obj.clone());
		assert_eq!(Value::from(obj).to_json(), json!({"me": null}));
	}
}
