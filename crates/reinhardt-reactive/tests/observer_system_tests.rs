//! Integration tests for the observer system
//!
//! These tests drive the engine through its public surface only:
//! 1. Observed objects and arrays notify exactly the computations that read them
//! 2. The scheduler batches, dedupes, and orders re-runs
//! 3. Misuse is reported as a diagnostic, never as a panic

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use reinhardt_reactive::{
	Array, Dep, Object, ReactiveConfig, ReactiveError, Subscriber, SubscriberId, Value, Watcher,
	WatcherOptions, configure, del, flush_scheduler_queue, observe, runtime, set, set_warn_handler,
};
use rstest::rstest;
use serial_test::serial;

/// Subscriber with a caller-chosen id that records its runs
struct Recorder {
	id: SubscriberId,
	this: Weak<Recorder>,
	read: Box<dyn Fn()>,
	log: Rc<RefCell<Vec<usize>>>,
}

impl Recorder {
	fn new(raw: usize, log: &Rc<RefCell<Vec<usize>>>, read: impl Fn() + 'static) -> Rc<Self> {
		let recorder = Rc::new_cyclic(|this| Self {
			id: SubscriberId::from_raw(raw),
			this: this.clone(),
			read: Box::new(read),
			log: log.clone(),
		});
		recorder.collect();
		recorder
	}

	fn collect(&self) {
		if let Some(this) = self.this.upgrade() {
			let this: Rc<dyn Subscriber> = this;
			runtime::push_target(Some(this));
			(self.read)();
			runtime::pop_target();
		}
	}
}

impl Subscriber for Recorder {
	fn id(&self) -> SubscriberId {
		self.id
	}

	fn add_dep(&self, dep: &Rc<Dep>) {
		if !dep.subscriber_ids().contains(&self.id) {
			let this: Weak<dyn Subscriber> = self.this.clone();
			dep.add_sub(this);
		}
	}

	fn update(&self) {
		if let Some(this) = self.this.upgrade() {
			reinhardt_reactive::queue_watcher(this);
		}
	}

	fn run(&self) {
		self.log.borrow_mut().push(self.id.as_raw());
	}
}

fn counting_watcher(read: impl Fn() -> Value + 'static) -> (Rc<Watcher>, Rc<Cell<usize>>) {
	let runs = Rc::new(Cell::new(0));
	let counter = runs.clone();
	let watcher = Watcher::new(
		move || {
			counter.set(counter.get() + 1);
			read()
		},
		WatcherOptions::default(),
	);
	(watcher, runs)
}

/// Nested writes reach readers, unrelated writes do not
#[test]
#[serial]
fn test_nested_property_tracking() {
	let root = Value::from(serde_json::json!({"a": 1, "b": {"c": 2}}));
	observe(&root, false);
	let obj = root.as_object().cloned().unwrap();

	let source = obj.clone();
	let (watcher, runs) = counting_watcher(move || {
		source
			.get("b")
			.as_object()
			.map(|b| b.get("c"))
			.unwrap_or_default()
	});
	assert_eq!(runs.get(), 1);

	let b = obj.get("b").as_object().cloned().unwrap();
	b.set("c", 3);
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 2);
	assert_eq!(watcher.value(), Value::from(3));

	obj.set("a", 5);
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 2);
}

/// Structural mutation is tracked, direct index writes are not
#[test]
#[serial]
fn test_array_mutation_vs_index_write() {
	let list = Array::from_vec(vec![1.into(), 2.into(), 3.into()]);
	let state = Object::from_entries([("list", Value::from(list.clone()))]);
	observe(&Value::from(state.clone()), false);

	let source = state.clone();
	let (_watcher, runs) = counting_watcher(move || {
		let len = source.get("list").as_array().map_or(0, Array::len);
		Value::from(len)
	});

	list.push([4]);
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 2);

	list.set_index(0, 99);
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 2);
	assert_eq!(list.get(0), Value::from(99));
}

/// Two subscribers of one property run once each, by id
#[test]
#[serial]
fn test_shared_dependency_runs_in_id_order() {
	let shared = Object::from_entries([("x", "")]);
	observe(&Value::from(shared.clone()), false);
	let log = Rc::new(RefCell::new(Vec::new()));

	let read = {
		let shared = shared.clone();
		move || {
			shared.get("x");
		}
	};
	// Subscribe the larger id first so notification order is reversed
	let _eleven = Recorder::new(11, &log, read.clone());
	let _ten = Recorder::new(10, &log, read);

	shared.set("x", "v");
	assert_eq!(reinhardt_reactive::scheduler::queued_ids().len(), 2);
	flush_scheduler_queue().unwrap();
	assert_eq!(*log.borrow(), vec![10, 11]);
}

/// Observing twice yields the same observer
#[test]
#[serial]
fn test_observe_fixed_point() {
	let value = Value::from(serde_json::json!({"nested": {"list": [1, {"deep": true}]}}));
	let first = observe(&value, false).unwrap();
	let again = observe(&value, false).unwrap();
	assert!(Rc::ptr_eq(&first, &again));
}

/// Many synchronous writes, one run
#[test]
#[serial]
fn test_burst_of_writes_runs_once() {
	let state = Object::from_entries([("n", 0)]);
	observe(&Value::from(state.clone()), false);
	let source = state.clone();
	let (watcher, runs) = counting_watcher(move || source.get("n"));

	for n in 1..=25 {
		state.set("n", n);
	}
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 2);
	assert_eq!(watcher.value(), Value::from(25));
}

/// A shrinking read set drops stale subscriptions
#[test]
#[serial]
fn test_conditional_branch_drops_stale_reads() {
	let state = Value::from(serde_json::json!({"show": true, "detail": "x"}));
	observe(&state, false);
	let obj = state.as_object().cloned().unwrap();

	let source = obj.clone();
	let (_watcher, runs) = counting_watcher(move || {
		if source.get("show").as_bool().unwrap_or(false) {
			source.get("detail")
		} else {
			Value::Null
		}
	});

	obj.set("show", false);
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 2);

	obj.set("detail", "y");
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 2);
}

/// Parent before child regardless of dirtying order
#[test]
#[serial]
fn test_parent_runs_before_child() {
	let state = Object::from_entries([("p", 0), ("c", 0)]);
	observe(&Value::from(state.clone()), false);
	let order = Rc::new(RefCell::new(Vec::new()));

	let make = |key: &'static str, label: &'static str| {
		let source = state.clone();
		let order = order.clone();
		Watcher::with_callback(
			move || source.get(key),
			move |_, _| order.borrow_mut().push(label),
			WatcherOptions::default(),
		)
	};
	let _parent = make("p", "parent");
	let _child = make("c", "child");

	state.set("c", 1);
	state.set("p", 1);
	flush_scheduler_queue().unwrap();
	assert_eq!(*order.borrow(), vec!["parent", "child"]);
}

/// One notification per push, inserted objects observed
#[test]
#[serial]
fn test_push_notifies_once_and_observes_items() {
	let list = Array::new();
	observe(&Value::from(list.clone()), false);
	let log = Rc::new(RefCell::new(Vec::new()));
	let dep = list.observer().unwrap().dep().clone();
	let _reader = Recorder::new(500, &log, move || dep.depend());

	let a = Object::from_entries([("k", 1)]);
	let b = Object::from_entries([("k", 2)]);
	list.push([Value::from(a.clone()), Value::from(b.clone())]);

	assert_eq!(reinhardt_reactive::scheduler::queued_ids().len(), 1);
	assert!(a.observer().is_some());
	assert!(b.observer().is_some());
	flush_scheduler_queue().unwrap();
	assert_eq!(*log.borrow(), vec![500]);
}

/// Same-value writes do not notify
#[test]
#[serial]
fn test_same_value_writes_are_silent() {
	let inner = Object::new();
	let state = Object::from_entries([
		("obj", Value::from(inner.clone())),
		("nan", Value::from(f64::NAN)),
	]);
	observe(&Value::from(state.clone()), false);
	let source = state.clone();
	let (_watcher, runs) = counting_watcher(move || {
		source.get("obj");
		source.get("nan")
	});

	state.set("obj", inner);
	state.set("nan", f64::NAN);
	assert!(reinhardt_reactive::scheduler::queued_ids().is_empty());
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 1);
}

/// A self-dirtying computation is stopped by the circular guard
#[test]
#[serial]
fn test_runaway_computation_is_aborted() {
	configure(ReactiveConfig::default().with_diagnostics(true));
	let seen = Rc::new(RefCell::new(Vec::new()));
	let sink = seen.clone();
	set_warn_handler(move |err| sink.borrow_mut().push(err.clone()));

	let state = Object::from_entries([("n", 0)]);
	observe(&Value::from(state.clone()), false);
	let source = state.clone();
	let _looping = Watcher::new(
		move || {
			let n = source.get("n").as_number().unwrap_or(0.0);
			source.set("n", n + 1.0);
			Value::from(n)
		},
		WatcherOptions::default()
			.with_user(true)
			.with_expression("n"),
	);

	let err = flush_scheduler_queue().unwrap_err();
	match &err {
		ReactiveError::InfiniteUpdateLoop { user, expression, .. } => {
			assert!(*user);
			assert_eq!(expression.as_deref(), Some("n"));
		}
		other => panic!("unexpected error: {other}"),
	}
	assert!(err.to_string().contains("infinite update loop"));
	assert_eq!(*seen.borrow(), vec![err]);
	assert!(!reinhardt_reactive::scheduler::is_flushing());

	runtime::clear_warn_handler();
}

#[test]
#[serial]
fn test_set_adds_reactive_key() {
	let state = Object::from_entries([("inner", Value::from(Object::new()))]);
	observe(&Value::from(state.clone()), true);
	let inner = state.get("inner");

	let source = state.clone();
	let (_watcher, runs) = counting_watcher(move || {
		let inner = source.get("inner");
		inner.as_object().map(|o| o.get("late")).unwrap_or_default()
	});

	set(&inner, "late", 1);
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 2);

	inner.as_object().unwrap().set("late", 2);
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 3);

	del(&inner, "late");
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 4);
	assert!(!inner.as_object().unwrap().has_own("late"));
}

#[test]
#[serial]
fn test_root_key_addition_is_refused() {
	configure(ReactiveConfig::default().with_diagnostics(true));
	let seen = Rc::new(RefCell::new(Vec::new()));
	let sink = seen.clone();
	set_warn_handler(move |err| sink.borrow_mut().push(err.clone()));

	let root = Value::from(Object::from_entries([("declared", 1)]));
	observe(&root, true);

	let returned = set(&root, "undeclared", 2);
	assert_eq!(returned, Value::from(2));
	assert!(!root.as_object().unwrap().has_own("undeclared"));
	del(&root, "declared");
	assert!(root.as_object().unwrap().has_own("declared"));

	assert_eq!(
		*seen.borrow(),
		vec![
			ReactiveError::RootDataAddition {
				key: "undeclared".into()
			},
			ReactiveError::RootDataDeletion {
				key: "declared".into()
			},
		]
	);
	runtime::clear_warn_handler();
}

#[test]
#[serial]
fn test_nested_arrays_are_tracked_through_property_read() {
	let inner = Array::from_vec(vec![1.into()]);
	let outer = Array::from_vec(vec![Value::from(inner.clone())]);
	let state = Object::from_entries([("grid", Value::from(outer))]);
	observe(&Value::from(state.clone()), false);

	let source = state.clone();
	let (_watcher, runs) = counting_watcher(move || source.get("grid"));

	inner.push([2]);
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 2);
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
	Push,
	Pop,
	Shift,
	Unshift,
	Splice,
	Sort,
	Reverse,
}

impl Mutation {
	fn apply(self, list: &Array) {
		match self {
			Mutation::Push => {
				list.push([4]);
			}
			Mutation::Pop => {
				list.pop();
			}
			Mutation::Shift => {
				list.shift();
			}
			Mutation::Unshift => {
				list.unshift([0]);
			}
			Mutation::Splice => {
				list.splice(1, 1, [7, 8]);
			}
			Mutation::Sort => list.sort(),
			Mutation::Reverse => list.reverse(),
		}
	}
}

/// Every mutating operation on an observed array re-runs its reader once
#[rstest]
#[case(Mutation::Push)]
#[case(Mutation::Pop)]
#[case(Mutation::Shift)]
#[case(Mutation::Unshift)]
#[case(Mutation::Splice)]
#[case(Mutation::Sort)]
#[case(Mutation::Reverse)]
#[serial]
fn test_each_array_mutator_notifies_once(#[case] mutation: Mutation) {
	let list = Array::from_vec(vec![3.into(), 1.into(), 2.into()]);
	let state = Object::from_entries([("list", Value::from(list.clone()))]);
	observe(&Value::from(state.clone()), false);

	let source = state.clone();
	let (_watcher, runs) = counting_watcher(move || source.get("list"));

	mutation.apply(&list);
	assert_eq!(reinhardt_reactive::scheduler::queued_ids().len(), 1);
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 2);
}

#[test]
#[serial]
fn test_unshift_and_splice_observe_inserted_objects() {
	let list = Array::from_vec(vec![1.into(), 2.into()]);
	observe(&Value::from(list.clone()), false);

	let head = Object::from_entries([("k", 1)]);
	let middle = Object::from_entries([("k", 2)]);
	let replaced = Object::from_entries([("k", 3)]);
	list.unshift([Value::from(head.clone())]);
	list.splice(1, 1, [Value::from(middle.clone()), Value::from(replaced.clone())]);

	assert!(head.observer().is_some());
	assert!(middle.observer().is_some());
	assert!(replaced.observer().is_some());
	assert_eq!(list.len(), 4);
}

#[test]
#[serial]
fn test_set_and_del_on_observed_array_rerun_reader() {
	let list = Array::from_vec(vec![1.into(), 2.into()]);
	let state = Object::from_entries([("list", Value::from(list.clone()))]);
	observe(&Value::from(state.clone()), false);
	let target = state.get("list");

	let source = state.clone();
	let (_watcher, runs) = counting_watcher(move || {
		source
			.get("list")
			.as_array()
			.map(|list| list.get(0))
			.unwrap_or_default()
	});

	set(&target, 0usize, 9);
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 2);
	assert_eq!(list.get(0), Value::from(9));

	set(&target, 5usize, "far");
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 3);
	assert_eq!(list.len(), 6);

	del(&target, 0usize);
	flush_scheduler_queue().unwrap();
	assert_eq!(runs.get(), 4);
	assert_eq!(list.get(0), Value::from(2));
}
