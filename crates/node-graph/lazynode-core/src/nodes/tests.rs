//! Behavioural coverage for function nodes and their interaction with the
//! other variants.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::anyhow;
use hashbrown::HashMap;
use serde_json::json;

use super::*;
use crate::config::EvalConfig;
use crate::error::{EvalError, EvalResult};
use crate::node::{AnyNode, Node, NodeCore, NodeRef, WrappedNode, WrappedRef};
use crate::types::{
    DependencyMap, EvalMethods, ExposingNodes, FetchInfo, NodeKey, NodeType, Value,
};

/// Leaf that echoes the exposing node `x`, counting how often it is asked
/// for dependencies and whether evaluation methods reached it.
struct CountingNode {
    filter_calls: Cell<usize>,
    method_calls: Cell<usize>,
    fetching: bool,
}

impl CountingNode {
    fn new() -> Rc<Self> {
        Rc::new(CountingNode {
            filter_calls: Cell::new(0),
            method_calls: Cell::new(0),
            fetching: false,
        })
    }
}

impl NodeCore for CountingNode {
    fn node_type(&self) -> NodeType {
        NodeType::Reference
    }

    fn children(&self) -> Vec<AnyNode> {
        Vec::new()
    }

    fn filter_nodes(&self, exposing: &ExposingNodes) -> EvalResult<Rc<DependencyMap>> {
        self.filter_calls.set(self.filter_calls.get() + 1);
        let mut deps = DependencyMap::new();
        if let Some(x) = exposing.get("x") {
            deps.insert_path(&Rc::clone(x).as_any_node(), "x");
        }
        Ok(Rc::new(deps))
    }

    fn depend_values(&self) -> HashMap<String, Value> {
        let mut values = HashMap::new();
        values.insert("x".to_string(), json!("raw"));
        values
    }

    fn fetch_info(&self, _exposing: &ExposingNodes) -> EvalResult<FetchInfo> {
        Ok(FetchInfo {
            is_fetching: self.fetching,
            ready: !self.fetching,
        })
    }
}

impl Node<Value> for CountingNode {
    fn just_eval(
        &self,
        exposing: &ExposingNodes,
        methods: Option<&EvalMethods>,
    ) -> EvalResult<Value> {
        if let Some(hit) = methods.and_then(|m| m.get("counter", "hit")) {
            self.method_calls.set(self.method_calls.get() + 1);
            hit(&[]);
        }
        let x = exposing.get("x").ok_or_else(|| EvalError::missing("x"))?;
        x.evaluate(exposing, methods)
    }

    fn wrap_context(self: Rc<Self>, param_name: &str) -> WrappedRef<Value> {
        WrapContextNode::<Value>::wrap(self, param_name, &EvalConfig::default())
    }

    fn as_any_node(self: Rc<Self>) -> AnyNode {
        self
    }
}

fn exposing_x(value: Value) -> ExposingNodes {
    [("x", from_value(value))].into_iter().collect()
}

fn as_i64(v: Value) -> i64 {
    v.as_i64().unwrap_or_default()
}

// --- Evaluation ----------------------------------------------------------

#[test]
fn it_should_apply_transform_to_child_value() {
    let node = with_function(from_value(21_i64), |v| v * 2);
    let out = node
        .evaluate(&ExposingNodes::new(), None)
        .expect("constant child evaluates");
    assert_eq!(out, 42);
}

#[test]
fn it_should_apply_transform_to_context_value() {
    let node = with_function(from_reference("x"), |v: Value| as_i64(v) + 1);
    assert_eq!(node.evaluate(&exposing_x(json!(4)), None).expect("x bound"), 5);
    assert_eq!(node.evaluate(&exposing_x(json!(9)), None).expect("x bound"), 10);
}

#[test]
fn it_should_compose_nested_transforms_inner_first() {
    let parsed: NodeRef<i64> = with_function(from_reference("x"), as_i64);
    let shifted: NodeRef<i64> = with_function(parsed, |n| n + 3);
    let scaled = with_function(shifted, |n| n * 10);
    assert_eq!(scaled.evaluate(&exposing_x(json!(1)), None).expect("chain"), 40);
}

#[test]
fn it_should_report_function_type_tag() {
    let node = with_function(from_value(1_i64), |v| v);
    assert_eq!(node.node_type(), NodeType::Function);
    assert_eq!(
        serde_json::to_value(node.node_type()).expect("serialize tag"),
        json!("function")
    );
}

#[test]
fn it_should_forward_eval_methods_unchanged() {
    let counting = CountingNode::new();
    let hits = Rc::new(Cell::new(0));
    let mut methods = EvalMethods::new();
    let counter = Rc::clone(&hits);
    methods.insert("counter", "hit", move |_| {
        counter.set(counter.get() + 1);
        Value::Null
    });

    let child: NodeRef<Value> = counting.clone();
    let node = with_function(child, |v: Value| v);
    node.evaluate(&exposing_x(json!(1)), Some(&methods))
        .expect("evaluates with methods");
    node.evaluate(&exposing_x(json!(1)), None)
        .expect("evaluates without methods");

    assert_eq!(counting.method_calls.get(), 1);
    assert_eq!(hits.get(), 1);
}

// --- Dependency extraction -----------------------------------------------

#[test]
fn it_should_pass_dependencies_through_from_child() {
    let exposing = exposing_x(json!(1));
    let child = from_reference("x");
    let node = with_function(Rc::clone(&child), as_i64);

    let from_node = node.filter_nodes(&exposing).expect("node deps");
    let from_child = child.filter_nodes(&exposing).expect("child deps");
    assert_eq!(*from_node, *from_child);

    let x = exposing.get("x").cloned().expect("x bound").as_any_node();
    assert_eq!(from_node.paths(&x), Some(&["x".to_string()][..]));
}

#[test]
fn it_should_memoize_filter_nodes_per_exposing_shape() {
    let counting = CountingNode::new();
    let child: NodeRef<Value> = counting.clone();
    let node = with_function(child, |v: Value| v);
    let exposing = exposing_x(json!(1));

    let first = node.filter_nodes(&exposing).expect("first call");
    let second = node.filter_nodes(&exposing.clone()).expect("second call");
    assert_eq!(counting.filter_calls.get(), 1);
    assert!(Rc::ptr_eq(&first, &second));

    // A fresh binding for `x` is a different shape.
    node.filter_nodes(&exposing_x(json!(1))).expect("third call");
    assert_eq!(counting.filter_calls.get(), 2);
}

#[test]
fn it_should_not_cache_with_zero_capacity() {
    let counting = CountingNode::new();
    let child: NodeRef<Value> = counting.clone();
    let config = EvalConfig {
        filter_cache_capacity: 0,
    };
    let node = FunctionNode::with_config(child, |v: Value| v, &config);
    let exposing = exposing_x(json!(1));

    node.filter_nodes(&exposing).expect("first call");
    node.filter_nodes(&exposing).expect("second call");
    assert_eq!(counting.filter_calls.get(), 2);
}

#[test]
fn it_should_keep_distinct_keys_for_identical_nodes() {
    let a = from_value(json!(1));
    let b = from_value(json!(1));
    let exposing: ExposingNodes = [("a", Rc::clone(&a)), ("b", Rc::clone(&b))]
        .into_iter()
        .collect();
    let node = with_function(
        from_record([("l", from_reference("a")), ("r", from_reference("b"))]),
        |v: Value| v,
    );

    let deps = node.filter_nodes(&exposing).expect("deps");
    assert_eq!(deps.len(), 2);
    assert_eq!(deps.paths(&a.as_any_node()), Some(&["a".to_string()][..]));
    assert_eq!(deps.paths(&b.as_any_node()), Some(&["b".to_string()][..]));
}

#[test]
fn it_should_carry_config_through_fallible_constructor() {
    let counting = CountingNode::new();
    let child: NodeRef<Value> = counting.clone();
    let config = EvalConfig {
        filter_cache_capacity: 0,
    };
    let node = FunctionNode::fallible_with_config(
        child,
        |v: Value| -> anyhow::Result<Value> { Ok(v) },
        &config,
    );
    let exposing = exposing_x(json!(1));

    node.filter_nodes(&exposing).expect("first call");
    node.filter_nodes(&exposing).expect("second call");
    assert_eq!(counting.filter_calls.get(), 2);
}

#[test]
fn it_should_release_exposing_nodes_after_filtering() {
    let node = with_function(from_reference("x"), |v: Value| v);
    let x = from_value(json!(1));
    let weak = Rc::downgrade(&x);
    let exposing: ExposingNodes = [("x", x)].into_iter().collect();

    let deps = node.filter_nodes(&exposing).expect("deps");
    assert_eq!(deps.iter().count(), 1);

    drop(exposing);
    assert!(weak.upgrade().is_none());
    assert_eq!(deps.len(), 1);
    assert_eq!(deps.iter().count(), 0);
}

// --- Structure and metadata ----------------------------------------------

#[test]
fn it_should_list_child_by_identity() {
    let child = from_value(json!(1));
    let node = with_function(Rc::clone(&child), |v: Value| v);
    let children = node.children();
    assert_eq!(children.len(), 1);
    assert_eq!(
        NodeKey::new(&children[0]),
        NodeKey::new(&child.as_any_node())
    );
    assert_eq!(
        NodeKey::new(&Rc::clone(node.child()).as_any_node()),
        NodeKey::new(&children[0])
    );
}

#[test]
fn it_should_pass_depend_values_and_fetch_info_through() {
    let counting = Rc::new(CountingNode {
        filter_calls: Cell::new(0),
        method_calls: Cell::new(0),
        fetching: true,
    });
    let child: NodeRef<Value> = counting;
    let node = with_function(child, |v: Value| v);

    assert_eq!(node.depend_values().get("x"), Some(&json!("raw")));
    assert_eq!(
        node.fetch_info(&ExposingNodes::new()).expect("fetch info"),
        FetchInfo {
            is_fetching: true,
            ready: false
        }
    );
}

#[test]
fn it_should_share_a_child_between_composites() {
    let shared = from_reference("x");
    let doubled = with_function(Rc::clone(&shared), |v: Value| as_i64(v) * 2);
    let negated = with_function(Rc::clone(&shared), |v: Value| -as_i64(v));
    let exposing = exposing_x(json!(6));
    assert_eq!(doubled.evaluate(&exposing, None).expect("doubled"), 12);
    assert_eq!(negated.evaluate(&exposing, None).expect("negated"), -6);
    assert_eq!(
        NodeKey::new(&doubled.children()[0]),
        NodeKey::new(&negated.children()[0])
    );
}

// --- Context wrapping ----------------------------------------------------

#[test]
fn it_should_commute_wrapping_with_the_transform() {
    let node = with_function(from_reference("x"), |v: Value| as_i64(v) * 2);
    let g = node
        .wrap_context("x")
        .evaluate(&ExposingNodes::new(), None)
        .expect("wrapped node evaluates without x");
    assert_eq!(g.call(json!(5)).expect("call with 5"), 10);
    assert_eq!(g.call(json!(-1)).expect("call with -1"), -2);
}

#[test]
fn it_should_match_evaluation_under_bound_context() {
    let exposing: ExposingNodes = [("offset", from_value(json!(100)))].into_iter().collect();
    let sum = with_function(
        from_record([("x", from_reference("x")), ("offset", from_reference("offset"))]),
        |v: Value| as_i64(v["x"].clone()) + as_i64(v["offset"].clone()),
    );

    let g = Rc::clone(&sum)
        .wrap_context("x")
        .evaluate(&exposing, None)
        .expect("wrapped");
    let bound = exposing.with("x", from_value(json!(7)));
    assert_eq!(
        g.call(json!(7)).expect("call"),
        sum.evaluate(&bound, None).expect("direct")
    );
}

#[test]
fn it_should_apply_transform_after_nested_wrapping() {
    let parsed: NodeRef<i64> = with_function(from_reference("x"), as_i64);
    let node = with_function(parsed, |n| format!("#{n}"));
    let g = node
        .wrap_context("x")
        .evaluate(&ExposingNodes::new(), None)
        .expect("wrapped");
    assert_eq!(g.call(json!(3)).expect("call"), "#3");
}

#[test]
fn it_should_leave_the_original_node_untouched() {
    let node = with_function(from_reference("x"), |v: Value| as_i64(v) * 2);
    let exposing = exposing_x(json!(4));
    let before = node.evaluate(&exposing, None).expect("before");

    let over_x = Rc::clone(&node).wrap_context("x");
    let over_y = Rc::clone(&node).wrap_context("y");
    let after = node.evaluate(&exposing, None).expect("after");
    assert_eq!(before, after);

    let gx = over_x.evaluate(&exposing, None).expect("x wrapped");
    let gy = over_y.evaluate(&exposing, None).expect("y wrapped");
    // `y` is not read by the child, so its wrapper still sees x = 4.
    assert_eq!(gx.call(json!(1)).expect("gx"), 2);
    assert_eq!(gy.call(json!(1)).expect("gy"), 8);
}

#[test]
fn it_should_drop_wrapped_name_from_dependencies() {
    let exposing: ExposingNodes = [("x", from_value(json!(1))), ("y", from_value(json!(2)))]
        .into_iter()
        .collect();
    let node = with_function(
        from_record([("x", from_reference("x")), ("y", from_reference("y"))]),
        |v: Value| v,
    );
    let wrapped = node.wrap_context("x");
    assert_eq!(wrapped.node_type(), NodeType::Function);

    let deps = wrapped.filter_nodes(&exposing).expect("deps");
    let y = exposing.get("y").cloned().expect("y bound").as_any_node();
    let x = exposing.get("x").cloned().expect("x bound").as_any_node();
    assert!(deps.contains(&y));
    assert!(!deps.contains(&x));
}

#[test]
fn it_should_wrap_twice_for_two_late_bound_names() {
    let node = with_function(
        from_record([("x", from_reference("x")), ("y", from_reference("y"))]),
        |v: Value| as_i64(v["x"].clone()) * 10 + as_i64(v["y"].clone()),
    );
    let wrapped = Rc::clone(&node).wrap_context("x").wrap_context("y");
    assert_eq!(wrapped.params(), vec!["x".to_string(), "y".to_string()]);
    assert_eq!(wrapped.node_type(), NodeType::Function);

    let g = wrapped
        .evaluate(&ExposingNodes::new(), None)
        .expect("wrapped node evaluates without x or y");
    let bound: ExposingNodes = [("x", from_value(json!(3))), ("y", from_value(json!(4)))]
        .into_iter()
        .collect();
    assert_eq!(g.call_with(&[json!(3), json!(4)]).expect("call"), 34);
    assert_eq!(
        g.call_with(&[json!(3), json!(4)]).expect("call"),
        node.evaluate(&bound, None).expect("direct")
    );

    let deps = wrapped.filter_nodes(&bound).expect("deps");
    assert!(deps.is_empty());
}

#[test]
fn it_should_bind_null_for_missing_wrapped_arguments() {
    let node = with_function(
        from_record([("x", from_reference("x")), ("y", from_reference("y"))]),
        |v: Value| v["y"].is_null(),
    );
    let g = node
        .wrap_context("x")
        .wrap_context("y")
        .evaluate(&ExposingNodes::new(), None)
        .expect("wrapped");
    assert!(g.call(json!(1)).expect("y left unbound"));
    assert!(!g.call_with(&[json!(1), json!(2)]).expect("y bound"));
}

// --- Error propagation ---------------------------------------------------

#[test]
fn it_should_surface_transform_failure_verbatim() {
    let node = with_try_function(from_value(json!(0)), |v: Value| {
        if as_i64(v) == 0 {
            Err(anyhow!("bad input"))
        } else {
            Ok(1_i64)
        }
    });
    let err = node
        .evaluate(&ExposingNodes::new(), None)
        .expect_err("transform fails");
    assert!(matches!(err, EvalError::Transform(_)));
    assert_eq!(err.to_string(), "bad input");
}

#[test]
fn it_should_surface_transform_failure_from_wrapped_call() {
    let node = with_try_function(from_reference("x"), |v: Value| {
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("expected text"))
    });
    let g = node
        .wrap_context("x")
        .evaluate(&ExposingNodes::new(), None)
        .expect("wrapped");
    assert_eq!(g.call(json!("ok")).expect("text"), "ok");
    let err = g.call(json!(1)).expect_err("number rejected");
    assert_eq!(err.to_string(), "expected text");
}

#[test]
fn it_should_surface_child_failure_unchanged() {
    let exposing = exposing_x(json!(1));
    let child = from_reference("y");
    let node = with_function(Rc::clone(&child), |v: Value| v);

    let child_err = child.evaluate(&exposing, None).expect_err("child fails");
    let node_err = node.evaluate(&exposing, None).expect_err("node fails");
    assert_eq!(node_err.missing_name(), Some("y"));
    assert_eq!(node_err.to_string(), child_err.to_string());
}
