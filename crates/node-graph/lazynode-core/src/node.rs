//! The capability contract shared by every node variant.
//!
//! A node is an immutable unit of lazy computation. Values are never stored
//! on the node; they are derived on demand from the exposing nodes supplied
//! with each call. Composites hold their children through shared handles, so
//! one child may appear under several parents in the same graph.

use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use log::trace;

use crate::error::EvalResult;
use crate::types::{DependencyMap, EvalMethods, ExposingNodes, FetchInfo, NodeType, Value};

/// Shared handle to a node producing `T`.
pub type NodeRef<T> = Rc<dyn Node<T>>;

/// Shared handle to a context-wrapped node producing [`ValueFn<T>`].
pub type WrappedRef<T> = Rc<dyn WrappedNode<T>>;

/// Type-erased handle, used for child enumeration and dependency keys.
pub type AnyNode = Rc<dyn NodeCore>;

/// Evaluation result of a context-wrapped node: still needs the values of its
/// late-bound context variables, in wrapping order, to produce `T`.
pub struct ValueFn<T>(Rc<dyn Fn(&[Value]) -> EvalResult<T>>);

impl<T> ValueFn<T> {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&[Value]) -> EvalResult<T> + 'static,
    {
        ValueFn(Rc::new(func))
    }

    /// Call with a single late-bound value.
    pub fn call(&self, param: Value) -> EvalResult<T> {
        (self.0)(std::slice::from_ref(&param))
    }

    /// Call with one value per wrapped name. Missing values bind `null`;
    /// extra values are ignored.
    pub fn call_with(&self, params: &[Value]) -> EvalResult<T> {
        (self.0)(params)
    }
}

impl<T> Clone for ValueFn<T> {
    fn clone(&self) -> Self {
        ValueFn(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for ValueFn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueFn(..)")
    }
}

/// Operations that do not depend on a node's output type.
pub trait NodeCore {
    fn node_type(&self) -> NodeType;

    /// Immediate structural children, in a stable order.
    fn children(&self) -> Vec<AnyNode>;

    /// Exposing nodes this subtree transitively reads, with the paths used
    /// to reach them. Implementations memoize per exposing-node shape, so a
    /// repeated call returns the same map instance.
    fn filter_nodes(&self, exposing: &ExposingNodes) -> EvalResult<Rc<DependencyMap>>;

    /// Raw dependency data exposed by this subtree.
    fn depend_values(&self) -> HashMap<String, Value>;

    fn fetch_info(&self, exposing: &ExposingNodes) -> EvalResult<FetchInfo>;

    /// Named child reachable by a path segment, for aggregating variants.
    fn child_by_name(&self, _name: &str) -> Option<AnyNode> {
        None
    }
}

pub trait Node<T: 'static>: NodeCore {
    /// Variant-specific evaluation.
    fn just_eval(&self, exposing: &ExposingNodes, methods: Option<&EvalMethods>)
        -> EvalResult<T>;

    fn evaluate(&self, exposing: &ExposingNodes, methods: Option<&EvalMethods>) -> EvalResult<T> {
        trace!("evaluate {:?} node", self.node_type());
        self.just_eval(exposing, methods)
    }

    /// Return a new node that evaluates to a function of the context value
    /// named `param_name`, instead of reading it from the exposing nodes.
    /// The receiver is left untouched.
    fn wrap_context(self: Rc<Self>, param_name: &str) -> WrappedRef<T>;

    fn as_any_node(self: Rc<Self>) -> AnyNode;
}

/// A node whose value is a [`ValueFn`] over one or more late-bound context
/// variables.
///
/// Wrapping again appends a parameter instead of nesting functions, so the
/// output type stays `ValueFn<T>` however many names are wrapped.
pub trait WrappedNode<T: 'static>: NodeCore {
    fn just_eval(
        &self,
        exposing: &ExposingNodes,
        methods: Option<&EvalMethods>,
    ) -> EvalResult<ValueFn<T>>;

    fn evaluate(
        &self,
        exposing: &ExposingNodes,
        methods: Option<&EvalMethods>,
    ) -> EvalResult<ValueFn<T>> {
        trace!("evaluate wrapped {:?} node", self.node_type());
        self.just_eval(exposing, methods)
    }

    /// Late-bound names, in the order the produced function takes them.
    fn params(&self) -> Vec<String>;

    /// Return a new node taking `param_name` as one more trailing parameter.
    fn wrap_context(self: Rc<Self>, param_name: &str) -> WrappedRef<T>;

    fn as_any_node(self: Rc<Self>) -> AnyNode;
}

/// Erases a shared child handle, whichever node trait it is viewed through.
pub trait ChildNode: NodeCore {
    fn erase(node: &Rc<Self>) -> AnyNode;
}

impl<T: 'static> ChildNode for dyn Node<T> {
    fn erase(node: &Rc<Self>) -> AnyNode {
        Rc::clone(node).as_any_node()
    }
}

impl<T: 'static> ChildNode for dyn WrappedNode<T> {
    fn erase(node: &Rc<Self>) -> AnyNode {
        Rc::clone(node).as_any_node()
    }
}
