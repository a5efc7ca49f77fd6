//! Lifts a child node's value through a pure transform.

use std::rc::Rc;

use hashbrown::HashMap;

use crate::config::EvalConfig;
use crate::error::{EvalError, EvalResult};
use crate::memo::FilterCache;
use crate::node::{
    AnyNode, ChildNode, Node, NodeCore, NodeRef, ValueFn, WrappedNode, WrappedRef,
};
use crate::types::{DependencyMap, EvalMethods, ExposingNodes, FetchInfo, NodeType, Value};

type Transform<T, O> = Rc<dyn Fn(T) -> EvalResult<O>>;

/// Evaluates its child, then applies `func` to the result.
///
/// A function node introduces no dependencies of its own: dependency
/// extraction, depend values and fetch info all come from the child.
///
/// `C` is the child's handle. A plain function node has a `dyn Node<T>` child
/// and produces `O`; wrapping it yields a function node over the wrapped child
/// (`dyn WrappedNode<T>`), producing `ValueFn<O>` with the same transform
/// applied last.
pub struct FunctionNode<T: 'static, O: 'static, C: ?Sized + 'static = dyn Node<T>> {
    child: Rc<C>,
    func: Transform<T, O>,
    cache: FilterCache,
}

impl<T: 'static, O: 'static> FunctionNode<T, O> {
    pub fn new<F>(child: NodeRef<T>, func: F) -> Self
    where
        F: Fn(T) -> O + 'static,
    {
        Self::with_config(child, func, &EvalConfig::default())
    }

    pub fn with_config<F>(child: NodeRef<T>, func: F, config: &EvalConfig) -> Self
    where
        F: Fn(T) -> O + 'static,
    {
        let func: Transform<T, O> = Rc::new(move |value: T| -> EvalResult<O> { Ok(func(value)) });
        Self::from_parts(child, func, config)
    }

    /// Like [`FunctionNode::new`], for transforms that can fail. The error is
    /// surfaced from `evaluate` as [`EvalError::Transform`].
    pub fn fallible<F, E>(child: NodeRef<T>, func: F) -> Self
    where
        F: Fn(T) -> Result<O, E> + 'static,
        E: Into<anyhow::Error>,
    {
        Self::fallible_with_config(child, func, &EvalConfig::default())
    }

    pub fn fallible_with_config<F, E>(child: NodeRef<T>, func: F, config: &EvalConfig) -> Self
    where
        F: Fn(T) -> Result<O, E> + 'static,
        E: Into<anyhow::Error>,
    {
        let func: Transform<T, O> = Rc::new(move |value: T| -> EvalResult<O> {
            func(value).map_err(|err| EvalError::Transform(err.into()))
        });
        Self::from_parts(child, func, config)
    }
}

impl<T: 'static, O: 'static, C: ?Sized + 'static> FunctionNode<T, O, C> {
    fn from_parts(child: Rc<C>, func: Transform<T, O>, config: &EvalConfig) -> Self {
        FunctionNode {
            child,
            func,
            cache: FilterCache::new(config),
        }
    }

    pub fn child(&self) -> &Rc<C> {
        &self.child
    }
}

impl<T: 'static, O: 'static, C: ?Sized + ChildNode + 'static> NodeCore for FunctionNode<T, O, C> {
    fn node_type(&self) -> NodeType {
        NodeType::Function
    }

    fn children(&self) -> Vec<AnyNode> {
        vec![C::erase(&self.child)]
    }

    fn filter_nodes(&self, exposing: &ExposingNodes) -> EvalResult<Rc<DependencyMap>> {
        self.cache
            .get_or_compute(exposing, || self.child.filter_nodes(exposing))
    }

    fn depend_values(&self) -> HashMap<String, Value> {
        self.child.depend_values()
    }

    fn fetch_info(&self, exposing: &ExposingNodes) -> EvalResult<FetchInfo> {
        self.child.fetch_info(exposing)
    }
}

impl<T: 'static, O: 'static> Node<O> for FunctionNode<T, O> {
    fn just_eval(&self, exposing: &ExposingNodes, methods: Option<&EvalMethods>) -> EvalResult<O> {
        (self.func)(self.child.evaluate(exposing, methods)?)
    }

    /// Wrapping commutes with composition: the child is wrapped first, and the
    /// transform is applied to whatever the wrapped child yields once called.
    fn wrap_context(self: Rc<Self>, param_name: &str) -> WrappedRef<O> {
        let child = Rc::clone(&self.child).wrap_context(param_name);
        Rc::new(FunctionNode::from_parts(
            child,
            Rc::clone(&self.func),
            &self.cache.config(),
        ))
    }

    fn as_any_node(self: Rc<Self>) -> AnyNode {
        self
    }
}

impl<T: 'static, O: 'static> WrappedNode<O> for FunctionNode<T, O, dyn WrappedNode<T>> {
    fn just_eval(
        &self,
        exposing: &ExposingNodes,
        methods: Option<&EvalMethods>,
    ) -> EvalResult<ValueFn<O>> {
        let child_fn = self.child.evaluate(exposing, methods)?;
        let func = Rc::clone(&self.func);
        Ok(ValueFn::new(move |params: &[Value]| -> EvalResult<O> {
            func(child_fn.call_with(params)?)
        }))
    }

    fn params(&self) -> Vec<String> {
        self.child.params()
    }

    fn wrap_context(self: Rc<Self>, param_name: &str) -> WrappedRef<O> {
        let child = Rc::clone(&self.child).wrap_context(param_name);
        Rc::new(FunctionNode::from_parts(
            child,
            Rc::clone(&self.func),
            &self.cache.config(),
        ))
    }

    fn as_any_node(self: Rc<Self>) -> AnyNode {
        self
    }
}

/// Build a node evaluating to `func` applied to `child`'s value.
pub fn with_function<T, O, F>(child: NodeRef<T>, func: F) -> Rc<FunctionNode<T, O>>
where
    T: 'static,
    O: 'static,
    F: Fn(T) -> O + 'static,
{
    Rc::new(FunctionNode::new(child, func))
}

/// Fallible counterpart of [`with_function`].
pub fn with_try_function<T, O, E, F>(child: NodeRef<T>, func: F) -> Rc<FunctionNode<T, O>>
where
    T: 'static,
    O: 'static,
    E: Into<anyhow::Error>,
    F: Fn(T) -> Result<O, E> + 'static,
{
    Rc::new(FunctionNode::fallible(child, func))
}
