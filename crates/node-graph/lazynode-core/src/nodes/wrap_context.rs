//! Default context wrapping for nodes that read context values directly.

use std::rc::Rc;

use hashbrown::HashMap;
use log::trace;

use crate::config::EvalConfig;
use crate::error::EvalResult;
use crate::memo::FilterCache;
use crate::node::{AnyNode, NodeCore, NodeRef, ValueFn, WrappedNode, WrappedRef};
use crate::nodes::simple::from_value;
use crate::types::{DependencyMap, EvalMethods, ExposingNodes, FetchInfo, NodeType, Value};

/// Evaluates to a function that re-evaluates `inner` with each wrapped name
/// bound to the matching argument.
///
/// The exposing nodes and methods seen at evaluation time are captured by the
/// returned function; only the wrapped names are late-bound.
pub struct WrapContextNode<T: 'static> {
    inner: NodeRef<T>,
    params: Vec<String>,
    cache: FilterCache,
}

impl<T: 'static> WrapContextNode<T> {
    pub fn new(inner: NodeRef<T>, param_name: &str) -> Self {
        Self::with_config(inner, param_name, &EvalConfig::default())
    }

    pub fn with_config(inner: NodeRef<T>, param_name: &str, config: &EvalConfig) -> Self {
        WrapContextNode {
            inner,
            params: vec![param_name.to_string()],
            cache: FilterCache::new(config),
        }
    }

    pub fn wrap(inner: NodeRef<T>, param_name: &str, config: &EvalConfig) -> WrappedRef<T> {
        Rc::new(Self::with_config(inner, param_name, config))
    }

    pub fn inner(&self) -> &NodeRef<T> {
        &self.inner
    }
}

impl<T: 'static> NodeCore for WrapContextNode<T> {
    fn node_type(&self) -> NodeType {
        NodeType::WrapContext
    }

    fn children(&self) -> Vec<AnyNode> {
        vec![Rc::clone(&self.inner).as_any_node()]
    }

    /// Wrapped names are supplied by the caller of the evaluated function, so
    /// they are never dependencies on the exposing nodes.
    fn filter_nodes(&self, exposing: &ExposingNodes) -> EvalResult<Rc<DependencyMap>> {
        self.cache.get_or_compute(exposing, || {
            self.inner.filter_nodes(&exposing.without(self.params.as_slice()))
        })
    }

    fn depend_values(&self) -> HashMap<String, Value> {
        self.inner.depend_values()
    }

    fn fetch_info(&self, exposing: &ExposingNodes) -> EvalResult<FetchInfo> {
        self.inner.fetch_info(&exposing.without(self.params.as_slice()))
    }
}

impl<T: 'static> WrappedNode<T> for WrapContextNode<T> {
    fn just_eval(
        &self,
        exposing: &ExposingNodes,
        methods: Option<&EvalMethods>,
    ) -> EvalResult<ValueFn<T>> {
        let inner = Rc::clone(&self.inner);
        let params = self.params.clone();
        let exposing = exposing.clone();
        let methods = methods.cloned();
        Ok(ValueFn::new(move |args: &[Value]| -> EvalResult<T> {
            trace!("bind context {:?}", params);
            let mut scoped = exposing.clone();
            for (idx, name) in params.iter().enumerate() {
                let value = args.get(idx).cloned().unwrap_or(Value::Null);
                scoped.insert(name.as_str(), from_value(value));
            }
            inner.evaluate(&scoped, methods.as_ref())
        }))
    }

    fn params(&self) -> Vec<String> {
        self.params.clone()
    }

    fn wrap_context(self: Rc<Self>, param_name: &str) -> WrappedRef<T> {
        let mut params = self.params.clone();
        params.push(param_name.to_string());
        Rc::new(WrapContextNode {
            inner: Rc::clone(&self.inner),
            params,
            cache: FilterCache::new(&self.cache.config()),
        })
    }

    fn as_any_node(self: Rc<Self>) -> AnyNode {
        self
    }
}
