use std::rc::Rc;

use hashbrown::HashMap;

use crate::config::EvalConfig;
use crate::error::EvalResult;
use crate::node::{AnyNode, Node, NodeCore, NodeRef, WrappedRef};
use crate::nodes::wrap_context::WrapContextNode;
use crate::types::{DependencyMap, EvalMethods, ExposingNodes, FetchInfo, NodeType, Value};

/// Constant node: evaluates to a clone of its value.
pub struct SimpleNode<T> {
    value: T,
    deps: Rc<DependencyMap>,
}

impl<T> SimpleNode<T> {
    pub fn new(value: T) -> Self {
        SimpleNode {
            value,
            deps: Rc::new(DependencyMap::new()),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: 'static> NodeCore for SimpleNode<T> {
    fn node_type(&self) -> NodeType {
        NodeType::Simple
    }

    fn children(&self) -> Vec<AnyNode> {
        Vec::new()
    }

    fn filter_nodes(&self, _exposing: &ExposingNodes) -> EvalResult<Rc<DependencyMap>> {
        Ok(Rc::clone(&self.deps))
    }

    fn depend_values(&self) -> HashMap<String, Value> {
        HashMap::new()
    }

    fn fetch_info(&self, _exposing: &ExposingNodes) -> EvalResult<FetchInfo> {
        Ok(FetchInfo::default())
    }
}

impl<T: Clone + 'static> Node<T> for SimpleNode<T> {
    fn just_eval(
        &self,
        _exposing: &ExposingNodes,
        _methods: Option<&EvalMethods>,
    ) -> EvalResult<T> {
        Ok(self.value.clone())
    }

    fn wrap_context(self: Rc<Self>, param_name: &str) -> WrappedRef<T> {
        WrapContextNode::<T>::wrap(self, param_name, &EvalConfig::default())
    }

    fn as_any_node(self: Rc<Self>) -> AnyNode {
        self
    }
}

/// Build a constant node.
pub fn from_value<T: Clone + 'static>(value: T) -> NodeRef<T> {
    Rc::new(SimpleNode::new(value))
}
