//! Leaf node that reads an exposing node by dotted path.

use std::rc::Rc;

use hashbrown::HashMap;
use log::debug;

use crate::config::EvalConfig;
use crate::error::{EvalError, EvalResult};
use crate::memo::FilterCache;
use crate::node::{AnyNode, Node, NodeCore, NodeRef, WrappedRef};
use crate::nodes::wrap_context::WrapContextNode;
use crate::types::{DependencyMap, EvalMethods, ExposingNodes, FetchInfo, NodeType, Value};

/// Reads `head.rest...`: evaluates the exposing node named `head`, then walks
/// the remaining segments through the resulting value. Unknown segments
/// yield `null`; an unknown head is a missing dependency.
pub struct ReferenceNode {
    path: String,
    segments: Vec<String>,
    cache: FilterCache,
}

impl ReferenceNode {
    pub fn new(path: &str) -> Self {
        Self::with_config(path, &EvalConfig::default())
    }

    pub fn with_config(path: &str, config: &EvalConfig) -> Self {
        let segments = path
            .split('.')
            .map(str::trim)
            .filter(|seg| !seg.is_empty())
            .map(str::to_string)
            .collect();
        ReferenceNode {
            path: path.trim().to_string(),
            segments,
            cache: FilterCache::new(config),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn head(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or("")
    }

    fn lookup<'a>(&self, exposing: &'a ExposingNodes) -> EvalResult<&'a NodeRef<Value>> {
        exposing.get(self.head()).ok_or_else(|| {
            debug!("reference '{}' has no exposing node '{}'", self.path, self.head());
            EvalError::missing(self.head())
        })
    }
}

fn descend(value: Value, segment: &str) -> Value {
    match value {
        Value::Object(mut fields) => fields.remove(segment).unwrap_or(Value::Null),
        Value::Array(mut items) => match segment.parse::<usize>() {
            Ok(idx) if idx < items.len() => items.swap_remove(idx),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

impl NodeCore for ReferenceNode {
    fn node_type(&self) -> NodeType {
        NodeType::Reference
    }

    fn children(&self) -> Vec<AnyNode> {
        Vec::new()
    }

    /// Records the full path under the deepest node reachable through named
    /// children of the head node.
    fn filter_nodes(&self, exposing: &ExposingNodes) -> EvalResult<Rc<DependencyMap>> {
        self.cache.get_or_compute(exposing, || {
            let mut deps = DependencyMap::new();
            if let Some(root) = exposing.get(self.head()) {
                let mut node = Rc::clone(root).as_any_node();
                for segment in self.segments.iter().skip(1) {
                    match node.child_by_name(segment) {
                        Some(child) => node = child,
                        None => break,
                    }
                }
                deps.insert_path(&node, self.path.clone());
            }
            Ok(Rc::new(deps))
        })
    }

    /// A reference resolves through the exposing nodes and holds no raw
    /// values of its own.
    fn depend_values(&self) -> HashMap<String, Value> {
        HashMap::new()
    }

    fn fetch_info(&self, exposing: &ExposingNodes) -> EvalResult<FetchInfo> {
        match exposing.get(self.head()) {
            Some(node) => node.fetch_info(exposing),
            None => Ok(FetchInfo::default()),
        }
    }
}

impl Node<Value> for ReferenceNode {
    fn just_eval(
        &self,
        exposing: &ExposingNodes,
        methods: Option<&EvalMethods>,
    ) -> EvalResult<Value> {
        let root = self.lookup(exposing)?.evaluate(exposing, methods)?;
        Ok(self
            .segments
            .iter()
            .skip(1)
            .fold(root, |acc, segment| descend(acc, segment)))
    }

    fn wrap_context(self: Rc<Self>, param_name: &str) -> WrappedRef<Value> {
        let config = self.cache.config();
        WrapContextNode::<Value>::wrap(self, param_name, &config)
    }

    fn as_any_node(self: Rc<Self>) -> AnyNode {
        self
    }
}

/// Build a node reading the exposing node at `path` (e.g. `"input1.value"`).
pub fn from_reference(path: &str) -> NodeRef<Value> {
    Rc::new(ReferenceNode::new(path))
}
