use std::rc::Rc;

use hashbrown::HashMap;
use serde_json::Map;

use crate::config::EvalConfig;
use crate::error::EvalResult;
use crate::memo::FilterCache;
use crate::node::{AnyNode, Node, NodeCore, NodeRef, WrappedRef};
use crate::nodes::wrap_context::WrapContextNode;
use crate::types::{DependencyMap, EvalMethods, ExposingNodes, FetchInfo, NodeType, Value};

/// Aggregates named children into a JSON object.
pub struct RecordNode {
    fields: Vec<(String, NodeRef<Value>)>,
    cache: FilterCache,
}

impl RecordNode {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, NodeRef<Value>)>,
        S: Into<String>,
    {
        Self::with_config(fields, &EvalConfig::default())
    }

    pub fn with_config<I, S>(fields: I, config: &EvalConfig) -> Self
    where
        I: IntoIterator<Item = (S, NodeRef<Value>)>,
        S: Into<String>,
    {
        let mut collected: Vec<(String, NodeRef<Value>)> = Vec::new();
        for (name, node) in fields {
            let name = name.into();
            match collected.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = node,
                None => collected.push((name, node)),
            }
        }
        RecordNode {
            fields: collected,
            cache: FilterCache::new(config),
        }
    }

    pub fn field(&self, name: &str) -> Option<&NodeRef<Value>> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, node)| node)
    }
}

impl NodeCore for RecordNode {
    fn node_type(&self) -> NodeType {
        NodeType::Record
    }

    fn children(&self) -> Vec<AnyNode> {
        self.fields
            .iter()
            .map(|(_, node)| Rc::clone(node).as_any_node())
            .collect()
    }

    fn filter_nodes(&self, exposing: &ExposingNodes) -> EvalResult<Rc<DependencyMap>> {
        self.cache.get_or_compute(exposing, || {
            let mut deps = DependencyMap::new();
            for (_, node) in &self.fields {
                let child = node.filter_nodes(exposing)?;
                deps.merge(&child);
            }
            Ok(Rc::new(deps))
        })
    }

    fn depend_values(&self) -> HashMap<String, Value> {
        let mut merged = HashMap::new();
        for (_, node) in &self.fields {
            merged.extend(node.depend_values());
        }
        merged
    }

    fn fetch_info(&self, exposing: &ExposingNodes) -> EvalResult<FetchInfo> {
        self.fields
            .iter()
            .try_fold(FetchInfo::default(), |acc, (_, node)| -> EvalResult<FetchInfo> {
                Ok(acc.merge(node.fetch_info(exposing)?))
            })
    }

    fn child_by_name(&self, name: &str) -> Option<AnyNode> {
        self.field(name).map(|node| Rc::clone(node).as_any_node())
    }
}

impl Node<Value> for RecordNode {
    fn just_eval(
        &self,
        exposing: &ExposingNodes,
        methods: Option<&EvalMethods>,
    ) -> EvalResult<Value> {
        let mut object = Map::with_capacity(self.fields.len());
        for (name, node) in &self.fields {
            object.insert(name.clone(), node.evaluate(exposing, methods)?);
        }
        Ok(Value::Object(object))
    }

    fn wrap_context(self: Rc<Self>, param_name: &str) -> WrappedRef<Value> {
        let config = self.cache.config();
        WrapContextNode::<Value>::wrap(self, param_name, &config)
    }

    fn as_any_node(self: Rc<Self>) -> AnyNode {
        self
    }
}

/// Build a node evaluating each field and collecting the results into an object.
pub fn from_record<I, S>(fields: I) -> NodeRef<Value>
where
    I: IntoIterator<Item = (S, NodeRef<Value>)>,
    S: Into<String>,
{
    Rc::new(RecordNode::new(fields))
}
