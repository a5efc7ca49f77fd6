//! Shared data types for node evaluation: identities, dependency maps and
//! the per-call evaluation context.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::node::{AnyNode, NodeCore, NodeRef};

/// Output type used wherever a node's concrete type is not known.
pub type Value = serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    Simple,
    Function,
    Record,
    Reference,
    WrapContext,
}

/// Descriptive metadata about whether a node's inputs are still loading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FetchInfo {
    pub is_fetching: bool,
    pub ready: bool,
}

impl Default for FetchInfo {
    fn default() -> Self {
        FetchInfo {
            is_fetching: false,
            ready: true,
        }
    }
}

impl FetchInfo {
    pub fn merge(self, other: FetchInfo) -> FetchInfo {
        FetchInfo {
            is_fetching: self.is_fetching || other.is_fetching,
            ready: self.ready && other.ready,
        }
    }
}

/// Identity handle for a node. Equality and hashing use the node's address,
/// never its contents, so two structurally identical nodes are distinct keys.
///
/// The key holds the node weakly: dependency maps and memo caches never keep
/// a graph alive. The weak handle pins the allocation, so the address is not
/// reused by another node while the key exists.
#[derive(Clone)]
pub struct NodeKey(Weak<dyn NodeCore>);

impl NodeKey {
    pub fn new(node: &AnyNode) -> Self {
        NodeKey(Rc::downgrade(node))
    }

    /// The node, if it is still alive.
    pub fn node(&self) -> Option<AnyNode> {
        self.0.upgrade()
    }

    fn addr(&self) -> *const () {
        self.0.as_ptr() as *const ()
    }
}

impl PartialEq for NodeKey {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for NodeKey {}

impl Hash for NodeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.addr() as usize).hash(state);
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Some(node) => write!(f, "{:?}@{:p}", node.node_type(), self.addr()),
            None => write!(f, "dropped@{:p}", self.addr()),
        }
    }
}

/// Externally exposed nodes a subtree depends on, with the access paths
/// used to reach each of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMap {
    entries: HashMap<NodeKey, Vec<String>>,
}

impl DependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` under `node`. Duplicate paths are ignored; order of first
    /// insertion is kept.
    pub fn insert_path(&mut self, node: &AnyNode, path: impl Into<String>) {
        self.insert_key(NodeKey::new(node), path.into());
    }

    fn insert_key(&mut self, key: NodeKey, path: String) {
        let paths = self.entries.entry(key).or_default();
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    pub fn merge(&mut self, other: &DependencyMap) {
        for (key, paths) in &other.entries {
            for path in paths {
                self.insert_key(key.clone(), path.clone());
            }
        }
    }

    pub fn paths(&self, node: &AnyNode) -> Option<&[String]> {
        self.entries.get(&NodeKey::new(node)).map(Vec::as_slice)
    }

    pub fn contains(&self, node: &AnyNode) -> bool {
        self.paths(node).is_some()
    }

    /// Entries whose node is still alive.
    pub fn iter(&self) -> impl Iterator<Item = (AnyNode, &[String])> {
        self.entries
            .iter()
            .filter_map(|(key, paths)| key.node().map(|node| (node, paths.as_slice())))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identity fingerprint of an [`ExposingNodes`] map: its names, sorted, each
/// paired with the identity of the node bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExposingShape(Vec<(String, NodeKey)>);

/// Named external nodes available to one evaluation pass. Cloning is cheap;
/// the bindings are shared until one side is modified.
#[derive(Clone, Default)]
pub struct ExposingNodes {
    nodes: Rc<HashMap<String, NodeRef<Value>>>,
}

impl ExposingNodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, node: NodeRef<Value>) {
        Rc::make_mut(&mut self.nodes).insert(name.into(), node);
    }

    /// Copy of this map with `name` bound to `node`.
    pub fn with(&self, name: &str, node: NodeRef<Value>) -> Self {
        let mut scoped = self.clone();
        scoped.insert(name, node);
        scoped
    }

    /// Copy of this map without any of `names`.
    pub fn without<S: AsRef<str>>(&self, names: &[S]) -> Self {
        if !names.iter().any(|name| self.nodes.contains_key(name.as_ref())) {
            return self.clone();
        }
        let mut scoped = self.clone();
        let nodes = Rc::make_mut(&mut scoped.nodes);
        for name in names {
            nodes.remove(name.as_ref());
        }
        scoped
    }

    pub fn get(&self, name: &str) -> Option<&NodeRef<Value>> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn shape(&self) -> ExposingShape {
        let mut pairs: Vec<(String, NodeKey)> = self
            .nodes
            .iter()
            .map(|(name, node)| (name.clone(), NodeKey::new(&Rc::clone(node).as_any_node())))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        ExposingShape(pairs)
    }
}

impl fmt::Debug for ExposingNodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ExposingNodes").field("names", &names).finish()
    }
}

impl<S: Into<String>> FromIterator<(S, NodeRef<Value>)> for ExposingNodes {
    fn from_iter<I: IntoIterator<Item = (S, NodeRef<Value>)>>(iter: I) -> Self {
        let mut exposing = ExposingNodes::new();
        for (name, node) in iter {
            exposing.insert(name, node);
        }
        exposing
    }
}

/// A side-channel hook made available to evaluation.
pub type EvalMethod = Rc<dyn Fn(&[Value]) -> Value>;

/// Opaque, caller-supplied hooks threaded through every `evaluate` call.
/// Composite nodes forward the bag to their children without inspecting it.
#[derive(Clone, Default)]
pub struct EvalMethods {
    methods: HashMap<String, HashMap<String, EvalMethod>>,
}

impl EvalMethods {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, namespace: &str, name: &str, method: F)
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        self.methods
            .entry(namespace.to_string())
            .or_default()
            .insert(name.to_string(), Rc::new(method));
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&EvalMethod> {
        self.methods.get(namespace).and_then(|ns| ns.get(name))
    }

    pub fn is_empty(&self) -> bool {
        self.methods.values().all(HashMap::is_empty)
    }
}

impl fmt::Debug for EvalMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .methods
            .iter()
            .flat_map(|(ns, methods)| methods.keys().map(move |name| format!("{ns}.{name}")))
            .collect();
        names.sort_unstable();
        f.debug_struct("EvalMethods").field("methods", &names).finish()
    }
}
