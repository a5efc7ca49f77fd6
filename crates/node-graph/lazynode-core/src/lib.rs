//! lazynode-core: lazily evaluated nodes with dependency tracking and context wrapping.

pub mod config;
pub mod error;
pub mod memo;
pub mod node;
pub mod nodes;
pub mod types;

pub use config::EvalConfig;
pub use error::{EvalError, EvalResult};
pub use memo::FilterCache;
pub use node::{AnyNode, ChildNode, Node, NodeCore, NodeRef, ValueFn, WrappedNode, WrappedRef};
pub use nodes::{
    from_record, from_reference, from_value, with_function, with_try_function, FunctionNode,
    RecordNode, ReferenceNode, SimpleNode, WrapContextNode,
};
pub use types::*;
