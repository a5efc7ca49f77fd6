//! Node variants and their construction helpers.

pub mod function;
pub mod record;
pub mod reference;
pub mod simple;
pub mod wrap_context;

pub use function::{with_function, with_try_function, FunctionNode};
pub use record::{from_record, RecordNode};
pub use reference::{from_reference, ReferenceNode};
pub use simple::{from_value, SimpleNode};
pub use wrap_context::WrapContextNode;

#[cfg(test)]
mod tests;
