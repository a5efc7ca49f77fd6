use thiserror::Error;

/// Failures surfaced by node evaluation and dependency extraction.
///
/// Nodes never recover from these locally: a composite returns whatever its
/// child or transform produced, untouched.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("missing exposing node '{name}'")]
    MissingDependency { name: String },
    #[error(transparent)]
    Transform(anyhow::Error),
}

impl EvalError {
    pub fn missing(name: impl Into<String>) -> Self {
        EvalError::MissingDependency { name: name.into() }
    }

    /// Name of the unresolved exposing node, if this is a lookup failure.
    pub fn missing_name(&self) -> Option<&str> {
        match self {
            EvalError::MissingDependency { name } => Some(name),
            EvalError::Transform(_) => None,
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
