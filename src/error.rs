//! Model errors.
//!
//! Every variant signals a programming or configuration mistake, raised before any
//! parameter is read or written. Nothing here is retried.

use std::fmt;

/// Errors produced when building, running or sampling from the language model.
#[derive(Debug)]
pub enum ModelError {
    /// Hyperparameters are inconsistent or out of range (e.g. `n_embd` not divisible by `n_head`).
    Configuration(String),

    /// A token sequence longer than the context window was passed to `forward`.
    ContextOverflow {
        /// Time dimension of the rejected input.
        length: i64,
        /// Context window of the model.
        block_size: i64,
    },

    /// Input or target tensors have the wrong rank or disagree on batch/time dimensions.
    ShapeMismatch(String),

    /// The next-token distribution could not be sampled (all-zero or non-finite weights).
    Sampling(String),

    /// libtorch failed while reading tensor data back to the host.
    Tensor(tch::TchError),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Configuration(m) => write!(f, "invalid model configuration: {m}"),
            ModelError::ContextOverflow { length, block_size } => write!(
                f,
                "context overflow: sequence of length {length} exceeds block size {block_size}"
            ),
            ModelError::ShapeMismatch(m) => write!(f, "shape mismatch: {m}"),
            ModelError::Sampling(m) => write!(f, "sampling failed: {m}"),
            ModelError::Tensor(e) => write!(f, "tensor error: {e}"),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::Tensor(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tch::TchError> for ModelError {
    fn from(e: tch::TchError) -> Self {
        ModelError::Tensor(e)
    }
}
