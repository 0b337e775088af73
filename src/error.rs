//! Error types with actionable diagnostics.
//!
//! All errors include enough context to resolve the problem without
//! consulting external documentation.

use thiserror::Error;

/// Result type alias for adaptar operations.
pub type Result<T> = std::result::Result<T, AdaptarError>;

/// Errors that can occur while extracting, restoring, or persisting
/// adapter state.
#[derive(Error, Debug)]
pub enum AdaptarError {
    /// The descriptor's bias string is not a recognized mode.
    #[error("Unsupported bias mode: '{mode}'\n  → Supported modes: none, all, lora_only")]
    UnsupportedBiasMode { mode: String },

    /// Strict restore found no `prompt_embeddings` entry in the state.
    #[error("Adapter state has no 'prompt_embeddings' entry\n  → Extract the state from a prompt-learning model before restoring one")]
    MissingPromptEmbeddings,

    /// The model cannot supply or accept prompt embeddings.
    #[error("Model has no prompt encoder\n  → Prompt embeddings only exist for prompt-learning methods")]
    NoPromptEncoder,

    /// A strict load hit a tensor whose shape differs from its slot.
    #[error("Tensor shape mismatch for '{name}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch { name: String, expected: Vec<usize>, actual: Vec<usize> },

    /// A strict load hit keys with no counterpart on the other side.
    #[error("State dict key mismatch: missing {missing:?}, unexpected {unexpected:?}\n  → Load with strict = false to tolerate a partial match")]
    KeyMismatch { missing: Vec<String>, unexpected: Vec<String> },

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// SafeTensors encoding or decoding error.
    #[error("SafeTensors error: {message}")]
    SafeTensors { message: String },

    /// Failure inside an external collaborator (factory, planner,
    /// dispatcher, hook manager). Propagated untranslated.
    #[error("Collaborator error: {message}")]
    Collaborator { message: String },
}

impl AdaptarError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }
}
