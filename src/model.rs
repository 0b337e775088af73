//! Model collaborator seam.

use crate::config::PeftConfig;
use crate::error::{AdaptarError, Result};
use crate::state::{LoadReport, StateDict, Tensor};

/// Trait for adapter-augmented models.
///
/// The state filter never constructs or inspects a model beyond this
/// surface: the full parameter mapping, the descriptor, and — for
/// prompt-learning methods — the prompt-encoder embedding slot.
/// Frameworks implement it over whatever module tree they hold.
pub trait AdapterModel {
    /// The adapter descriptor this model was built with.
    fn peft_config(&self) -> &PeftConfig;

    /// Full parameter mapping, in declaration order.
    fn state_dict(&self) -> StateDict;

    /// Load `state` into the model's parameters.
    ///
    /// With `strict = false` this is the partial-match load used when
    /// restoring an adapter into a model that also holds frozen base
    /// weights; tolerated keys come back in the [`LoadReport`].
    fn load_state_dict(&mut self, state: &StateDict, strict: bool) -> Result<LoadReport>;

    /// The prompt embedding tensor to persist.
    ///
    /// Only prompt-learning models have one; the default refuses.
    fn prompt_embeddings_to_save(&self) -> Result<Tensor> {
        Err(AdaptarError::NoPromptEncoder)
    }

    /// Strictly load `weight` into the prompt encoder's embedding slot.
    ///
    /// Fails with [`AdaptarError::ShapeMismatch`] when the tensor does
    /// not fit the slot. The default refuses.
    fn load_prompt_embeddings(&mut self, _weight: &Tensor) -> Result<()> {
        Err(AdaptarError::NoPromptEncoder)
    }

    /// Substrings naming additional full modules to persist alongside
    /// the adapter. Defaults to the descriptor's `modules_to_save`.
    fn modules_to_save(&self) -> Option<&[String]> {
        self.peft_config().modules_to_save.as_deref()
    }

    /// Module class names that must not be split across devices.
    fn no_split_modules(&self) -> &[String] {
        &[]
    }
}
