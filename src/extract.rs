//! Adapter state extraction and restoration.
//!
//! [`extract_adapter_state`] pulls the trainable subset out of a full
//! parameter mapping; [`apply_adapter_state`] installs such a subset
//! back into a model built with the same descriptor. Both work purely on
//! key names — membership is substring search, the sibling-bias rule is
//! explicit string split/concat, never reflection over model structure.

use tracing::debug;

use crate::config::{BiasMode, PeftMethod};
use crate::error::{AdaptarError, Result};
use crate::model::AdapterModel;
use crate::state::{LoadReport, StateDict};

/// Key under which prompt embeddings land in an extracted mapping.
pub const PROMPT_EMBEDDINGS_KEY: &str = "prompt_embeddings";

/// Substring marking low-rank adapter parameters (`lora_A`, `lora_B`).
const LORA_MARKER: &str = "lora_";

/// Extract the trainable adapter subset of `model`'s parameters.
///
/// `state_dict` defaults to `model.state_dict()`; pass one explicitly
/// when the live mapping has already been gathered (e.g. unwrapped from
/// a distributed wrapper).
///
/// For low-rank adapters the subset is driven by the descriptor's bias
/// mode; for prompt-learning methods it is the single
/// [`PROMPT_EMBEDDINGS_KEY`] entry. Parameters of any module named in
/// `modules_to_save` are copied in last, replacing method-derived
/// entries of the same key.
pub fn extract_adapter_state<M: AdapterModel>(
    model: &M,
    state_dict: Option<StateDict>,
) -> Result<StateDict> {
    let full = state_dict.unwrap_or_else(|| model.state_dict());
    let config = model.peft_config();

    let mut filtered = if config.peft_type == PeftMethod::Lora {
        // Parse before touching the mapping so an unsupported mode
        // produces no partial result.
        match config.bias_mode()? {
            BiasMode::None => full
                .iter()
                .filter(|(key, _)| key.contains(LORA_MARKER))
                .map(|(key, tensor)| (key.to_string(), tensor.clone()))
                .collect(),
            BiasMode::All => full
                .iter()
                .filter(|(key, _)| key.contains(LORA_MARKER) || key.contains("bias"))
                .map(|(key, tensor)| (key.to_string(), tensor.clone()))
                .collect(),
            BiasMode::LoraOnly => {
                let mut subset = StateDict::new();
                for (key, tensor) in full.iter() {
                    if !key.contains(LORA_MARKER) {
                        continue;
                    }
                    subset.insert(key, tensor.clone());
                    let prefix = key.split(LORA_MARKER).next().unwrap_or_default();
                    let bias_key = format!("{prefix}bias");
                    if let Some(bias_tensor) = full.get(&bias_key) {
                        subset.insert(bias_key, bias_tensor.clone());
                    }
                }
                subset
            }
        }
    } else {
        let mut subset = StateDict::with_capacity(1);
        subset.insert(PROMPT_EMBEDDINGS_KEY, model.prompt_embeddings_to_save()?);
        subset
    };

    if let Some(modules) = model.modules_to_save() {
        let mut extras = 0usize;
        for (key, tensor) in full.iter() {
            if modules.iter().any(|module| key.contains(module.as_str())) {
                filtered.insert(key, tensor.clone());
                extras += 1;
            }
        }
        debug!(extras, "copied extra saved modules into adapter state");
    }

    debug!(entries = filtered.len(), "extracted adapter state");
    Ok(filtered)
}

/// Restore an extracted adapter state into `model`.
///
/// The whole mapping is loaded non-strictly — base-model keys the state
/// does not carry are expected and tolerated. Prompt-learning methods
/// additionally load the [`PROMPT_EMBEDDINGS_KEY`] entry strictly into
/// the prompt encoder: a missing key or a shape conflict fails the call.
pub fn apply_adapter_state<M: AdapterModel>(
    model: &mut M,
    state: &StateDict,
) -> Result<LoadReport> {
    let report = model.load_state_dict(state, false)?;

    if model.peft_config().peft_type.is_prompt_learning() {
        let embeddings = state
            .get(PROMPT_EMBEDDINGS_KEY)
            .ok_or(AdaptarError::MissingPromptEmbeddings)?;
        model.load_prompt_embeddings(embeddings)?;
    }

    debug!(
        missing = report.missing.len(),
        unexpected = report.unexpected.len(),
        "applied adapter state"
    );
    Ok(report)
}
