//! On-disk adapter bundle (PEFT directory layout).
//!
//! Persists an extracted state together with its descriptor as the
//! standard pair the HuggingFace ecosystem expects:
//! `adapter_config.json` + `adapter_model.safetensors`.

use std::collections::HashMap;
use std::path::Path;

use ndarray::IxDyn;
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use tracing::debug;

use crate::config::PeftConfig;
use crate::error::{AdaptarError, Result};
use crate::state::{StateDict, Tensor};

/// Descriptor file name inside a bundle directory.
pub const ADAPTER_CONFIG_FILE: &str = "adapter_config.json";
/// Weights file name inside a bundle directory.
pub const ADAPTER_WEIGHTS_FILE: &str = "adapter_model.safetensors";

/// Save an extracted adapter state and its descriptor to `dir`.
///
/// Creates the directory if needed and writes
/// [`ADAPTER_CONFIG_FILE`] (pretty JSON) and [`ADAPTER_WEIGHTS_FILE`]
/// (f32 safetensors with a `format: "pt"` metadata entry).
pub fn save_adapter(dir: impl AsRef<Path>, config: &PeftConfig, state: &StateDict) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .map_err(|e| AdaptarError::io(format!("creating {}", dir.display()), e))?;

    let config_json = config
        .to_json()
        .map_err(|e| AdaptarError::Serialization { message: e.to_string() })?;
    std::fs::write(dir.join(ADAPTER_CONFIG_FILE), config_json)
        .map_err(|e| AdaptarError::io(format!("writing {ADAPTER_CONFIG_FILE}"), e))?;

    // Contiguous little-endian f32 buffers for the tensor views
    let tensor_data: Vec<(String, Vec<u8>, Vec<usize>)> = state
        .iter()
        .map(|(name, tensor)| {
            let values: Vec<f32> = tensor.iter().copied().collect();
            let bytes: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
            (name.to_string(), bytes, tensor.shape().to_vec())
        })
        .collect();

    let views: Vec<(&str, TensorView<'_>)> = tensor_data
        .iter()
        .map(|(name, bytes, shape)| {
            let view = TensorView::new(Dtype::F32, shape.clone(), bytes).map_err(|e| {
                AdaptarError::SafeTensors { message: format!("building view for '{name}': {e}") }
            })?;
            Ok((name.as_str(), view))
        })
        .collect::<Result<_>>()?;

    let mut metadata = HashMap::new();
    metadata.insert("format".to_string(), "pt".to_string());

    let safetensor_bytes = safetensors::serialize(views, &Some(metadata))
        .map_err(|e| AdaptarError::SafeTensors { message: format!("serialization failed: {e}") })?;
    std::fs::write(dir.join(ADAPTER_WEIGHTS_FILE), safetensor_bytes)
        .map_err(|e| AdaptarError::io(format!("writing {ADAPTER_WEIGHTS_FILE}"), e))?;

    debug!(tensors = state.len(), dir = %dir.display(), "saved adapter bundle");
    Ok(())
}

/// Load an adapter bundle saved by [`save_adapter`].
pub fn load_adapter(dir: impl AsRef<Path>) -> Result<(PeftConfig, StateDict)> {
    let dir = dir.as_ref();

    let config_json = std::fs::read_to_string(dir.join(ADAPTER_CONFIG_FILE))
        .map_err(|e| AdaptarError::io(format!("reading {ADAPTER_CONFIG_FILE}"), e))?;
    let config = PeftConfig::from_json(&config_json)
        .map_err(|e| AdaptarError::Serialization { message: e.to_string() })?;

    let data = std::fs::read(dir.join(ADAPTER_WEIGHTS_FILE))
        .map_err(|e| AdaptarError::io(format!("reading {ADAPTER_WEIGHTS_FILE}"), e))?;
    let tensors = SafeTensors::deserialize(&data)
        .map_err(|e| AdaptarError::SafeTensors { message: format!("parsing failed: {e}") })?;

    let mut state = StateDict::with_capacity(tensors.len());
    for (name, view) in tensors.tensors() {
        if view.dtype() != Dtype::F32 {
            return Err(AdaptarError::SafeTensors {
                message: format!("tensor '{name}' has dtype {:?}, expected F32", view.dtype()),
            });
        }
        // pod_collect copies, so buffer alignment never matters
        let values: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());
        let tensor = Tensor::from_shape_vec(IxDyn(view.shape()), values).map_err(|e| {
            AdaptarError::SafeTensors { message: format!("tensor '{name}' shape error: {e}") }
        })?;
        state.insert(name, tensor);
    }

    debug!(tensors = state.len(), dir = %dir.display(), "loaded adapter bundle");
    Ok((config, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeftMethod;
    use ndarray::arr2;
    use tempfile::TempDir;

    fn sample_state() -> StateDict {
        let mut state = StateDict::new();
        state.insert(
            "base.layers.0.attn.q_proj.lora_A.weight",
            arr2(&[[0.1f32, 0.2], [0.3, 0.4]]).into_dyn(),
        );
        state.insert(
            "base.layers.0.attn.q_proj.lora_B.weight",
            arr2(&[[1.0f32], [2.0]]).into_dyn(),
        );
        state
    }

    #[test]
    fn test_save_creates_both_files() {
        let tmp = TempDir::new().unwrap();
        let config = PeftConfig::lora(4, 8.0);

        save_adapter(tmp.path(), &config, &sample_state()).unwrap();

        assert!(tmp.path().join(ADAPTER_CONFIG_FILE).exists());
        assert!(tmp.path().join(ADAPTER_WEIGHTS_FILE).exists());
    }

    #[test]
    fn test_round_trip_preserves_config_and_tensors() {
        let tmp = TempDir::new().unwrap();
        let config = PeftConfig::lora(4, 8.0).with_base_model("test/model");
        let state = sample_state();

        save_adapter(tmp.path(), &config, &state).unwrap();
        let (loaded_config, loaded_state) = load_adapter(tmp.path()).unwrap();

        assert_eq!(loaded_config, config);
        assert_eq!(loaded_state.len(), state.len());
        for (name, tensor) in state.iter() {
            assert_eq!(loaded_state.get(name), Some(tensor), "tensor '{name}' changed");
        }
    }

    #[test]
    fn test_round_trip_prompt_method() {
        let tmp = TempDir::new().unwrap();
        let config = PeftConfig::prompt_learning(PeftMethod::PromptTuning, 10);
        let mut state = StateDict::new();
        state.insert("prompt_embeddings", arr2(&[[0.5f32; 4]; 10]).into_dyn());

        save_adapter(tmp.path(), &config, &state).unwrap();
        let (loaded_config, loaded_state) = load_adapter(tmp.path()).unwrap();

        assert_eq!(loaded_config.peft_type, PeftMethod::PromptTuning);
        assert_eq!(loaded_state.get("prompt_embeddings"), state.get("prompt_embeddings"));
    }

    #[test]
    fn test_save_empty_state_still_writes_files() {
        let tmp = TempDir::new().unwrap();
        save_adapter(tmp.path(), &PeftConfig::lora(4, 8.0), &StateDict::new()).unwrap();
        let (_, loaded_state) = load_adapter(tmp.path()).unwrap();
        assert!(loaded_state.is_empty());
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let result = load_adapter(tmp.path().join("nope"));
        assert!(matches!(result, Err(AdaptarError::Io { .. })));
    }

    #[test]
    fn test_load_corrupt_weights_fails() {
        let tmp = TempDir::new().unwrap();
        save_adapter(tmp.path(), &PeftConfig::lora(4, 8.0), &sample_state()).unwrap();
        std::fs::write(tmp.path().join(ADAPTER_WEIGHTS_FILE), b"not safetensors").unwrap();

        let result = load_adapter(tmp.path());
        assert!(matches!(result, Err(AdaptarError::SafeTensors { .. })));
    }
}
