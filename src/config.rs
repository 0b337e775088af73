//! Adapter descriptor matching the PEFT configuration schema.
//!
//! The descriptor travels with the model it configures and serializes to
//! `adapter_config.json`, so field names follow the PEFT JSON schema
//! (`peft_type`, `r`, `lora_alpha`, ...). The `bias` field stays a raw
//! string and is parsed to [`BiasMode`] at use time; an unrecognized
//! string surfaces as [`AdaptarError::UnsupportedBiasMode`] instead of
//! silently filtering nothing.

use crate::error::AdaptarError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fine-tuning method family.
///
/// Every method other than [`PeftMethod::Lora`] is a prompt-learning
/// method: its trainable state is a learned embedding table rather than
/// weight deltas scattered through the base model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeftMethod {
    /// Low-rank adaptation (trainable `lora_A`/`lora_B` matrices).
    Lora,
    /// Learned soft prompts prepended to the input embeddings.
    PromptTuning,
    /// Prompt tuning with a reparameterization encoder.
    PTuning,
    /// Learned prefixes injected into every attention layer.
    PrefixTuning,
}

impl PeftMethod {
    /// Whether the method's trainable state is a prompt embedding table.
    pub fn is_prompt_learning(self) -> bool {
        !matches!(self, Self::Lora)
    }

    /// PEFT schema name for this method.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lora => "LORA",
            Self::PromptTuning => "PROMPT_TUNING",
            Self::PTuning => "P_TUNING",
            Self::PrefixTuning => "PREFIX_TUNING",
        }
    }
}

impl fmt::Display for PeftMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy controlling which bias parameters ride along with a low-rank
/// adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiasMode {
    /// No bias parameters are extracted.
    None,
    /// Every parameter whose name contains `bias` is extracted.
    All,
    /// Only biases of modules that carry low-rank matrices are extracted.
    LoraOnly,
}

impl BiasMode {
    /// PEFT schema name for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::All => "all",
            Self::LoraOnly => "lora_only",
        }
    }
}

impl fmt::Display for BiasMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BiasMode {
    type Err = AdaptarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "all" => Ok(Self::All),
            "lora_only" => Ok(Self::LoraOnly),
            other => Err(AdaptarError::UnsupportedBiasMode { mode: other.to_string() }),
        }
    }
}

fn default_bias() -> String {
    BiasMode::None.as_str().to_string()
}

/// Adapter descriptor.
///
/// Carries the method selection plus the handful of knobs the state
/// filter reads (`bias`, `modules_to_save`). The remaining fields exist
/// so the descriptor round-trips through `adapter_config.json`
/// unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeftConfig {
    /// Fine-tuning method.
    pub peft_type: PeftMethod,
    /// Bias handling: "none", "all", or "lora_only".
    #[serde(default = "default_bias")]
    pub bias: String,
    /// LoRA rank (0 for prompt-learning methods).
    #[serde(default)]
    pub r: usize,
    /// LoRA alpha scaling parameter.
    #[serde(default)]
    pub lora_alpha: f32,
    /// LoRA dropout rate (0.0 if not used).
    #[serde(default)]
    pub lora_dropout: f32,
    /// Target module names for low-rank adaptation.
    #[serde(default)]
    pub target_modules: Vec<String>,
    /// Number of virtual tokens (prompt-learning methods).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_virtual_tokens: Option<usize>,
    /// Substrings naming additional full modules to persist alongside
    /// the adapter (e.g. a replaced classifier head).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules_to_save: Option<Vec<String>>,
    /// Base model name or path (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_model_name_or_path: Option<String>,
    /// Task type (e.g., "CAUSAL_LM", "SEQ_CLS").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    /// Inference mode.
    #[serde(default)]
    pub inference_mode: bool,
}

impl PeftConfig {
    /// Descriptor for a low-rank adapter of the given rank and alpha.
    pub fn lora(r: usize, lora_alpha: f32) -> Self {
        Self {
            peft_type: PeftMethod::Lora,
            bias: default_bias(),
            r,
            lora_alpha,
            lora_dropout: 0.0,
            target_modules: Vec::new(),
            num_virtual_tokens: None,
            modules_to_save: None,
            base_model_name_or_path: None,
            task_type: None,
            inference_mode: false,
        }
    }

    /// Descriptor for a prompt-learning method with the given number of
    /// virtual tokens.
    pub fn prompt_learning(method: PeftMethod, num_virtual_tokens: usize) -> Self {
        Self {
            peft_type: method,
            bias: default_bias(),
            r: 0,
            lora_alpha: 0.0,
            lora_dropout: 0.0,
            target_modules: Vec::new(),
            num_virtual_tokens: Some(num_virtual_tokens),
            modules_to_save: None,
            base_model_name_or_path: None,
            task_type: None,
            inference_mode: false,
        }
    }

    /// Set bias handling mode.
    pub fn with_bias(mut self, bias: impl Into<String>) -> Self {
        self.bias = bias.into();
        self
    }

    /// Set target module names.
    pub fn with_target_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_modules = modules.into_iter().map(Into::into).collect();
        self
    }

    /// Set the extra full modules to persist alongside the adapter.
    pub fn with_modules_to_save<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules_to_save = Some(modules.into_iter().map(Into::into).collect());
        self
    }

    /// Set the base model name.
    pub fn with_base_model(mut self, name: impl Into<String>) -> Self {
        self.base_model_name_or_path = Some(name.into());
        self
    }

    /// Set task type.
    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    /// Set inference mode.
    pub fn with_inference_mode(mut self, inference_mode: bool) -> Self {
        self.inference_mode = inference_mode;
        self
    }

    /// Parse the bias string into a typed mode.
    pub fn bias_mode(&self) -> Result<BiasMode, AdaptarError> {
        self.bias.parse()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_method_schema_names() {
        assert_eq!(PeftMethod::Lora.as_str(), "LORA");
        assert_eq!(PeftMethod::PromptTuning.as_str(), "PROMPT_TUNING");
        assert_eq!(PeftMethod::PTuning.as_str(), "P_TUNING");
        assert_eq!(PeftMethod::PrefixTuning.as_str(), "PREFIX_TUNING");
    }

    #[test]
    fn test_method_serde_matches_schema_names() {
        for method in [
            PeftMethod::Lora,
            PeftMethod::PromptTuning,
            PeftMethod::PTuning,
            PeftMethod::PrefixTuning,
        ] {
            let json = serde_json::to_string(&method).unwrap();
            assert_eq!(json, format!("\"{}\"", method.as_str()));
            let back: PeftMethod = serde_json::from_str(&json).unwrap();
            assert_eq!(back, method);
        }
    }

    #[test]
    fn test_only_lora_is_weight_based() {
        assert!(!PeftMethod::Lora.is_prompt_learning());
        assert!(PeftMethod::PromptTuning.is_prompt_learning());
        assert!(PeftMethod::PTuning.is_prompt_learning());
        assert!(PeftMethod::PrefixTuning.is_prompt_learning());
    }

    #[test]
    fn test_bias_mode_round_trip() {
        for mode in [BiasMode::None, BiasMode::All, BiasMode::LoraOnly] {
            assert_eq!(mode.as_str().parse::<BiasMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_bias_mode_rejects_unknown() {
        let err = "bogus".parse::<BiasMode>().unwrap_err();
        assert!(matches!(err, AdaptarError::UnsupportedBiasMode { mode } if mode == "bogus"));
    }

    #[test]
    fn test_lora_constructor_defaults() {
        let config = PeftConfig::lora(8, 16.0);
        assert_eq!(config.peft_type, PeftMethod::Lora);
        assert_eq!(config.r, 8);
        assert_eq!(config.bias, "none");
        assert!(config.modules_to_save.is_none());
    }

    #[test]
    fn test_prompt_learning_constructor() {
        let config = PeftConfig::prompt_learning(PeftMethod::PrefixTuning, 20);
        assert_eq!(config.peft_type, PeftMethod::PrefixTuning);
        assert_eq!(config.num_virtual_tokens, Some(20));
        assert_eq!(config.r, 0);
    }

    #[test]
    fn test_builder_methods() {
        let config = PeftConfig::lora(4, 8.0)
            .with_bias("lora_only")
            .with_target_modules(["q_proj", "v_proj"])
            .with_modules_to_save(["classifier"])
            .with_base_model("meta-llama/Llama-2-7b")
            .with_task_type("SEQ_CLS")
            .with_inference_mode(true);

        assert_eq!(config.bias_mode().unwrap(), BiasMode::LoraOnly);
        assert_eq!(config.target_modules, vec!["q_proj", "v_proj"]);
        assert_eq!(config.modules_to_save, Some(vec!["classifier".to_string()]));
        assert_eq!(config.base_model_name_or_path, Some("meta-llama/Llama-2-7b".to_string()));
        assert!(config.inference_mode);
    }

    #[test]
    fn test_json_round_trip() {
        let config = PeftConfig::lora(16, 32.0).with_modules_to_save(["score"]);
        let json = config.to_json().unwrap();
        let back = PeftConfig::from_json(&json).unwrap();
        assert_eq!(config, back);
        assert_abs_diff_eq!(back.lora_alpha, 32.0, epsilon = 1e-6);
    }

    #[test]
    fn test_json_schema_keys() {
        let json = PeftConfig::lora(16, 32.0).to_json().unwrap();
        assert!(json.contains("\"peft_type\""));
        assert!(json.contains("\"LORA\""));
        assert!(json.contains("\"r\""));
        assert!(json.contains("\"lora_alpha\""));
        assert!(json.contains("\"bias\""));
    }

    #[test]
    fn test_json_omits_absent_options() {
        let json = PeftConfig::lora(4, 4.0).to_json().unwrap();
        assert!(!json.contains("base_model_name_or_path"));
        assert!(!json.contains("modules_to_save"));
        assert!(!json.contains("num_virtual_tokens"));
    }

    #[test]
    fn test_bias_defaults_when_missing_in_json() {
        let config = PeftConfig::from_json(r#"{"peft_type": "LORA", "r": 8}"#).unwrap();
        assert_eq!(config.bias_mode().unwrap(), BiasMode::None);
    }

    #[test]
    fn test_invalid_bias_survives_parse_until_use() {
        // Deserializing keeps the raw string; the error surfaces at
        // bias_mode() time, mirroring the extraction contract.
        let config = PeftConfig::from_json(r#"{"peft_type": "LORA", "bias": "bogus"}"#).unwrap();
        assert!(config.bias_mode().is_err());
    }
}
