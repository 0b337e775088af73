//! Adapter state extraction and restoration for parameter-efficient
//! fine-tuning.
//!
//! A fine-tuned PEFT model is mostly frozen base weights plus a small
//! trainable remainder. This crate handles that remainder:
//! - Extracting the trainable subset (low-rank matrices, biases per
//!   policy, prompt embeddings, replaced heads) from a full parameter
//!   mapping
//! - Restoring such a subset into a freshly built model without
//!   tripping over the base weights it does not carry
//! - Persisting the pair `adapter_config.json` +
//!   `adapter_model.safetensors` for ecosystem interop
//! - Orchestrating restore across device-planning and dispatch
//!   collaborators for sharded inference
//!
//! # Toyota Way Principles
//!
//! - **Muda Elimination**: only the trainable remainder is ever copied
//!   or persisted
//! - **Jidoka**: unsupported configurations and shape conflicts stop the
//!   line with actionable errors
//! - **Genchi Genbutsu**: filtering decisions come from the actual key
//!   names, never from reflection over model structure
//!
//! # Quick Start
//!
//! ```ignore
//! use adaptar::{extract_adapter_state, save_adapter, PeftConfig};
//!
//! let state = extract_adapter_state(&model, None)?;
//! save_adapter("out/adapter", model.peft_config(), &state)?;
//! ```

pub mod bundle;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod model;
pub mod state;

pub use bundle::{load_adapter, save_adapter, ADAPTER_CONFIG_FILE, ADAPTER_WEIGHTS_FILE};
pub use config::{BiasMode, PeftConfig, PeftMethod};
pub use dispatch::{
    load_and_dispatch, AdapterModelFactory, AlignmentHooks, AttachPoint, DeviceMap, DevicePlanner,
    MemoryBudget, ModelDispatcher,
};
pub use error::{AdaptarError, Result};
pub use extract::{apply_adapter_state, extract_adapter_state, PROMPT_EMBEDDINGS_KEY};
pub use model::AdapterModel;
pub use state::{LoadReport, StateDict, Tensor};
