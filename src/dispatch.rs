//! Load-and-dispatch orchestration.
//!
//! A convenience path layering [`apply_adapter_state`] between external
//! collaborators: a model factory, a device planner, a dispatcher, and
//! an alignment-hook manager. This module owns no placement logic — it
//! sequences the collaborators and propagates their failures unchanged
//! (no retry, no fallback, no translation).

use std::collections::HashMap;

use tracing::info;

use crate::config::PeftConfig;
use crate::error::Result;
use crate::extract::apply_adapter_state;
use crate::model::AdapterModel;
use crate::state::StateDict;

/// Mapping from module path to target device identifier (e.g. `cuda:0`).
pub type DeviceMap = HashMap<String, String>;

/// Per-device memory budget in bytes, keyed by device identifier.
pub type MemoryBudget = HashMap<String, u64>;

/// Where an I/O-alignment hook is attached after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachPoint {
    /// The unwrapped base model (low-rank adapter methods).
    BaseModel,
    /// The adapter wrapper itself (prompt-learning methods).
    Wrapper,
}

/// Builds an adapter-augmented model from a base model and a descriptor.
pub trait AdapterModelFactory<B> {
    /// The wrapped model type produced.
    type Model: AdapterModel;

    /// Wrap `base` with the adapter described by `config`.
    fn build(&self, base: B, config: &PeftConfig) -> Result<Self::Model>;
}

/// Computes a device assignment for a model under an optional budget.
pub trait DevicePlanner<M> {
    /// Map each module path to a device, keeping every module whose
    /// class name appears in `no_split` on a single device.
    fn infer_device_map(
        &self,
        model: &M,
        max_memory: Option<&MemoryBudget>,
        no_split: &[String],
    ) -> Result<DeviceMap>;
}

/// Physically places a model's submodules per a device map.
pub trait ModelDispatcher<M> {
    /// Consume `model` and return it with submodules placed.
    fn dispatch(&self, model: M, device_map: &DeviceMap) -> Result<M>;
}

/// Manages device-alignment hooks across the pipeline's module trees:
/// the bare base model `B` before wrapping, and the adapter-augmented
/// model `M` after dispatch.
pub trait AlignmentHooks<B, M> {
    /// Remove alignment hooks from the base model and all submodules.
    fn strip_base_hooks(&self, base: &mut B) -> Result<()>;

    /// Attach a hook keeping inputs and outputs on one device.
    fn attach_hook(&self, model: &mut M, point: AttachPoint) -> Result<()>;

    /// Remove alignment hooks from the prompt-encoder submodule only.
    fn strip_prompt_encoder_hooks(&self, model: &mut M) -> Result<()>;
}

/// Wrap `base` with an adapter, restore `state` into it, and place the
/// result across devices.
///
/// Steps, in order: strip stale hooks from the (possibly already
/// sharded) base, build the adapter model, apply the state, plan a
/// device map under `max_memory`, dispatch, and re-attach an
/// I/O-alignment hook — at the base model for low-rank adapters, at the
/// wrapper (with a hook-free prompt encoder) for prompt-learning
/// methods.
#[allow(clippy::too_many_arguments)]
pub fn load_and_dispatch<B, F, P, D, H>(
    mut base: B,
    state: &StateDict,
    config: &PeftConfig,
    max_memory: Option<&MemoryBudget>,
    factory: &F,
    planner: &P,
    dispatcher: &D,
    hooks: &H,
) -> Result<F::Model>
where
    F: AdapterModelFactory<B>,
    P: DevicePlanner<F::Model>,
    D: ModelDispatcher<F::Model>,
    H: AlignmentHooks<B, F::Model>,
{
    // Step 1: clear stale alignment hooks left by prior dispatches
    hooks.strip_base_hooks(&mut base)?;

    // Step 2: wrap the base with the adapter
    let mut model = factory.build(base, config)?;

    // Step 3: restore the adapter state
    let report = apply_adapter_state(&mut model, state)?;
    info!(
        missing = report.missing.len(),
        unexpected = report.unexpected.len(),
        "adapter state restored"
    );

    // Step 4: plan device placement
    let device_map = planner.infer_device_map(&model, max_memory, model.no_split_modules())?;

    // Step 5: place submodules
    let mut model = dispatcher.dispatch(model, &device_map)?;
    info!(modules = device_map.len(), "model dispatched");

    // Step 6: re-attach I/O alignment for inference ergonomics
    if model.peft_config().peft_type.is_prompt_learning() {
        hooks.strip_prompt_encoder_hooks(&mut model)?;
        hooks.attach_hook(&mut model, AttachPoint::Wrapper)?;
    } else {
        hooks.attach_hook(&mut model, AttachPoint::BaseModel)?;
    }

    Ok(model)
}
