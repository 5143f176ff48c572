//! MLP width/depth sampling and activation choices.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::space::{ConfigValue, SampleEngine, SamplerSpec};

/// Activations worth sweeping for policy/value MLP heads.
pub const MLP_ACTIVATIONS: [&str; 4] = ["relu", "tanh", "sigmoid", "elu"];

/// The standard activation sweep as an independent sampler spec.
pub fn activation_choices() -> SamplerSpec {
    SamplerSpec::Choice {
        values: MLP_ACTIVATIONS.iter().map(|a| json!(a)).collect(),
    }
}

/// Sample a hidden-layer width list: `randint(1, max_layers)` layers, each
/// `randint(4, max_neurons)` wide.
pub fn sample_mlp_units(
    engine: &mut dyn SampleEngine,
    max_layers: i64,
    max_neurons: i64,
) -> Vec<i64> {
    let num_layers = engine.randint(1, max_layers).max(0);
    (0..num_layers).map(|_| engine.randint(4, max_neurons)).collect()
}

/// Package MLP unit sampling as a dependent field with no inputs: re-sampled
/// per trial from the shared engine, like the conv stack.
pub fn mlp_units_sampler<E>(max_layers: i64, max_neurons: i64, engine: Arc<Mutex<E>>) -> ConfigValue
where
    E: SampleEngine + 'static,
{
    ConfigValue::Computed {
        inputs: Vec::new(),
        resolve: Arc::new(move |_| {
            let units = sample_mlp_units(&mut *engine.lock(), max_layers, max_neurons);
            Value::from(units)
        }),
    }
}
