//! Spatially-constrained convolutional stack generation.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::space::{ConfigValue, SampleEngine};

/// One convolutional layer of a generated stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub filters: i64,
    pub kernel_size: i64,
    pub stride: i64,
    pub padding: i64,
}

/// Generates multi-layer convolution descriptions whose kernel/stride/padding
/// choices keep the spatial feature map positive at every layer.
///
/// Stateful and order-dependent: each layer's valid choice set depends on the
/// cumulative effect of all prior layers, so generation must be re-run per
/// trial. Deterministic under a seeded engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvStackGenerator {
    /// Input spatial size (width/height) fed to the first layer.
    pub initial_size: i64,
    pub kernel_candidates: Vec<i64>,
    pub stride_candidates: Vec<i64>,
    pub padding_candidates: Vec<i64>,
    /// Filter count range `[low, high)` per layer.
    pub filter_range: (i64, i64),
}

impl Default for ConvStackGenerator {
    fn default() -> Self {
        Self {
            initial_size: 64,
            kernel_candidates: vec![3, 4, 6, 8, 10, 12],
            stride_candidates: vec![1, 2, 3, 4],
            padding_candidates: vec![0, 1],
            filter_range: (16, 32),
        }
    }
}

impl ConvStackGenerator {
    /// Build up to `num_layers` layers, stopping early when no kernel fits
    /// the current spatial size or a sampled layer would collapse it to ≤ 0.
    /// An invalid layer is never appended.
    pub fn generate(&self, num_layers: usize, engine: &mut dyn SampleEngine) -> Vec<LayerSpec> {
        let mut layers = Vec::with_capacity(num_layers);
        let mut size = self.initial_size;

        for _ in 0..num_layers {
            let valid_kernels: Vec<i64> = self
                .kernel_candidates
                .iter()
                .copied()
                .filter(|k| *k <= size)
                .collect();
            if valid_kernels.is_empty() || self.stride_candidates.is_empty() {
                break;
            }

            let kernel = pick(engine, &valid_kernels);
            let stride = pick(engine, &self.stride_candidates).max(1);
            let padding = if self.padding_candidates.is_empty() {
                0
            } else {
                pick(engine, &self.padding_candidates)
            };

            let next_size = (size + 2 * padding - kernel) / stride + 1;
            if next_size <= 0 {
                break;
            }

            layers.push(LayerSpec {
                filters: engine.randint(self.filter_range.0, self.filter_range.1),
                kernel_size: kernel,
                stride,
                padding,
            });
            size = next_size;
        }

        layers
    }
}

fn pick(engine: &mut dyn SampleEngine, candidates: &[i64]) -> i64 {
    candidates[engine.randint(0, candidates.len() as i64) as usize]
}

/// Package the generator as a dependent sampler reading the trial's layer
/// count. Re-runs per trial against the shared engine, so a fixed engine
/// seed reproduces the full trial sequence.
pub fn conv_stack_sampler<E>(
    generator: ConvStackGenerator,
    num_layers_key: &str,
    engine: Arc<Mutex<E>>,
) -> ConfigValue
where
    E: SampleEngine + 'static,
{
    let num_layers_key = num_layers_key.to_string();
    let inputs = vec![num_layers_key.clone()];
    ConfigValue::Computed {
        inputs,
        resolve: Arc::new(move |cfg| {
            let num_layers = cfg.get_i64(&num_layers_key).unwrap_or(0).max(0) as usize;
            let layers = generator.generate(num_layers, &mut *engine.lock());
            match serde_json::to_value(&layers) {
                Ok(value) => value,
                Err(e) => {
                    warn!(error = %e, "failed to serialize generated conv stack");
                    Value::Null
                }
            }
        }),
    }
}
