//! # ht-tune
//!
//! Constrained, dependent hyperparameter search spaces for Hivetune.
//!
//! Provides the configuration-tree builder (independent sampler specs left
//! opaque for an external search engine, dependent fields computed from
//! already-resolved siblings), the minibatch divisor resolver, and the
//! spatially-constrained convolutional stack generator.

mod conv;
mod divisors;
mod mlp;
mod space;

pub use conv::{conv_stack_sampler, ConvStackGenerator, LayerSpec};
pub use divisors::{
    batch_size_divisors, minibatch_sampler, smallest_batch_divisor, DEFAULT_MIN_MINIBATCH,
};
pub use mlp::{activation_choices, mlp_units_sampler, sample_mlp_units, MLP_ACTIVATIONS};
pub use space::{
    ConfigTree, ConfigValue, DependentFn, ResolvedConfig, SampleEngine, SamplerSpec, SeededEngine,
};
