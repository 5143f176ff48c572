//! Configuration trees with independent and dependent sampler fields.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ht_types::SearchSpaceError;

/// Opaque description of an independent sampler, left for the external
/// search engine to resolve per trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SamplerSpec {
    /// Categorical choices.
    Choice { values: Vec<Value> },
    /// Integer range `[low, high)`, half-open like `tune.randint`.
    Randint { low: i64, high: i64 },
    /// Continuous uniform range `[low, high)`.
    Uniform { low: f64, high: f64 },
    /// Log-uniform range (sampled in log-space then exponentiated).
    LogUniform { low: f64, high: f64 },
}

/// A dependent sampler: computes its value from the trial's already-resolved
/// sibling fields.
pub type DependentFn = Arc<dyn Fn(&ResolvedConfig) -> Value + Send + Sync>;

/// One field of a configuration tree.
#[derive(Clone)]
pub enum ConfigValue {
    /// A fixed value passed through unchanged.
    Literal(Value),
    /// An independent sampler resolved by the search engine.
    Sampler(SamplerSpec),
    /// A dependent sampler. `inputs` names the sibling keys it reads, so the
    /// tree can validate resolution order up front.
    Computed {
        inputs: Vec<String>,
        resolve: DependentFn,
    },
}

impl fmt::Debug for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Sampler(spec) => f.debug_tuple("Sampler").field(spec).finish(),
            Self::Computed { inputs, .. } => f
                .debug_struct("Computed")
                .field("inputs", inputs)
                .finish_non_exhaustive(),
        }
    }
}

/// One fully-resolved trial configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedConfig {
    values: HashMap<String, Value>,
}

impl ResolvedConfig {
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Adapter boundary to the external search engine's sampling primitives.
///
/// The core never picks trial values itself; it describes independent fields
/// via [`SamplerSpec`] and calls back through this trait when a trial is
/// resolved locally (tests, smoke runs) or by the engine integration.
pub trait SampleEngine: Send {
    /// Pick one of `values`. Returns `Value::Null` for an empty slice.
    fn choice(&mut self, values: &[Value]) -> Value;
    /// Integer from `[low, high)`; degenerate ranges collapse to `low`.
    fn randint(&mut self, low: i64, high: i64) -> i64;
    fn uniform(&mut self, low: f64, high: f64) -> f64;
    fn log_uniform(&mut self, low: f64, high: f64) -> f64;
}

/// Seedable engine used for tests and local trials. Identical seeds yield
/// identical trials, which is what makes the stateful generators debuggable.
pub struct SeededEngine {
    rng: StdRng,
}

impl SeededEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SampleEngine for SeededEngine {
    fn choice(&mut self, values: &[Value]) -> Value {
        if values.is_empty() {
            return Value::Null;
        }
        values[self.rng.random_range(0..values.len())].clone()
    }

    fn randint(&mut self, low: i64, high: i64) -> i64 {
        if high <= low {
            return low;
        }
        self.rng.random_range(low..high)
    }

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        self.rng.random_range(low..high)
    }

    fn log_uniform(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        self.rng.random_range(low.ln()..high.ln()).exp()
    }
}

/// An ordered mapping from key to literal, independent sampler, or dependent
/// sampler. Built once, then resolved once per trial.
///
/// Resolution order: independent fields first in insertion order, then
/// dependent fields in insertion order. `set` is last-write-wins — overriding
/// a key replaces its spec entirely while keeping its position, which is how
/// task-specific configs progressively narrow a shared base.
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    entries: Vec<(String, ConfigValue)>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field (last-write-wins).
    pub fn set(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn literal(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, ConfigValue::Literal(value.into()))
    }

    pub fn choice(self, key: impl Into<String>, values: Vec<Value>) -> Self {
        self.set(key, ConfigValue::Sampler(SamplerSpec::Choice { values }))
    }

    pub fn randint(self, key: impl Into<String>, low: i64, high: i64) -> Self {
        self.set(key, ConfigValue::Sampler(SamplerSpec::Randint { low, high }))
    }

    pub fn uniform(self, key: impl Into<String>, low: f64, high: f64) -> Self {
        self.set(key, ConfigValue::Sampler(SamplerSpec::Uniform { low, high }))
    }

    pub fn log_uniform(self, key: impl Into<String>, low: f64, high: f64) -> Self {
        self.set(key, ConfigValue::Sampler(SamplerSpec::LogUniform { low, high }))
    }

    /// Add a dependent field reading the named sibling `inputs`.
    pub fn computed<F>(self, key: impl Into<String>, inputs: Vec<String>, resolve: F) -> Self
    where
        F: Fn(&ResolvedConfig) -> Value + Send + Sync + 'static,
    {
        self.set(
            key,
            ConfigValue::Computed {
                inputs,
                resolve: Arc::new(resolve),
            },
        )
    }

    /// Layer `overrides` on top of this tree, key by key (last-write-wins).
    pub fn apply(self, overrides: ConfigTree) -> Self {
        overrides
            .entries
            .into_iter()
            .fold(self, |tree, (key, value)| tree.set(key, value))
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that every dependent field only references keys resolved before
    /// it: inputs must exist, and an input that is itself computed must come
    /// earlier in insertion order (no cycles, no forward references).
    pub fn validate(&self) -> Result<(), SearchSpaceError> {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            let ConfigValue::Computed { inputs, .. } = value else {
                continue;
            };
            for input in inputs {
                let Some(j) = self.entries.iter().position(|(k, _)| k == input) else {
                    return Err(SearchSpaceError::UnknownInput {
                        field: key.clone(),
                        input: input.clone(),
                    });
                };
                let input_is_computed =
                    matches!(self.entries[j].1, ConfigValue::Computed { .. });
                if input_is_computed && j >= i {
                    return Err(SearchSpaceError::ForwardReference {
                        field: key.clone(),
                        input: input.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Produce one trial: independent fields through the engine, then
    /// dependent fields over the already-resolved values.
    pub fn resolve(&self, engine: &mut dyn SampleEngine) -> Result<ResolvedConfig, SearchSpaceError> {
        self.validate()?;

        let mut resolved = ResolvedConfig::default();
        for (key, value) in &self.entries {
            match value {
                ConfigValue::Literal(v) => resolved.insert(key.clone(), v.clone()),
                ConfigValue::Sampler(spec) => {
                    let v = match spec {
                        SamplerSpec::Choice { values } => engine.choice(values),
                        SamplerSpec::Randint { low, high } => {
                            Value::from(engine.randint(*low, *high))
                        }
                        SamplerSpec::Uniform { low, high } => {
                            Value::from(engine.uniform(*low, *high))
                        }
                        SamplerSpec::LogUniform { low, high } => {
                            Value::from(engine.log_uniform(*low, *high))
                        }
                    };
                    resolved.insert(key.clone(), v);
                }
                ConfigValue::Computed { .. } => (),
            }
        }
        for (key, value) in &self.entries {
            if let ConfigValue::Computed { resolve, .. } = value {
                let v = resolve(&resolved);
                resolved.insert(key.clone(), v);
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_tree() -> ConfigTree {
        ConfigTree::new()
            .literal("max_epochs", 1500)
            .choice("num_envs", vec![json!(512), json!(1024), json!(2048), json!(4096)])
            .randint("horizon_length", 8, 256)
            .uniform("entropy_coef", 0.0, 0.02)
    }

    #[test]
    fn resolve_covers_every_field() {
        let tree = base_tree();
        let mut engine = SeededEngine::new(7);
        let trial = tree.resolve(&mut engine).unwrap();

        assert_eq!(trial.len(), 4);
        assert_eq!(trial.get_i64("max_epochs"), Some(1500));
        assert!([512, 1024, 2048, 4096].contains(&trial.get_i64("num_envs").unwrap()));
        let horizon = trial.get_i64("horizon_length").unwrap();
        assert!((8..256).contains(&horizon));
        let entropy = trial.get_f64("entropy_coef").unwrap();
        assert!((0.0..0.02).contains(&entropy));
    }

    #[test]
    fn identical_seeds_give_identical_trials() {
        let tree = base_tree();
        let a = tree.resolve(&mut SeededEngine::new(42)).unwrap();
        let b = tree.resolve(&mut SeededEngine::new(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dependent_field_sees_resolved_siblings() {
        let tree = base_tree().computed(
            "total_batch",
            vec!["num_envs".into(), "horizon_length".into()],
            |cfg| {
                let envs = cfg.get_i64("num_envs").unwrap_or(0);
                let horizon = cfg.get_i64("horizon_length").unwrap_or(0);
                Value::from(envs * horizon)
            },
        );
        let trial = tree.resolve(&mut SeededEngine::new(3)).unwrap();
        let expected = trial.get_i64("num_envs").unwrap() * trial.get_i64("horizon_length").unwrap();
        assert_eq!(trial.get_i64("total_batch"), Some(expected));
    }

    #[test]
    fn dependent_fields_resolve_in_insertion_order() {
        let tree = ConfigTree::new()
            .literal("base", 10)
            .computed("doubled", vec!["base".into()], |cfg| {
                Value::from(cfg.get_i64("base").unwrap_or(0) * 2)
            })
            .computed("quadrupled", vec!["doubled".into()], |cfg| {
                Value::from(cfg.get_i64("doubled").unwrap_or(0) * 2)
            });
        let trial = tree.resolve(&mut SeededEngine::new(0)).unwrap();
        assert_eq!(trial.get_i64("quadrupled"), Some(40));
    }

    #[test]
    fn validate_rejects_unknown_input() {
        let tree = ConfigTree::new().computed("minibatch", vec!["missing".into()], |_| Value::Null);
        assert!(matches!(
            tree.validate(),
            Err(SearchSpaceError::UnknownInput { .. })
        ));
    }

    #[test]
    fn validate_rejects_forward_reference() {
        let tree = ConfigTree::new()
            .computed("first", vec!["second".into()], |_| Value::Null)
            .computed("second", Vec::new(), |_| Value::from(1));
        assert!(matches!(
            tree.validate(),
            Err(SearchSpaceError::ForwardReference { .. })
        ));
    }

    #[test]
    fn set_is_last_write_wins_in_place() {
        let tree = base_tree().randint("num_envs", 1, 4);
        match tree.get("num_envs") {
            Some(ConfigValue::Sampler(SamplerSpec::Randint { low: 1, high: 4 })) => (),
            other => panic!("override did not replace spec: {other:?}"),
        }
        // Position and count unchanged: replaced, not appended.
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.keys().nth(1), Some("num_envs"));
    }

    #[test]
    fn apply_layers_overrides_on_base() {
        let overrides = ConfigTree::new()
            .literal("max_epochs", 100)
            .literal("task", "Isaac-Repose-Cube-Shadow-Direct-v0");
        let tree = base_tree().apply(overrides);

        assert_eq!(tree.len(), 5);
        match tree.get("max_epochs") {
            Some(ConfigValue::Literal(v)) => assert_eq!(v, &json!(100)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn engine_edge_cases() {
        let mut engine = SeededEngine::new(1);
        assert_eq!(engine.choice(&[]), Value::Null);
        assert_eq!(engine.randint(5, 5), 5);
        assert_eq!(engine.uniform(2.0, 2.0), 2.0);
        for _ in 0..50 {
            let v = engine.log_uniform(1e-5, 1e-1);
            assert!((1e-5..=1e-1).contains(&v), "out of bounds: {v}");
        }
    }
}
