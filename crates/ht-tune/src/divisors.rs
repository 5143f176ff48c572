//! Minibatch sizes compatible with a total batch size.

use serde_json::Value;

use crate::space::ConfigValue;

/// Conventional lower bound for a useful minibatch.
pub const DEFAULT_MIN_MINIBATCH: u32 = 128;

/// All divisors of `total_batch` in `[min_size, total_batch]`, ascending.
///
/// Falls back to `[min_size]` when no divisor exists in range — callers that
/// rely on exact divisibility must check that case, since the fallback may
/// not divide `total_batch`. Linear scan; total batch is bounded by
/// env count × horizon length in practice.
pub fn batch_size_divisors(total_batch: u32, min_size: u32) -> Vec<u32> {
    let divisors: Vec<u32> = (min_size..=total_batch)
        .filter(|i| total_batch % i == 0)
        .collect();
    if divisors.is_empty() {
        vec![min_size]
    } else {
        divisors
    }
}

/// The smallest divisor of `total_batch` that is ≥ `min_size`, or `min_size`
/// itself when none exists (documented fallback, not an error).
pub fn smallest_batch_divisor(total_batch: u32, min_size: u32) -> u32 {
    batch_size_divisors(total_batch, min_size)[0]
}

/// Package the resolver as a dependent sampler reading the trial's env count
/// and horizon length.
pub fn minibatch_sampler(env_key: &str, horizon_key: &str, min_size: u32) -> ConfigValue {
    let env_key = env_key.to_string();
    let horizon_key = horizon_key.to_string();
    let inputs = vec![env_key.clone(), horizon_key.clone()];
    ConfigValue::Computed {
        inputs,
        resolve: std::sync::Arc::new(move |cfg| {
            let num_envs = cfg.get_i64(&env_key).unwrap_or(0).max(0) as u32;
            let horizon = cfg.get_i64(&horizon_key).unwrap_or(0).max(0) as u32;
            Value::from(smallest_batch_divisor(num_envs * horizon, min_size))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{ConfigTree, SeededEngine};
    use serde_json::json;

    #[test]
    fn smallest_divisor_of_power_of_two() {
        assert_eq!(smallest_batch_divisor(4096, 128), 128);
    }

    #[test]
    fn only_divisor_in_range_is_the_number_itself() {
        // 130 = 2 * 5 * 13: no divisor in [128, 130) — 130 itself qualifies.
        assert_eq!(smallest_batch_divisor(130, 128), 130);
    }

    #[test]
    fn fallback_when_no_divisor_exists() {
        // 127 is prime and below min_size; the fallback does not divide it.
        assert_eq!(smallest_batch_divisor(127, 128), 128);
        assert_ne!(127 % 128, 0);
    }

    #[test]
    fn divisor_list_is_ascending_and_exact() {
        let divisors = batch_size_divisors(512, 128);
        assert_eq!(divisors, vec![128, 256, 512]);
    }

    #[test]
    fn result_at_least_min_size_and_divides_unless_fallback() {
        for total_batch in [256u32, 1000, 1024, 4096, 130, 127, 129, 8192 * 256] {
            for min_size in [1u32, 64, 128, 500] {
                let result = smallest_batch_divisor(total_batch, min_size);
                assert!(result >= min_size);
                if result != min_size {
                    assert_eq!(total_batch % result, 0, "{result} must divide {total_batch}");
                }
            }
        }
    }

    #[test]
    fn sampler_reads_resolved_siblings() {
        let tree = ConfigTree::new()
            .choice("num_envs", vec![json!(1024)])
            .choice("horizon_length", vec![json!(16)])
            .set(
                "minibatch_size",
                minibatch_sampler("num_envs", "horizon_length", DEFAULT_MIN_MINIBATCH),
            );
        let trial = tree.resolve(&mut SeededEngine::new(0)).unwrap();
        // 1024 * 16 = 16384 = 2^14 → smallest divisor ≥ 128 is 128.
        assert_eq!(trial.get_i64("minibatch_size"), Some(128));
    }
}
