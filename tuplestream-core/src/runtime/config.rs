use bon::Builder;
use envconfig::Envconfig;

/// Settings of a [LocalRuntime](super::LocalRuntime).
///
/// Build it in code with [RuntimeConfig::builder] or read it from the environment with
/// [Envconfig::init_from_env].
///
/// ```rust
/// use tuplestream::runtime::RuntimeConfig;
///
/// let config = RuntimeConfig::builder().max_skipped(10).build();
/// assert_eq!(config.progress_interval, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Envconfig)]
pub struct RuntimeConfig {
    /// Abort the run once more than this many tuples were skipped in total.
    /// Unbounded if not set.
    #[envconfig(from = "TUPLESTREAM_MAX_SKIPPED")]
    pub max_skipped: Option<u64>,

    /// Log progress every time this many source rows were read, 0 disables progress logs
    #[envconfig(from = "TUPLESTREAM_PROGRESS_INTERVAL", default = "0")]
    #[builder(default = 0)]
    pub progress_interval: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_from_empty_env() {
        let config = RuntimeConfig::init_from_hashmap(&HashMap::new()).unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn reads_env() {
        let env = HashMap::from([
            ("TUPLESTREAM_MAX_SKIPPED".to_owned(), "5".to_owned()),
            ("TUPLESTREAM_PROGRESS_INTERVAL".to_owned(), "1000".to_owned()),
        ]);
        let config = RuntimeConfig::init_from_hashmap(&env).unwrap();
        assert_eq!(config.max_skipped, Some(5));
        assert_eq!(config.progress_interval, 1000);
        assert!(RuntimeConfig::init_from_hashmap(&HashMap::from([(
            "TUPLESTREAM_PROGRESS_INTERVAL".to_owned(),
            "often".to_owned()
        )]))
        .is_err());
    }
}
