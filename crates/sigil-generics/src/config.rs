// config.rs
//
// Tunables for a GenericContext.

use std::env;

/// Limits on a single requirement machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineLimits {
    /// Classes a machine may create before giving up with
    /// `CompletionFailed`.
    pub max_terms: usize,
    /// Classes up to this member depth apply their protocols' requirement
    /// signatures immediately; deeper ones only when a query reaches them.
    pub eager_depth: usize,
}

impl Default for MachineLimits {
    fn default() -> Self {
        Self {
            max_terms: 4000,
            eager_depth: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    pub machine: MachineLimits,
    /// Nesting bound for recursive type substitution. Deeper types
    /// substitute to the error type.
    pub max_substitution_depth: usize,
    /// Check substitution map invariants on construction, not only in debug
    /// builds.
    pub verify_substitution_maps: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            machine: MachineLimits::default(),
            max_substitution_depth: 256,
            verify_substitution_maps: cfg!(debug_assertions),
        }
    }
}

/// Builder for [`GenericContext`](crate::GenericContext).
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `SIGIL_MAX_TERMS`, `SIGIL_EAGER_DEPTH` and
    /// `SIGIL_MAX_SUBST_DEPTH` when set to a number.
    pub fn from_env() -> Self {
        let mut builder = Self::new();
        if let Some(n) = env_usize("SIGIL_MAX_TERMS") {
            builder = builder.with_max_terms(n);
        }
        if let Some(n) = env_usize("SIGIL_EAGER_DEPTH") {
            builder = builder.with_eager_depth(n);
        }
        if let Some(n) = env_usize("SIGIL_MAX_SUBST_DEPTH") {
            builder = builder.with_max_substitution_depth(n);
        }
        builder
    }

    pub fn with_max_terms(mut self, max_terms: usize) -> Self {
        self.config.machine.max_terms = max_terms;
        self
    }

    pub fn with_eager_depth(mut self, eager_depth: usize) -> Self {
        self.config.machine.eager_depth = eager_depth;
        self
    }

    pub fn with_max_substitution_depth(mut self, depth: usize) -> Self {
        self.config.max_substitution_depth = depth;
        self
    }

    pub fn with_verification(mut self, verify: bool) -> Self {
        self.config.verify_substitution_maps = verify;
        self
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn build(self) -> crate::GenericContext {
        crate::GenericContext::with_config(self.config)
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let value = env::var(key).ok()?;
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring non-numeric setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let builder = ContextBuilder::new()
            .with_max_terms(10)
            .with_eager_depth(0)
            .with_max_substitution_depth(4)
            .with_verification(true);
        let config = builder.config();
        assert_eq!(config.machine.max_terms, 10);
        assert_eq!(config.machine.eager_depth, 0);
        assert_eq!(config.max_substitution_depth, 4);
        assert!(config.verify_substitution_maps);
    }

    #[test]
    fn defaults_are_bounded() {
        let config = ContextConfig::default();
        assert!(config.machine.max_terms > 0);
        assert!(config.max_substitution_depth > 0);
    }
}
