//! Session configuration, loaded from the environment.

use std::time::Duration;

use iapkit_core::{Platform, Sku};
use iapkit_store::SkuCatalog;
use iapkit_validation::ValidatorConfig;

use crate::error::ConfigError;
use crate::finalizer::FinalizePolicy;

/// Everything an [`IapSession`](crate::IapSession) needs besides its collaborators.
///
/// | Variable                         | Default                                  |
/// |----------------------------------|------------------------------------------|
/// | `IAP_PLATFORM`                   | build target, else `android`             |
/// | `IAP_SKUS_IOS`                   | `SKU_1`                                  |
/// | `IAP_SKUS_ANDROID`               | `credit_tier1,credit_tier2,credit_tier3` |
/// | `IAP_VALIDATION_URL`             | `http://localhost:8080`                  |
/// | `IAP_VALIDATION_PATH`            | `/iap/validate-iap`                      |
/// | `IAP_VALIDATION_TOKEN`           | unset                                    |
/// | `IAP_VALIDATION_TIMEOUT_MS`      | `10000`                                  |
/// | `IAP_FEED_CAPACITY`              | `16`                                     |
/// | `IAP_MAX_CONCURRENT_VALIDATIONS` | `4`                                      |
/// | `IAP_FINALIZE_POLICY`            | `on-verdict`                             |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub platform: Platform,
    pub skus: SkuCatalog,
    pub validator: ValidatorConfig,
    /// Buffered batches between the store and the worker.
    pub feed_capacity: usize,
    pub max_concurrent_validations: usize,
    pub finalize_policy: FinalizePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            platform: Platform::current().unwrap_or(Platform::Android),
            skus: SkuCatalog::default(),
            validator: ValidatorConfig::default(),
            feed_capacity: 16,
            max_concurrent_validations: 4,
            finalize_policy: FinalizePolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            ..Self::default()
        }
    }

    pub fn with_skus(mut self, skus: SkuCatalog) -> Self {
        self.skus = skus;
        self
    }

    pub fn with_validator(mut self, validator: ValidatorConfig) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity;
        self
    }

    pub fn with_max_concurrent_validations(mut self, max: usize) -> Self {
        self.max_concurrent_validations = max;
        self
    }

    pub fn with_finalize_policy(mut self, policy: FinalizePolicy) -> Self {
        self.finalize_policy = policy;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("IAP_PLATFORM") {
            config.platform = raw
                .parse()
                .map_err(|e| ConfigError::invalid("IAP_PLATFORM", format!("{e}")))?;
        }

        if let Some(raw) = get("IAP_SKUS_IOS") {
            config.skus = config.skus.with_ios(parse_skus("IAP_SKUS_IOS", &raw)?);
        }
        if let Some(raw) = get("IAP_SKUS_ANDROID") {
            config.skus = config.skus.with_android(parse_skus("IAP_SKUS_ANDROID", &raw)?);
        }

        if let Some(url) = get("IAP_VALIDATION_URL") {
            config.validator.base_url = url;
        }
        if let Some(path) = get("IAP_VALIDATION_PATH") {
            config.validator.path = path;
        }
        config.validator.token = get("IAP_VALIDATION_TOKEN");
        if let Some(raw) = get("IAP_VALIDATION_TIMEOUT_MS") {
            let ms = parse_positive("IAP_VALIDATION_TIMEOUT_MS", &raw)?;
            config.validator.timeout = Duration::from_millis(ms as u64);
        }

        if let Some(raw) = get("IAP_FEED_CAPACITY") {
            config.feed_capacity = parse_positive("IAP_FEED_CAPACITY", &raw)?;
        }
        if let Some(raw) = get("IAP_MAX_CONCURRENT_VALIDATIONS") {
            config.max_concurrent_validations =
                parse_positive("IAP_MAX_CONCURRENT_VALIDATIONS", &raw)?;
        }
        if let Some(raw) = get("IAP_FINALIZE_POLICY") {
            config.finalize_policy = raw.parse()?;
        }

        Ok(config)
    }
}

fn parse_skus(key: &'static str, raw: &str) -> Result<Vec<Sku>, ConfigError> {
    Sku::parse_list(raw).map_err(|e| ConfigError::invalid(key, e.to_string()))
}

fn parse_positive(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::invalid(key, "must be greater than zero")),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::invalid(key, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.validator.url(), "http://localhost:8080/iap/validate-iap");
        assert_eq!(config.finalize_policy, FinalizePolicy::OnVerdict);
    }

    #[test]
    fn reads_every_key() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("IAP_PLATFORM", "ios"),
            ("IAP_SKUS_IOS", "pro_monthly, pro_yearly"),
            ("IAP_VALIDATION_URL", "https://api.example.com"),
            ("IAP_VALIDATION_TOKEN", "s3cret"),
            ("IAP_VALIDATION_TIMEOUT_MS", "2500"),
            ("IAP_FEED_CAPACITY", "2"),
            ("IAP_MAX_CONCURRENT_VALIDATIONS", "1"),
            ("IAP_FINALIZE_POLICY", "always"),
        ]))
        .unwrap();

        assert_eq!(config.platform, Platform::Ios);
        assert_eq!(
            config.skus.for_platform(Platform::Ios),
            Sku::parse_list("pro_monthly,pro_yearly").unwrap().as_slice()
        );
        assert_eq!(config.validator.token.as_deref(), Some("s3cret"));
        assert_eq!(config.validator.timeout, Duration::from_millis(2500));
        assert_eq!(config.feed_capacity, 2);
        assert_eq!(config.max_concurrent_validations, 1);
        assert_eq!(config.finalize_policy, FinalizePolicy::Always);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = SessionConfig::from_lookup(lookup(&[("IAP_FEED_CAPACITY", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "IAP_FEED_CAPACITY", .. }));
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let err = SessionConfig::from_lookup(lookup(&[("IAP_PLATFORM", "web")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "IAP_PLATFORM", .. }));
    }
}
