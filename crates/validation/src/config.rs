//! Validation backend configuration.

use std::time::Duration;

/// Where and how to reach the validation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub base_url: String,
    pub path: String,
    /// Optional bearer token sent with every request.
    pub token: Option<String>,
    /// Deadline for a single validation call.
    pub timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            path: "/iap/validate-iap".to_string(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl ValidatorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full validation endpoint URL.
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slashes() {
        let config =
            ValidatorConfig::new("https://api.example.com/").with_path("/iap/validate-iap");
        assert_eq!(config.url(), "https://api.example.com/iap/validate-iap");

        let config = ValidatorConfig::new("https://api.example.com").with_path("v2/validate");
        assert_eq!(config.url(), "https://api.example.com/v2/validate");
    }
}
