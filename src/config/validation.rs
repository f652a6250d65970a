//! Configuration validation module

use crate::config::{DispatchConfig, LimitsConfig, ServerConfig, StorageConfig, WebhookConfig};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Server configuration error: {message}")]
    Server { message: String },

    #[error("Limits configuration error: {message}")]
    Limits { message: String },

    #[error("Dispatch configuration error: {message}")]
    Dispatch { message: String },

    #[error("Webhook configuration error: {message}")]
    Webhook { message: String },

    #[error("Storage configuration error: {message}")]
    Storage { message: String },
}

impl ValidationError {
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    pub fn limits(message: impl Into<String>) -> Self {
        Self::Limits {
            message: message.into(),
        }
    }

    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
        }
    }

    pub fn webhook(message: impl Into<String>) -> Self {
        Self::Webhook {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::server(format!(
                "Port must be in range 1-65535, got {}",
                self.port
            )));
        }
        if self.host.trim().is_empty() {
            return Err(ValidationError::server("Host must not be empty"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(ValidationError::server(
                "request_timeout_seconds must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Validate for LimitsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_bundle_bytes == 0 {
            return Err(ValidationError::limits(
                "max_bundle_bytes must be greater than 0",
            ));
        }
        if self.max_in_flight_jobs == 0 {
            return Err(ValidationError::limits(
                "max_in_flight_jobs must be greater than 0",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::limits(
                "queue_capacity must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Validate for DispatchConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_concurrent_jobs == 0 {
            return Err(ValidationError::dispatch(
                "max_concurrent_jobs must be greater than 0",
            ));
        }
        if self.job_timeout_seconds == 0 {
            return Err(ValidationError::dispatch(
                "job_timeout_seconds must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Validate for WebhookConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::webhook(
                "max_attempts must be greater than 0",
            ));
        }
        if self.backoff_base_ms == 0 {
            return Err(ValidationError::webhook(
                "backoff_base_ms must be greater than 0",
            ));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(ValidationError::webhook(
                "backoff_max_ms must be at least backoff_base_ms",
            ));
        }
        for subscription in &self.subscriptions {
            if subscription.url.trim().is_empty() {
                return Err(ValidationError::webhook(
                    "subscription url must not be empty",
                ));
            }
            if subscription.secret.trim().is_empty() {
                return Err(ValidationError::webhook(format!(
                    "subscription secret for {} must not be empty",
                    subscription.url
                )));
            }
        }
        Ok(())
    }
}

impl Validate for StorageConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.artifact_root.as_os_str().is_empty() {
            return Err(ValidationError::storage("artifact_root must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Server { .. })
        ));
    }

    #[test]
    fn backoff_bounds_are_checked() {
        let mut config = Config::default();
        config.webhook.backoff_max_ms = config.webhook.backoff_base_ms - 1;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Webhook { .. })
        ));
    }

    #[test]
    fn empty_subscription_secret_is_rejected() {
        let mut config = Config::default();
        config.webhook.subscriptions.push(crate::config::SubscriptionConfig {
            url: "https://hooks.example.com/review".to_string(),
            secret: "".to_string(),
        });
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Webhook { .. })
        ));
    }
}
