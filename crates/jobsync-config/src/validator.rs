//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{Config, StoreBackend};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Convert the first error into a [`ConfigError`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_scheduler(config, &mut result);
        Self::validate_node(config, &mut result);
        Self::validate_store(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        if config.scheduler.poll_interval_secs == 0 {
            result.add_error(ValidationError::new(
                "scheduler.poll_interval_secs",
                "poll_interval_secs must be greater than 0",
            ));
        } else if config.scheduler.poll_interval_secs < 10 {
            result.add_warning(ValidationWarning::new(
                "scheduler.poll_interval_secs",
                "poll interval is below 10s, the store will be queried very often",
            ));
        }

        if config.scheduler.worker_count == 0 {
            result.add_error(ValidationError::new(
                "scheduler.worker_count",
                "worker_count must be at least 1",
            ));
        }
    }

    fn validate_node(config: &Config, result: &mut ValidationResult) {
        if let Some(ref address) = config.node.address {
            if address.trim().is_empty() {
                result.add_error(ValidationError::new(
                    "node.address",
                    "Node address cannot be empty when set",
                ));
            }
        }
    }

    fn validate_store(config: &Config, result: &mut ValidationResult) {
        match config.store.backend {
            StoreBackend::Sqlite => {
                if config.store.path.as_os_str().is_empty() {
                    result.add_error(ValidationError::new(
                        "store.path",
                        "SQLite backend requires a database path",
                    ));
                }
            }
            StoreBackend::Memory => {
                result.add_warning(ValidationWarning::new(
                    "store.backend",
                    "Memory backend does not persist definitions across restarts",
                ));
            }
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        if config.logging.level.trim().is_empty() {
            result.add_error(ValidationError::new(
                "logging.level",
                "Log level cannot be empty",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
