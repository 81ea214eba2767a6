use http::header::HeaderName;

use crate::config::models::{OverrideConfig, OverrideSource};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid method name '{method}': {reason}")]
    InvalidMethod { method: String, reason: String },

    #[error("Invalid override source ({kind} '{name}'): {message}")]
    InvalidSource {
        kind: String,
        name: String,
        message: String,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Override configuration validator.
///
/// All failures here are construction-time failures: once a config passes,
/// request-time processing can never fail for override-related reasons.
pub struct OverrideConfigValidator;

impl OverrideConfigValidator {
    /// Validate the entire override configuration
    pub fn validate(config: &OverrideConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_method_token(&config.carrier_method, "carrier_method") {
            errors.push(e);
        }

        if config.allowed_methods.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "allowed_methods".to_string(),
            });
        } else {
            for method in &config.allowed_methods {
                if let Err(e) = Self::validate_method_token(method, "allowed_methods") {
                    errors.push(e);
                }
            }
        }

        for method in &config.bodyless_methods {
            if let Err(e) = Self::validate_method_token(method, "bodyless_methods") {
                errors.push(e);
            }
        }

        if config.sources.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "sources".to_string(),
            });
        } else {
            for source in &config.sources {
                if let Err(e) = Self::validate_source(source) {
                    errors.push(e);
                }
            }
        }

        if config.max_form_body_bytes == 0
            && config
                .sources
                .iter()
                .any(|s| matches!(s, OverrideSource::Form { .. }))
        {
            errors.push(ValidationError::InvalidField {
                field: "max_form_body_bytes".to_string(),
                message: "Must be greater than 0 when a form source is configured".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate that a method name is a legal HTTP token (RFC 9110).
    fn validate_method_token(method: &str, field: &str) -> ValidationResult<()> {
        if method.trim().is_empty() {
            return Err(ValidationError::InvalidMethod {
                method: method.to_string(),
                reason: format!("'{field}' entries cannot be empty"),
            });
        }

        if !method.bytes().all(is_tchar) {
            return Err(ValidationError::InvalidMethod {
                method: method.to_string(),
                reason: format!("'{field}' entries must be HTTP tokens (no spaces or separators)"),
            });
        }

        Ok(())
    }

    /// Validate a single override source
    fn validate_source(source: &OverrideSource) -> ValidationResult<()> {
        let name = source.name();

        if name.trim().is_empty() {
            return Err(ValidationError::InvalidSource {
                kind: source.kind().to_string(),
                name: name.to_string(),
                message: "Source name cannot be empty".to_string(),
            });
        }

        if let OverrideSource::Header { name } = source
            && HeaderName::from_bytes(name.as_bytes()).is_err()
        {
            return Err(ValidationError::InvalidSource {
                kind: "header".to_string(),
                name: name.clone(),
                message: "Not a valid HTTP header name".to_string(),
            });
        }

        Ok(())
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.is_empty() {
            return "No errors".to_string();
        }

        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}

/// RFC 9110 `tchar`: any visible ASCII except delimiters.
fn is_tchar(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.'
        | b'^' | b'_' | b'`' | b'|' | b'~'
        | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z')
}
