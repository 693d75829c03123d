use crate::core::domain::error::ValidationError;
use url::Url;

const API_PREFIX: &str = "api2/json";

/// A validated Proxmox VE endpoint, e.g. `https://pve.example.com:8006`.
///
/// Only the scheme, host and port are kept. An `/api2/json` suffix supplied by
/// the user is tolerated and stripped, so `api_url` can always append it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxmoxUrl(Url);

impl ProxmoxUrl {
    /// Parses and validates an endpoint URL.
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        validate_url(raw)?;
        let mut url = Url::parse(raw.trim())
            .map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))?;
        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self(url))
    }

    /// Creates a URL without validation.
    #[cfg(test)]
    pub(crate) fn new_unchecked(value: &str) -> Self {
        Self(Url::parse(value).expect("test URL must parse"))
    }

    /// Returns the base URL as a string slice (always ends with `/`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Builds the full URL of an API path relative to `/api2/json`.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.0.as_str().trim_end_matches('/'),
            API_PREFIX,
            path.trim_start_matches('/')
        )
    }
}

/// Validates the format of an endpoint URL string.
pub(crate) fn validate_url(raw: &str) -> Result<(), ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::Field {
            field: "url".to_string(),
            message: "URL cannot be empty".to_string(),
        });
    }
    if raw.len() > 2083 {
        return Err(ValidationError::Format(
            "URL exceeds maximum length of 2083 characters".to_string(),
        ));
    }
    let url = Url::parse(raw)
        .map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::ConstraintViolation(
            "Invalid scheme. Must be one of: https, http".to_string(),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::Field {
            field: "url".to_string(),
            message: "URL must contain a host".to_string(),
        });
    }
    let path = url.path().trim_end_matches('/');
    if !path.is_empty() && path != "/api2/json" {
        return Err(ValidationError::ConstraintViolation(format!(
            "Unexpected path '{}': use the bare endpoint or /api2/json",
            url.path()
        )));
    }
    Ok(())
}
