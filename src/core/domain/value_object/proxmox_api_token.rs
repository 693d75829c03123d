use crate::core::domain::error::ValidationError;
use std::fmt;

/// A Proxmox API token: an id of the form `user@realm!tokenname` and its secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxmoxApiToken {
    id: String,
    secret: String,
}

impl ProxmoxApiToken {
    /// Creates a validated API token.
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        let secret = secret.into();
        validate_api_token(&id, &secret)?;
        Ok(Self { id, secret })
    }

    /// Returns the token id (`user@realm!tokenname`).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Formats the token as the value of an `Authorization` header.
    #[must_use]
    pub fn as_authorization_header(&self) -> String {
        format!("PVEAPIToken={}={}", self.id, self.secret)
    }
}

impl fmt::Debug for ProxmoxApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxmoxApiToken")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Validates an API token id/secret pair.
pub(crate) fn validate_api_token(id: &str, secret: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::Field {
            field: "token_id".to_string(),
            message: "Token id cannot be empty".to_string(),
        });
    }
    let Some((user, token_name)) = id.split_once('!') else {
        return Err(ValidationError::Format(
            "Token id must be in format user@realm!tokenname".to_string(),
        ));
    };
    if token_name.is_empty() || !user.contains('@') {
        return Err(ValidationError::Format(
            "Token id must be in format user@realm!tokenname".to_string(),
        ));
    }
    if secret.trim().is_empty() {
        return Err(ValidationError::Field {
            field: "token_secret".to_string(),
            message: "Token secret cannot be empty".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_header() {
        let token = ProxmoxApiToken::new("root@pam!swapper", "aaaa-bbbb").unwrap();
        assert_eq!(
            token.as_authorization_header(),
            "PVEAPIToken=root@pam!swapper=aaaa-bbbb"
        );
        assert!(!format!("{:?}", token).contains("aaaa-bbbb"));
    }

    #[test]
    fn test_invalid_tokens() {
        assert!(ProxmoxApiToken::new("", "secret").is_err());
        assert!(ProxmoxApiToken::new("root@pam", "secret").is_err());
        assert!(ProxmoxApiToken::new("root!swapper", "secret").is_err());
        assert!(ProxmoxApiToken::new("root@pam!", "secret").is_err());
        assert!(ProxmoxApiToken::new("root@pam!swapper", " ").is_err());
    }
}
