use crate::core::domain::error::ValidationError;

/// A Proxmox user id in `user@realm` form (e.g. `root@pam`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxmoxUserId(String);

impl ProxmoxUserId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_user_id(&value)?;
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the realm part (`pam`, `pve`, `ldap`, ...).
    #[must_use]
    pub fn realm(&self) -> &str {
        self.0.rsplit_once('@').map(|(_, realm)| realm).unwrap_or_default()
    }
}

/// Validates a `user@realm` string.
pub(crate) fn validate_user_id(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Field {
            field: "username".to_string(),
            message: "Username cannot be empty".to_string(),
        });
    }
    let Some((user, realm)) = value.rsplit_once('@') else {
        return Err(ValidationError::Format(
            "Username must be in format user@realm".to_string(),
        ));
    };
    if user.is_empty() || realm.is_empty() {
        return Err(ValidationError::Format(
            "Username must be in format user@realm".to_string(),
        ));
    }
    if !realm
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::Format(
            "Realm contains invalid characters".to_string(),
        ));
    }
    if user.chars().any(|c| c.is_whitespace() || c == ':') {
        return Err(ValidationError::Format(
            "Username cannot contain whitespace or ':'".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_realm() {
        let user = ProxmoxUserId::new("swapper@pve").unwrap();
        assert_eq!(user.realm(), "pve");
        assert_eq!(user.as_str(), "swapper@pve");
    }

    #[test]
    fn test_invalid_user_ids() {
        for value in ["", "root", "@pam", "root@", "ro ot@pam", "root@p m"] {
            assert!(ProxmoxUserId::new(value).is_err(), "{} should fail", value);
        }
    }
}
