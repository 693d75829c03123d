use crate::core::domain::value_object::{
    ProxmoxApiToken, ProxmoxPassword, ProxmoxUrl, ProxmoxUserId,
};

/// How the swapper authenticates against the hypervisor.
#[derive(Debug, Clone)]
pub enum ProxmoxCredentials {
    /// Stateless API token, sent on every request.
    ApiToken(ProxmoxApiToken),
    /// Username and password exchanged for a ticket, renewed on expiry or `401`.
    Password {
        user: ProxmoxUserId,
        password: ProxmoxPassword,
    },
}

/// Everything needed to reach one Proxmox VE endpoint.
#[derive(Debug, Clone)]
pub struct ProxmoxConnection {
    url: ProxmoxUrl,
    credentials: ProxmoxCredentials,
    accept_invalid_certs: bool,
}

impl ProxmoxConnection {
    pub fn new(url: ProxmoxUrl, credentials: ProxmoxCredentials, accept_invalid_certs: bool) -> Self {
        Self {
            url,
            credentials,
            accept_invalid_certs,
        }
    }

    pub fn url(&self) -> &ProxmoxUrl {
        &self.url
    }

    pub fn credentials(&self) -> &ProxmoxCredentials {
        &self.credentials
    }

    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }
}
