use crate::{
    auth::application::{
        request::login_request::LoginRequest, response::login_response::LoginResponse,
    },
    core::domain::{
        error::{SwapperError, SwapperResult, ValidationError},
        model::proxmox_auth::ProxmoxAuth,
        value_object::{ProxmoxCSRFToken, ProxmoxPassword, ProxmoxTicket, ProxmoxUrl, ProxmoxUserId},
    },
};

use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use tracing::debug;

/// Exchanges a username and password for a ticket and CSRF token.
pub struct LoginService {
    default_headers: HeaderMap,
}

impl LoginService {
    pub fn new() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Self { default_headers }
    }

    pub async fn execute(
        &self,
        http_client: &Client,
        url: &ProxmoxUrl,
        user: &ProxmoxUserId,
        password: &ProxmoxPassword,
    ) -> SwapperResult<ProxmoxAuth> {
        let request = LoginRequest {
            username: user.as_str().to_string(),
            password: password.as_str().to_string(),
        };
        debug!(user = user.as_str(), "requesting Proxmox ticket");

        let response = http_client
            .post(url.api_url("access/ticket"))
            .headers(self.default_headers.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| SwapperError::Upstream(e.to_string()))?;

        match response.status() {
            StatusCode::OK => self.handle_successful_login(response).await,
            StatusCode::UNAUTHORIZED => Err(SwapperError::Authentication(
                "Invalid credentials provided".to_string(),
            )),
            StatusCode::BAD_REQUEST => Err(ValidationError::Field {
                field: "request".to_string(),
                message: "Invalid request format".to_string(),
            }
            .into()),
            StatusCode::NOT_FOUND => Err(SwapperError::Upstream(
                "Login endpoint not found".to_string(),
            )),
            StatusCode::SERVICE_UNAVAILABLE => Err(SwapperError::Upstream(
                "Proxmox service is currently unavailable".to_string(),
            )),
            status => Err(SwapperError::Upstream(format!(
                "Unexpected response status: {}",
                status
            ))),
        }
    }

    async fn handle_successful_login(
        &self,
        response: reqwest::Response,
    ) -> SwapperResult<ProxmoxAuth> {
        let login_response = response.json::<LoginResponse>().await.map_err(|e| {
            SwapperError::Upstream(format!("Failed to parse login response: {}", e))
        })?;

        let ticket = ProxmoxTicket::new(login_response.data.ticket)?;
        let csrf_token = ProxmoxCSRFToken::new(login_response.data.csrf_token)?;

        Ok(ProxmoxAuth::new(ticket, Some(csrf_token)))
    }
}

impl Default for LoginService {
    fn default() -> Self {
        Self::new()
    }
}
