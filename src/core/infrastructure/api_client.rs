//! Internal HTTP client that handles authentication and response unwrapping.

use crate::{
    auth::application::service::login_service::LoginService,
    core::domain::{
        error::{SwapperError, SwapperResult},
        model::{
            proxmox_auth::ProxmoxAuth,
            proxmox_connection::{ProxmoxConnection, ProxmoxCredentials},
        },
    },
};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Request budget towards the hypervisor.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_second: NonZeroU32,
    pub burst_size: NonZeroU32,
}

/// Tunables of the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub rate_limit: Option<RateLimitConfig>,
    /// Proxmox tickets are valid for two hours; renew a little earlier.
    pub ticket_lifetime: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rate_limit: None,
            ticket_lifetime: Duration::from_secs(110 * 60),
        }
    }
}

/// Every Proxmox response wraps its payload in `{ "data": ... }`.
#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// Internal HTTP client that manages authentication and provides methods to call the Proxmox API.
///
/// Token credentials are sent as an `Authorization: PVEAPIToken=...` header on every
/// request. Password credentials are exchanged for a ticket; the `PVEAuthCookie` and
/// `CSRFPreventionToken` headers are added to each request, and a `401 Unauthorized`
/// triggers exactly one ticket refresh and retry.
#[derive(Debug)]
pub struct ApiClient {
    http_client: Client,
    connection: Arc<ProxmoxConnection>,
    auth: Arc<RwLock<Option<ProxmoxAuth>>>,
    config: Arc<ClientConfig>,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl ApiClient {
    /// Creates a new `ApiClient`. Ticket sessions start unauthenticated.
    ///
    /// # Errors
    /// Returns `SwapperError::Upstream` if the HTTP client cannot be built.
    pub fn new(connection: ProxmoxConnection, config: ClientConfig) -> SwapperResult<Self> {
        let http_client = Client::builder()
            .danger_accept_invalid_certs(connection.accept_invalid_certs())
            .build()
            .map_err(|e| SwapperError::Upstream(e.to_string()))?;

        let rate_limiter = config.rate_limit.map(|rl| {
            let quota = Quota::per_second(rl.requests_per_second).allow_burst(rl.burst_size);
            Arc::new(DefaultDirectRateLimiter::direct(quota))
        });

        Ok(Self {
            http_client,
            connection: Arc::new(connection),
            auth: Arc::new(RwLock::new(None)),
            config: Arc::new(config),
            rate_limiter,
        })
    }

    /// Returns a reference to the underlying connection details.
    pub fn connection(&self) -> &ProxmoxConnection {
        &self.connection
    }

    /// Sets the ticket session (used after a successful login).
    pub async fn set_auth(&self, auth: ProxmoxAuth) {
        let mut lock = self.auth.write().await;
        *lock = Some(auth);
    }

    /// Performs an authenticated GET request and unwraps `data`.
    pub async fn get<T>(&self, path: &str) -> SwapperResult<T>
    where
        T: DeserializeOwned,
    {
        self.execute_request(Method::GET, path, None::<&()>).await
    }

    /// Performs an authenticated POST request with a JSON body and unwraps `data`.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> SwapperResult<T>
    where
        B: serde::Serialize,
        T: DeserializeOwned,
    {
        self.execute_request(Method::POST, path, Some(body)).await
    }

    /// Core request execution method. It ensures authentication, sends the request,
    /// handles 401 by refreshing a ticket once, and parses the response.
    async fn execute_request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> SwapperResult<T>
    where
        B: serde::Serialize,
        T: DeserializeOwned,
    {
        self.ensure_authenticated().await?;

        let response = self.send(method.clone(), path, body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return match self.connection.credentials() {
                ProxmoxCredentials::ApiToken(token) => Err(SwapperError::Authentication(
                    format!("API token {} was rejected", token.id()),
                )),
                ProxmoxCredentials::Password { .. } => {
                    warn!(path, "ticket rejected, refreshing once");
                    self.refresh_auth().await?;
                    let retried = self.send(method, path, body).await?;
                    Self::parse(retried).await
                }
            };
        }

        Self::parse(response).await
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> SwapperResult<reqwest::Response>
    where
        B: serde::Serialize,
    {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let url = self.connection.url().api_url(path);
        debug!(%method, %url, "hypervisor request");

        let mut req_builder = self.http_client.request(method, &url);
        req_builder = self.authorize(req_builder).await;
        if let Some(body) = body {
            req_builder = req_builder.json(body);
        }

        req_builder
            .send()
            .await
            .map_err(|e| SwapperError::Upstream(format!("HTTP request failed: {}", e)))
    }

    async fn authorize(&self, req_builder: RequestBuilder) -> RequestBuilder {
        match self.connection.credentials() {
            ProxmoxCredentials::ApiToken(token) => {
                req_builder.header("Authorization", token.as_authorization_header())
            }
            ProxmoxCredentials::Password { .. } => {
                let auth_guard = self.auth.read().await;
                match auth_guard.as_ref() {
                    Some(auth) => {
                        let req_builder =
                            req_builder.header("Cookie", auth.ticket().as_cookie_header());
                        match auth.csrf_token() {
                            Some(csrf) => req_builder.header("CSRFPreventionToken", csrf.as_str()),
                            None => req_builder,
                        }
                    }
                    None => req_builder,
                }
            }
        }
    }

    async fn parse<T>(response: reqwest::Response) -> SwapperResult<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SwapperError::Authentication(
                "Request rejected after ticket refresh".to_string(),
            ));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(SwapperError::Upstream(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json::<DataEnvelope<T>>()
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| SwapperError::Upstream(format!("Failed to parse response: {}", e)))
    }

    /// Ensures that a ticket session is present and fresh. No-op for API tokens.
    async fn ensure_authenticated(&self) -> SwapperResult<()> {
        if matches!(self.connection.credentials(), ProxmoxCredentials::ApiToken(_)) {
            return Ok(());
        }

        let need_refresh = {
            let auth_guard = self.auth.read().await;
            match auth_guard.as_ref() {
                Some(auth) => auth.ticket().is_expired(self.config.ticket_lifetime),
                None => true,
            }
        };

        if need_refresh {
            self.refresh_auth().await?;
        }
        Ok(())
    }

    /// Performs a fresh login using the stored credentials to obtain a new ticket.
    async fn refresh_auth(&self) -> SwapperResult<()> {
        let ProxmoxCredentials::Password { user, password } = self.connection.credentials() else {
            return Ok(());
        };
        let auth = LoginService::new()
            .execute(&self.http_client, self.connection.url(), user, password)
            .await?;
        self.set_auth(auth).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::value_object::{
        ProxmoxApiToken, ProxmoxCSRFToken, ProxmoxPassword, ProxmoxTicket, ProxmoxUrl,
        ProxmoxUserId,
    };
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    fn token_connection(server_url: &str) -> ProxmoxConnection {
        let token = ProxmoxApiToken::new("root@pam!swapper", "s3cr3t").unwrap();
        ProxmoxConnection::new(
            ProxmoxUrl::new_unchecked(server_url),
            ProxmoxCredentials::ApiToken(token),
            false,
        )
    }

    fn password_connection(server_url: &str) -> ProxmoxConnection {
        ProxmoxConnection::new(
            ProxmoxUrl::new_unchecked(server_url),
            ProxmoxCredentials::Password {
                user: ProxmoxUserId::new("testuser@pam").unwrap(),
                password: ProxmoxPassword::new("testpass").unwrap(),
            },
            false,
        )
    }

    fn create_test_auth() -> ProxmoxAuth {
        let ticket = ProxmoxTicket::new_unchecked("PVE:testuser@pam:4EEC61E2::sig".to_string());
        let csrf = ProxmoxCSRFToken::new_unchecked("4EEC61E2:token".to_string());
        ProxmoxAuth::new(ticket, Some(csrf))
    }

    #[tokio::test]
    async fn test_get_with_api_token_unwraps_data() {
        let mock_server = MockServer::start().await;
        let client =
            ApiClient::new(token_connection(&mock_server.uri()), ClientConfig::default()).unwrap();

        Mock::given(method("GET"))
            .and(path("/api2/json/test"))
            .and(header("Authorization", "PVEAPIToken=root@pam!swapper=s3cr3t"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": "ok"})),
            )
            .mount(&mock_server)
            .await;

        let result: String = client.get("test").await.unwrap();
        assert_eq!(result, "ok");
    }

    #[tokio::test]
    async fn test_rejected_api_token_is_authentication_error() {
        let mock_server = MockServer::start().await;
        let client =
            ApiClient::new(token_connection(&mock_server.uri()), ClientConfig::default()).unwrap();

        Mock::given(method("GET"))
            .and(path("/api2/json/test"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let result: SwapperResult<serde_json::Value> = client.get("test").await;
        assert!(matches!(result, Err(SwapperError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_unauthorized_ticket_triggers_refresh() {
        let mock_server = MockServer::start().await;
        let client =
            ApiClient::new(password_connection(&mock_server.uri()), ClientConfig::default())
                .unwrap();
        client.set_auth(create_test_auth()).await;

        // First GET returns 401
        Mock::given(method("GET"))
            .and(path("/api2/json/test"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api2/json/access/ticket"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "ticket": "PVE:testuser@pam:4EEC61E2::new_sig",
                    "CSRFPreventionToken": "4EEC61E2:abc123"
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        // Retry carries the renewed cookie
        Mock::given(method("GET"))
            .and(path("/api2/json/test"))
            .and(header("Cookie", "PVEAuthCookie=PVE:testuser@pam:4EEC61E2::new_sig"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": "ok"})),
            )
            .mount(&mock_server)
            .await;

        let result: String = client.get("test").await.unwrap();
        assert_eq!(result, "ok");
    }

    #[tokio::test]
    async fn test_http_error_is_upstream_failure() {
        let mock_server = MockServer::start().await;
        let client =
            ApiClient::new(token_connection(&mock_server.uri()), ClientConfig::default()).unwrap();

        Mock::given(method("POST"))
            .and(path("/api2/json/nodes/pve1/qemu/100/status/start"))
            .respond_with(ResponseTemplate::new(500).set_body_string("VM is locked"))
            .mount(&mock_server)
            .await;

        let result: SwapperResult<serde_json::Value> = client
            .post("nodes/pve1/qemu/100/status/start", &serde_json::json!({}))
            .await;
        match result {
            Err(SwapperError::Upstream(message)) => assert!(message.contains("VM is locked")),
            other => panic!("expected upstream failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limiting_delays_requests() {
        use std::time::Instant;

        let mock_server = MockServer::start().await;
        let config = ClientConfig {
            rate_limit: Some(RateLimitConfig {
                requests_per_second: NonZeroU32::new(2).unwrap(),
                burst_size: NonZeroU32::new(2).unwrap(),
            }),
            ..Default::default()
        };
        let client = ApiClient::new(token_connection(&mock_server.uri()), config).unwrap();

        Mock::given(method("GET"))
            .and(path("/api2/json/test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": "ok"})),
            )
            .expect(4)
            .mount(&mock_server)
            .await;

        let start = Instant::now();
        for _ in 0..4 {
            client.get::<String>("test").await.unwrap();
        }
        // Two requests fit in the burst, the other two wait for refill.
        assert!(start.elapsed() >= Duration::from_millis(900));
    }
}
