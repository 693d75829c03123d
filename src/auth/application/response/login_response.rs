use serde::Deserialize;

/// Envelope returned by `POST /access/ticket`.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub data: LoginResponseData,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponseData {
    pub ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    pub csrf_token: String,
    #[serde(default)]
    pub username: Option<String>,
}
