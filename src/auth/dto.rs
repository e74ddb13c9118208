use serde::{Deserialize, Serialize};

/// Request body for token issuance.
#[derive(Deserialize)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Request body for signing-secret rotation.
#[derive(Deserialize)]
pub struct RotateSecretRequest {
    pub secret: String,
}
