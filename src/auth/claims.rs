use serde::{Deserialize, Serialize};

/// JWT payload carried by every bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,        // user id, decimal
    pub roles: Vec<String>, // snapshot at issuance
    pub iat: i64,           // issued at (unix timestamp)
    pub exp: i64,           // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}
