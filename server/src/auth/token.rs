use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Default access token lifetime in hours
pub const ACCESS_TOKEN_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,        // Caller ID
    exp: i64,           // Expiration time
    iat: i64,           // Issued at
    token_type: String, // always "access"
}

/// Create an access token for a caller, valid for `hours`
pub fn create_access_token(secret: &str, caller_id: &str, hours: i64) -> anyhow::Result<String> {
    if caller_id.is_empty() {
        anyhow::bail!("Caller id cannot be empty");
    }
    if caller_id.contains('/') {
        anyhow::bail!("Caller id cannot contain '/'");
    }

    let now = Utc::now();
    let exp = now + Duration::hours(hours);

    let claims = Claims {
        sub: caller_id.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
        token_type: "access".to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify an access token and extract the caller ID
///
/// The caller id becomes a path segment, so ids containing `/` are refused.
pub fn verify_token(secret: &str, token: &str) -> anyhow::Result<String> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    if token_data.claims.token_type != "access" {
        anyhow::bail!("Not an access token");
    }

    let caller_id = token_data.claims.sub;
    if caller_id.is_empty() || caller_id.contains('/') {
        anyhow::bail!("Token subject is not a valid caller id");
    }

    Ok(caller_id)
}
