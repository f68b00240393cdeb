use crate::config::Config;
use crate::error::AppResult;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const ACCESS_TOKEN_TYPE: &str = "access";

/// Tokens are issued by the collection service; `sub` carries the owner id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

pub fn create_access_token(owner_id: &str, config: &Config) -> AppResult<String> {
    let expiration = Utc::now() + Duration::minutes(config.security.access_token_expire_minutes);

    let claims = Claims {
        sub: owner_id.to_string(),
        exp: expiration.timestamp(),
        token_type: ACCESS_TOKEN_TYPE.to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.security.secret_key.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_access_token(token: &str, config: &Config) -> Option<Claims> {
    let validation = Validation::default();

    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.security.secret_key.as_bytes()),
        &validation,
    ) {
        Ok(data) if data.claims.token_type == ACCESS_TOKEN_TYPE && !data.claims.sub.is_empty() => {
            Some(data.claims)
        }
        _ => None,
    }
}
