use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::config::Config;
use crate::error::{Error, HtmlError};
use crate::schema::{Id, User, UserRole};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, username: String, role: UserRole, ttl: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + ttl).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Utc::now().timestamp()).is_negative()
    }
}

/// Authenticated caller of an action.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            log::warn!("{} was denied {:?}", self.username, action);
            return Err(HtmlError::Forbidden.default());
        }
        Ok(())
    }

    /// Owners may act on their own objects; everyone else needs `manage_all`.
    pub fn authenticate_owner(
        &self,
        owner_id: Id,
        manage_own: ActionType,
        manage_all: ActionType,
    ) -> Result<(), Error> {
        if owner_id == self.user_id {
            return self.authenticate(manage_own);
        }
        self.authenticate(manage_all)
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

/// Signing material derived from the configured secret.
#[derive(Clone)]
pub struct SessionKeys {
    key: Hmac<Sha256>,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, Error> {
        let key = Hmac::new_from_slice(secret.as_bytes())
            .map_err(|_| HtmlError::InternalServerError.new("Invalid session secret"))?;

        Ok(Self { key, ttl })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Self::new(&config.jwt_secret, Duration::hours(config.session_ttl_hours))
    }
}

pub fn generate_jwt_session(user: &User, keys: &SessionKeys) -> Result<String, Error> {
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role, keys.ttl);

    claims
        .sign_with_key(&keys.key)
        .map_err(|_| HtmlError::InternalServerError.new("Failed to sign session"))
}

pub fn verify_jwt_session(token: &str, keys: &SessionKeys) -> Result<JwtSessionData, Error> {
    let session: JwtSessionData = token
        .verify_with_key(&keys.key)
        .map_err(|_| HtmlError::InvalidSession.new("Invalid Session; Invalid token"))?;

    if session.is_expired() {
        return Err(HtmlError::InvalidSession.new("Invalid session; Token expired"));
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 4,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Jane"),
            last_name: String::from("Doe"),
            password: String::new(),
            role,
        }
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let keys = SessionKeys::new("secret", Duration::hours(1)).unwrap();
        let token = generate_jwt_session(&user(UserRole::Admin), &keys).unwrap();

        let session: SessionData = verify_jwt_session(&token, &keys).unwrap().into();
        assert_eq!(session.user_id, 4);
        assert_eq!(session.username, "cook");
        assert!(session.is_admin);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let keys = SessionKeys::new("secret", Duration::hours(1)).unwrap();
        let other = SessionKeys::new("another", Duration::hours(1)).unwrap();
        let token = generate_jwt_session(&user(UserRole::User), &other).unwrap();

        assert_eq!(verify_jwt_session(&token, &keys).unwrap_err().code, 401);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = SessionKeys::new("secret", Duration::hours(-1)).unwrap();
        let token = generate_jwt_session(&user(UserRole::User), &keys).unwrap();

        let error = verify_jwt_session(&token, &keys).unwrap_err();
        assert_eq!(error.info.as_deref(), Some("Invalid session; Token expired"));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let keys = SessionKeys::new("secret", Duration::hours(1)).unwrap();
        assert!(verify_jwt_session("not.a.token", &keys).is_err());
    }
}
