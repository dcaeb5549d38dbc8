use warp::{reject::Rejection, Filter};

use crate::{
    constants::{SESSION_HEADER, SESSION_SCHEMES},
    error::HtmlError,
};

use super::jwt::{verify_jwt_session, SessionData, SessionKeys};

/// Extracts the token from `Token <t>` / `Bearer <t>`.
pub fn parse_authorization(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty()
        || !SESSION_SCHEMES
            .iter()
            .any(|known| known.eq_ignore_ascii_case(scheme))
    {
        return None;
    }
    Some(token)
}

/// Rejects with 401 unless the request carries a valid session token.
pub fn with_session(
    keys: SessionKeys,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>(SESSION_HEADER).and_then(move |header: Option<String>| {
        let keys = keys.clone();
        async move {
            let header = header.ok_or_else(|| Rejection::from(HtmlError::Unauthorized.default()))?;
            let token = parse_authorization(&header).ok_or_else(|| {
                Rejection::from(HtmlError::InvalidSession.new("Invalid authorization header"))
            })?;

            verify_jwt_session(token, &keys)
                .map(SessionData::from)
                .map_err(Rejection::from)
        }
    })
}

/// Anonymous callers (and callers with unusable tokens) pass through as `None`.
pub fn with_possible_session(
    keys: SessionKeys,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>(SESSION_HEADER).map(move |header: Option<String>| {
        header
            .as_deref()
            .and_then(parse_authorization)
            .and_then(|token| verify_jwt_session(token, &keys).ok())
            .map(SessionData::from)
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        jwt::generate_jwt_session,
        schema::{User, UserRole},
    };

    fn keys() -> SessionKeys {
        SessionKeys::new("middleware-secret", Duration::hours(1)).unwrap()
    }

    fn token() -> String {
        let user = User {
            id: 3,
            email: String::from("reader@example.com"),
            username: String::from("reader"),
            first_name: String::from("Read"),
            last_name: String::from("Er"),
            password: String::new(),
            role: UserRole::User,
        };
        generate_jwt_session(&user, &keys()).unwrap()
    }

    #[test]
    fn parses_known_schemes() {
        assert_eq!(parse_authorization("Token abc"), Some("abc"));
        assert_eq!(parse_authorization("bearer abc"), Some("abc"));
        assert_eq!(parse_authorization("Basic abc"), None);
        assert_eq!(parse_authorization("Token "), None);
        assert_eq!(parse_authorization("abc"), None);
    }

    #[tokio::test]
    async fn session_is_extracted_from_header() {
        let session = warp::test::request()
            .header("authorization", format!("Token {}", token()))
            .filter(&with_session(keys()))
            .await
            .unwrap();

        assert_eq!(session.user_id, 3);
        assert!(!session.is_admin);
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let result = warp::test::request().filter(&with_session(keys())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn anonymous_requests_pass_possible_session() {
        let session = warp::test::request()
            .filter(&with_possible_session(keys()))
            .await
            .unwrap();
        assert!(session.is_none());

        let session = warp::test::request()
            .header("authorization", format!("Bearer {}", token()))
            .filter(&with_possible_session(keys()))
            .await
            .unwrap();
        assert_eq!(session.map(|s| s.username), Some(String::from("reader")));
    }
}
