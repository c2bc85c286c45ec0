use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, TokenData, Validation};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};

const SUBJECT: &str = "admin";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Snafu, Serialize)]
#[serde(tag = "error")]
#[snafu(visibility(pub(crate)))]
pub enum AuthError {
    #[snafu(display("password is required"))]
    MissingPassword,

    #[snafu(display("request body is malformed"))]
    MalformedBody {
        #[serde(skip)]
        source: JsonRejection,
    },

    #[snafu(display("invalid password"))]
    WrongPassword,

    #[snafu(display("admin access is not configured"))]
    NotConfigured,

    #[snafu(display("failed to issue a session token"))]
    Encode {
        #[serde(skip)]
        source: jsonwebtoken::errors::Error,
        #[serde(skip)]
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("request is not authenticated"))]
    ExtractToken {
        #[serde(skip)]
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("session token is invalid or expired"))]
    Decode {
        #[serde(skip)]
        source: jsonwebtoken::errors::Error,
        #[serde(skip)]
        #[snafu(implicit)]
        location: Location,
    },
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingPassword | AuthError::MalformedBody { .. } => StatusCode::BAD_REQUEST,
            AuthError::WrongPassword | AuthError::ExtractToken { .. } | AuthError::Decode { .. } => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::NotConfigured | AuthError::Encode { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for AuthError {
    fn from(source: JsonRejection) -> Self {
        AuthError::MalformedBody { source }
    }
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    success: bool,
    authenticated: bool,
    message: String,
    #[serde(flatten)]
    data: AuthError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("admin authentication failed: {self:?}");
        }

        let content = AuthResponse {
            success: false,
            authenticated: false,
            message: self.to_string(),
            data: self,
        };

        (status, Json(content)).into_response()
    }
}

#[derive(Clone)]
pub struct Sessions {
    secret: SecretString,
    ttl: Duration,
    validation: Validation,
}

impl Sessions {
    pub fn new(secret: SecretString, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.sub = Some(SUBJECT.to_string());

        Self {
            secret,
            ttl,
            validation,
        }
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.expose_secret().as_ref())
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.expose_secret().as_ref())
    }

    fn claims(&self, issued_at: DateTime<Utc>) -> SessionClaims {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(12));

        SessionClaims {
            sub: SUBJECT.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }

    pub fn encode(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        let header = jsonwebtoken::Header::new(Algorithm::HS256);
        jsonwebtoken::encode(&header, claims, &self.encoding_key()).context(EncodeSnafu)
    }

    pub fn decode(&self, token: &str) -> Result<TokenData<SessionClaims>, AuthError> {
        jsonwebtoken::decode(token, &self.decoding_key(), &self.validation).context(DecodeSnafu)
    }

    pub fn issue(&self) -> Result<String, AuthError> {
        self.encode(&self.claims(Utc::now()))
    }
}

impl std::fmt::Debug for Sessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sessions")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Checks the admin password and hands out session tokens.
///
/// The password is compared through its SHA-256 digest, the configured value
/// is the lowercase hex digest. Session tokens are only issued when a signing
/// secret is configured.
#[derive(Debug, Clone)]
pub struct Authenticator {
    password_hash: Option<String>,
    sessions: Option<Sessions>,
}

impl Authenticator {
    pub fn new(password_hash: Option<&str>, sessions: Option<Sessions>) -> Self {
        let password_hash = password_hash
            .map(|hash| hash.trim().to_ascii_lowercase())
            .filter(|hash| !hash.is_empty());

        Self {
            password_hash,
            sessions,
        }
    }

    /// Returns a session token when sessions are enabled.
    #[tracing::instrument(skip_all)]
    pub fn authenticate(&self, password: &str) -> Result<Option<String>, AuthError> {
        if password.is_empty() {
            return MissingPasswordSnafu.fail();
        }

        let expected = self.password_hash.as_deref().context(NotConfiguredSnafu)?;
        if !constant_time_eq(&digest(password), expected) {
            tracing::warn!("rejected admin password");
            return WrongPasswordSnafu.fail();
        }

        self.sessions.as_ref().map(Sessions::issue).transpose()
    }

    /// Verifies the `Authorization: Bearer` token of a request.
    pub fn verify(&self, headers: &HeaderMap) -> Result<TokenData<SessionClaims>, AuthError> {
        let sessions = self.sessions.as_ref().context(ExtractTokenSnafu)?;

        let header = headers
            .get(header::AUTHORIZATION)
            .context(ExtractTokenSnafu)?;

        let token = header.to_str().ok().context(ExtractTokenSnafu)?;
        let token = token.strip_prefix("Bearer ").context(ExtractTokenSnafu)?;

        sessions.decode(token.trim())
    }
}

/// Lowercase hex SHA-256 digest, the format `ADMIN_PASSWORD_HASH` is configured in.
pub fn digest(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |diff, (lhs, rhs)| diff | (lhs ^ rhs))
        == 0
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn sessions() -> Sessions {
        Sessions::new(
            SecretString::from("signing-secret".to_owned()),
            Duration::from_secs(12 * 60 * 60),
        )
    }

    fn authenticator() -> Authenticator {
        Authenticator::new(Some(&digest("hunter2")), Some(sessions()))
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {token}")).unwrap();
        headers.insert(header::AUTHORIZATION, value);
        headers
    }

    #[test]
    fn digest_is_lowercase_hex() {
        assert_eq!(
            digest("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
    }

    #[test]
    fn correct_password_issues_a_verifiable_token() {
        let auth = authenticator();

        let token = auth.authenticate("hunter2").unwrap().expect("sessions are enabled");
        let data = auth.verify(&bearer(&token)).unwrap();
        assert_eq!(data.claims.sub, "admin");
        assert!(data.claims.exp > data.claims.iat);
    }

    #[test]
    fn configured_hash_is_case_insensitive() {
        let upper = digest("hunter2").to_uppercase();
        let auth = Authenticator::new(Some(&upper), None);

        assert_eq!(auth.authenticate("hunter2").unwrap(), None, "no sessions, no token");
    }

    #[test]
    fn wrong_and_missing_passwords() {
        let auth = authenticator();

        let wrong = auth.authenticate("hunter3").unwrap_err();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let missing = auth.authenticate("").unwrap_err();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let unconfigured = Authenticator::new(None, None).authenticate("hunter2").unwrap_err();
        assert_eq!(unconfigured.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let auth = authenticator();
        let sessions = sessions();

        let stale = sessions.claims(Utc::now() - chrono::Duration::hours(13));
        let token = sessions.encode(&stale).unwrap();
        assert!(matches!(auth.verify(&bearer(&token)), Err(AuthError::Decode { .. })));

        let other = Sessions::new(SecretString::from("other".to_owned()), Duration::from_secs(60));
        let token = other.issue().unwrap();
        assert!(matches!(auth.verify(&bearer(&token)), Err(AuthError::Decode { .. })));

        assert!(matches!(
            auth.verify(&HeaderMap::new()),
            Err(AuthError::ExtractToken { .. })
        ));
    }
}
