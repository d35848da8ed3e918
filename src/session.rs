//! Owner session check.
//!
//! Sessions are issued elsewhere; this module only reads them. A session is a
//! `session` cookie holding `<owner_id>:<signature>`, where the signature is an
//! HMAC-SHA256 of the owner id under the configured secret.

use crate::albums::Album;
use axum::http::HeaderMap;
use base64::{Engine, engine::general_purpose};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No valid owner session")]
    MissingSession,

    #[error("Session owner does not own album {0}")]
    NotOwner(String),
}

#[derive(Clone)]
pub struct SessionReader {
    secret: Option<String>,
}

impl SessionReader {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    pub fn is_enforced(&self) -> bool {
        self.secret.is_some()
    }

    /// Owner id carried by a correctly signed session cookie, if any.
    pub fn current_owner(&self, headers: &HeaderMap) -> Option<String> {
        let secret = self.secret.as_deref()?;
        let signed_value = get_cookie_value(headers, SESSION_COOKIE)?;
        verify_signed_cookie(secret, &signed_value)
    }

    /// Passes when sessions are not enforced or the session belongs to the
    /// album's owner.
    pub fn authorize(&self, headers: &HeaderMap, album: &Album) -> Result<(), SessionError> {
        if !self.is_enforced() {
            return Ok(());
        }

        let owner = self
            .current_owner(headers)
            .ok_or(SessionError::MissingSession)?;
        if owner != album.owner_id {
            tracing::warn!(album_id = %album.id, "Session owner does not match album owner");
            return Err(SessionError::NotOwner(album.id.clone()));
        }
        Ok(())
    }
}

pub fn create_signed_cookie(secret: &str, value: &str) -> Result<String, String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "Invalid secret key")?;
    mac.update(value.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{}:{}", value, signature_b64))
}

/// Returns the signed value when the signature checks out.
pub fn verify_signed_cookie(secret: &str, signed_value: &str) -> Option<String> {
    let (value, signature_b64) = signed_value.rsplit_once(':')?;
    let signature = general_purpose::URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(value.as_bytes());
    mac.verify_slice(&signature).ok()?;
    Some(value.to_string())
}

pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all("cookie")
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_signed_cookie_roundtrip() {
        let signed = create_signed_cookie("secret", "owner-1").unwrap();
        assert_eq!(
            verify_signed_cookie("secret", &signed).as_deref(),
            Some("owner-1")
        );
        assert_eq!(verify_signed_cookie("other-secret", &signed), None);
        assert_eq!(verify_signed_cookie("secret", "owner-1:forged"), None);
        assert_eq!(verify_signed_cookie("secret", "owner-1"), None);
    }

    #[test]
    fn test_cookie_lookup() {
        let headers = headers_with_cookie("theme=dark; session=abc:def ; other=1");
        assert_eq!(
            get_cookie_value(&headers, "session").as_deref(),
            Some("abc:def")
        );
        assert_eq!(get_cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_authorize_without_secret_is_open() {
        let reader = SessionReader::new(None);
        let album = Album::new("a", "A", "owner-1");
        assert!(reader.authorize(&HeaderMap::new(), &album).is_ok());
    }

    #[test]
    fn test_authorize_checks_owner() {
        let reader = SessionReader::new(Some("secret".to_string()));
        let album = Album::new("a", "A", "owner-1");

        assert!(matches!(
            reader.authorize(&HeaderMap::new(), &album),
            Err(SessionError::MissingSession)
        ));

        let owner_cookie = format!(
            "session={}",
            create_signed_cookie("secret", "owner-1").unwrap()
        );
        assert!(
            reader
                .authorize(&headers_with_cookie(&owner_cookie), &album)
                .is_ok()
        );

        let stranger_cookie = format!(
            "session={}",
            create_signed_cookie("secret", "owner-2").unwrap()
        );
        assert!(matches!(
            reader.authorize(&headers_with_cookie(&stranger_cookie), &album),
            Err(SessionError::NotOwner(_))
        ));
    }
}
