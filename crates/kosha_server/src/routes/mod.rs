//! I define the http route handlers.
//!

pub mod accounts;
pub mod containers;
pub mod health;
pub mod resources;

use axum::http::{header, HeaderMap};
use kosha_space::OpaqueId;
use mime::Mime;
use sha2::{Digest, Sha256};

use crate::error::ApiError;

/// Resolve an external resource identifier into an internal
/// id.
///
/// Canonically-encoded ids pass through; any other
/// url-safe name (as clients may choose on `PUT`) maps onto a
/// deterministic digest-derived id, so repeated requests for
/// the same name address the same resource.
pub(crate) fn resolve_id(raw: &str) -> Result<OpaqueId, ApiError> {
    if let Ok(id) = raw.parse() {
        return Ok(id);
    }

    let is_url_safe = raw
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~'));
    if raw.is_empty() || raw.len() > 128 || !is_url_safe {
        return Err(ApiError::invalid_argument(format!(
            "Invalid resource id: {raw}"
        )));
    }

    let digest = Sha256::digest(raw.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    Ok(OpaqueId::from_raw(bytes))
}

/// Extract the required `Content-Type` header.
pub(crate) fn require_content_type(headers: &HeaderMap) -> Result<Mime, ApiError> {
    let raw = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(ApiError::missing_content_type)?;
    raw.parse()
        .map_err(|_| ApiError::invalid_argument(format!("Invalid content type: {raw}")))
}

/// Extract the `Accept` header, if present.
pub(crate) fn accept_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
}

/// Extract the `Slug` naming hint, if present.
pub(crate) fn slug_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("slug")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_owned())
}

#[cfg(test)]
mod tests {
    use claims::{assert_err, assert_ok, assert_ok_eq};

    use super::*;

    #[test]
    fn canonical_ids_pass_through() {
        let id = OpaqueId::generate();
        assert_ok_eq!(resolve_id(&id.to_string()), id);
    }

    #[test]
    fn client_names_map_deterministically() {
        let a = assert_ok!(resolve_id("test-update"));
        let b = assert_ok!(resolve_id("test-update"));
        let c = assert_ok!(resolve_id("test-update-2"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn unsafe_names_are_rejected() {
        assert_err!(resolve_id(""));
        assert_err!(resolve_id("has space"));
        assert_err!(resolve_id("slash/inside"));
        assert_err!(resolve_id(&"x".repeat(200)));
    }
}
