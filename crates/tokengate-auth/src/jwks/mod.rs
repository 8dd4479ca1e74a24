//! Client public key resolution for `private_key_jwt`.
//!
//! The authenticator depends on the [`KeyResolver`] capability only, so it
//! can be driven by fixed key sets in tests. [`ClientJwksCache`] is the
//! production resolver: inline key sets are searched directly, remote ones
//! are fetched over HTTPS and cached.

mod cache;

pub use cache::ClientJwksCache;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use serde::Deserialize;

use crate::oauth::algorithm::SigningAlgorithm;
use crate::oauth::signature::jwk_supports;

/// Where a client's public keys come from.
#[derive(Debug, Clone)]
pub enum JwksSource {
    /// Remote key set at `jwks_uri`.
    Uri(String),
    /// Key set embedded in the registration.
    Inline(JwkSet),
}

/// JWKS resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    /// The JWKS URI is not HTTPS and plain HTTP is not allowed.
    #[error("JWKS URI must use HTTPS: {0}")]
    InsecureUri(String),

    /// The HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// The request failed.
    #[error("Failed to fetch JWKS: {0}")]
    Fetch(String),

    /// The server answered with a non-success status.
    #[error("JWKS fetch failed with status: {0}")]
    Status(u16),

    /// The response exceeded the size limit.
    #[error("JWKS response exceeds maximum size of {limit} bytes")]
    TooLarge {
        /// Configured limit.
        limit: usize,
    },

    /// The response is not a JWK set.
    #[error("Invalid JWKS JSON: {0}")]
    InvalidJson(String),

    /// No key matches the requested `kid` and algorithm.
    #[error("No suitable key found in JWKS{}", kid_suffix(.kid))]
    KeyNotFound {
        /// Requested key ID.
        kid: Option<String>,
    },
}

fn kid_suffix(kid: &Option<String>) -> String {
    kid.as_ref()
        .map(|k| format!(" for kid '{}'", k))
        .unwrap_or_default()
}

/// Resolves the public key that verifies a client assertion.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Returns the key from `source` matching `kid` that can verify `alg`.
    ///
    /// Without a `kid`, the first compatible key is returned.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if no key matches, or a fetch error if the key
    /// set could not be retrieved.
    async fn resolve_key(
        &self,
        source: &JwksSource,
        kid: Option<&str>,
        alg: SigningAlgorithm,
    ) -> Result<Jwk, JwksError>;
}

/// Finds a signing key in a set by kid and algorithm.
///
/// A key qualifies when its `kid` matches (if one is requested), its `use`
/// is `sig` or absent, and its type fits the algorithm.
#[must_use]
pub fn select_key<'a>(jwks: &'a JwkSet, kid: Option<&str>, alg: SigningAlgorithm) -> Option<&'a Jwk> {
    jwks.keys.iter().find(|key| {
        if let Some(expected_kid) = kid
            && key.common.key_id.as_deref() != Some(expected_kid)
        {
            return false;
        }

        if let Some(use_) = &key.common.public_key_use
            && *use_ != PublicKeyUse::Signature
        {
            return false;
        }

        jwk_supports(key, alg)
    })
}

#[derive(Deserialize)]
struct RawJwkSet {
    keys: Vec<serde_json::Value>,
}

/// Parses a JWK set, skipping keys this library cannot represent.
///
/// A single unsupported key (an unknown `kty` or `alg`) must not make the
/// client's other keys unusable.
///
/// # Errors
///
/// Returns `InvalidJson` if the document is not an object with a `keys` array.
pub fn parse_jwk_set(bytes: &[u8]) -> Result<JwkSet, JwksError> {
    let raw: RawJwkSet =
        serde_json::from_slice(bytes).map_err(|e| JwksError::InvalidJson(e.to_string()))?;

    Ok(jwk_set_from_values(raw.keys))
}

/// Deserializes an optional inline key set with the same rules as
/// [`parse_jwk_set`].
pub(crate) fn deserialize_jwk_set<'de, D>(deserializer: D) -> Result<Option<JwkSet>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<RawJwkSet>::deserialize(deserializer)?.map(|raw| jwk_set_from_values(raw.keys)))
}

fn jwk_set_from_values(values: Vec<serde_json::Value>) -> JwkSet {
    JwkSet {
        keys: values.into_iter().filter_map(parse_jwk).collect(),
    }
}

fn parse_jwk(mut value: serde_json::Value) -> Option<Jwk> {
    // jsonwebtoken has no ES512 key algorithm. A P-521 key verifies ES512
    // only, so the member is dropped once the curve is checked.
    let declares_es512 =
        value.get("alg").and_then(serde_json::Value::as_str) == Some(SigningAlgorithm::ES512.as_str());
    if declares_es512 {
        if value.get("crv").and_then(serde_json::Value::as_str) != Some("P-521") {
            tracing::debug!(kid = ?value.get("kid"), "Skipping ES512 JWK that is not on P-521");
            return None;
        }
        if let Some(members) = value.as_object_mut() {
            members.remove("alg");
        }
    }

    match serde_json::from_value::<Jwk>(value) {
        Ok(key) if key.common.key_algorithm == Some(KeyAlgorithm::UNKNOWN_ALGORITHM) => {
            tracing::debug!(kid = ?key.common.key_id, "Skipping JWK with unsupported alg");
            None
        }
        Ok(key) => Some(key),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unsupported JWK");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::KeyFixture;
    use serde_json::json;

    #[test]
    fn test_select_key_by_kid() {
        let a = KeyFixture::p256();
        let b = KeyFixture::p256();
        let jwks = JwkSet {
            keys: vec![a.public_jwk_with_kid("a"), b.public_jwk_with_kid("b")],
        };

        let key = select_key(&jwks, Some("b"), SigningAlgorithm::ES256).unwrap();
        assert_eq!(key.common.key_id.as_deref(), Some("b"));
        assert!(select_key(&jwks, Some("c"), SigningAlgorithm::ES256).is_none());
    }

    #[test]
    fn test_select_first_compatible_without_kid() {
        let ec = KeyFixture::p384();
        let rsa = KeyFixture::rsa();
        let jwks = JwkSet {
            keys: vec![ec.public_jwk_with_kid("ec"), rsa.public_jwk_with_kid("rsa")],
        };

        let key = select_key(&jwks, None, SigningAlgorithm::PS256).unwrap();
        assert_eq!(key.common.key_id.as_deref(), Some("rsa"));

        let key = select_key(&jwks, None, SigningAlgorithm::ES384).unwrap();
        assert_eq!(key.common.key_id.as_deref(), Some("ec"));

        // No P-256 key in the set
        assert!(select_key(&jwks, None, SigningAlgorithm::ES256).is_none());
    }

    #[test]
    fn test_select_skips_encryption_keys_and_other_algorithms() {
        let rsa = KeyFixture::rsa();
        let mut enc: serde_json::Value = serde_json::from_str(&rsa.public_jwk_json()).unwrap();
        enc["use"] = json!("enc");
        let mut rs512: serde_json::Value = serde_json::from_str(&rsa.public_jwk_json()).unwrap();
        rs512["alg"] = json!("RS512");

        let jwks = JwkSet {
            keys: vec![
                serde_json::from_value(enc).unwrap(),
                serde_json::from_value(rs512).unwrap(),
            ],
        };

        assert!(select_key(&jwks, None, SigningAlgorithm::RS256).is_none());
        assert!(select_key(&jwks, None, SigningAlgorithm::RS512).is_some());
    }

    #[test]
    fn test_parse_jwk_set_skips_unsupported_keys() {
        let rsa = KeyFixture::rsa();
        let doc = format!(
            r#"{{"keys":[{{"kty":"UNKNOWN","x":"y"}},{}]}}"#,
            rsa.public_jwk_json()
        );
        let jwks = parse_jwk_set(doc.as_bytes()).unwrap();
        assert_eq!(jwks.keys.len(), 1);

        assert!(matches!(
            parse_jwk_set(b"[]"),
            Err(JwksError::InvalidJson(_))
        ));
    }

    fn asymmetric_algorithms() -> impl Iterator<Item = SigningAlgorithm> {
        SigningAlgorithm::ALL
            .iter()
            .copied()
            .filter(|alg| !alg.is_symmetric())
    }

    #[test]
    fn test_declared_alg_selects_key_for_every_asymmetric_algorithm() {
        for alg in asymmetric_algorithms() {
            let fixture = KeyFixture::for_algorithm(alg);
            let doc = json!({ "keys": [fixture.public_jwk_value("k", alg)] }).to_string();
            let jwks = parse_jwk_set(doc.as_bytes()).unwrap();

            assert_eq!(jwks.keys.len(), 1, "{alg} key dropped");
            assert!(select_key(&jwks, Some("k"), alg).is_some(), "{alg} not selected");

            for other in asymmetric_algorithms().filter(|other| *other != alg) {
                assert!(
                    select_key(&jwks, Some("k"), other).is_none(),
                    "key declared {alg} selected for {other}"
                );
            }
        }
    }

    #[test]
    fn test_declared_es512_requires_p521() {
        let p256 = KeyFixture::p256();
        let p521 = KeyFixture::p521();
        let doc = json!({
            "keys": [
                p256.public_jwk_value("wrong-curve", SigningAlgorithm::ES512),
                p521.public_jwk_value("p521", SigningAlgorithm::ES512),
            ]
        })
        .to_string();

        let jwks = parse_jwk_set(doc.as_bytes()).unwrap();
        assert_eq!(jwks.keys.len(), 1);
        assert!(select_key(&jwks, Some("wrong-curve"), SigningAlgorithm::ES256).is_none());
        assert!(select_key(&jwks, Some("p521"), SigningAlgorithm::ES512).is_some());
    }

    #[test]
    fn test_unsupported_declared_alg_is_skipped() {
        let mut value = KeyFixture::p256().public_jwk_value("k", SigningAlgorithm::ES256);
        value["alg"] = json!("ES256K");
        let doc = json!({ "keys": [value] }).to_string();

        let jwks = parse_jwk_set(doc.as_bytes()).unwrap();
        assert!(jwks.keys.is_empty());
    }

    #[test]
    fn test_key_not_found_message() {
        let err = JwksError::KeyNotFound {
            kid: Some("k1".to_string()),
        };
        assert_eq!(err.to_string(), "No suitable key found in JWKS for kid 'k1'");
        let err = JwksError::KeyNotFound { kid: None };
        assert_eq!(err.to_string(), "No suitable key found in JWKS");
    }
}
