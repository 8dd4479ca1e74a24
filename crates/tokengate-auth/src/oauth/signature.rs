//! Signature and MAC verification for compact JWS tokens.
//!
//! The caller always states the algorithm it expects. The token's own `alg`
//! header is only compared against that expectation and never used to pick a
//! key type, so an RSA public key can not be turned into an HMAC secret and
//! `alg: none` is never accepted.
//!
//! HS*, RS*, PS*, ES256 and ES384 are verified with `jsonwebtoken`. ES512 is
//! verified with `p521` directly.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, EllipticCurveKeyParameters, Jwk};
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;

use crate::oauth::algorithm::SigningAlgorithm;

/// P-521 coordinate length in bytes.
const P521_COORDINATE_LEN: usize = 66;

/// Key material used to verify a token.
#[derive(Debug, Clone)]
pub enum VerificationKey {
    /// Shared secret for the HMAC algorithms.
    Secret(Vec<u8>),
    /// Public key for the RSA and ECDSA algorithms.
    Jwk(Box<Jwk>),
}

impl VerificationKey {
    /// Creates a secret key from a client secret.
    #[must_use]
    pub fn secret(secret: impl AsRef<[u8]>) -> Self {
        Self::Secret(secret.as_ref().to_vec())
    }

    /// Creates a public key from a JWK.
    #[must_use]
    pub fn jwk(jwk: Jwk) -> Self {
        Self::Jwk(Box::new(jwk))
    }
}

/// JOSE header fields relevant to verification.
#[derive(Debug, Clone, Deserialize)]
pub struct JoseHeader {
    /// Declared algorithm.
    pub alg: String,
    /// Key ID.
    #[serde(default)]
    pub kid: Option<String>,
}

/// Reasons a token fails verification.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The token is not a three-part compact JWS.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// The header `alg` differs from the expected algorithm.
    #[error("Algorithm mismatch: expected {expected}, token declares {declared}")]
    AlgorithmMismatch {
        /// Algorithm the caller expected.
        expected: SigningAlgorithm,
        /// Algorithm in the token header.
        declared: String,
    },

    /// The key type cannot be used with the expected algorithm.
    #[error("Key is not usable with {0}")]
    KeyMismatch(SigningAlgorithm),

    /// The key material is invalid.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The signature does not verify.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The JWT library rejected the token for another reason.
    #[error("Token rejected: {0}")]
    Rejected(String),
}

/// Decodes the JOSE header of a compact JWS without verifying anything.
///
/// # Errors
///
/// Returns `VerificationError::Malformed` if the token does not have three
/// parts or the header is not base64url-encoded JSON.
pub fn decode_header(token: &str) -> Result<JoseHeader, VerificationError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(VerificationError::Malformed(
            "expected three dot-separated parts".to_string(),
        ));
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(parts[0])
        .map_err(|e| VerificationError::Malformed(format!("header encoding: {}", e)))?;

    serde_json::from_slice(&header_bytes)
        .map_err(|e| VerificationError::Malformed(format!("header JSON: {}", e)))
}

/// Signature/MAC verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Creates a new verifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns `true` if `token` carries a valid signature made with
    /// `expected` under `key`.
    #[must_use]
    pub fn verify(&self, expected: SigningAlgorithm, token: &str, key: &VerificationKey) -> bool {
        self.verify_detailed(expected, token, key).is_ok()
    }

    /// Verifies `token` and reports why verification failed.
    ///
    /// Only the signature is checked; claims are left to the caller.
    ///
    /// # Errors
    ///
    /// Returns a `VerificationError` describing the first failed check.
    pub fn verify_detailed(
        &self,
        expected: SigningAlgorithm,
        token: &str,
        key: &VerificationKey,
    ) -> Result<(), VerificationError> {
        let header = decode_header(token)?;
        if header.alg != expected.as_str() {
            return Err(VerificationError::AlgorithmMismatch {
                expected,
                declared: header.alg,
            });
        }

        check_key_compatibility(expected, key)?;

        match expected.to_jsonwebtoken() {
            Some(algorithm) => verify_with_jsonwebtoken(algorithm, token, key),
            None => verify_es512(token, key),
        }
    }
}

/// Ensures the key type belongs to the algorithm's family.
fn check_key_compatibility(
    expected: SigningAlgorithm,
    key: &VerificationKey,
) -> Result<(), VerificationError> {
    let compatible = match key {
        VerificationKey::Secret(secret) => expected.is_symmetric() && !secret.is_empty(),
        VerificationKey::Jwk(jwk) => jwk_supports(jwk, expected),
    };

    if compatible {
        Ok(())
    } else {
        Err(VerificationError::KeyMismatch(expected))
    }
}

/// Returns `true` if the JWK can verify signatures made with `alg`.
///
/// The key type (and curve, for EC keys) must fit the algorithm, and an
/// `alg` declared on the key must equal it.
pub(crate) fn jwk_supports(jwk: &Jwk, alg: SigningAlgorithm) -> bool {
    if let Some(declared) = &jwk.common.key_algorithm
        && declared.to_string() != alg.as_str()
    {
        return false;
    }

    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => alg.is_rsa(),
        AlgorithmParameters::EllipticCurve(params) => {
            alg.is_ecdsa() && curve_name(&params.curve) == alg.ec_curve()
        }
        _ => false,
    }
}

fn curve_name(curve: &EllipticCurve) -> Option<&'static str> {
    match curve {
        EllipticCurve::P256 => Some("P-256"),
        EllipticCurve::P384 => Some("P-384"),
        EllipticCurve::P521 => Some("P-521"),
        _ => None,
    }
}

fn verify_with_jsonwebtoken(
    algorithm: jsonwebtoken::Algorithm,
    token: &str,
    key: &VerificationKey,
) -> Result<(), VerificationError> {
    let decoding_key = match key {
        VerificationKey::Secret(secret) => DecodingKey::from_secret(secret),
        VerificationKey::Jwk(jwk) => DecodingKey::from_jwk(jwk)
            .map_err(|e| VerificationError::InvalidKey(e.to_string()))?,
    };

    // Signature only; registered claims are checked by the assertion validator.
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<serde_json::Value>(token, &decoding_key, &validation)
        .map(|_| ())
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                VerificationError::InvalidSignature
            }
            _ => VerificationError::Rejected(e.to_string()),
        })
}

fn verify_es512(token: &str, key: &VerificationKey) -> Result<(), VerificationError> {
    use p521::ecdsa::signature::Verifier;
    use p521::ecdsa::{Signature, VerifyingKey};

    let VerificationKey::Jwk(jwk) = key else {
        return Err(VerificationError::KeyMismatch(SigningAlgorithm::ES512));
    };
    let AlgorithmParameters::EllipticCurve(params) = &jwk.algorithm else {
        return Err(VerificationError::KeyMismatch(SigningAlgorithm::ES512));
    };

    let (signing_input, signature_b64) = token
        .rsplit_once('.')
        .ok_or_else(|| VerificationError::Malformed("missing signature".to_string()))?;

    let signature_bytes = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|e| VerificationError::Malformed(format!("signature encoding: {}", e)))?;
    let signature =
        Signature::from_slice(&signature_bytes).map_err(|_| VerificationError::InvalidSignature)?;

    let verifying_key = VerifyingKey::from_sec1_bytes(&p521_sec1_point(params)?)
        .map_err(|e| VerificationError::InvalidKey(e.to_string()))?;

    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| VerificationError::InvalidSignature)
}

/// Builds the uncompressed SEC1 encoding `0x04 || x || y` of a P-521 JWK.
fn p521_sec1_point(params: &EllipticCurveKeyParameters) -> Result<Vec<u8>, VerificationError> {
    let x = decode_coordinate(&params.x)?;
    let y = decode_coordinate(&params.y)?;

    let mut point = Vec::with_capacity(1 + 2 * P521_COORDINATE_LEN);
    point.push(0x04);
    point.extend_from_slice(&x);
    point.extend_from_slice(&y);
    Ok(point)
}

fn decode_coordinate(value: &str) -> Result<Vec<u8>, VerificationError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| VerificationError::InvalidKey(format!("coordinate encoding: {}", e)))?;

    if bytes.len() > P521_COORDINATE_LEN {
        return Err(VerificationError::InvalidKey(format!(
            "P-521 coordinate is {} bytes",
            bytes.len()
        )));
    }

    // Left-pad coordinates serialized without leading zeros.
    let mut padded = vec![0u8; P521_COORDINATE_LEN - bytes.len()];
    padded.extend_from_slice(&bytes);
    Ok(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{KeyFixture, hmac_token, sample_claims, sign_token};

    #[test]
    fn test_hmac_round_trip() {
        let verifier = SignatureVerifier::new();
        for alg in [
            SigningAlgorithm::HS256,
            SigningAlgorithm::HS384,
            SigningAlgorithm::HS512,
        ] {
            let token = hmac_token(alg, b"client-secret-value", &sample_claims());
            assert!(verifier.verify(alg, &token, &VerificationKey::secret("client-secret-value")));
            assert!(!verifier.verify(alg, &token, &VerificationKey::secret("other-secret")));
        }
    }

    #[test]
    fn test_expected_algorithm_must_match_header() {
        let verifier = SignatureVerifier::new();
        let token = hmac_token(SigningAlgorithm::HS384, b"secret", &sample_claims());

        let err = verifier
            .verify_detailed(SigningAlgorithm::HS256, &token, &VerificationKey::secret("secret"))
            .unwrap_err();
        assert!(matches!(err, VerificationError::AlgorithmMismatch { .. }));
    }

    #[test]
    fn test_alg_none_is_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"client"}"#);
        let token = format!("{}.{}.", header, payload);

        let verifier = SignatureVerifier::new();
        for alg in SigningAlgorithm::ALL {
            assert!(!verifier.verify(alg, &token, &VerificationKey::secret("secret")));
        }
    }

    #[test]
    fn test_secret_key_rejected_for_asymmetric_algorithm() {
        let verifier = SignatureVerifier::new();
        let token = hmac_token(SigningAlgorithm::HS256, b"secret", &sample_claims());

        // A token relabelled as RS256 must not verify with a secret.
        let err = verifier
            .verify_detailed(SigningAlgorithm::RS256, &token, &VerificationKey::secret("secret"))
            .unwrap_err();
        assert!(matches!(err, VerificationError::AlgorithmMismatch { .. }));

        let rsa = KeyFixture::rsa();
        let forged = hmac_token(SigningAlgorithm::HS256, rsa.public_jwk_json().as_bytes(), &sample_claims());
        let err = verifier
            .verify_detailed(SigningAlgorithm::HS256, &forged, &VerificationKey::jwk(rsa.public_jwk()))
            .unwrap_err();
        assert!(matches!(err, VerificationError::KeyMismatch(_)));
    }

    #[test]
    fn test_rsa_and_pss() {
        let verifier = SignatureVerifier::new();
        let rsa = KeyFixture::rsa();
        let key = VerificationKey::jwk(rsa.public_jwk());

        for alg in [
            SigningAlgorithm::RS256,
            SigningAlgorithm::RS512,
            SigningAlgorithm::PS256,
            SigningAlgorithm::PS384,
        ] {
            let token = sign_token(alg, &rsa, None, &sample_claims());
            assert!(verifier.verify(alg, &token, &key), "{} should verify", alg);
        }
    }

    #[test]
    fn test_ecdsa_curves_must_match() {
        let verifier = SignatureVerifier::new();
        let p256 = KeyFixture::p256();
        let p384 = KeyFixture::p384();

        let token = sign_token(SigningAlgorithm::ES256, &p256, None, &sample_claims());
        assert!(verifier.verify(
            SigningAlgorithm::ES256,
            &token,
            &VerificationKey::jwk(p256.public_jwk())
        ));
        assert!(!verifier.verify(
            SigningAlgorithm::ES256,
            &token,
            &VerificationKey::jwk(p384.public_jwk())
        ));
    }

    #[test]
    fn test_es512() {
        let verifier = SignatureVerifier::new();
        let p521 = KeyFixture::p521();
        let other = KeyFixture::p521();

        let token = sign_token(SigningAlgorithm::ES512, &p521, Some("k1"), &sample_claims());
        assert!(verifier.verify(
            SigningAlgorithm::ES512,
            &token,
            &VerificationKey::jwk(p521.public_jwk())
        ));
        assert!(!verifier.verify(
            SigningAlgorithm::ES512,
            &token,
            &VerificationKey::jwk(other.public_jwk())
        ));

        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, "ES512");
        assert_eq!(header.kid.as_deref(), Some("k1"));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let verifier = SignatureVerifier::new();
        let token = hmac_token(SigningAlgorithm::HS256, b"secret", &sample_claims());
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1] = URL_SAFE_NO_PAD.encode(br#"{"sub":"attacker"}"#);
        let tampered = parts.join(".");

        let err = verifier
            .verify_detailed(SigningAlgorithm::HS256, &tampered, &VerificationKey::secret("secret"))
            .unwrap_err();
        assert!(matches!(err, VerificationError::InvalidSignature));
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(
            decode_header("only.two"),
            Err(VerificationError::Malformed(_))
        ));
        assert!(matches!(
            decode_header("!!!.payload.sig"),
            Err(VerificationError::Malformed(_))
        ));
    }
}
