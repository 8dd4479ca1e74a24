//! JWS algorithms accepted for client assertions.
//!
//! `client_secret_jwt` is restricted to the HMAC family and `private_key_jwt`
//! to the asymmetric families (RSASSA-PKCS1-v1_5, RSASSA-PSS, ECDSA).

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

/// A JWS signing or MAC algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// HMAC using SHA-256.
    HS256,
    /// HMAC using SHA-384.
    HS384,
    /// HMAC using SHA-512.
    HS512,
    /// RSASSA-PKCS1-v1_5 using SHA-256.
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384.
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512.
    RS512,
    /// RSASSA-PSS using SHA-256.
    PS256,
    /// RSASSA-PSS using SHA-384.
    PS384,
    /// RSASSA-PSS using SHA-512.
    PS512,
    /// ECDSA using P-256 and SHA-256.
    ES256,
    /// ECDSA using P-384 and SHA-384.
    ES384,
    /// ECDSA using P-521 and SHA-512.
    ES512,
}

/// Key family an algorithm belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmFamily {
    /// Shared-secret MACs.
    Symmetric,
    /// Public-key signatures.
    Asymmetric,
}

impl fmt::Display for AlgorithmFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symmetric => write!(f, "symmetric"),
            Self::Asymmetric => write!(f, "asymmetric"),
        }
    }
}

impl SigningAlgorithm {
    /// All supported algorithms.
    pub const ALL: [SigningAlgorithm; 12] = [
        Self::HS256,
        Self::HS384,
        Self::HS512,
        Self::RS256,
        Self::RS384,
        Self::RS512,
        Self::PS256,
        Self::PS384,
        Self::PS512,
        Self::ES256,
        Self::ES384,
        Self::ES512,
    ];

    /// Returns the JOSE `alg` value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
        }
    }

    /// Parses a JOSE `alg` value. Matching is case-sensitive.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.as_str() == value)
    }

    /// Returns the key family of this algorithm.
    #[must_use]
    pub fn family(&self) -> AlgorithmFamily {
        match self {
            Self::HS256 | Self::HS384 | Self::HS512 => AlgorithmFamily::Symmetric,
            _ => AlgorithmFamily::Asymmetric,
        }
    }

    /// Returns `true` for the HMAC algorithms.
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        self.family() == AlgorithmFamily::Symmetric
    }

    /// Returns `true` for the RSA algorithms (PKCS#1 v1.5 and PSS).
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(
            self,
            Self::RS256 | Self::RS384 | Self::RS512 | Self::PS256 | Self::PS384 | Self::PS512
        )
    }

    /// Returns `true` for the ECDSA algorithms.
    #[must_use]
    pub fn is_ecdsa(&self) -> bool {
        matches!(self, Self::ES256 | Self::ES384 | Self::ES512)
    }

    /// Returns the JWK `crv` value required by an ECDSA algorithm.
    #[must_use]
    pub fn ec_curve(&self) -> Option<&'static str> {
        match self {
            Self::ES256 => Some("P-256"),
            Self::ES384 => Some("P-384"),
            Self::ES512 => Some("P-521"),
            _ => None,
        }
    }

    /// Maps to the `jsonwebtoken` algorithm.
    ///
    /// Returns `None` for ES512, which `jsonwebtoken` does not implement.
    #[must_use]
    pub fn to_jsonwebtoken(&self) -> Option<Algorithm> {
        match self {
            Self::HS256 => Some(Algorithm::HS256),
            Self::HS384 => Some(Algorithm::HS384),
            Self::HS512 => Some(Algorithm::HS512),
            Self::RS256 => Some(Algorithm::RS256),
            Self::RS384 => Some(Algorithm::RS384),
            Self::RS512 => Some(Algorithm::RS512),
            Self::PS256 => Some(Algorithm::PS256),
            Self::PS384 => Some(Algorithm::PS384),
            Self::PS512 => Some(Algorithm::PS512),
            Self::ES256 => Some(Algorithm::ES256),
            Self::ES384 => Some(Algorithm::ES384),
            Self::ES512 => None,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown algorithm name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported signing algorithm: {0}")]
pub struct UnsupportedAlgorithm(pub String);

impl FromStr for SigningAlgorithm {
    type Err = UnsupportedAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnsupportedAlgorithm(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for alg in SigningAlgorithm::ALL {
            assert_eq!(SigningAlgorithm::parse(alg.as_str()), Some(alg));
        }
    }

    #[test]
    fn test_parse_rejects_unknown_and_none() {
        assert_eq!(SigningAlgorithm::parse("none"), None);
        assert_eq!(SigningAlgorithm::parse("hs256"), None);
        assert_eq!(SigningAlgorithm::parse("EdDSA"), None);
        assert!("RS1".parse::<SigningAlgorithm>().is_err());
    }

    #[test]
    fn test_families() {
        let symmetric: Vec<_> = SigningAlgorithm::ALL
            .into_iter()
            .filter(SigningAlgorithm::is_symmetric)
            .collect();
        assert_eq!(
            symmetric,
            vec![
                SigningAlgorithm::HS256,
                SigningAlgorithm::HS384,
                SigningAlgorithm::HS512
            ]
        );
        assert_eq!(
            SigningAlgorithm::PS384.family(),
            AlgorithmFamily::Asymmetric
        );
        assert!(SigningAlgorithm::PS512.is_rsa());
        assert!(SigningAlgorithm::ES512.is_ecdsa());
    }

    #[test]
    fn test_ec_curves() {
        assert_eq!(SigningAlgorithm::ES256.ec_curve(), Some("P-256"));
        assert_eq!(SigningAlgorithm::ES512.ec_curve(), Some("P-521"));
        assert_eq!(SigningAlgorithm::RS256.ec_curve(), None);
    }

    #[test]
    fn test_jsonwebtoken_mapping() {
        assert_eq!(
            SigningAlgorithm::PS256.to_jsonwebtoken(),
            Some(Algorithm::PS256)
        );
        assert_eq!(SigningAlgorithm::ES512.to_jsonwebtoken(), None);
    }

    #[test]
    fn test_serde_uses_jose_names() {
        let json = serde_json::to_string(&SigningAlgorithm::ES384).unwrap();
        assert_eq!(json, "\"ES384\"");
        let alg: SigningAlgorithm = serde_json::from_str("\"HS512\"").unwrap();
        assert_eq!(alg, SigningAlgorithm::HS512);
    }
}
