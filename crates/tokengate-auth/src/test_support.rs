//! Key and token fixtures for unit tests.

use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{EncodingKey, Header};
use rand::rngs::OsRng;
use serde::Serialize;
use serde_json::{Value, json};

use crate::oauth::algorithm::SigningAlgorithm;

#[derive(Clone)]
enum SigningMaterial {
    Jwt(EncodingKey),
    P521(p521::ecdsa::SigningKey),
}

/// A generated key pair with its public JWK.
#[derive(Clone)]
pub(crate) struct KeyFixture {
    material: SigningMaterial,
    public: Value,
}

impl KeyFixture {
    /// 2048-bit RSA key, generated once per test binary.
    pub(crate) fn rsa() -> Self {
        static RSA: OnceLock<KeyFixture> = OnceLock::new();
        RSA.get_or_init(|| {
            use rsa::pkcs8::{EncodePrivateKey, LineEnding};
            use rsa::traits::PublicKeyParts;

            let private_key = rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
            let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
            let public = json!({
                "kty": "RSA",
                "n": URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
                "e": URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
            });
            KeyFixture {
                material: SigningMaterial::Jwt(EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap()),
                public,
            }
        })
        .clone()
    }

    pub(crate) fn p256() -> Self {
        use p256::elliptic_curve::sec1::ToEncodedPoint;
        use p256::pkcs8::{EncodePrivateKey, LineEnding};

        let secret = p256::SecretKey::random(&mut OsRng);
        let pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap();
        let point = secret.public_key().to_encoded_point(false);
        Self {
            material: SigningMaterial::Jwt(EncodingKey::from_ec_pem(pem.as_bytes()).unwrap()),
            public: json!({
                "kty": "EC",
                "crv": "P-256",
                "x": URL_SAFE_NO_PAD.encode(point.x().unwrap()),
                "y": URL_SAFE_NO_PAD.encode(point.y().unwrap()),
            }),
        }
    }

    pub(crate) fn p384() -> Self {
        use p384::elliptic_curve::sec1::ToEncodedPoint;
        use p384::pkcs8::{EncodePrivateKey, LineEnding};

        let secret = p384::SecretKey::random(&mut OsRng);
        let pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap();
        let point = secret.public_key().to_encoded_point(false);
        Self {
            material: SigningMaterial::Jwt(EncodingKey::from_ec_pem(pem.as_bytes()).unwrap()),
            public: json!({
                "kty": "EC",
                "crv": "P-384",
                "x": URL_SAFE_NO_PAD.encode(point.x().unwrap()),
                "y": URL_SAFE_NO_PAD.encode(point.y().unwrap()),
            }),
        }
    }

    pub(crate) fn p521() -> Self {
        use p521::elliptic_curve::sec1::ToEncodedPoint;

        let secret = p521::SecretKey::random(&mut OsRng);
        let point = secret.public_key().to_encoded_point(false);
        let signing_key = p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes()).unwrap();
        Self {
            material: SigningMaterial::P521(signing_key),
            public: json!({
                "kty": "EC",
                "crv": "P-521",
                "x": URL_SAFE_NO_PAD.encode(point.x().unwrap()),
                "y": URL_SAFE_NO_PAD.encode(point.y().unwrap()),
            }),
        }
    }

    /// Fixture matching an algorithm's key type.
    pub(crate) fn for_algorithm(alg: SigningAlgorithm) -> Self {
        match alg {
            SigningAlgorithm::ES256 => Self::p256(),
            SigningAlgorithm::ES384 => Self::p384(),
            SigningAlgorithm::ES512 => Self::p521(),
            _ => Self::rsa(),
        }
    }

    pub(crate) fn public_jwk(&self) -> Jwk {
        serde_json::from_value(self.public.clone()).unwrap()
    }

    pub(crate) fn public_jwk_with_kid(&self, kid: &str) -> Jwk {
        let mut public = self.public.clone();
        public["kid"] = json!(kid);
        serde_json::from_value(public).unwrap()
    }

    pub(crate) fn public_jwk_json(&self) -> String {
        self.public.to_string()
    }

    /// Public JWK as published by a client that declares the key's `alg`.
    pub(crate) fn public_jwk_value(&self, kid: &str, alg: SigningAlgorithm) -> Value {
        let mut public = self.public.clone();
        public["kid"] = json!(kid);
        public["alg"] = json!(alg.as_str());
        public["use"] = json!("sig");
        public
    }
}

/// Claims shaped like a client assertion, with no particular audience.
pub(crate) fn sample_claims() -> Value {
    json!({
        "iss": "client",
        "sub": "client",
        "aud": "https://as.example.com/token",
        "jti": "sample-jti",
        "exp": time::OffsetDateTime::now_utc().unix_timestamp() + 60,
    })
}

/// Signs claims with an asymmetric fixture.
pub(crate) fn sign_token<T: Serialize>(
    alg: SigningAlgorithm,
    key: &KeyFixture,
    kid: Option<&str>,
    claims: &T,
) -> String {
    match &key.material {
        SigningMaterial::Jwt(encoding_key) => {
            let mut header = Header::new(alg.to_jsonwebtoken().unwrap());
            header.kid = kid.map(str::to_string);
            jsonwebtoken::encode(&header, claims, encoding_key).unwrap()
        }
        SigningMaterial::P521(signing_key) => {
            use p521::ecdsa::signature::Signer;

            let mut header = json!({ "alg": alg.as_str(), "typ": "JWT" });
            if let Some(kid) = kid {
                header["kid"] = json!(kid);
            }
            let signing_input = format!(
                "{}.{}",
                URL_SAFE_NO_PAD.encode(header.to_string()),
                URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap())
            );
            let signature: p521::ecdsa::Signature = signing_key.sign(signing_input.as_bytes());
            format!(
                "{}.{}",
                signing_input,
                URL_SAFE_NO_PAD.encode(signature.to_bytes())
            )
        }
    }
}

/// MACs claims with a shared secret.
pub(crate) fn hmac_token<T: Serialize>(alg: SigningAlgorithm, secret: &[u8], claims: &T) -> String {
    let header = Header::new(alg.to_jsonwebtoken().unwrap());
    jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(secret)).unwrap()
}
