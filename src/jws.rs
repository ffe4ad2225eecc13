//! The flat JWS envelope wrapped around every ACME v1 request body.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{error::Result, key::KeyPair};

/// Public key representation carried in the JWS header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub(crate) enum Jwk {
    #[serde(rename = "RSA")]
    Rsa { n: String, e: String },

    #[serde(rename = "EC")]
    Ec { crv: String, x: String, y: String },
}

impl Jwk {
    /// A simple, NON-standard fingerprint of the public key: the base64url
    /// modulus for RSA, `crv + x + y` for EC.
    ///
    /// This is what goes into `http-01` key authorizations. It is
    /// deliberately not the RFC 7638 thumbprint; do not "fix" it without
    /// checking against a live server.
    pub(crate) fn fingerprint(&self) -> String {
        match self {
            Jwk::Rsa { n, .. } => n.clone(),
            Jwk::Ec { crv, x, y } => format!("{crv}{x}{y}"),
        }
    }
}

/// JWS header: algorithm, public key, and (in the protected form) the
/// single-use replay nonce.
#[derive(Debug, Serialize)]
pub(crate) struct JwsHeader {
    alg: &'static str,

    jwk: Jwk,

    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
}

/// The ACME v1 flat JWS object.
///
/// `header` is a plain JSON object; `protected` is the base64url encoding of
/// the same header with the nonce added; `payload` and `signature` are
/// base64url. The signature covers `protected + "." + payload`.
#[derive(Debug, Serialize)]
pub(crate) struct FlatJws {
    header: JwsHeader,
    protected: String,
    payload: String,
    signature: String,
}

/// Signs `payload` into the flat JWS envelope, consuming `nonce`.
pub(crate) fn sign(key: &KeyPair, payload: &[u8], nonce: String) -> Result<FlatJws> {
    let jwk = key.jwk();

    let protected = {
        let header = JwsHeader {
            alg: key.alg(),
            jwk: jwk.clone(),
            nonce: Some(nonce),
        };
        BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?)
    };

    let payload = BASE64_URL_SAFE_NO_PAD.encode(payload);

    let to_sign = format!("{protected}.{payload}");
    let signature = BASE64_URL_SAFE_NO_PAD.encode(key.sign(to_sign.as_bytes())?);

    Ok(FlatJws {
        header: JwsHeader {
            alg: key.alg(),
            jwk,
            nonce: None,
        },
        protected,
        payload,
        signature,
    })
}

#[cfg(test)]
mod tests {
    use rsa::pkcs8::DecodePrivateKey as _;
    use rsa::signature::Verifier as _;
    use sha2::Sha256;

    use super::*;
    use crate::test::{TEST_ACCOUNT_KEY_PEM, TEST_EC_KEY_PEM};

    fn signed_value(key: &KeyPair) -> serde_json::Value {
        let jws = sign(key, br#"{"resource":"new-reg"}"#, "nonce-1".to_owned()).unwrap();
        serde_json::to_value(&jws).unwrap()
    }

    #[test]
    fn envelope_has_v1_shape() {
        let key = KeyPair::from_pem(TEST_ACCOUNT_KEY_PEM).unwrap();
        let value = signed_value(&key);

        assert_eq!(value["header"]["alg"], "RS256");
        assert_eq!(value["header"]["jwk"]["kty"], "RSA");
        // the nonce lives in the protected header only
        assert!(value["header"].get("nonce").is_none());
        assert!(value["protected"].is_string());
        assert!(value["payload"].is_string());
        assert!(value["signature"].is_string());

        let protected: serde_json::Value = serde_json::from_slice(
            &BASE64_URL_SAFE_NO_PAD
                .decode(value["protected"].as_str().unwrap())
                .unwrap(),
        )
        .unwrap();
        assert_eq!(protected["nonce"], "nonce-1");
        assert_eq!(protected["alg"], "RS256");
    }

    #[test]
    fn rsa_signature_verifies_over_protected_dot_payload() {
        let key = KeyPair::from_pem(TEST_ACCOUNT_KEY_PEM).unwrap();
        let value = signed_value(&key);

        let signed_input = format!(
            "{}.{}",
            value["protected"].as_str().unwrap(),
            value["payload"].as_str().unwrap()
        );
        let signature = rsa::pkcs1v15::Signature::try_from(
            BASE64_URL_SAFE_NO_PAD
                .decode(value["signature"].as_str().unwrap())
                .unwrap()
                .as_slice(),
        )
        .unwrap();

        let private = rsa::RsaPrivateKey::from_pkcs8_pem(TEST_ACCOUNT_KEY_PEM).unwrap();
        let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(private.to_public_key());

        verifier
            .verify(signed_input.as_bytes(), &signature)
            .unwrap();

        // flipping one byte of the payload must break verification
        let tampered = format!("{}x", signed_input);
        assert!(verifier.verify(tampered.as_bytes(), &signature).is_err());
    }

    #[test]
    fn rsa_fingerprint_is_the_modulus() {
        let key = KeyPair::from_pem(TEST_ACCOUNT_KEY_PEM).unwrap();
        let jwk = key.jwk();

        let Jwk::Rsa { n, .. } = &jwk else {
            panic!("expected RSA jwk");
        };
        assert_eq!(&jwk.fingerprint(), n);
    }

    #[test]
    fn ec_fingerprint_concatenates_curve_and_point() {
        let key = KeyPair::from_pem(TEST_EC_KEY_PEM).unwrap();
        let jwk = key.jwk();

        let Jwk::Ec { crv, x, y } = &jwk else {
            panic!("expected EC jwk");
        };
        assert_eq!(jwk.fingerprint(), format!("{crv}{x}{y}"));
        assert!(jwk.fingerprint().starts_with("P-256"));
    }
}
