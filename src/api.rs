//! JSON wire objects for the ACME v1 protocol.
//!
//! Request payloads carry a `resource` discriminator naming the endpoint
//! they are aimed at; responses are plain JSON objects.

use serde::{Deserialize, Serialize};

/// `{"resource":"new-reg","contact":["mailto:..."]}`
#[derive(Debug, Serialize)]
pub(crate) struct NewRegistration {
    resource: &'static str,
    contact: Vec<String>,
}

impl NewRegistration {
    pub(crate) fn new(email: &str) -> Self {
        NewRegistration {
            resource: "new-reg",
            contact: vec![format!("mailto:{email}")],
        }
    }
}

/// `{"resource":"reg","agreement":"<terms url>"}`
#[derive(Debug, Serialize)]
pub(crate) struct UpdateRegistration {
    resource: &'static str,
    agreement: String,
}

impl UpdateRegistration {
    pub(crate) fn agree(terms_url: &str) -> Self {
        UpdateRegistration {
            resource: "reg",
            agreement: terms_url.to_owned(),
        }
    }
}

/// `{"resource":"new-authz","identifier":{"type":"dns","value":"..."}}`
#[derive(Debug, Serialize)]
pub(crate) struct NewAuthorization {
    resource: &'static str,
    identifier: Identifier,
}

impl NewAuthorization {
    pub(crate) fn dns(domain: &str) -> Self {
        NewAuthorization {
            resource: "new-authz",
            identifier: Identifier {
                _type: "dns".to_owned(),
                value: domain.to_owned(),
            },
        }
    }
}

/// An identifier the CA can authorize. ACME v1 only knows `dns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub _type: String,
    pub value: String,
}

/// `{"resource":"challenge","keyAuthorization":"<token>.<fingerprint>"}`
#[derive(Debug, Serialize)]
pub(crate) struct ChallengeResponse {
    resource: &'static str,
    #[serde(rename = "keyAuthorization")]
    key_authorization: String,
}

impl ChallengeResponse {
    pub(crate) fn new(key_authorization: &str) -> Self {
        ChallengeResponse {
            resource: "challenge",
            key_authorization: key_authorization.to_owned(),
        }
    }
}

/// `{"resource":"new-cert","csr":"<base64url DER>","authorizations":[...]}`
#[derive(Debug, Serialize)]
pub(crate) struct NewCertificate {
    resource: &'static str,
    csr: String,
    authorizations: Vec<String>,
}

impl NewCertificate {
    pub(crate) fn new(csr: String, authorizations: Vec<String>) -> Self {
        NewCertificate {
            resource: "new-cert",
            csr,
            authorizations,
        }
    }
}

/// The status an authorization (or challenge) reports while we poll it.
///
/// Anything the protocol does not name deserializes to `Unknown` and is
/// treated as a protocol error by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    #[serde(other)]
    Unknown,
}

/// A challenge offered within an authorization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Challenge {
    /// Challenge type, e.g. `http-01`.
    #[serde(rename = "type")]
    pub _type: String,

    /// URL the readiness notification is POSTed to.
    pub uri: String,

    /// Opaque token; names the well-known path and seeds the key
    /// authorization.
    pub token: String,

    pub status: Option<String>,
}

/// An ACME v1 authorization object.
#[derive(Debug, Clone, Deserialize)]
pub struct Authorization {
    pub identifier: Option<Identifier>,

    pub status: AuthorizationStatus,

    /// The proofs the server will accept, any one of which suffices.
    pub challenges: Vec<Challenge>,
}

impl Authorization {
    /// Returns the first `http-01` challenge, if one is offered.
    pub fn http_challenge(&self) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c._type == "http-01")
    }
}

/// Minimal view of a polled status body.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
    pub(crate) status: AuthorizationStatus,
}
