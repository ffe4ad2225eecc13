//! Typed errors for the whole issuance run.
//!
//! Every component reports through [`Error`]; the run stops at the first
//! fatal variant. [`Error::kind`] groups the variants into the coarse
//! classes callers usually branch on.

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed caller input, detected before any network call.
    ValidationInput,

    /// Network, DNS, or TLS failure. Not retried by the client except for
    /// the single nonce re-fetch in the transport.
    Transport,

    /// The server answered in a way the protocol does not allow: unexpected
    /// status code, missing `Link` relation, malformed JSON body.
    Protocol,

    /// The CA looked at our challenge proof and rejected it.
    ValidationFailure,

    /// A downloaded artifact did not match what the server sent inline.
    Integrity,

    /// Local signing or PEM encoding failed.
    Encoding,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("no replay-nonce header in response from {url}")]
    NonceUnavailable { url: String },

    #[error("failed to sign request: {0}")]
    Signing(String),

    #[error("missing `{name}` header in response")]
    MissingHeader { name: &'static str },

    #[error("malformed response body: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("registration request failed ({status}): {body}")]
    RegistrationRequestFailed { status: u16, body: String },

    #[error("server did not provide a `{rel}` link relation")]
    MissingLinkRelation { rel: &'static str },

    #[error("terms of service at {url} were not accepted")]
    TermsNotAccepted { url: String },

    #[error("posting the terms agreement failed ({status}): {body}")]
    AgreementPostFailed { status: u16, body: String },

    #[error("authorization request for {domain} failed ({status}): {body}")]
    AuthorizationRequestFailed {
        domain: String,
        status: u16,
        body: String,
    },

    #[error("no supported challenge offered for {domain}")]
    NoSupportedChallenge { domain: String },

    #[error("authorization status request for {domain} failed ({status})")]
    AuthorizationStatusRequestFailed { domain: String, status: u16 },

    #[error("the CA was unable to validate {domain}: {detail}")]
    DomainValidationFailed { domain: String, detail: String },

    #[error("authorization for {domain} is in an unexpected state: {body}")]
    UnexpectedAuthorizationState { domain: String, body: String },

    #[error("validation of {domain} still pending after {attempts} poll attempts")]
    ValidationTimedOut { domain: String, attempts: usize },

    #[error("certificate request failed ({status}): {body}")]
    CertificateRequestFailed { status: u16, body: String },

    #[error("server did not provide an issuer certificate link")]
    MissingIssuerLink,

    #[error("re-fetching certificate from {url} failed ({status})")]
    CertificateRefetchFailed { url: String, status: u16 },

    #[error("certificate at {url} did not match the certificate returned inline")]
    CertificateMismatch { url: String },

    #[error("fetching issuer certificate from {url} failed ({status})")]
    IssuerCertificateFetchFailed { url: String, status: u16 },

    #[error("failed to encode output: {0}")]
    OutputEncoding(String),

    /// A caller-supplied capability (terms policy or challenge responder)
    /// reported failure.
    #[error("caller capability failed: {0}")]
    Callback(String),
}

impl Error {
    /// The coarse class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidOptions(_) => ErrorKind::ValidationInput,

            Error::Transport(_) | Error::NonceUnavailable { .. } => ErrorKind::Transport,

            Error::MissingHeader { .. }
            | Error::MalformedResponse(_)
            | Error::RegistrationRequestFailed { .. }
            | Error::MissingLinkRelation { .. }
            | Error::TermsNotAccepted { .. }
            | Error::AgreementPostFailed { .. }
            | Error::AuthorizationRequestFailed { .. }
            | Error::NoSupportedChallenge { .. }
            | Error::AuthorizationStatusRequestFailed { .. }
            | Error::UnexpectedAuthorizationState { .. }
            | Error::ValidationTimedOut { .. }
            | Error::CertificateRequestFailed { .. }
            | Error::MissingIssuerLink
            | Error::CertificateRefetchFailed { .. }
            | Error::IssuerCertificateFetchFailed { .. } => ErrorKind::Protocol,

            Error::DomainValidationFailed { .. } | Error::Callback(_) => {
                ErrorKind::ValidationFailure
            }

            Error::CertificateMismatch { .. } => ErrorKind::Integrity,

            Error::Signing(_) | Error::OutputEncoding(_) => ErrorKind::Encoding,
        }
    }
}
