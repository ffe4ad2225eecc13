//! Obtaining domain-validated TLS certificates from ACME v1 providers such
//! as [Let's Encrypt](https://letsencrypt.org/).
//!
//! The v1 dialect predates [RFC 8555]: every request body is a flat JWS
//! whose payload carries a `resource` discriminator, replay nonces arrive in
//! `Replay-Nonce` response headers, and each protocol step advertises the
//! next one through `Link` headers.
//!
//! A full run goes through three steps:
//!
//! 1. account registration (with optional terms-of-service agreement),
//! 2. one `http-01` authorization per domain,
//! 3. CSR submission and certificate download.
//!
//! # Domain Ownership
//!
//! Proving control of a domain means serving the CA a key authorization at
//! `http://<domain>/.well-known/acme-challenge/<token>`. This library never
//! touches your web server itself; it hands the proof to your
//! [`ChallengeResponder`] and takes it back out through the same trait when
//! the CA has reached a verdict.
//!
//! # Keys
//!
//! Two distinct private keys are involved: the account key signs every
//! request, the domain key signs only the CSR. Supply both as PEM text, or
//! mint them with [`create_rsa_key`] / [`create_p256_key`].
//!
//! # Rate Limits
//!
//! Public CAs rate-limit aggressively. Use the staging environment
//! ([`DirectoryUrl::LetsEncryptStaging`]) while developing.
//!
//! [RFC 8555]: https://datatracker.ietf.org/doc/html/rfc8555

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

mod authz;
mod cert;
mod client;
mod dir;
mod error;
mod issue;
mod jws;
mod key;
mod link;
mod reg;
mod req;
mod trans;

pub mod api;

#[cfg(test)]
mod test;

pub use crate::{
    cert::{create_p256_key, create_rsa_key, CertificateBundle},
    client::{
        get_certificate, obtain_certificate, register_account, AccountOptions,
        CertificateOptions, ChallengeResponder, PollConfig, TermsPolicy,
    },
    dir::{Directory, DirectoryUrl},
    error::{Error, ErrorKind, Result},
    reg::Registration,
};
