//! Public operations, caller options, and the capability traits through
//! which control returns to the caller mid-protocol.

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use zeroize::Zeroizing;

use crate::{
    authz::{authorize_domain, AuthzOutcome},
    cert::CertificateBundle,
    dir::{Directory, DirectoryUrl},
    error::{Error, Result},
    issue::issue_certificate,
    key::KeyPair,
    reg::{register, Registration},
    trans::Transport,
};

/// Decides whether the CA's terms of service are acceptable.
///
/// Consulted at most once per registration, and only when the server
/// advertises a `terms-of-service` link.
#[allow(async_fn_in_trait)]
pub trait TermsPolicy {
    /// Returns `true` to accept the terms at `terms_url`.
    ///
    /// Returning `false` aborts the run with [`Error::TermsNotAccepted`].
    async fn agree_to_terms(&self, terms_url: &str) -> Result<bool>;
}

/// Publishes `http-01` proofs on the web server answering for a domain.
#[allow(async_fn_in_trait)]
pub trait ChallengeResponder {
    /// Makes `key_authorization` retrievable as plain text at
    /// `http://<domain><path>`.
    async fn set_challenge(&self, domain: &str, path: &str, key_authorization: &str)
        -> Result<()>;

    /// Removes a previously published proof.
    ///
    /// Called exactly once whenever `set_challenge` was attempted, whether
    /// publishing or validation succeeded or not. Errors are logged and
    /// otherwise ignored.
    async fn remove_challenge(&self, domain: &str, path: &str) -> Result<()>;
}

/// Pacing of the authorization poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fixed delay between status polls.
    pub delay: Duration,

    /// Poll attempts before a still-pending authorization fails the run
    /// with [`Error::ValidationTimedOut`].
    pub max_attempts: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            delay: Duration::from_millis(1000),
            max_attempts: 60,
        }
    }
}

/// Caller input for [`register_account`].
#[derive(Debug, Clone)]
pub struct AccountOptions {
    /// Account private key as PEM text.
    pub account_key_pem: String,

    /// Contact email, registered as a `mailto:` contact.
    pub email: String,

    /// The server's `new-reg` endpoint.
    pub new_reg_url: String,
}

impl AccountOptions {
    fn validate(&self) -> Result<KeyPair> {
        if self.email.is_empty() {
            return Err(Error::InvalidOptions("an account email is required".to_owned()));
        }
        if self.new_reg_url.is_empty() {
            return Err(Error::InvalidOptions("a new-reg URL is required".to_owned()));
        }

        parse_key(&self.account_key_pem, "account")
    }
}

/// Caller input for [`get_certificate`].
#[derive(Debug, Clone)]
pub struct CertificateOptions {
    /// Account private key as PEM text. Signs every request.
    pub account_key_pem: String,

    /// Certificate private key as PEM text. Signs the CSR only and must
    /// differ from the account key.
    pub domain_key_pem: String,

    /// Contact email, registered as a `mailto:` contact.
    pub email: String,

    /// Domains to authorize and certify. The first becomes the subject CN;
    /// all of them appear as SANs.
    pub domains: Vec<String>,

    /// The server's `new-reg` endpoint.
    pub new_reg_url: String,

    /// The server's `new-cert` endpoint. Normally discovered from the
    /// `Link rel="next"` of the last authorization; this is the fallback.
    pub new_cert_url: Option<String>,

    pub poll: PollConfig,
}

impl CertificateOptions {
    fn validate(&self) -> Result<(KeyPair, KeyPair)> {
        if self.email.is_empty() {
            return Err(Error::InvalidOptions("an account email is required".to_owned()));
        }
        if self.domains.is_empty() || self.domains.iter().any(String::is_empty) {
            return Err(Error::InvalidOptions(
                "at least one non-empty domain is required".to_owned(),
            ));
        }
        if self.new_reg_url.is_empty() {
            return Err(Error::InvalidOptions("a new-reg URL is required".to_owned()));
        }

        let account_key = parse_key(&self.account_key_pem, "account")?;
        let domain_key = parse_key(&self.domain_key_pem, "domain")?;

        if account_key.fingerprint() == domain_key.fingerprint() {
            return Err(Error::InvalidOptions(
                "account key and domain key must be distinct".to_owned(),
            ));
        }

        Ok((account_key, domain_key))
    }
}

fn parse_key(pem: &str, what: &str) -> Result<KeyPair> {
    KeyPair::from_pem(pem)
        .map_err(|_| Error::InvalidOptions(format!("the {what} key is not a usable private key PEM")))
}

/// Registers (or refreshes) an account and accepts terms via `policy`.
pub async fn register_account(
    options: &AccountOptions,
    policy: &impl TermsPolicy,
) -> Result<Registration> {
    let account_key = options.validate()?;
    let trans = Transport::new(Arc::new(account_key));

    register(&trans, &options.email, &options.new_reg_url, policy).await
}

/// Runs the whole issuance session: registration, one authorization per
/// domain, then certificate issuance and download.
///
/// Domains are processed strictly in order. A 403 on `new-authz` means the
/// registration went stale; the session re-registers and retries that
/// domain, at most once per domain. The first fatal error ends the run and
/// nothing is returned.
pub async fn get_certificate(
    options: &CertificateOptions,
    policy: &impl TermsPolicy,
    responder: &impl ChallengeResponder,
) -> Result<CertificateBundle> {
    let (account_key, domain_key) = options.validate()?;
    let trans = Transport::new(Arc::new(account_key));

    let mut registration = register(&trans, &options.email, &options.new_reg_url, policy).await?;

    let mut pending: VecDeque<&str> = options.domains.iter().map(String::as_str).collect();
    let mut authz_urls = Vec::with_capacity(options.domains.len());
    let mut new_cert_url = options.new_cert_url.clone();
    let mut re_registered = HashSet::new();

    while let Some(domain) = pending.pop_front() {
        let outcome = authorize_domain(
            &trans,
            &registration.new_authz_url,
            domain,
            responder,
            options.poll.delay,
            options.poll.max_attempts,
        )
        .await?;

        match outcome {
            AuthzOutcome::Validated { auth_url, next_url } => {
                authz_urls.push(auth_url);
                new_cert_url = Some(next_url);
            }

            AuthzOutcome::StaleRegistration => {
                if !re_registered.insert(domain.to_owned()) {
                    // re-registering didn't help; give up on this domain
                    return Err(Error::AuthorizationRequestFailed {
                        domain: domain.to_owned(),
                        status: 403,
                        body: "authorization still refused after re-registering".to_owned(),
                    });
                }

                registration =
                    register(&trans, &options.email, &options.new_reg_url, policy).await?;
                pending.push_front(domain);
            }
        }
    }

    let new_cert_url = new_cert_url.ok_or(Error::MissingLinkRelation { rel: "next" })?;

    let (cert, ca) = issue_certificate(
        &trans,
        &domain_key,
        &options.domains,
        &authz_urls,
        &new_cert_url,
    )
    .await?;

    Ok(CertificateBundle::new(
        cert,
        Zeroizing::new(options.domain_key_pem.clone()),
        ca,
    ))
}

/// Convenience wrapper: discovers the endpoints from a directory document,
/// then runs [`get_certificate`]. Endpoint URLs in `options` are replaced
/// by what the directory publishes.
pub async fn obtain_certificate(
    directory_url: DirectoryUrl<'_>,
    mut options: CertificateOptions,
    policy: &impl TermsPolicy,
    responder: &impl ChallengeResponder,
) -> Result<CertificateBundle> {
    let directory = Directory::fetch(directory_url).await?;

    options.new_reg_url = directory.new_reg;
    options.new_cert_url = Some(directory.new_cert);

    get_certificate(&options, policy, responder).await
}

#[cfg(test)]
mod tests {
    use der::{oid::AssociatedOid as _, Decode as _};
    use x509_cert::{
        der::DecodePem as _,
        ext::pkix::{name::GeneralName, SubjectAltName},
    };

    use super::*;
    use crate::test::{
        with_acme_server, RecordingPolicy, RecordingResponder, ServerBehavior,
        TEST_ACCOUNT_KEY_PEM, TEST_DOMAIN_KEY_PEM,
    };

    fn options(server_base: &str) -> CertificateOptions {
        CertificateOptions {
            account_key_pem: TEST_ACCOUNT_KEY_PEM.to_owned(),
            domain_key_pem: TEST_DOMAIN_KEY_PEM.to_owned(),
            email: "foo@bar.com".to_owned(),
            domains: vec!["example.com".to_owned(), "www.example.com".to_owned()],
            new_reg_url: format!("{server_base}/acme/new-reg"),
            new_cert_url: None,
            poll: PollConfig {
                delay: Duration::from_millis(10),
                max_attempts: 10,
            },
        }
    }

    fn san_dns_names(cert_pem: &str) -> Vec<String> {
        let cert = x509_cert::Certificate::from_pem(cert_pem).unwrap();
        let extensions = cert.tbs_certificate.extensions.unwrap();
        let san = extensions
            .iter()
            .find(|ext| ext.extn_id == SubjectAltName::OID)
            .unwrap();
        let san = SubjectAltName::from_der(san.extn_value.as_bytes()).unwrap();

        san.0
            .into_iter()
            .filter_map(|name| match name {
                GeneralName::DnsName(name) => Some(name.to_string()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn full_issuance_happy_path() {
        let server = with_acme_server(ServerBehavior {
            pending_polls: 1,
            ..ServerBehavior::default()
        });
        let policy = RecordingPolicy::accepting();
        let responder = RecordingResponder::default();

        let bundle = get_certificate(&options(&server.base_url()), &policy, &responder)
            .await
            .unwrap();

        // terms accepted once, one proof published and removed per domain
        assert_eq!(policy.seen_urls().len(), 1);
        assert_eq!(server.state.agreement_posts(), 1);
        assert_eq!(responder.set_calls(), 2);
        assert_eq!(responder.remove_calls(), 2);

        // the issued certificate covers every requested domain
        let names = san_dns_names(bundle.certificate());
        assert!(names.contains(&"example.com".to_owned()));
        assert!(names.contains(&"www.example.com".to_owned()));

        assert!(bundle.ca_certificate().starts_with("-----BEGIN CERTIFICATE-----"));
        assert_eq!(bundle.private_key(), TEST_DOMAIN_KEY_PEM);
        assert!(bundle.valid_days_left().unwrap() > 0);

        // every nonce the server handed out was used at most once
        assert!(server.state.no_nonce_reused());
    }

    #[tokio::test]
    async fn stale_registration_reregisters_once_and_recovers() {
        let server = with_acme_server(ServerBehavior {
            stale_first_registration: true,
            ..ServerBehavior::default()
        });
        let policy = RecordingPolicy::accepting();
        let responder = RecordingResponder::default();

        get_certificate(&options(&server.base_url()), &policy, &responder)
            .await
            .unwrap();

        assert_eq!(server.state.registrations(), 2);
    }

    #[tokio::test]
    async fn persistent_403_fails_after_one_reregistration() {
        let server = with_acme_server(ServerBehavior {
            always_forbid_authz: true,
            ..ServerBehavior::default()
        });
        let policy = RecordingPolicy::accepting();
        let responder = RecordingResponder::default();

        let err = get_certificate(&options(&server.base_url()), &policy, &responder)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::AuthorizationRequestFailed { status: 403, .. }
        ));
        // re-registered exactly once, then stopped
        assert_eq!(server.state.registrations(), 2);
    }

    #[tokio::test]
    async fn obtains_certificate_via_directory_discovery() {
        let server = with_acme_server(ServerBehavior::default());
        let policy = RecordingPolicy::accepting();
        let responder = RecordingResponder::default();

        let mut options = options(&server.base_url());
        options.new_reg_url = String::new(); // replaced by the directory

        let bundle = obtain_certificate(
            DirectoryUrl::Other(&server.dir_url),
            options,
            &policy,
            &responder,
        )
        .await
        .unwrap();

        assert!(bundle.certificate().starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[tokio::test]
    async fn rejects_identical_account_and_domain_keys() {
        let mut options = options("http://ca.invalid");
        options.domain_key_pem = TEST_ACCOUNT_KEY_PEM.to_owned();

        let policy = RecordingPolicy::accepting();
        let responder = RecordingResponder::default();
        let err = get_certificate(&options, &policy, &responder)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidOptions(_)));
        assert_eq!(err.kind(), crate::ErrorKind::ValidationInput);
    }

    #[tokio::test]
    async fn rejects_empty_domain_list() {
        let mut options = options("http://ca.invalid");
        options.domains.clear();

        let policy = RecordingPolicy::accepting();
        let responder = RecordingResponder::default();
        let err = get_certificate(&options, &policy, &responder)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidOptions(_)));
    }
}
