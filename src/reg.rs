//! The one-time "register account, accept terms" exchange.

use crate::{
    api,
    client::TermsPolicy,
    error::{Error, Result},
    link::parse_link,
    req::{req_expect_header, req_link_header, req_safe_read_body},
    trans::Transport,
};

/// What account registration discovered.
#[derive(Debug, Clone)]
pub struct Registration {
    /// URL of the account resource, from the `Location` header.
    pub registration_url: String,

    /// Where to request new authorizations, from `Link rel="next"`.
    pub new_authz_url: String,

    /// Terms the CA required us to accept, if any.
    pub terms_url: Option<String>,
}

/// Runs the registration exchange against `new_reg_url`.
///
/// If the server advertises a `terms-of-service` relation, `policy` is
/// consulted before the agreement is POSTed back; this is the only point
/// where control returns to the caller mid-protocol.
pub(crate) async fn register(
    trans: &Transport,
    email: &str,
    new_reg_url: &str,
    policy: &impl TermsPolicy,
) -> Result<Registration> {
    log::debug!("Registering account for {email}");

    let res = trans
        .post(new_reg_url, &api::NewRegistration::new(email))
        .await?;

    let status = res.status();
    if !status.is_success() {
        let body = req_safe_read_body(res).await;
        return Err(Error::RegistrationRequestFailed {
            status: status.as_u16(),
            body,
        });
    }

    let links = parse_link(req_link_header(&res).as_deref())
        .ok_or(Error::MissingLinkRelation { rel: "next" })?;
    let new_authz_url = links
        .get("next")
        .cloned()
        .ok_or(Error::MissingLinkRelation { rel: "next" })?;
    let registration_url = req_expect_header(&res, "location")?;
    let terms_url = links.get("terms-of-service").cloned();

    if let Some(terms_url) = &terms_url {
        log::debug!("The CA requires agreement to terms: {terms_url}");

        if !policy.agree_to_terms(terms_url).await? {
            return Err(Error::TermsNotAccepted {
                url: terms_url.clone(),
            });
        }

        let res = trans
            .post(&registration_url, &api::UpdateRegistration::agree(terms_url))
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = req_safe_read_body(res).await;
            return Err(Error::AgreementPostFailed {
                status: status.as_u16(),
                body,
            });
        }

        log::debug!("Posted agreement to {registration_url}");
    }

    Ok(Registration {
        registration_url,
        new_authz_url,
        terms_url,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        key::KeyPair,
        test::{with_acme_server, RecordingPolicy, ServerBehavior, TEST_ACCOUNT_KEY_PEM},
    };

    fn transport() -> Transport {
        Transport::new(Arc::new(KeyPair::from_pem(TEST_ACCOUNT_KEY_PEM).unwrap()))
    }

    #[tokio::test]
    async fn registers_and_accepts_terms() {
        let server = with_acme_server(ServerBehavior::default());
        let trans = transport();
        let policy = RecordingPolicy::accepting();

        let reg = register(&trans, "foo@bar.com", &server.url("/acme/new-reg"), &policy)
            .await
            .unwrap();

        assert!(reg.new_authz_url.ends_with("/acme/new-authz"));
        assert!(reg.registration_url.ends_with("/acme/reg/1"));
        assert!(reg.terms_url.as_deref().unwrap().ends_with("/terms"));

        // the policy saw the terms URL and the agreement went back out
        assert_eq!(policy.seen_urls().len(), 1);
        assert_eq!(server.state.agreement_posts(), 1);
    }

    #[tokio::test]
    async fn rejected_terms_abort_registration() {
        let server = with_acme_server(ServerBehavior::default());
        let trans = transport();
        let policy = RecordingPolicy::rejecting();

        let err = register(&trans, "foo@bar.com", &server.url("/acme/new-reg"), &policy)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TermsNotAccepted { .. }));
        assert_eq!(server.state.agreement_posts(), 0);
    }

    #[tokio::test]
    async fn missing_next_link_is_protocol_error() {
        let server = with_acme_server(ServerBehavior {
            omit_registration_links: true,
            ..ServerBehavior::default()
        });
        let trans = transport();
        let policy = RecordingPolicy::accepting();

        let err = register(&trans, "foo@bar.com", &server.url("/acme/new-reg"), &policy)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingLinkRelation { rel: "next" }));
        assert_eq!(err.kind(), crate::ErrorKind::Protocol);
    }
}
