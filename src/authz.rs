//! Per-domain authorization: request, publish proof, poll to a verdict.

use std::time::Duration;

use reqwest::StatusCode;

use crate::{
    api,
    client::ChallengeResponder,
    error::{Error, Result},
    link::parse_link,
    req::{read_json, req_expect_header, req_get, req_link_header, req_safe_read_body},
    trans::Transport,
};

/// Prefix under which `http-01` proofs must be retrievable.
pub(crate) const WELL_KNOWN_PREFIX: &str = "/.well-known/acme-challenge/";

/// Result of driving one domain through authorization.
#[derive(Debug)]
pub(crate) enum AuthzOutcome {
    /// The CA validated the domain.
    Validated {
        /// This authorization's URL, referenced later in the certificate
        /// request.
        auth_url: String,

        /// Next-step (certificate issuance) URL from `Link rel="next"`.
        next_url: String,
    },

    /// The CA answered 403: our registration went stale and must be redone
    /// before this domain is retried.
    StaleRegistration,
}

/// Drives the full authorization exchange for one domain.
///
/// The responder's `remove_challenge` is invoked on every exit path once
/// `set_challenge` has been attempted; its errors are logged and ignored.
pub(crate) async fn authorize_domain<R: ChallengeResponder>(
    trans: &Transport,
    new_authz_url: &str,
    domain: &str,
    responder: &R,
    poll_delay: Duration,
    max_poll_attempts: usize,
) -> Result<AuthzOutcome> {
    log::debug!("Requesting authorization for {domain}");

    let res = trans
        .post(new_authz_url, &api::NewAuthorization::dns(domain))
        .await?;

    let status = res.status();
    if status == StatusCode::FORBIDDEN {
        log::debug!("Authorization for {domain} answered 403, re-registering");
        return Ok(AuthzOutcome::StaleRegistration);
    }
    if !status.is_success() {
        let body = req_safe_read_body(res).await;
        return Err(Error::AuthorizationRequestFailed {
            domain: domain.to_owned(),
            status: status.as_u16(),
            body,
        });
    }

    let links = parse_link(req_link_header(&res).as_deref())
        .ok_or(Error::MissingLinkRelation { rel: "next" })?;
    let next_url = links
        .get("next")
        .cloned()
        .ok_or(Error::MissingLinkRelation { rel: "next" })?;
    let auth_url = req_expect_header(&res, "location")?;

    let authz: api::Authorization = read_json(res).await?;
    let challenge = authz
        .http_challenge()
        .ok_or_else(|| Error::NoSupportedChallenge {
            domain: domain.to_owned(),
        })?;

    let key_authorization = format!("{}.{}", challenge.token, trans.key().fingerprint());
    let path = format!("{WELL_KNOWN_PREFIX}{}", challenge.token);

    let result = publish_and_validate(
        trans,
        responder,
        domain,
        &path,
        &key_authorization,
        &challenge.uri,
        &auth_url,
        poll_delay,
        max_poll_attempts,
    )
    .await;

    // guaranteed cleanup, also when validation failed
    if let Err(err) = responder.remove_challenge(domain, &path).await {
        log::warn!("Failed to remove challenge for {domain} at {path}: {err}");
    }

    result.map(|()| AuthzOutcome::Validated { auth_url, next_url })
}

#[allow(clippy::too_many_arguments)]
async fn publish_and_validate<R: ChallengeResponder>(
    trans: &Transport,
    responder: &R,
    domain: &str,
    path: &str,
    key_authorization: &str,
    challenge_url: &str,
    auth_url: &str,
    poll_delay: Duration,
    max_poll_attempts: usize,
) -> Result<()> {
    responder
        .set_challenge(domain, path, key_authorization)
        .await?;
    log::debug!("Challenge proof for {domain} published at {path}");

    let res = trans
        .post(challenge_url, &api::ChallengeResponse::new(key_authorization))
        .await?;

    let status = res.status();
    if !status.is_success() {
        return Err(Error::AuthorizationStatusRequestFailed {
            domain: domain.to_owned(),
            status: status.as_u16(),
        });
    }

    let mut body = req_safe_read_body(res).await;

    for attempt in 0..max_poll_attempts {
        let parsed: api::StatusBody = serde_json::from_str(&body)?;

        match parsed.status {
            api::AuthorizationStatus::Pending => {
                log::debug!("{domain} still pending (attempt {attempt})");
                tokio::time::sleep(poll_delay).await;

                let res = req_get(auth_url).await?;
                let status = res.status();
                if !status.is_success() {
                    return Err(Error::AuthorizationStatusRequestFailed {
                        domain: domain.to_owned(),
                        status: status.as_u16(),
                    });
                }

                body = req_safe_read_body(res).await;
            }

            api::AuthorizationStatus::Valid => {
                log::debug!("Validating {domain}: done");
                return Ok(());
            }

            api::AuthorizationStatus::Invalid => {
                return Err(Error::DomainValidationFailed {
                    domain: domain.to_owned(),
                    detail: body,
                });
            }

            api::AuthorizationStatus::Unknown => {
                return Err(Error::UnexpectedAuthorizationState {
                    domain: domain.to_owned(),
                    body,
                });
            }
        }
    }

    Err(Error::ValidationTimedOut {
        domain: domain.to_owned(),
        attempts: max_poll_attempts,
    })
}
