//! The final protocol step: CSR in, certificate chain out.

use base64::prelude::*;
use reqwest::StatusCode;

use crate::{
    api,
    cert::{cert_der_to_pem, create_csr},
    error::{Error, Result},
    key::KeyPair,
    link::parse_link,
    req::{req_expect_header, req_get, req_link_header, req_safe_read_body},
    trans::Transport,
};

/// Requests a certificate for `domains` using the given validated
/// authorizations.
///
/// The inline DER body is cross-checked against a fresh download from the
/// `Location` URL before it is trusted; any difference fails the run.
/// Returns the leaf and issuer certificates as PEM.
pub(crate) async fn issue_certificate(
    trans: &Transport,
    domain_key: &KeyPair,
    domains: &[String],
    authz_urls: &[String],
    new_cert_url: &str,
) -> Result<(String, String)> {
    log::debug!("Requesting certificate for {domains:?}");

    let csr = create_csr(domain_key, domains)?;
    let csr = BASE64_URL_SAFE_NO_PAD.encode(csr);

    let res = trans
        .post(
            new_cert_url,
            &api::NewCertificate::new(csr, authz_urls.to_vec()),
        )
        .await?;

    let status = res.status();
    if !status.is_success() {
        let body = req_safe_read_body(res).await;
        return Err(Error::CertificateRequestFailed {
            status: status.as_u16(),
            body,
        });
    }

    let links = parse_link(req_link_header(&res).as_deref()).ok_or(Error::MissingIssuerLink)?;
    let issuer_url = links.get("up").cloned().ok_or(Error::MissingIssuerLink)?;
    let cert_url = req_expect_header(&res, "location")?;

    let inline_der = res.bytes().await?;

    // trust, but verify: the certificate must also be retrievable from its
    // canonical URL and byte-identical to what came inline
    let res = req_get(&cert_url).await?;
    let status = res.status();
    if status != StatusCode::OK {
        return Err(Error::CertificateRefetchFailed {
            url: cert_url,
            status: status.as_u16(),
        });
    }

    let refetched_der = res.bytes().await?;
    if refetched_der != inline_der {
        return Err(Error::CertificateMismatch { url: cert_url });
    }
    log::debug!("Verified certificate against {cert_url}");

    let res = req_get(&issuer_url).await?;
    let status = res.status();
    if status != StatusCode::OK {
        return Err(Error::IssuerCertificateFetchFailed {
            url: issuer_url,
            status: status.as_u16(),
        });
    }
    let issuer_der = res.bytes().await?;

    Ok((cert_der_to_pem(&inline_der)?, cert_der_to_pem(&issuer_der)?))
}
