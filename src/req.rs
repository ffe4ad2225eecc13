use std::{sync::OnceLock, time::Duration};

use serde::de;

use crate::error::{Error, Result};

/// Shared HTTP client with connect/read timeouts.
fn client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("constructing HTTP client")
    })
}

pub(crate) async fn req_get(url: &str) -> Result<reqwest::Response> {
    log::trace!("GET {url}");
    Ok(client().get(url).send().await?)
}

pub(crate) async fn req_head(url: &str) -> Result<reqwest::Response> {
    log::trace!("HEAD {url}");
    Ok(client().head(url).send().await?)
}

/// POSTs `body` as raw bytes, no forced content type.
pub(crate) async fn req_post(url: &str, body: String) -> Result<reqwest::Response> {
    log::trace!("POST {url} {body}");
    Ok(client().post(url).body(body).send().await?)
}

pub(crate) fn req_expect_header(res: &reqwest::Response, name: &'static str) -> Result<String> {
    res.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
        .ok_or(Error::MissingHeader { name })
}

/// Joins all `Link` headers into the single comma-separated form the parser
/// expects. Servers are free to split relations across header lines.
pub(crate) fn req_link_header(res: &reqwest::Response) -> Option<String> {
    let values = res
        .headers()
        .get_all("link")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>();

    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

pub(crate) async fn req_safe_read_body(res: reqwest::Response) -> String {
    // some CAs close the TLS connection abruptly even though the body
    // made it across; treat that as an empty remainder.
    res.text().await.unwrap_or_default()
}

pub(crate) async fn read_json<T: de::DeserializeOwned>(res: reqwest::Response) -> Result<T> {
    let body = req_safe_read_body(res).await;
    log::debug!("{body}");
    Ok(serde_json::from_str(&body)?)
}
