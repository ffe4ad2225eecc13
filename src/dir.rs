use serde::Deserialize;

use crate::{
    error::Result,
    req::{read_json, req_get},
};

const LETSENCRYPT_URL: &str = "https://acme-v01.api.letsencrypt.org/directory";
const LETSENCRYPT_STAGING_URL: &str = "https://acme-staging.api.letsencrypt.org/directory";

/// Enumeration of known ACME v1 directory URLs.
#[derive(Debug, Clone)]
pub enum DirectoryUrl<'a> {
    /// The main Let's Encrypt v01 directory.
    ///
    /// Not appropriate for testing / development.
    LetsEncrypt,

    /// The staging Let's Encrypt v01 directory.
    ///
    /// Use for testing and development. Doesn't issue "valid" certificates.
    LetsEncryptStaging,

    /// An arbitrary directory URL to connect to.
    Other(&'a str),
}

impl DirectoryUrl<'_> {
    fn to_url(&self) -> &str {
        match self {
            DirectoryUrl::LetsEncrypt => LETSENCRYPT_URL,
            DirectoryUrl::LetsEncryptStaging => LETSENCRYPT_STAGING_URL,
            DirectoryUrl::Other(url) => url,
        }
    }
}

/// The endpoint map an ACME v1 server publishes at its directory URL.
///
/// Step URLs are also discovered incrementally through `Link` headers during
/// the protocol itself; the directory is the bootstrap.
#[derive(Debug, Clone, Deserialize)]
pub struct Directory {
    #[serde(rename = "new-reg")]
    pub new_reg: String,

    #[serde(rename = "new-authz")]
    pub new_authz: String,

    #[serde(rename = "new-cert")]
    pub new_cert: String,

    #[serde(rename = "revoke-cert")]
    pub revoke_cert: Option<String>,
}

impl Directory {
    /// Fetches and parses the directory document.
    pub async fn fetch(url: DirectoryUrl<'_>) -> Result<Directory> {
        let res = req_get(url.to_url()).await?;
        read_json(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{with_acme_server, ServerBehavior};

    #[tokio::test]
    async fn fetches_endpoint_map() {
        let server = with_acme_server(ServerBehavior::default());

        let dir = Directory::fetch(DirectoryUrl::Other(&server.dir_url))
            .await
            .unwrap();

        assert!(dir.new_reg.ends_with("/acme/new-reg"));
        assert!(dir.new_authz.ends_with("/acme/new-authz"));
        assert!(dir.new_cert.ends_with("/acme/new-cert"));
        assert!(dir.revoke_cert.is_some());
    }
}
