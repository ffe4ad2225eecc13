//! Nonce-aware signed transport.
//!
//! Every ACME v1 POST carries exactly one replay nonce inside its JWS
//! envelope. The pool is refilled from the `replay-nonce` header of every
//! response we see, successful or not; when it runs dry a single HEAD
//! request against the target URL fetches a fresh one.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use serde::Serialize;

use crate::{
    error::{Error, Result},
    jws,
    key::KeyPair,
    req::{req_head, req_post},
};

/// Signs and POSTs request payloads, tracking replay nonces.
///
/// Owned by a single issuance run; never shared across runs.
#[derive(Debug)]
pub(crate) struct Transport {
    key: Arc<KeyPair>,
    nonce_pool: NoncePool,
}

impl Transport {
    pub(crate) fn new(key: Arc<KeyPair>) -> Self {
        Transport {
            key,
            nonce_pool: NoncePool::default(),
        }
    }

    /// The account key used for signing.
    pub(crate) fn key(&self) -> &KeyPair {
        &self.key
    }

    /// Signs `body` with the next nonce and POSTs it to `url`.
    ///
    /// Returns the raw response; interpreting the status code is the
    /// caller's job. Nothing is retried here beyond the implicit nonce
    /// fetch when the pool is empty.
    pub(crate) async fn post<T>(&self, url: &str, body: &T) -> Result<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        let nonce = self.nonce_pool.take(url).await?;
        log::trace!("Using nonce: {nonce}");

        let payload = serde_json::to_vec(body)?;
        let jws = jws::sign(&self.key, &payload, nonce)?;
        let signed = serde_json::to_string(&jws)?;

        log::debug!("Call endpoint: {url}");
        let res = req_post(url, signed).await?;

        // error responses may still carry a nonce; keep it either way
        self.nonce_pool.extract(&res);

        Ok(res)
    }

    #[cfg(test)]
    pub(crate) fn pooled_nonces(&self) -> usize {
        self.nonce_pool.pool.lock().len()
    }
}

/// FIFO queue of unconsumed replay nonces.
#[derive(Debug, Default)]
struct NoncePool {
    pool: Mutex<VecDeque<String>>,
}

impl NoncePool {
    fn extract(&self, res: &reqwest::Response) {
        if let Some(nonce) = res
            .headers()
            .get("replay-nonce")
            .and_then(|value| value.to_str().ok())
        {
            log::trace!("Storing nonce: {nonce}");
            self.pool.lock().push_back(nonce.to_owned());
        }
    }

    /// Pops the oldest nonce, or HEADs `url` once for a fresh one.
    async fn take(&self, url: &str) -> Result<String> {
        if let Some(nonce) = self.pool.lock().pop_front() {
            log::trace!("Use previous nonce");
            return Ok(nonce);
        }

        log::debug!("Request new nonce from {url}");
        let res = req_head(url).await?;

        res.headers()
            .get("replay-nonce")
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned)
            .ok_or_else(|| Error::NonceUnavailable {
                url: url.to_owned(),
            })
    }
}
