//! Payload verification.
//!
//! Every scanned payload is checked before it is stored. The verification
//! service receives the opaque payload and answers with a status and the
//! decoded flat record text; only an accepting status lets the record
//! through.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec;
use crate::error::{Error, Result};

/// Status the verification service returns for an acceptable payload.
pub const ACCEPTED_STATUS: &str = "estructura Correcta";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Verdict on one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub accepted: bool,
    /// Status text reported by the verifier.
    pub status: String,
    /// Decoded flat record text.
    pub data: String,
}

impl Verification {
    /// Build a verdict from a status string.
    #[must_use]
    pub fn from_status(status: impl Into<String>, data: impl Into<String>) -> Self {
        let status = status.into();
        Self {
            accepted: status == ACCEPTED_STATUS,
            status,
            data: data.into(),
        }
    }
}

/// Trait for payload verifiers.
///
/// Implemented by the HTTP service client and the offline verifier.
pub trait Verifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Verify one payload. Transport problems are errors; a rejection is an
    /// `Ok` verdict with `accepted == false`.
    fn verify(&self, payload: &str) -> impl Future<Output = Result<Verification>> + Send;
}

/// Boxed verifier for dynamic dispatch.
///
/// The trait returns `impl Future`, so runtime selection between verifiers
/// goes through this wrapper.
pub struct BoxedVerifier {
    inner: Box<dyn VerifierBoxed + Send + Sync>,
}

/// Object-safe version of [`Verifier`] for boxing.
pub trait VerifierBoxed: Send + Sync {
    fn name(&self) -> &'static str;
    fn verify_boxed(&self, payload: &str) -> Pin<Box<dyn Future<Output = Result<Verification>> + Send + '_>>;
}

impl BoxedVerifier {
    pub fn new<V: Verifier + 'static>(verifier: V) -> Self {
        Self {
            inner: Box::new(BoxedVerifierWrapper(verifier)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Verify one payload.
    ///
    /// # Errors
    ///
    /// Returns the underlying verifier's error.
    pub async fn verify(&self, payload: &str) -> Result<Verification> {
        self.inner.verify_boxed(payload).await
    }
}

struct BoxedVerifierWrapper<V: Verifier + 'static>(V);

impl<V: Verifier + 'static> VerifierBoxed for BoxedVerifierWrapper<V> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn verify_boxed(&self, payload: &str) -> Pin<Box<dyn Future<Output = Result<Verification>> + Send + '_>> {
        let payload = payload.to_string();
        Box::pin(async move { self.0.verify(&payload).await })
    }
}

/// Pick the verifier for an optional service URL.
#[must_use]
pub fn create_verifier(url: Option<&str>) -> BoxedVerifier {
    match url.filter(|u| !u.trim().is_empty()) {
        Some(url) => BoxedVerifier::new(HttpVerifier::new(url)),
        None => BoxedVerifier::new(LocalVerifier),
    }
}

// ── HTTP ──────────────────────────────────────────────────────

/// Verification service request body.
#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    data: &'a str,
}

/// Verification service response body.
#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(rename = "Correcto")]
    status: String,
    #[serde(default)]
    data: String,
}

/// Client for the remote verification service.
pub struct HttpVerifier {
    client: reqwest::Client,
    url: String,
}

impl HttpVerifier {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    fn parse_response(body: &str) -> Result<Verification> {
        let response: VerifyResponse = serde_json::from_str(body)
            .map_err(|e| Error::Transport(format!("invalid verification response: {e}")))?;
        Ok(Verification::from_status(response.status, response.data))
    }
}

impl Verifier for HttpVerifier {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn verify(&self, payload: &str) -> Result<Verification> {
        let response = self
            .client
            .post(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .json(&VerifyRequest { data: payload })
            .send()
            .await
            .map_err(|e| Error::Transport(format!("verification request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("verification response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "verification failed with {status}: {body}"
            )));
        }

        debug!(url = %self.url, "Verification response received");
        Self::parse_response(&body)
    }
}

// ── Offline ───────────────────────────────────────────────────

/// Offline verifier: decodes the payload itself and accepts it when it
/// yields a valid record.
///
/// Payloads already in flat `key:value` form are taken as is; anything
/// else is treated as base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalVerifier;

impl LocalVerifier {
    fn check(payload: &str) -> Verification {
        let payload = payload.trim();
        let text = if payload.contains(':') {
            payload.to_string()
        } else {
            match codec::decode_payload(payload) {
                Ok(text) => text,
                Err(e) => return Verification::from_status(e.to_string(), ""),
            }
        };

        match codec::decode_strict(&text) {
            Ok(_) => Verification::from_status(ACCEPTED_STATUS, text),
            Err(e) => Verification::from_status(e.to_string(), text),
        }
    }
}

impl Verifier for LocalVerifier {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn verify(&self, payload: &str) -> Result<Verification> {
        Ok(Self::check(payload))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    /// Verifier returning a scripted verdict.
    #[derive(Debug, Default)]
    pub struct ScriptedVerifier {
        reject: Mutex<Option<String>>,
        fail: AtomicBool,
        pub calls: AtomicUsize,
    }

    impl ScriptedVerifier {
        /// Accepts everything and echoes decoded base64 (or plain) payloads.
        pub fn accepting() -> Self {
            Self::default()
        }

        pub fn rejecting(status: &str) -> Self {
            let verifier = Self::default();
            *verifier.reject.lock().unwrap() = Some(status.to_string());
            verifier
        }

        pub fn failing() -> Self {
            let verifier = Self::default();
            verifier.fail.store(true, Ordering::SeqCst);
            verifier
        }
    }

    impl Verifier for ScriptedVerifier {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn verify(&self, payload: &str) -> Result<Verification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Transport("verifier offline".to_string()));
            }
            let data = codec::decode_payload(payload).unwrap_or_else(|_| payload.to_string());
            let status = self.reject.lock().unwrap().clone();
            Ok(match status {
                Some(status) => Verification::from_status(status, data),
                None => Verification::from_status(ACCEPTED_STATUS, data),
            })
        }
    }
}
