//! Delivery of the run's report to a reporting endpoint.
//!
//! The body is canonical JSON (sorted keys, no whitespace) and is signed
//! with HMAC-SHA256 over those exact bytes. The receiver recomputes the
//! signature from the raw body it received.

use crate::analysis::PushReport;
use crate::error::{Error, Result};
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;

pub const SIGNATURE_HEADER: &str = "X-Signature-256";

const TIMEOUT: Duration = Duration::from_secs(30);

/// Serialize with object keys in sorted order and no insignificant whitespace.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    // serde_json::Map is ordered by key, so a round trip through Value sorts
    // every object regardless of struct field order.
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| Error::InvalidKey)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub struct Reporter {
    client: reqwest::blocking::Client,
    endpoint: String,
    secret: String,
}

impl Reporter {
    pub fn new(endpoint: Option<String>, secret: Option<String>) -> Result<Self> {
        let endpoint = endpoint
            .filter(|e| !e.trim().is_empty())
            .ok_or(Error::MissingEndpoint)?;
        let secret = secret
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingSecret)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            secret,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the report once. Any non-success status is a failure.
    pub fn deliver(&self, report: &PushReport) -> Result<()> {
        let body = canonical_json(report)?;
        let signature = sign(self.secret.as_bytes(), &body)?;

        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, format!("sha256={}", signature))
            .body(body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(endpoint = %self.endpoint, status = status.as_u16(), "report delivered");
        Ok(())
    }
}
