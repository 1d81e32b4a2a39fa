use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::from_str;
use tracing::debug;

use crate::error::RagError;

/// Body and status of a completed request. Non-2xx statuses are kept so callers
/// can tell "not found" apart from "unavailable".
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

fn client(timeout: Duration) -> Result<Client, RagError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("chronobot/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RagError::http("(client)", e.to_string()))
}

fn read(url: &str, resp: Response) -> RawResponse {
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    debug!(url, %status, bytes = body.len(), "response received");
    RawResponse { status, body }
}

pub fn get_raw(url: &str, timeout: Duration) -> Result<RawResponse, RagError> {
    let resp = client(timeout)?
        .get(url)
        .send()
        .map_err(|e| RagError::http(url, e.to_string()))?;
    Ok(read(url, resp))
}

pub fn get_json<T: DeserializeOwned>(url: &str, timeout: Duration) -> Result<T, RagError> {
    let res = get_raw(url, timeout)?;
    if !res.status.is_success() {
        return Err(RagError::http(url, format!("GET failed: {} {}", res.status, res.body)));
    }
    from_str::<T>(&res.body)
        .map_err(|e| RagError::Decode(format!("GET {} decode failed: {} | {}", url, e, res.body)))
}

/// Posts a JSON body and returns the raw response text of a successful call.
pub fn post_text<B: Serialize>(url: &str, body: &B, timeout: Duration) -> Result<String, RagError> {
    let resp = client(timeout)?
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .json(body)
        .send()
        .map_err(|e| RagError::http(url, e.to_string()))?;
    let res = read(url, resp);
    if !res.status.is_success() {
        return Err(RagError::http(url, format!("POST failed: {} {}", res.status, res.body)));
    }
    Ok(res.body)
}

pub fn post_json<T: DeserializeOwned, B: Serialize>(
    url: &str,
    body: &B,
    timeout: Duration,
) -> Result<T, RagError> {
    let text = post_text(url, body, timeout)?;
    from_str::<T>(&text)
        .map_err(|e| RagError::Decode(format!("POST {} decode failed: {} | {}", url, e, text)))
}
