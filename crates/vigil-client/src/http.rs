//! Shared request plumbing and error mapping.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use vigil_core::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))
}

/// Base URL without a trailing slash.
pub(crate) fn base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

pub(crate) fn transport(err: reqwest::Error) -> Error {
    Error::Network(err.to_string())
}

/// Turn a non-success response into the matching error.
pub(crate) async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, body))
}

pub(crate) fn status_error(status: StatusCode, body: String) -> Error {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::AuthenticationFailed(message),
        s if s.is_server_error() => Error::Network(message),
        s => Error::Api {
            status: s.as_u16(),
            message,
        },
    }
}

pub(crate) async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
    let response = check(builder.send().await.map_err(transport)?).await?;
    response
        .json()
        .await
        .map_err(|e| Error::Serialization(format!("invalid response body: {}", e)))
}

pub(crate) async fn send(builder: RequestBuilder) -> Result<()> {
    check(builder.send().await.map_err(transport)?).await?;
    Ok(())
}
