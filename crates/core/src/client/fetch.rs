//! Resolving plain URLs into something a client can add.

use std::time::Duration;

use reqwest::{redirect, Client, StatusCode};
use tracing::debug;

use crate::torrent::{info_hash_from_magnet, info_hash_from_torrent};

use super::{AddInput, ClientError};

const MAX_REDIRECTS: usize = 5;

/// HTTP client that stops (instead of failing) on a redirect to a magnet.
pub(crate) fn torrent_fetcher(timeout: Duration) -> Result<Client, ClientError> {
    let policy = redirect::Policy::custom(|attempt| {
        if attempt.url().scheme() == "magnet" {
            attempt.stop()
        } else if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    });
    Client::builder()
        .timeout(timeout)
        .redirect(policy)
        .build()
        .map_err(|e| ClientError::ConnectionFailed(e.to_string()))
}

/// Download a `.torrent` behind `url`.
///
/// Indexer download links often redirect to a magnet URI; that case
/// yields `AddInput::Magnet`.
pub(crate) async fn resolve_url(client: &Client, url: &str) -> Result<AddInput, ClientError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(ClientError::from_reqwest)?;

    let status = response.status();
    if status.is_redirection() {
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if location.starts_with("magnet:") {
            debug!(url = %url, "Download link redirected to magnet");
            return Ok(AddInput::Magnet(location.to_string()));
        }
        return Err(ClientError::InvalidInput(format!(
            "unexpected redirect to {}",
            location
        )));
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(ClientError::AuthFailed(format!("HTTP {} fetching torrent", status)))
        }
        StatusCode::NOT_FOUND => return Err(ClientError::NotFound(url.to_string())),
        s if !s.is_success() => {
            return Err(ClientError::InvalidResponse(format!(
                "HTTP {} fetching torrent",
                status
            )))
        }
        _ => {}
    }

    let data = response
        .bytes()
        .await
        .map_err(ClientError::from_reqwest)?
        .to_vec();
    let filename = url
        .rsplit('/')
        .next()
        .filter(|s| s.ends_with(".torrent"))
        .map(str::to_string);

    Ok(AddInput::TorrentFile { data, filename })
}

/// Resolve URLs and derive the info hash the client will report.
pub(crate) async fn prepare(
    fetcher: &Client,
    input: AddInput,
) -> Result<(AddInput, String), ClientError> {
    let input = match input {
        AddInput::Url(url) => resolve_url(fetcher, &url).await?,
        other => other,
    };

    let id = match &input {
        AddInput::Magnet(uri) => info_hash_from_magnet(uri).ok_or_else(|| {
            ClientError::InvalidInput(format!("magnet without btih hash: {}", uri))
        })?,
        AddInput::TorrentFile { data, .. } => {
            info_hash_from_torrent(data).map_err(|e| ClientError::InvalidInput(e.to_string()))?
        }
        AddInput::Url(url) => {
            return Err(ClientError::InvalidInput(format!("unresolved url {}", url)))
        }
    };
    Ok((input, id))
}
