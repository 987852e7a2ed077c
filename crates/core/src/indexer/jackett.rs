//! Jackett (Torznab aggregator) indexer.
//!
//! Searches go through Jackett's JSON results API; capabilities come from
//! the Torznab `t=caps` document of the configured indexer id.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::release::parse_release;
use crate::torrent::info_hash_from_magnet;

use super::rate_limiter::{RateLimitPolicy, RateLimiterPool, RequestBudget};
use super::{
    CapabilityCategory, CapabilitySet, Indexer, IndexerConfig, IndexerError, IndexerInfo,
    SearchOptions, SearchResult,
};

/// Category ids at or above this value are tracker-specific.
const CUSTOM_CATEGORY_BASE: u32 = 100_000;

static CAPS_CATEGORY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<(?:category|subcat) id="(\d+)" name="([^"]*)""#).unwrap());
static CAPS_LIMITS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<limits[^>]*max="(\d+)""#).unwrap());
static TORZNAB_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<error code="(\d+)" description="([^"]*)""#).unwrap());

pub struct JackettIndexer {
    client: Client,
    config: IndexerConfig,
    policy: RateLimitPolicy,
    limiter: Arc<RateLimiterPool>,
}

impl JackettIndexer {
    pub fn new(config: IndexerConfig, limiter: Arc<RateLimiterPool>) -> Result<Self, IndexerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IndexerError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            policy: RateLimitPolicy::from_config(&config),
            config,
            limiter,
        })
    }

    fn indexer_url(&self) -> String {
        format!(
            "{}/api/v2.0/indexers/{}",
            self.config.endpoint.trim_end_matches('/'),
            urlencoding::encode(&self.config.indexer)
        )
    }

    fn api_key(&self) -> &str {
        self.config.api_key.as_deref().unwrap_or_default()
    }

    fn build_search_url(&self, query: &str, opts: &SearchOptions) -> String {
        let mut url = format!(
            "{}/results?apikey={}&Query={}",
            self.indexer_url(),
            urlencoding::encode(self.api_key()),
            urlencoding::encode(query)
        );

        let categories: Vec<u32> = match opts.media_type {
            Some(media) => media.category_ids().to_vec(),
            None => self.config.categories.clone(),
        };
        for cat in categories {
            url.push_str(&format!("&Category[]={}", cat));
        }
        url
    }

    fn build_caps_url(&self) -> String {
        format!(
            "{}/results/torznab/api?apikey={}&t=caps",
            self.indexer_url(),
            urlencoding::encode(self.api_key())
        )
    }

    async fn get(&self, url: &str) -> Result<String, IndexerError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs * 1000);
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(&self.config.name, status, retry_after, &body));
        }

        response.text().await.map_err(map_reqwest_error)
    }
}

#[async_trait]
impl Indexer for JackettIndexer {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> &'static str {
        "jackett"
    }

    async fn test_connection(&self) -> Result<IndexerInfo, IndexerError> {
        let caps = self.get_capabilities().await?;
        Ok(IndexerInfo {
            name: self.config.name.clone(),
            kind: self.kind().to_string(),
            message: format!(
                "Connected to {} ({} categories)",
                self.config.indexer,
                caps.categories.len()
            ),
        })
    }

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>, IndexerError> {
        let url = self.build_search_url(query, opts);
        let budget = RequestBudget::new(self.policy.request_budget);

        debug!(indexer = %self.config.name, query = %query, "Searching Jackett");
        let body = self
            .limiter
            .run(&self.config.name, &self.policy, &budget, || self.get(&url))
            .await?;

        let response: JackettResponse = serde_json::from_str(&body)
            .map_err(|e| IndexerError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let results = convert_results(&self.config.name, response);
        let results = paginate(
            results
                .into_iter()
                .filter(|r| r.seeders >= opts.min_seeders)
                .filter(|r| match (opts.media_type, r.category) {
                    (Some(media), Some(cat)) => media.contains(cat),
                    _ => true,
                })
                .collect(),
            opts.page,
            self.config.page_size,
        );

        debug!(
            indexer = %self.config.name,
            results = results.len(),
            requests = budget.used(),
            "Jackett search complete"
        );
        Ok(results)
    }

    async fn get_capabilities(&self) -> Result<CapabilitySet, IndexerError> {
        let url = self.build_caps_url();
        let budget = RequestBudget::new(self.policy.request_budget);
        let body = self
            .limiter
            .run(&self.config.name, &self.policy, &budget, || self.get(&url))
            .await?;
        parse_caps(&self.config.name, &body)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> IndexerError {
    if e.is_timeout() {
        IndexerError::Timeout
    } else if e.is_connect() {
        IndexerError::ConnectionFailed(e.to_string())
    } else if e.is_decode() {
        IndexerError::InvalidResponse(e.to_string())
    } else {
        IndexerError::ConnectionFailed(e.to_string())
    }
}

fn map_status(
    indexer: &str,
    status: StatusCode,
    retry_after_ms: Option<u64>,
    body: &str,
) -> IndexerError {
    let snippet: String = body.chars().take(200).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            IndexerError::AuthFailed(format!("HTTP {}", status))
        }
        StatusCode::NOT_FOUND => IndexerError::NotFound(format!("indexer {}", indexer)),
        StatusCode::TOO_MANY_REQUESTS => IndexerError::RateLimited {
            indexer: indexer.to_string(),
            retry_after_ms,
        },
        s if s.is_server_error() => {
            IndexerError::ConnectionFailed(format!("HTTP {}: {}", status, snippet))
        }
        _ => IndexerError::InvalidResponse(format!("HTTP {}: {}", status, snippet)),
    }
}

fn convert_results(indexer: &str, response: JackettResponse) -> Vec<SearchResult> {
    response
        .Results
        .into_iter()
        .filter_map(|r| {
            let info_hash = r
                .InfoHash
                .filter(|h| !h.is_empty())
                .map(|h| h.to_lowercase())
                .or_else(|| r.MagnetUri.as_deref().and_then(info_hash_from_magnet));

            let Some(reference) = r.MagnetUri.or(r.Link) else {
                debug!(indexer = %indexer, title = %r.Title, "Skipping result without link");
                return None;
            };

            let seeders = r.Seeders.unwrap_or(0).max(0);
            let peers = r.Peers.unwrap_or(0).max(0);

            Some(SearchResult {
                quality: parse_release(&r.Title).quality,
                title: r.Title,
                size_bytes: r.Size.unwrap_or(0).max(0) as u64,
                seeders: seeders as u32,
                leechers: peers.saturating_sub(seeders) as u32,
                reference,
                info_hash,
                indexer: indexer.to_string(),
                category: r
                    .Category
                    .into_iter()
                    .find(|c| *c < CUSTOM_CATEGORY_BASE),
                publish_date: r.PublishDate.as_deref().and_then(parse_jackett_date),
                details_url: r.Details,
            })
        })
        .collect()
}

fn paginate(results: Vec<SearchResult>, page: u32, page_size: u32) -> Vec<SearchResult> {
    let size = page_size.max(1) as usize;
    results
        .into_iter()
        .skip(page as usize * size)
        .take(size)
        .collect()
}

fn parse_caps(indexer: &str, xml: &str) -> Result<CapabilitySet, IndexerError> {
    if let Some(caps) = TORZNAB_ERROR.captures(xml) {
        let code: u32 = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let description = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        return Err(match code {
            100..=102 => IndexerError::AuthFailed(description.to_string()),
            429 | 500 => IndexerError::RateLimited {
                indexer: indexer.to_string(),
                retry_after_ms: None,
            },
            _ => IndexerError::InvalidResponse(format!("torznab error {}: {}", code, description)),
        });
    }
    if !xml.contains("<caps") {
        return Err(IndexerError::InvalidResponse(
            "missing <caps> document".to_string(),
        ));
    }

    let available = |tag: &str| {
        Regex::new(&format!(r#"<{}\s[^>]*available="yes""#, tag))
            .map(|re| re.is_match(xml))
            .unwrap_or(false)
    };

    let categories = CAPS_CATEGORY
        .captures_iter(xml)
        .filter_map(|caps| {
            Some(CapabilityCategory {
                id: caps.get(1)?.as_str().parse().ok()?,
                name: caps.get(2)?.as_str().to_string(),
            })
        })
        .collect();

    Ok(CapabilitySet {
        search: available("search"),
        tv_search: available("tv-search"),
        movie_search: available("movie-search"),
        categories,
        max_results: CAPS_LIMITS
            .captures(xml)
            .and_then(|caps| caps.get(1)?.as_str().parse().ok()),
    })
}

/// Jackett reports RFC 3339 dates, sometimes without an offset.
fn parse_jackett_date(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    MagnetUri: Option<String>,
    Link: Option<String>,
    InfoHash: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i64>,
    Peers: Option<i64>,
    #[serde(default)]
    Category: Vec<u32>,
    PublishDate: Option<String>,
    Details: Option<String>,
}
