use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{ActivitySource, Fingerprint, PollResult, Snapshot};
use crate::config::{FingerprintMode, MonitorConfig};
use crate::error::FetchError;

/// App id the public web client sends; the profile endpoint rejects requests without it.
const IG_APP_ID: &str = "936619743392459";
const CLIENT_UA: &str = concat!("activity-monitor/", env!("CARGO_PKG_VERSION"));
/// Posts included in a digest fingerprint.
const DIGEST_WINDOW: usize = 12;
const CAPTION_EXCERPT_CHARS: usize = 120;
/// Fingerprint used for a profile with no posts.
pub const EMPTY_PROFILE: &str = "none";

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    data: ProfileData,
}
#[derive(Debug, Deserialize)]
struct ProfileData {
    user: Option<User>,
}
#[derive(Debug, Deserialize)]
struct User {
    edge_owner_to_timeline_media: Timeline,
}
#[derive(Debug, Deserialize)]
struct Timeline {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    edges: Vec<Edge>,
}
#[derive(Debug, Deserialize)]
struct Edge {
    node: Post,
}
#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    shortcode: Option<String>,
    #[serde(default)]
    edge_media_to_caption: Option<CaptionEdges>,
}
#[derive(Debug, Deserialize)]
struct CaptionEdges {
    #[serde(default)]
    edges: Vec<CaptionEdge>,
}
#[derive(Debug, Deserialize)]
struct CaptionEdge {
    node: CaptionNode,
}
#[derive(Debug, Deserialize)]
struct CaptionNode {
    text: String,
}

pub struct InstagramSource {
    username: String,
    endpoint: String,
    mode: FingerprintMode,
    client: Client,
}

impl InstagramSource {
    pub fn new(cfg: &MonitorConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(cfg.http_timeout)
            .build()
            .context("building instagram http client")?;
        Ok(Self {
            username: cfg.username.clone(),
            endpoint: cfg.instagram_api_url.clone(),
            mode: cfg.fingerprint_mode,
            client,
        })
    }
}

#[async_trait]
impl ActivitySource for InstagramSource {
    async fn poll(&self) -> PollResult {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("username", self.username.as_str())])
            .header("x-ig-app-id", IG_APP_ID)
            .header(USER_AGENT, CLIENT_UA)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        parse_profile(&body, self.mode, Utc::now())
    }

    fn name(&self) -> &str {
        "instagram"
    }
}

/// Reduce a `web_profile_info` body to a snapshot.
pub fn parse_profile(body: &str, mode: FingerprintMode, now: DateTime<Utc>) -> PollResult {
    let parsed: ProfileResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    let user = parsed
        .data
        .user
        .ok_or_else(|| FetchError::Malformed("profile has no user (private or missing)".into()))?;
    let timeline = user.edge_owner_to_timeline_media;

    let latest = timeline.edges.first().map(|e| &e.node);
    let fingerprint = match mode {
        FingerprintMode::LatestPost => latest
            .map(|p| Fingerprint::new(p.id.clone()))
            .unwrap_or_else(|| Fingerprint::from(EMPTY_PROFILE)),
        FingerprintMode::Digest => digest(timeline.count, &timeline.edges),
    };

    let mut snapshot = Snapshot::new(fingerprint, now);
    if let Some(post) = latest {
        snapshot = snapshot.with_detail(describe(post));
    }
    Ok(snapshot)
}

fn digest(count: u64, edges: &[Edge]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(format!("count:{count}\n"));
    for e in edges.iter().take(DIGEST_WINDOW) {
        hasher.update(e.node.id.as_bytes());
        hasher.update(b"\n");
    }
    let hex: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    Fingerprint::new(hex)
}

fn describe(post: &Post) -> String {
    let link = match &post.shortcode {
        Some(code) => format!("https://www.instagram.com/p/{code}/"),
        None => format!("post {}", post.id),
    };
    let caption = post
        .edge_media_to_caption
        .as_ref()
        .and_then(|c| c.edges.first())
        .map(|c| excerpt(&c.node.text));
    match caption {
        Some(text) if !text.is_empty() => format!("{link}\n{text}"),
        _ => link,
    }
}

fn excerpt(text: &str) -> String {
    let one_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() <= CAPTION_EXCERPT_CHARS {
        return one_line;
    }
    let mut out: String = one_line.chars().take(CAPTION_EXCERPT_CHARS).collect();
    out.push('…');
    out
}
