use anyhow::{Result, bail};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{Tool, require_str, url_parameters};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Video and playlist identifiers found in a YouTube URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YoutubeIds {
    pub video: Option<String>,
    pub playlist: Option<String>,
}

impl YoutubeIds {
    /// Read `v` and `list` from the query string. `youtu.be/<id>` short links
    /// carry the video id in the path instead.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim())?;
        let mut ids = Self::default();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "v" if ids.video.is_none() && !value.is_empty() => {
                    ids.video = Some(value.into_owned())
                }
                "list" if ids.playlist.is_none() && !value.is_empty() => {
                    ids.playlist = Some(value.into_owned())
                }
                _ => {}
            }
        }

        if ids.video.is_none()
            && url.host_str() == Some("youtu.be")
            && let Some(id) = url.path_segments().and_then(|mut s| s.next())
            && !id.is_empty()
        {
            ids.video = Some(id.to_string());
        }

        Ok(ids)
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.playlist.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub channel_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistInfo {
    pub title: String,
    pub description: String,
    pub video_count: u64,
}

/// Looks up video and playlist metadata through the YouTube Data API.
pub struct YoutubeTool {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl YoutubeTool {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: API_BASE.to_string(),
        }
    }

    /// Point at a different API root (a proxy or a local fake).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn list<T: for<'de> Deserialize<'de>>(
        &self,
        resource: &str,
        part: &str,
        id: &str,
        key: &str,
    ) -> Result<Vec<T>> {
        let url = Url::parse_with_params(
            &format!("{}/{}", self.base_url, resource),
            &[("part", part), ("id", id), ("key", key)],
        )?;
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("YouTube API error ({}): {}", status, text);
        }
        let body: ListResponse<T> = resp.json().await?;
        Ok(body.items)
    }

    async fn video_info(&self, id: &str, key: &str) -> Result<Option<VideoInfo>> {
        let items: Vec<VideoItem> = self
            .list("videos", "snippet,contentDetails,statistics", id, key)
            .await?;
        Ok(items.into_iter().next().map(|item| VideoInfo {
            title: item.snippet.title,
            description: item.snippet.description,
            tags: item.snippet.tags,
            channel_title: item.snippet.channel_title,
        }))
    }

    async fn playlist_info(&self, id: &str, key: &str) -> Result<Option<PlaylistInfo>> {
        let items: Vec<PlaylistItem> = self
            .list("playlists", "snippet,contentDetails", id, key)
            .await?;
        Ok(items.into_iter().next().map(|item| PlaylistInfo {
            title: item.snippet.title,
            description: item.snippet.description,
            video_count: item.content_details.item_count,
        }))
    }
}

/// Collapse a lookup into the JSON slot for it. Not-found and failed lookups
/// both become `null`; failures are also reported back to the caller.
fn slot<T: Serialize>(
    label: &str,
    id: &str,
    lookup: Result<Option<T>>,
    errors: &mut Vec<String>,
) -> Value {
    match lookup {
        Ok(Some(info)) => serde_json::to_value(info).unwrap_or(Value::Null),
        Ok(None) => {
            warn!(%id, "no {} found", label);
            Value::Null
        }
        Err(e) => {
            warn!(%id, error = %e, "{} lookup failed", label);
            errors.push(format!("{} {}: {}", label, id, e));
            Value::Null
        }
    }
}

#[async_trait]
impl Tool for YoutubeTool {
    fn name(&self) -> &str {
        "get_youtube_info"
    }

    fn description(&self) -> &str {
        "Takes a YouTube URL and extracts the video or playlist information such as \
         title, description, tags, channel and video count."
    }

    fn parameters(&self) -> Value {
        url_parameters("The YouTube video or playlist URL.")
    }

    async fn execute(&self, args: &Value) -> Result<Value> {
        let raw = require_str(args, "url")?;
        let ids = YoutubeIds::parse(raw)
            .map_err(|e| anyhow::anyhow!("Failed to fetch or process the URL. Error: {}", e))?;
        if ids.is_empty() {
            bail!("no video or playlist id found in {}", raw);
        }
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("YouTube lookups are not configured (YOUTUBE_API_KEY)"))?;

        let mut info = serde_json::Map::new();
        let mut errors = Vec::new();

        if let Some(id) = &ids.playlist {
            let lookup = self.playlist_info(id, key).await;
            info.insert("playlist_info".into(), slot("playlist", id, lookup, &mut errors));
        }
        if let Some(id) = &ids.video {
            let lookup = self.video_info(id, key).await;
            info.insert("video_info".into(), slot("video", id, lookup, &mut errors));
        }

        if errors.len() == info.len() {
            bail!("{}", errors.join("; "));
        }
        Ok(Value::Object(info))
    }
}

// --- API types ---

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct VideoItem {
    snippet: VideoSnippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    channel_title: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    snippet: PlaylistSnippet,
    content_details: PlaylistDetails,
}

#[derive(Deserialize)]
struct PlaylistSnippet {
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistDetails {
    #[serde(default)]
    item_count: u64,
}
