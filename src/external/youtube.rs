use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::trace;

use crate::external::video_provider::{FetchError, VideoProvider};

/// YouTube Data API v3 client.
pub struct YouTubeProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl YouTubeProvider {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        trace!(%url, "calling YouTube API");

        let resp = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::UpstreamUnavailable(format!("{} timed out", endpoint))
                } else {
                    FetchError::UpstreamUnavailable(e.to_string())
                }
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::UpstreamUnavailable(e.to_string()))?;

        if !status.is_success() {
            // Comments turned off by the uploader is an empty result, not an outage
            if status == StatusCode::FORBIDDEN && body.contains("commentsDisabled") {
                return Err(FetchError::NoData(format!("{}: comments disabled", endpoint)));
            }
            return Err(FetchError::UpstreamUnavailable(format!(
                "{} returned status {}",
                endpoint, status
            )));
        }

        serde_json::from_str(&body).map_err(|e| FetchError::MalformedResponse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ItemList<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CommentThread {
    snippet: CommentThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadSnippet {
    top_level_comment: Comment,
}

#[derive(Debug, Deserialize)]
struct Comment {
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    text_original: String,
}

#[async_trait]
impl VideoProvider for YouTubeProvider {
    async fn popular_video_id(&self, region: &str) -> Result<String, FetchError> {
        let body: ItemList<VideoItem> = self
            .get_json(
                "videos",
                &[
                    ("part", "id"),
                    ("chart", "mostPopular"),
                    ("regionCode", region),
                    ("maxResults", "1"),
                ],
            )
            .await?;

        body.items
            .into_iter()
            .next()
            .map(|item| item.id)
            .ok_or_else(|| FetchError::NoData(format!("no popular video for region {}", region)))
    }

    async fn top_comment(&self, video_id: &str) -> Result<String, FetchError> {
        let body: ItemList<CommentThread> = self
            .get_json(
                "commentThreads",
                &[
                    ("part", "snippet"),
                    ("videoId", video_id),
                    ("order", "relevance"),
                    ("maxResults", "1"),
                ],
            )
            .await?;

        body.items
            .into_iter()
            .next()
            .map(|thread| thread.snippet.top_level_comment.snippet.text_original)
            .ok_or_else(|| FetchError::NoData(format!("no comments for video {}", video_id)))
    }
}
