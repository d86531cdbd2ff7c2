use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::models::VideoMessage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport failure, timeout or non-success status on either call.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The call succeeded but the result set was empty.
    #[error("no data: {0}")]
    NoData(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::UpstreamUnavailable(_) => "upstream_unavailable",
            FetchError::NoData(_) => "no_data",
            FetchError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Source of the "most popular video + top comment" pair for a region.
///
/// Implementations are stateless apart from their HTTP client and never
/// retry: the next scheduled tick is the retry.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Resolve the most popular video id for `region`.
    async fn popular_video_id(&self, region: &str) -> Result<String, FetchError>;

    /// Resolve the most relevant top-level comment for `video_id`.
    async fn top_comment(&self, video_id: &str) -> Result<String, FetchError>;

    /// Run both calls in sequence.
    ///
    /// A video without comments still yields a message with an empty
    /// comment; any other failure of the second call fails the fetch.
    async fn fetch(&self, region: &str) -> Result<VideoMessage, FetchError> {
        let video_id = self.popular_video_id(region).await?;

        let comment = match self.top_comment(&video_id).await {
            Ok(comment) => comment,
            Err(FetchError::NoData(msg)) => {
                debug!(%video_id, "no comment for video: {}", msg);
                String::new()
            }
            Err(e) => return Err(e),
        };

        Ok(VideoMessage::new(video_id, comment))
    }
}
