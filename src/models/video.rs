use serde::{Deserialize, Serialize};

/// Most popular video of a region together with its top comment.
///
/// `comment` is empty when the video has no comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMessage {
    pub video_id: String,
    pub comment: String,
}

impl VideoMessage {
    pub fn new(video_id: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            comment: comment.into(),
        }
    }
}
