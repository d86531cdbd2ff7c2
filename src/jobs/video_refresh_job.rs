use std::sync::Arc;

use tracing::{debug, trace};

use crate::domain::Principal;
use crate::external::video_provider::VideoProvider;
use crate::services::result_cache::ResultCache;

/// Result of a single tick, kept for run statistics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Updated,
    Skipped(&'static str),
}

/// Refreshes one principal's popular video message.
///
/// The region is frozen when the job is built; a region change means a new
/// job. A failed tick leaves the cached message as it was.
#[derive(Clone)]
pub struct VideoRefreshJob {
    principal: Principal,
    region: String,
    provider: Arc<dyn VideoProvider>,
    cache: ResultCache,
}

impl VideoRefreshJob {
    pub fn new(
        principal: Principal,
        region: String,
        provider: Arc<dyn VideoProvider>,
        cache: ResultCache,
    ) -> Self {
        Self {
            principal,
            region,
            provider,
            cache,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Run one tick. Never returns an error: fetch failures are logged and
    /// the next tick is the retry.
    pub async fn run(&self) -> TickOutcome {
        trace!(principal = %self.principal, region = %self.region, "refreshing video message");

        match self.provider.fetch(&self.region).await {
            Ok(message) => {
                trace!(principal = %self.principal, video_id = %message.video_id, "video message updated");
                self.cache.put(&self.principal, message);
                TickOutcome::Updated
            }
            Err(e) => {
                debug!(
                    principal = %self.principal,
                    region = %self.region,
                    kind = e.kind(),
                    "skipping tick: {}",
                    e
                );
                TickOutcome::Skipped(e.kind())
            }
        }
    }
}
