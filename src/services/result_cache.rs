use std::sync::Arc;

use dashmap::DashMap;

use crate::domain::Principal;
use crate::models::VideoMessage;

/// Latest fetched video message per principal.
///
/// Last write wins and entries never expire: a stale message is served
/// rather than nothing. Logging out does not clear the entry.
#[derive(Clone, Default)]
pub struct ResultCache {
    cache: Arc<DashMap<Principal, VideoMessage>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Overwrite the cached message for a principal
    pub fn put(&self, principal: &Principal, message: VideoMessage) {
        self.cache.insert(principal.clone(), message);
    }

    /// `None` until the first successful fetch for this principal
    pub fn get(&self, principal: &Principal) -> Option<VideoMessage> {
        self.cache.get(principal).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }
}
