use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::domain::Principal;
use crate::errors::AppError;
use crate::models::{
    normalize_country, validate_time_interval, LoginRequest, NewUser, UserRecord, UserResponse,
    VideoMessage,
};
use crate::services::auth_service::{hash_password, verify_password, TokenService};
use crate::services::job_registry::{JobRegistry, JobSummary, SchedulerError};
use crate::services::result_cache::ResultCache;
use crate::store::UserStore;

/// Account operations and the job lifecycle they drive.
///
/// Login starts the user's refresh job, logout stops it, and a settings
/// change is persisted before the running job is replaced. Each "read or
/// write the row, then schedule" pair runs under a per-user lock, so the job
/// always ends up with the settings that were stored last.
#[derive(Clone)]
pub struct UserService {
    store: Arc<UserStore>,
    registry: Arc<JobRegistry>,
    cache: ResultCache,
    tokens: TokenService,
    settings_locks: Arc<DashMap<Principal, Arc<Mutex<()>>>>,
}

impl UserService {
    pub fn new(
        store: Arc<UserStore>,
        registry: Arc<JobRegistry>,
        cache: ResultCache,
        tokens: TokenService,
    ) -> Self {
        Self {
            store,
            registry,
            cache,
            tokens,
            settings_locks: Arc::new(DashMap::new()),
        }
    }

    async fn lock_settings(&self, principal: &Principal) -> OwnedMutexGuard<()> {
        let lock = self
            .settings_locks
            .entry(principal.clone())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn user_exists(&self, username: &str) -> Result<bool, AppError> {
        Ok(self.store.get_user(username).await?.is_some())
    }

    pub async fn add_user(&self, mut new_user: NewUser) -> Result<UserResponse, AppError> {
        new_user.validate().map_err(AppError::Validation)?;

        let record = UserRecord {
            username: new_user.username,
            password: hash_password(&new_user.password)?,
            time_interval: new_user.time_interval,
            country: new_user.country,
        };
        let response = UserResponse::from_record(&record, None);

        self.store.add_user(record).await?;
        info!(username = %response.username, "👤 user registered");
        Ok(response)
    }

    /// Check the credentials, issue a token and make sure the user's job runs
    /// with the stored settings.
    pub async fn login(&self, request: LoginRequest) -> Result<UserResponse, AppError> {
        let _settings = self.lock_settings(&Principal::new(&request.username)).await;
        let user = self
            .store
            .get_user(&request.username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(&request.password, &user.password) {
            warn!(username = %user.username, "login rejected: bad password");
            return Err(AppError::Unauthorized);
        }

        let principal = Principal::new(&user.username);
        let token = self.tokens.issue(&principal)?;

        match self.registry.start(&principal, user.period(), &user.country) {
            Ok(()) => {}
            // Second login from another client: keep one job, refresh its settings
            Err(SchedulerError::AlreadyActive(_)) => {
                self.registry
                    .replace(&principal, user.period(), &user.country)?;
            }
            Err(e) => return Err(e.into()),
        }

        info!(%principal, "🔑 user logged in");
        Ok(UserResponse::from_record(&user, Some(token)))
    }

    /// Returns `false` when the user had no active job.
    pub fn logout(&self, principal: &Principal) -> bool {
        let stopped = self.registry.stop(principal);
        info!(%principal, stopped, "user logged out");
        stopped
    }

    pub async fn update_time_interval(
        &self,
        principal: &Principal,
        minutes: u32,
    ) -> Result<UserResponse, AppError> {
        validate_time_interval(minutes).map_err(AppError::Validation)?;

        let _settings = self.lock_settings(principal).await;
        let user = self
            .store
            .update_time_interval(principal.as_str(), minutes)
            .await?;
        self.registry
            .replace(principal, user.period(), &user.country)?;

        Ok(UserResponse::from_record(&user, None))
    }

    pub async fn update_country(
        &self,
        principal: &Principal,
        country: &str,
    ) -> Result<UserResponse, AppError> {
        let country = normalize_country(country).map_err(AppError::Validation)?;

        let _settings = self.lock_settings(principal).await;
        let user = self
            .store
            .update_country(principal.as_str(), &country)
            .await?;
        self.registry
            .replace(principal, user.period(), &user.country)?;

        Ok(UserResponse::from_record(&user, None))
    }

    pub async fn current_user(&self, principal: &Principal) -> Result<UserResponse, AppError> {
        let user = self
            .store
            .get_user(principal.as_str())
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(UserResponse::from_record(&user, None))
    }

    /// Latest cached result; `None` until the first successful tick.
    pub fn video_message(&self, principal: &Principal) -> Option<VideoMessage> {
        self.cache.get(principal)
    }

    pub fn job_status(&self, principal: &Principal) -> Option<JobSummary> {
        self.registry.summary(principal)
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::external::video_provider::{FetchError, VideoProvider};
    use crate::services::worker_pool::WorkerPool;

    /// Answers every region with a fixed video named after it.
    pub(crate) struct RegionEchoProvider;

    #[async_trait]
    impl VideoProvider for RegionEchoProvider {
        async fn popular_video_id(&self, region: &str) -> Result<String, FetchError> {
            Ok(format!("video-{}", region))
        }

        async fn top_comment(&self, video_id: &str) -> Result<String, FetchError> {
            Ok(format!("comment on {}", video_id))
        }
    }

    pub(crate) async fn service_in(dir: &TempDir) -> (UserService, Arc<JobRegistry>) {
        let store = Arc::new(UserStore::open(dir.path()).await.unwrap());
        let cache = ResultCache::new();
        let registry = Arc::new(JobRegistry::new(
            Arc::new(RegionEchoProvider),
            cache.clone(),
            WorkerPool::new(4),
        ));
        let tokens = TokenService::new(b"test-secret", Duration::from_secs(3600));
        let service = UserService::new(store, registry.clone(), cache, tokens);
        (service, registry)
    }

    pub(crate) fn new_user(username: &str, country: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: "pass1".to_string(),
            time_interval: 5,
            country: country.to_string(),
        }
    }

    fn login_request(username: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: "pass1".to_string(),
        }
    }

    async fn wait_for_message(service: &UserService, principal: &Principal) -> VideoMessage {
        for _ in 0..200 {
            if let Some(message) = service.video_message(principal) {
                return message;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no video message for {}", principal);
    }

    #[tokio::test]
    async fn test_add_user_normalizes_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_in(&dir).await;

        let response = service.add_user(new_user(" User1 ", "ge")).await.unwrap();
        assert_eq!(response.username, "user1");
        assert_eq!(response.country, "GE");
        assert!(response.token.is_none());

        assert!(service.user_exists("USER1").await.unwrap());
        assert!(!service.user_exists("user2").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_user_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_in(&dir).await;

        let err = service.add_user(new_user("1abc", "US")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut too_slow = new_user("abc", "US");
        too_slow.time_interval = 61;
        let err = service.add_user(too_slow).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        service.add_user(new_user("abc", "US")).await.unwrap();
        let err = service.add_user(new_user("ABC", "FR")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login_starts_job_and_logout_stops_it() {
        let dir = tempfile::tempdir().unwrap();
        let (service, registry) = service_in(&dir).await;
        service.add_user(new_user("alice", "US")).await.unwrap();
        let alice = Principal::new("alice");

        let response = service.login(login_request("alice")).await.unwrap();
        let token = response.token.unwrap();
        assert_eq!(service.tokens().verify(&token).unwrap(), alice);
        assert!(registry.is_active(&alice));

        let message = wait_for_message(&service, &alice).await;
        assert_eq!(message.video_id, "video-US");

        let status = service.job_status(&alice).unwrap();
        assert_eq!(status.period_secs, 300);
        assert_eq!(status.region, "US");

        assert!(service.logout(&alice));
        assert!(!registry.is_active(&alice));
        assert!(!service.logout(&alice));
        // Cached result outlives the session
        assert!(service.video_message(&alice).is_some());

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_second_login_keeps_a_single_job() {
        let dir = tempfile::tempdir().unwrap();
        let (service, registry) = service_in(&dir).await;
        service.add_user(new_user("alice", "US")).await.unwrap();

        service.login(login_request("alice")).await.unwrap();
        service.login(login_request("alice")).await.unwrap();

        assert_eq!(registry.active_count(), 1);
        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let (service, registry) = service_in(&dir).await;
        service.add_user(new_user("alice", "US")).await.unwrap();

        let wrong_password = LoginRequest {
            username: "alice".to_string(),
            password: "nope".to_string(),
        };
        let err = service.login(wrong_password).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let err = service.login(login_request("bob")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_update_country_persists_and_replaces_job() {
        let dir = tempfile::tempdir().unwrap();
        let (service, registry) = service_in(&dir).await;
        service.add_user(new_user("alice", "US")).await.unwrap();
        let alice = Principal::new("alice");
        service.login(login_request("alice")).await.unwrap();

        let response = service.update_country(&alice, "fr").await.unwrap();
        assert_eq!(response.country, "FR");
        assert_eq!(service.current_user(&alice).await.unwrap().country, "FR");
        assert_eq!(service.job_status(&alice).unwrap().region, "FR");

        let response = service.update_time_interval(&alice, 1).await.unwrap();
        assert_eq!(response.time_interval, 1);
        assert_eq!(service.job_status(&alice).unwrap().period_secs, 60);
        assert_eq!(registry.active_count(), 1);

        let err = service.update_time_interval(&alice, 0).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = service.update_country(&alice, "FRA").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_leave_job_on_stored_settings() {
        let dir = tempfile::tempdir().unwrap();
        let (service, registry) = service_in(&dir).await;
        service.add_user(new_user("alice", "US")).await.unwrap();
        let alice = Principal::new("alice");
        service.login(login_request("alice")).await.unwrap();

        let updates: Vec<_> = ["FR", "DE", "JP", "BR", "GB", "IT"]
            .into_iter()
            .enumerate()
            .map(|(i, country)| {
                let service = service.clone();
                let alice = alice.clone();
                tokio::spawn(async move {
                    service.update_country(&alice, country).await.unwrap();
                    service
                        .update_time_interval(&alice, i as u32 + 1)
                        .await
                        .unwrap();
                })
            })
            .collect();
        for result in futures::future::join_all(updates).await {
            result.unwrap();
        }

        let stored = service.current_user(&alice).await.unwrap();
        let status = service.job_status(&alice).unwrap();
        assert_eq!(status.region, stored.country);
        assert_eq!(status.period_secs, u64::from(stored.time_interval) * 60);
        assert_eq!(registry.active_count(), 1);

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_current_user_for_unknown_principal() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_in(&dir).await;

        let err = service
            .current_user(&Principal::new("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
        assert!(service.video_message(&Principal::new("ghost")).is_none());
    }
}
