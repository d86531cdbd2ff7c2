use std::sync::Arc;

use crate::services::auth_service::TokenService;
use crate::services::job_registry::JobRegistry;
use crate::services::user_service::UserService;

#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub tokens: TokenService,
    pub registry: Arc<JobRegistry>,
}

impl AppState {
    pub fn new(users: UserService, registry: Arc<JobRegistry>) -> Self {
        Self {
            tokens: users.tokens().clone(),
            users,
            registry,
        }
    }
}
