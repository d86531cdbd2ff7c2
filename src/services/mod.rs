pub mod auth_service;
pub mod job_registry;
pub mod result_cache;
pub mod user_service;
pub mod worker_pool;
