//! Background Jobs Module
//!
//! Units of work driven by the per-user scheduler in
//! `services::job_registry`. A job owns no schedule of its own: the registry
//! decides when a tick runs, the job decides what a tick does.
//!
//! # Available Jobs
//!
//! - `video_refresh_job` - Fetches the most popular video of the user's
//!   country plus its top comment and caches the pair for the user
//!
//! Jobs in this module are designed to be:
//! - Fault-tolerant: a failed tick is logged and skipped, never propagated
//! - Side-effect free apart from the cache write on success

pub mod video_refresh_job;
