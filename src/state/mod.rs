//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `UrlStatus`: lifecycle of a frontier URL (pending, processing, completed, failed)
//! - `JobStatus` / `JobType`: the job status machine and which phases a job runs
//! - `DomainState`: per-domain request spacing used by the rate limiter

mod domain_state;
mod job_state;
mod url_status;

pub use domain_state::DomainState;
pub use job_state::{JobStatus, JobType};
pub use url_status::UrlStatus;
