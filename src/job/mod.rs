//! Outbound send requests.
//!
//! A [`Job`] is created for every `send_email`/`send_sms` call, persisted
//! before it is queued, and stamped with `sent_at` exactly once after the
//! transport accepted it.

mod types;

pub use types::{Job, JobType, Params};
