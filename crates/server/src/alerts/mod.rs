//! Legacy politician alerts: matching a Hansard against subscriptions and
//! mailing the resulting digests.
//!
//! ## Submodules
//!
//! - `matcher` - Pure grouping of statements into per-alert digest jobs
//! - `email` - Rendering and delivery, with the sandbox recipient policy
//! - `digest` - Loads a Hansard from the store and runs the whole batch

pub mod digest;
pub mod email;
pub mod matcher;

pub use digest::{DigestError, notify_hansard};
pub use email::{
    DeliveryOutcome, DispatchSummary, MAX_SUBJECT_LENGTH, NotificationSender, NotifyError,
    RecipientPolicy, digest_subject, truncate_subject,
};
pub use matcher::{DigestJob, match_statements};
