//! Job tracking for album transfers.
//!
//! Each album transfer is recorded as a [`TransferJob`] so that progress can
//! be inspected with `status` and a human can tell how far an interrupted
//! run got:
//! - created `pending` when the album transfer starts
//! - updated after every chunk
//! - finished as `completed` or `failed`

pub mod error;
pub mod tracker;
pub mod types;

pub use error::JobError;
pub use tracker::{JobTracker, JsonJobTracker};
pub use types::{JobStatus, TransferJob};
