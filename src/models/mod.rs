//! Domain models for logship.
//!
//! # Core Concepts
//!
//! - [`LogEvent`]: One recorded usage event. Events live as JSON lines in the
//!   active log until the file is rotated into the pending queue.
//! - [`EventBatch`]: The block POSTed to the statistics endpoint: a product
//!   code, the anonymous device id, and a bounded slice of events.
//! - [`ResultCode`] / [`UploadSummary`]: Classification of one upload pass
//!   over the whole pending queue.
//! - [`BlockOutcome`]: The server's verdict on a single posted block, which
//!   decides whether the owning file is removed or retried later.

mod batch;
mod event;
mod result;

pub use batch::*;
pub use event::*;
pub use result::*;
