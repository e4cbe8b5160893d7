//! Bar records
//!
//! Raw feed records, their validation into immutable [`BarRecord`]s, and
//! aggregation of intraday bars into sessions

mod session;
mod types;
mod validator;

pub use session::{aggregate_session, SessionHours};
pub use types::{BarRecord, RawBar, RejectionReason};
pub use validator::validate;
