pub mod user;
pub mod reset;

pub use user::{StagedReset, UserRecord};
pub use reset::ResetReport;
