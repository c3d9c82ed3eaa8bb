pub mod commands;
pub mod ledger;

pub use commands::{clear_warnings, user_warnings, warn};
