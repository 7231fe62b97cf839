mod accounts;
mod status;

pub use accounts::{cmd_promote, cmd_unlock};
pub use status::cmd_status;
