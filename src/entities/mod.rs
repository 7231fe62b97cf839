pub mod prelude;

pub mod auto_security_logs;
pub mod login_attempts;
pub mod password_reset_tokens;
pub mod security_logs;
pub mod sessions;
pub mod users;
