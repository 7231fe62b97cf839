pub use super::auto_security_logs::Entity as AutoSecurityLogs;
pub use super::login_attempts::Entity as LoginAttempts;
pub use super::password_reset_tokens::Entity as PasswordResetTokens;
pub use super::security_logs::Entity as SecurityLogs;
pub use super::sessions::Entity as Sessions;
pub use super::users::Entity as Users;
