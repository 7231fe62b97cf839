pub mod audit;
pub mod reset_token;
pub mod session;
pub mod threat;
pub mod user;
