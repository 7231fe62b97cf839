pub mod audit;
pub mod mailer;
pub mod password;
pub mod tokens;

pub use mailer::{LogMailer, MailMessage, Mailer, SmtpMailer};
pub use tokens::{Claims, TokenError, TokenService};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, AuthSession, ProfileUpdate, Registration};
pub use auth_service_impl::SeaOrmAuthService;

pub mod federated;
pub use federated::{FederatedError, FederatedIdentityService, ProviderLogin};

pub mod threat_service;
pub mod threat_service_impl;
pub use threat_service::{SecurityStatus, ThreatError, ThreatResponse, ThreatService, ThreatSignal};
pub use threat_service_impl::SeaOrmThreatService;
