pub mod grant_store;
pub mod mailer;
pub mod oauth;

pub use grant_store::GrantStore;
pub use mailer::Mailer;
pub use oauth::{AuthorizeParams, OAuthService, OAuthTokenResponse};
