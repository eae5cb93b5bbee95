pub mod oauth_client;
pub mod user;

pub use oauth_client::OAuthClientRepository;
pub use user::UserRepository;
