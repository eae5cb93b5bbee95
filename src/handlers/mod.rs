pub mod authorize;
pub mod discovery;
pub mod health;
pub mod jwks;
pub mod logout;
pub mod token;
pub mod userinfo;

pub use authorize::{authorize_handler, authorize_resume_handler};
pub use discovery::openid_configuration_handler;
pub use health::{health_handler, ready_handler};
pub use jwks::jwks_handler;
pub use logout::logout_handler;
pub use token::{token_handler, token_refresh_handler};
pub use userinfo::userinfo_handler;
