//! Provisions a registered client application out-of-band. Administrative
//! CRUD of clients has no HTTP surface in this implementation (SPEC §1);
//! this binary is the one-off substitute, in the spirit of the teacher's
//! own `examples/set_admin.rs` admin-seeding pattern.
//!
//! Usage: `seed_client <name> <redirect_uri>[,<redirect_uri>...] [scope ...]`
//! Prints the generated `client_id` and raw `client_secret` once; only the
//! secret's Argon2id hash is persisted.

use sqlx::mysql::MySqlPoolOptions;

use oidc_idp::repositories::OAuthClientRepository;
use oidc_idp::repositories::oauth_client::hash_client_secret;
use oidc_idp::utils::secret;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let name = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: seed_client <name> <redirect_uri>[,...] [scope ...]"))?;
    let redirect_uris: Vec<String> = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("at least one redirect_uri is required"))?
        .split(',')
        .map(|s| s.trim().to_string())
        .collect();
    let scopes: Vec<String> = {
        let rest: Vec<String> = args.collect();
        if rest.is_empty() {
            vec!["openid".to_string(), "email".to_string(), "profile".to_string()]
        } else {
            rest
        }
    };

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = MySqlPoolOptions::new().connect(&database_url).await?;

    let client_id = secret::generate_client_id();
    let client_secret = secret::generate_secret();
    let client_secret_hash = hash_client_secret(&client_secret)
        .map_err(|e| anyhow::anyhow!("failed to hash client secret: {e}"))?;

    let repo = OAuthClientRepository::new(pool);
    repo.create(&client_id, &client_secret_hash, &name, &redirect_uris, &scopes)
        .await
        .map_err(|e| anyhow::anyhow!("failed to create client: {e}"))?;

    println!("client_id:     {client_id}");
    println!("client_secret: {client_secret}");
    println!("(the secret above is shown once; only its hash was persisted)");
    Ok(())
}
