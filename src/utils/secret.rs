use rand::Rng;

/// Minimum length for generated secrets
pub const MIN_SECRET_LENGTH: usize = 32;

/// Default length for generated secrets
pub const DEFAULT_SECRET_LENGTH: usize = 48;

/// Character set for secret generation (alphanumeric + special chars)
const SECRET_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*-_=+";

/// Generate a cryptographically secure random client secret.
///
/// Used by the out-of-band seed binary at client-creation time; the raw
/// value is shown once and only its Argon2id hash (`password::hash_password`)
/// is persisted.
pub fn generate_secret() -> String {
    generate_secret_with_length(DEFAULT_SECRET_LENGTH)
}

/// Generate a cryptographically secure random secret with specified length
/// (clamped to `MIN_SECRET_LENGTH`).
pub fn generate_secret_with_length(length: usize) -> String {
    let length = length.max(MIN_SECRET_LENGTH);
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..SECRET_CHARSET.len());
            SECRET_CHARSET[idx] as char
        })
        .collect()
}

/// Generate a URL-safe, random `client_id` with at least 32 bytes of entropy.
pub fn generate_client_id() -> String {
    generate_oauth_token_with_length(DEFAULT_TOKEN_LENGTH)
}

/// Character set for OAuth token generation (URL-safe base64 characters)
const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Default length for generated OAuth tokens (256 bits of entropy)
pub const DEFAULT_TOKEN_LENGTH: usize = 43;

/// Generate a cryptographically secure random OAuth token
/// 
/// # Returns
/// A random URL-safe string suitable for use as an OAuth token
/// 
/// # Requirements
/// - 5.1: Generate secure access_token and refresh_token
pub fn generate_oauth_token() -> String {
    generate_oauth_token_with_length(DEFAULT_TOKEN_LENGTH)
}

/// Generate a cryptographically secure random OAuth token with specified length
/// 
/// # Arguments
/// * `length` - The desired length of the token
/// 
/// # Returns
/// A random URL-safe string of the specified length
pub fn generate_oauth_token_with_length(length: usize) -> String {
    let mut rng = rand::thread_rng();
    
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..TOKEN_CHARSET.len());
            TOKEN_CHARSET[idx] as char
        })
        .collect()
}
