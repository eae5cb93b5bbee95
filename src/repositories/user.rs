use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::AuthError;
use crate::models::User;

/// Satisfies the `UserStore` contract this implementation's core depends on:
/// lookup by id (token/UserInfo path) and lookup by email (the out-of-scope
/// login collaborator). `create_user` exists so that collaborator has
/// something to call; this crate does not itself expose a registration
/// HTTP endpoint.
#[derive(Clone)]
pub struct UserRepository {
    pool: MySqlPool,
}

impl UserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, AuthError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(email)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().map(|c| c == "23000").unwrap_or(false)
                    || db_err.message().contains("Duplicate entry")
                {
                    return AuthError::EmailAlreadyExists;
                }
            }
            AuthError::InternalError(e.into())
        })?;

        self.find_by_id(id)
            .await?
            .ok_or(AuthError::InternalError(anyhow::anyhow!(
                "Failed to fetch created user"
            )))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_active, email_verified,
                   first_name, last_name, username, profile_picture_url, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::InternalError(e.into()))?;

        Ok(user)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_active, email_verified,
                   first_name, last_name, username, profile_picture_url, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::InternalError(e.into()))?;

        Ok(user)
    }

    /// Flip `email_verified` true after the verification token is consumed
    /// from the grant store.
    pub async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), AuthError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = true
            WHERE id = ?
            "#,
        )
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::InternalError(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Property: Email Uniqueness — a second registration with an already-
    // used email must fail, never silently overwrite the first account.
    // Property: Valid Registration Creates User — the created user must be
    // findable by the same email and id it was created with.

    use proptest::prelude::*;
    use sqlx::MySqlPool;

    use super::UserRepository;
    use crate::error::AuthError;

    fn email_strategy() -> impl Strategy<Value = String> {
        ("[a-z]{3,10}", "[a-z]{3,8}")
            .prop_map(|(local, domain)| format!("test_{}@{}.com", local, domain))
    }

    fn password_hash_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9]{60,80}".prop_map(|s| format!("$argon2id$v=19$m=19456,t=2,p=1${}", s))
    }

    async fn setup_test_db() -> MySqlPool {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

        let pool = sqlx::mysql::MySqlPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to create pool");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    async fn cleanup_test_data(pool: &MySqlPool, emails: &[String]) {
        for email in emails {
            let _ = sqlx::query("DELETE FROM users WHERE email = ?")
                .bind(email)
                .execute(pool)
                .await;
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_email_uniqueness(
            email in email_strategy(),
            password_hash1 in password_hash_strategy(),
            password_hash2 in password_hash_strategy()
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let pool = setup_test_db().await;
                let repo = UserRepository::new(pool.clone());

                cleanup_test_data(&pool, &[email.clone()]).await;

                let result1 = repo.create_user(&email, &password_hash1).await;
                prop_assert!(result1.is_ok(), "First user creation should succeed");

                let result2 = repo.create_user(&email, &password_hash2).await;
                prop_assert!(result2.is_err(), "Second user creation with same email should fail");

                match result2 {
                    Err(AuthError::EmailAlreadyExists) => {}
                    Err(e) => {
                        prop_assert!(false, "Expected EmailAlreadyExists error, got: {:?}", e);
                    }
                    Ok(_) => {
                        prop_assert!(false, "Should not allow duplicate email");
                    }
                }

                cleanup_test_data(&pool, &[email]).await;
                Ok(())
            })?;
        }

        #[test]
        fn prop_valid_registration_creates_user(
            email in email_strategy(),
            password_hash in password_hash_strategy()
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let pool = setup_test_db().await;
                let repo = UserRepository::new(pool.clone());

                cleanup_test_data(&pool, &[email.clone()]).await;

                let create_result = repo.create_user(&email, &password_hash).await;
                prop_assert!(create_result.is_ok(), "User creation should succeed");

                let created_user = create_result.unwrap();

                let found_user = repo.find_by_email(&email).await.unwrap();
                prop_assert!(found_user.is_some(), "User should be found by email");

                let found_user = found_user.unwrap();
                prop_assert_eq!(found_user.id, created_user.id, "User IDs should match");
                prop_assert_eq!(&found_user.email, &email, "Email should match");

                cleanup_test_data(&pool, &[email.clone()]).await;
                Ok(())
            })?;
        }
    }
}
