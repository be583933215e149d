use anyhow::Context;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use secrecy::{ExposeSecret, Secret};

use crate::domain::{EmailAddress, Role};
use crate::repo::{NewUser, StoreError, UserCredentials, UserStore};
use crate::telemetry::spawn_blocking_with_tracing;

use super::Credentials;

/// Why a login attempt did not produce a user
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials(#[source] anyhow::Error),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        Self::Unexpected(e.into())
    }
}

/// Look up the user by email and check the password against the stored hash
#[tracing::instrument(name = "Validate credentials", skip(users, credentials), fields(email = %credentials.email))]
pub async fn validate_credentials(
    users: &dyn UserStore,
    credentials: Credentials,
) -> Result<UserCredentials, AuthError> {
    let user = users
        .fetch_credentials_by_email(&credentials.email)
        .await?
        .context("No user stored for email")
        .map_err(AuthError::InvalidCredentials)?;

    let password_hash = user.password_hash.clone();
    spawn_blocking_with_tracing(move || verify_password_hash(credentials.password, password_hash))
        .await
        .context("Failed to spawn blocking task")??;

    Ok(user)
}

#[tracing::instrument(name = "Verify password hash", skip(password, password_hash))]
fn verify_password_hash(
    password: Secret<String>,
    password_hash: Secret<String>,
) -> Result<(), AuthError> {
    let password_hash = PasswordHash::new(password_hash.expose_secret())
        .context("Failed to parse stored password hash")?;

    Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &password_hash)
        .context("Failed to verify password hash")
        .map_err(AuthError::InvalidCredentials)
}

/// Argon2 PHC string for `password` with a fresh random salt
pub fn hash_password(password: &Secret<String>) -> anyhow::Result<Secret<String>> {
    let salt = SaltString::generate(&mut rand::thread_rng());

    let password_hash = Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(Secret::new(password_hash))
}

/// Create the administrator account unless a user with that email already exists
#[tracing::instrument(name = "Seed administrator", skip(users, password))]
pub async fn seed_admin(
    users: &dyn UserStore,
    email: &EmailAddress,
    password: &Secret<String>,
) -> anyhow::Result<()> {
    if users.exists_by_email(email).await? {
        tracing::info!("Administrator already present");
        return Ok(());
    }

    let password = password.clone();
    let password_hash = spawn_blocking_with_tracing(move || hash_password(&password))
        .await
        .context("Failed to spawn blocking task")??;

    let new_user = NewUser {
        email: email.clone(),
        password_hash,
        roles: vec![Role::Admin],
    };
    match users.insert(&new_user).await {
        Ok(id) => tracing::info!(user_id = %id, "Administrator created"),
        // Another instance seeded it first
        Err(StoreError::Conflict) => tracing::info!("Administrator already present"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
