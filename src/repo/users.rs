use secrecy::Secret;

use sqlx::PgPool;

use uuid::Uuid;

use crate::domain::{EmailAddress, Role};

use super::{StoreError, StoreResult};

#[derive(Debug)]
pub struct NewUser {
    pub email: EmailAddress,
    pub password_hash: Secret<String>,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: Uuid,
    pub email: EmailAddress,
    pub password_hash: Secret<String>,
    pub roles: Vec<Role>,
}

/// Back-office user persistence
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, new_user: &NewUser) -> StoreResult<Uuid>;

    async fn fetch_credentials_by_email(
        &self,
        email: &EmailAddress,
    ) -> StoreResult<Option<UserCredentials>>;

    async fn exists_by_email(&self, email: &EmailAddress) -> StoreResult<bool> {
        Ok(self.fetch_credentials_by_email(email).await?.is_some())
    }
}

/// Postgres user store
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    roles: Vec<String>,
}

impl TryFrom<UserRow> for UserCredentials {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        let email = row.email.parse().map_err(StoreError::Corrupt)?;
        let roles = row
            .roles
            .iter()
            .map(|role| role.parse())
            .collect::<Result<_, _>>()
            .map_err(StoreError::Corrupt)?;

        Ok(Self {
            id: row.id,
            email,
            password_hash: Secret::new(row.password_hash),
            roles,
        })
    }
}

#[async_trait::async_trait]
impl UserStore for PgUserStore {
    #[tracing::instrument("Insert a new user record", skip(self, new_user), fields(email = %new_user.email))]
    async fn insert(&self, new_user: &NewUser) -> StoreResult<Uuid> {
        use secrecy::ExposeSecret;

        let roles: Vec<&str> = new_user.roles.iter().map(AsRef::as_ref).collect();
        let id = Uuid::new_v4();
        sqlx::query("insert into users(id, email, password_hash, roles) values ($1, $2, $3, $4)")
            .bind(id)
            .bind(new_user.email.as_ref())
            .bind(new_user.password_hash.expose_secret())
            .bind(&roles)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    #[tracing::instrument("Fetch user credentials", skip(self))]
    async fn fetch_credentials_by_email(
        &self,
        email: &EmailAddress,
    ) -> StoreResult<Option<UserCredentials>> {
        sqlx::query_as::<_, UserRow>(
            "select id, email, password_hash, roles from users where email=$1",
        )
        .bind(email.as_ref())
        .fetch_optional(&self.pool)
        .await?
        .map(UserCredentials::try_from)
        .transpose()
    }
}
