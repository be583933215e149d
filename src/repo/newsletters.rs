use chrono::{DateTime, Utc};

use serde::Serialize;

use sqlx::PgPool;

use uuid::Uuid;

use super::StoreResult;

/// A newsletter issue requested by an administrator
#[derive(Debug, Clone)]
pub struct NewNewsletter {
    pub subject: String,
    pub content: String,
}

/// Stored newsletter issue
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Newsletter {
    pub id: Uuid,
    pub subject: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The single draft administrators edit between issues
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct NewsletterTemplate {
    pub subject: String,
    pub content: String,
}

/// Archive of published newsletter issues
#[async_trait::async_trait]
pub trait NewsletterStore: Send + Sync {
    async fn insert(&self, newsletter: &NewNewsletter) -> StoreResult<Newsletter>;
}

/// Storage for the one newsletter template; saving replaces it
#[async_trait::async_trait]
pub trait NewsletterTemplateStore: Send + Sync {
    async fn fetch_template(&self) -> StoreResult<Option<NewsletterTemplate>>;

    async fn save_template(&self, template: &NewsletterTemplate) -> StoreResult<()>;
}

/// Postgres newsletter store
#[derive(Debug, Clone)]
pub struct PgNewsletterStore {
    pool: PgPool,
}

impl PgNewsletterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NewsletterStore for PgNewsletterStore {
    #[tracing::instrument(name = "Insert newsletter", skip(self, newsletter), fields(subject = %newsletter.subject))]
    async fn insert(&self, newsletter: &NewNewsletter) -> StoreResult<Newsletter> {
        let stored = sqlx::query_as::<_, Newsletter>(
            "insert into newsletters(id, subject, content) values ($1, $2, $3) \
             returning id, subject, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&newsletter.subject)
        .bind(&newsletter.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }
}

#[async_trait::async_trait]
impl NewsletterTemplateStore for PgNewsletterStore {
    #[tracing::instrument(name = "Fetch newsletter template", skip(self))]
    async fn fetch_template(&self) -> StoreResult<Option<NewsletterTemplate>> {
        let template = sqlx::query_as::<_, NewsletterTemplate>(
            "select subject, content from newsletter_template where id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(template)
    }

    #[tracing::instrument(name = "Save newsletter template", skip(self, template), fields(subject = %template.subject))]
    async fn save_template(&self, template: &NewsletterTemplate) -> StoreResult<()> {
        sqlx::query(
            "insert into newsletter_template(id, subject, content) values (1, $1, $2) \
             on conflict (id) do update \
             set subject = excluded.subject, content = excluded.content, updated_at = now()",
        )
        .bind(&template.subject)
        .bind(&template.content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
