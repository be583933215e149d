mod memory;
mod newsletters;
mod subscribers;
mod users;

pub use memory::InMemoryStore;
pub use newsletters::{
    NewNewsletter, Newsletter, NewsletterStore, NewsletterTemplate, NewsletterTemplateStore,
    PgNewsletterStore,
};
pub use subscribers::{PgSubscriberStore, SubscriberStore};
pub use users::{NewUser, PgUserStore, UserCredentials, UserStore};

/// Errors raised by the persistence layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Record conflicts with an existing record")]
    Conflict,
    /// A stored row cannot be represented as a domain object
    #[error("Stored record is inconsistent: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict,
            _ => Self::Database(e),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
