use crate::{
    domain::{NewSubscriber, SubscriberEmail},
    registration::{StoreError, SubscriberSession, SubscriberStore},
};

use {
    anyhow::Context,
    async_trait::async_trait,
    sqlx::{PgPool, Postgres, Row, Transaction},
    uuid::Uuid,
};

type Trans = Transaction<'static, Postgres>;

const CREATE_SUBSCRIBERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS subscribers (
        id uuid NOT NULL PRIMARY KEY,
        email TEXT NOT NULL,
        subscribed_at timestamptz NOT NULL
    )
"#;

// One row per email regardless of case. This is what ultimately settles two
// registrations racing for the same address.
const CREATE_EMAIL_INDEX: &str = r#"
    CREATE UNIQUE INDEX IF NOT EXISTS subscribers_email_lower_idx
    ON subscribers (lower(email))
"#;

#[derive(Clone, Debug)]
pub struct PgSubscriberStore {
    pool: PgPool,
}

impl PgSubscriberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `subscribers` table and its index if they are missing.
    #[tracing::instrument(name = "Ensuring the subscriber schema exists", skip(self))]
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(CREATE_SUBSCRIBERS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(CREATE_EMAIL_INDEX).execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgSubscriberSession {
    transaction: Trans,
}

#[async_trait]
impl SubscriberStore for PgSubscriberStore {
    type Session = PgSubscriberSession;

    #[tracing::instrument(name = "Begin subscriber transaction", skip(self))]
    async fn begin(&self) -> Result<Self::Session, StoreError> {
        let transaction = self
            .pool
            .begin()
            .await
            .context("Failed to acquire Postgres connection from database pool")?;
        Ok(PgSubscriberSession { transaction })
    }
}

#[async_trait]
impl SubscriberSession for PgSubscriberSession {
    #[tracing::instrument(name = "Find existing subscriber by email", skip(self, email))]
    async fn find_by_email(
        &mut self,
        email: &SubscriberEmail,
    ) -> Result<Option<Uuid>, StoreError> {
        let existing = sqlx::query(r#"SELECT id FROM subscribers WHERE lower(email) = lower($1)"#)
            .bind(email.as_ref())
            .fetch_optional(&mut *self.transaction)
            .await
            .context("Failed to query subscribers by email")?
            .map(|row| row.try_get::<Uuid, _>("id"))
            .transpose()
            .context("Failed to read the id of an existing subscriber")?;

        if existing.is_some() {
            tracing::info!("Existing subscriber found for email {}", email);
        }

        Ok(existing)
    }

    #[tracing::instrument(
        name = "Saving new subscriber details in the database",
        skip(self, subscriber)
    )]
    async fn add(&mut self, subscriber: &NewSubscriber) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (id, email, subscribed_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(subscriber.id)
        .bind(subscriber.email.as_ref())
        .bind(subscriber.subscribed_at)
        .execute(&mut *self.transaction)
        .await
        .map_err(classify)?;

        Ok(())
    }

    #[tracing::instrument(name = "Commit subscriber transaction", skip(self))]
    async fn commit(self) -> Result<(), StoreError> {
        self.transaction.commit().await.map_err(classify)
    }

    #[tracing::instrument(name = "Roll back subscriber transaction", skip(self))]
    async fn rollback(self) -> Result<(), StoreError> {
        self.transaction
            .rollback()
            .await
            .context("Failed to roll back subscriber transaction")?;
        Ok(())
    }
}

fn classify(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            tracing::info!("Insert rejected by the unique email index");
            StoreError::Duplicate
        }
        _ => StoreError::Unexpected(anyhow::Error::from(e)),
    }
}
