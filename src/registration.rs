//! The registration workflow: validate, reject duplicates, stage the insert,
//! notify, commit. Collaborators are reached through the traits below so the
//! ordering can be exercised without a database or a mail server.

use crate::domain::{NewSubscriber, SubscriberEmail};

use {async_trait::async_trait, serde::Deserialize, uuid::Uuid};

/// Only a JSON object deserializes into a request; any other JSON value is
/// rejected by the extractor.
#[derive(Debug, Deserialize)]
#[serde(from = "serde_json::Map<String, serde_json::Value>")]
pub struct RegistrationRequest {
    /// Kept loosely typed so that an absent field (404) can be told apart from
    /// a value of the wrong type (406). `null` counts as absent.
    pub email: Option<serde_json::Value>,
}

impl From<serde_json::Map<String, serde_json::Value>> for RegistrationRequest {
    fn from(mut body: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            email: body.remove("email").filter(|value| !value.is_null()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("Email field expected.")]
    MissingEmail,
    #[error("Email format is not valid.")]
    InvalidEmail(String),
    #[error("Email already registered.")]
    AlreadyRegistered,
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("A subscriber with this email already exists")]
    Duplicate,
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Hands out one session per registration. Sessions are never shared.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    type Session: SubscriberSession;

    async fn begin(&self) -> Result<Self::Session, StoreError>;
}

/// A unit of work against the store. Nothing staged through `add` is
/// visible to other sessions until `commit` succeeds.
#[async_trait]
pub trait SubscriberSession: Send + Sized {
    /// Case-insensitive lookup.
    async fn find_by_email(
        &mut self,
        email: &SubscriberEmail,
    ) -> Result<Option<Uuid>, StoreError>;

    /// Returns `StoreError::Duplicate` if the email collides with a stored one.
    async fn add(&mut self, subscriber: &NewSubscriber) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &SubscriberEmail) -> Result<(), anyhow::Error>;
}

#[tracing::instrument(
    name = "Registering a new subscriber",
    skip(request, store, notifier),
    fields(subscriber_email = tracing::field::Empty)
)]
pub async fn register_subscriber<S, N>(
    request: RegistrationRequest,
    store: &S,
    notifier: &N,
) -> Result<NewSubscriber, RegisterError>
where
    S: SubscriberStore,
    N: Notifier,
{
    let email = parse_email(request)?;
    tracing::Span::current().record("subscriber_email", &tracing::field::display(&email));
    let new_subscriber = NewSubscriber::new(email);

    let mut session = store
        .begin()
        .await
        .map_err(store_failure("Failed to open a subscriber store session"))?;

    let existing = session
        .find_by_email(&new_subscriber.email)
        .await
        .map_err(store_failure("Failed to look up an existing subscriber"))?;
    if existing.is_some() {
        tracing::info!("Email {} is already registered", new_subscriber.email);
        release(session).await;
        return Err(RegisterError::AlreadyRegistered);
    }

    if let Err(e) = session.add(&new_subscriber).await {
        release(session).await;
        return Err(store_failure("Failed to stage the new subscriber")(e));
    }

    if let Err(e) = notifier.notify(&new_subscriber.email).await {
        tracing::error!(
            error.cause_chain = ?e,
            "Notification failed, discarding the staged subscriber"
        );
        release(session).await;
        return Err(RegisterError::Unexpected(
            e.context("Failed to send the registration notification"),
        ));
    }

    session
        .commit()
        .await
        .map_err(store_failure("Failed to commit the new subscriber"))?;

    Ok(new_subscriber)
}

fn parse_email(request: RegistrationRequest) -> Result<SubscriberEmail, RegisterError> {
    let raw = match request.email.ok_or(RegisterError::MissingEmail)? {
        serde_json::Value::String(s) => s,
        other => {
            return Err(RegisterError::InvalidEmail(format!(
                "Expected a string, found {}",
                other
            )))
        }
    };
    SubscriberEmail::parse(raw).map_err(|e| RegisterError::InvalidEmail(e.to_string()))
}

/// Duplicates surface as conflicts no matter which step detected them, which
/// covers two requests racing past the lookup.
fn store_failure(context: &'static str) -> impl FnOnce(StoreError) -> RegisterError {
    move |e| match e {
        StoreError::Duplicate => RegisterError::AlreadyRegistered,
        StoreError::Unexpected(e) => RegisterError::Unexpected(e.context(context)),
    }
}

/// Nothing staged in `session` has been committed, so a failed rollback is
/// logged and does not change the outcome reported to the caller.
async fn release<T: SubscriberSession>(session: T) {
    if let Err(e) = session.rollback().await {
        tracing::warn!(
            error.cause_chain = ?e,
            "Failed to roll back the subscriber store session"
        );
    }
}
