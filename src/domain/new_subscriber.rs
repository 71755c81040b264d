use super::SubscriberEmail;

use {
    chrono::{DateTime, Utc},
    uuid::Uuid,
};

/// A subscriber that has passed validation but is not yet committed.
#[derive(Debug)]
pub struct NewSubscriber {
    pub id: Uuid,
    pub email: SubscriberEmail,
    pub subscribed_at: DateTime<Utc>,
}

impl NewSubscriber {
    pub fn new(email: SubscriberEmail) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            subscribed_at: Utc::now(),
        }
    }
}
