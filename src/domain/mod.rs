mod new_subscriber;
mod subscriber_email;

pub use {
    new_subscriber::NewSubscriber,
    subscriber_email::{SubscriberEmail, SubscriberEmailError},
};
