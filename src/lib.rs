pub mod configuration;
pub mod domain;
pub mod email_client;
pub mod registration;
pub mod routes;
pub mod startup;
pub mod subscriber_store;
pub mod telemetry;

pub use {
    configuration::get_configuration,
    startup::{run, Application},
    telemetry::{get_subscriber, init_subscriber},
};
