use crate::{
    configuration::{DatabaseSettings, Settings},
    email_client::EmailClient,
    routes,
    subscriber_store::PgSubscriberStore,
};

use std::net::TcpListener;

use {
    actix_cors::Cors,
    actix_web::{dev::Server, web, App, HttpServer},
    anyhow::Context,
    sqlx::{postgres::PgPoolOptions, PgPool},
    tracing_actix_web::TracingLogger,
};

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    /// Connects to the store, creates the schema, binds the listener and
    /// registers the routes. Nothing is mutated after this returns.
    pub async fn build(configuration: &Settings) -> Result<Self, anyhow::Error> {
        let store = PgSubscriberStore::new(get_connection_pool(&configuration.database));
        store
            .ensure_schema()
            .await
            .context("Failed to create the subscriber schema")?;

        let sender_email = configuration
            .email_client
            .sender()
            .context("Invalid sender email address")?;
        let email_client = EmailClient::new(
            &configuration.email_client.base_url,
            sender_email,
            configuration.email_client.authorization_token.clone(),
            configuration.email_client.timeout(),
        )?;

        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        );
        let listener =
            TcpListener::bind(&address).with_context(|| format!("Failed to bind {}", address))?;
        let port = listener.local_addr()?.port();
        tracing::info!("Listening on {}", listener.local_addr()?);

        let server = run(
            listener,
            store,
            email_client,
            configuration.application.cors_allowed_origins.clone(),
        )?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn get_connection_pool(configuration: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(configuration.with_db())
}

fn cors_policy(allowed_origins: &[String]) -> Cors {
    if allowed_origins.iter().any(|origin| origin == "*") {
        return Cors::permissive();
    }
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
}

pub fn run(
    listener: TcpListener,
    store: PgSubscriberStore,
    email_client: EmailClient,
    allowed_origins: Vec<String>,
) -> Result<Server, std::io::Error> {
    let store = web::Data::new(store);
    let email_client = web::Data::new(email_client);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors_policy(&allowed_origins))
            .wrap(TracingLogger::default())
            .app_data(web::JsonConfig::default().error_handler(routes::json_error_handler))
            .route("/health_check", web::get().to(routes::health_check))
            .route("/register", web::post().to(routes::register))
            .app_data(store.clone())
            .app_data(email_client.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
