use subscriber_registration::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = get_configuration()?;

    let subscriber = get_subscriber(
        "subscriber_registration".into(),
        configuration.application.log_level().into(),
        std::io::stdout,
    );
    init_subscriber(subscriber)?;

    let application = Application::build(&configuration).await?;
    application.run_until_stopped().await?;

    Ok(())
}
