use form_relay::configuration::get_configuration;
use form_relay::startup::Application;
use form_relay::telemetry::get_subscriber;
use form_relay::telemetry::init_subscriber;

/// Initialise telemetry, load config, and start the server
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("form-relay", "info", std::io::stdout);
    init_subscriber(subscriber)?;

    let cfg = get_configuration()?;
    let app = Application::build(cfg).await?;
    app.run_until_stopped().await?;
    Ok(())
}
