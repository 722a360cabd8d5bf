use color_eyre::eyre::{WrapErr, eyre};
use lettre::{AsyncSmtpTransport, Tokio1Executor, transport::smtp::authentication::Credentials};
use parliament_alerts::AppResources;
use parliament_alerts::alerts::notify_hansard;
use parliament_alerts::api::start_webserver;
use parliament_alerts::config::load_config_or_panic;
use parliament_alerts::mailer::Mailer;
use rustls::crypto;
use rustls::crypto::CryptoProvider;
use sea_orm::Database;
use std::env;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "parliament_alerts=info,hyper=warn,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

/// `parliament-alerts` serves the web endpoints.
/// `parliament-alerts notify-hansard <id>` sends the digests for one Hansard and exits.
enum Command {
    Serve,
    NotifyHansard(i32),
}

fn parse_command(mut args: impl Iterator<Item = String>) -> color_eyre::Result<Command> {
    match args.next().as_deref() {
        None | Some("serve") => Ok(Command::Serve),
        Some("notify-hansard") => {
            let id = args
                .next()
                .ok_or_else(|| eyre!("notify-hansard requires a Hansard id"))?;
            let id = id
                .parse()
                .wrap_err_with(|| format!("Invalid Hansard id {id:?}"))?;
            Ok(Command::NotifyHansard(id))
        }
        Some(other) => Err(eyre!("Unknown command {other:?}")),
    }
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    initialize_tracing();

    let command = parse_command(env::args().skip(1))?;

    // Load config
    let config = Arc::new(load_config_or_panic());

    let ring_provider = crypto::ring::default_provider();
    CryptoProvider::install_default(ring_provider)
        .map_err(|_| eyre!("Failed to install crypto provider"))?;

    // Set up SeaORM database connection
    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .wrap_err("Failed to connect to database")?,
    );

    // Set up lettre SMTP client
    let creds = Credentials::new(config.smtp.username.clone(), config.smtp.password.clone());
    let mailer: Arc<dyn Mailer> = Arc::new(
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp.server)
            .wrap_err("Invalid SMTP relay")?
            .port(config.smtp.port)
            .credentials(creds)
            .build(),
    );

    let resources = AppResources::new(db, mailer, config);
    tracing::info!(
        readonly_db = resources.config.readonly_db,
        sandbox = resources.config.alerts.sandbox,
        "alerts configuration"
    );

    match command {
        Command::Serve => start_webserver(resources).await?,
        Command::NotifyHansard(hansard_id) => {
            let summary = notify_hansard(&resources, hansard_id).await?;
            tracing::info!(
                hansard_id,
                sent = summary.sent,
                sandboxed = summary.sandboxed,
                failed = summary.failed,
                "Hansard digests dispatched"
            );
        }
    }
    Ok(())
}
