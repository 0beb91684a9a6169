use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use xfb_pay::codes::{self, CodeFormat};
use xfb_pay::config::{self, Config};
use xfb_pay::db::{self, AppState};

#[derive(Parser)]
#[command(name = "xfb-pay", version, about = "Digital product sales and payment links")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create the database schema and exit
    InitDb,
    /// Print a checksummed code without touching the database
    GenCode {
        /// Leading letters, e.g. O for order numbers or P for payment codes
        #[arg(long, default_value = "")]
        prefix: String,
        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(3..=4))]
        sequence_digits: u32,
    },
    /// Verify the check digit of a code
    CheckCode { code: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xfb_pay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await?,
        Command::InitDb => {
            let path = config::database_path_from_env();
            db::create_pool(&path)?;
            tracing::info!("Initialized database at {}", path);
        }
        Command::GenCode {
            prefix,
            sequence_digits,
        } => {
            let format = CodeFormat::new(&prefix, sequence_digits)?;
            let code = codes::generate_unique_code(format, |_| Ok(true))?;
            println!("{}", code);
        }
        Command::CheckCode { code } => {
            if codes::validate_code(&code) {
                println!("{}: valid", code);
            } else {
                println!("{}: INVALID check digit", code);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn serve() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_path)?;
    tracing::info!("Database ready at {}", config.database_path);

    let state = AppState {
        db: pool,
        base_url: config.base_url.clone(),
        payment_secret: config.payment_secret.clone(),
    };

    let app = xfb_pay::app(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {} (public base URL {})", addr, config.base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutting down");
}
