use acessivision_backend::config::AppConfig;
use acessivision_backend::infrastructure::database;
use acessivision_backend::services::plans::PlanService;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "plan_admin", about = "Manage user plans from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Make one user premium starting now
    GrantPremium {
        uid: String,
        /// Length of the premium period
        #[arg(long)]
        days: Option<i64>,
    },
    /// Downgrade every user whose premium period has ended
    SweepExpired,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plan_admin=info,acessivision_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    info!("🔌 Connecting to database...");
    let db = database::setup_database(&config.database_url).await?;
    let plans = PlanService::new(db, config.premium_price_cents, config.plan_duration_days);

    match cli.command {
        Command::GrantPremium { uid, days } => {
            let days = days.unwrap_or(config.plan_duration_days);
            let status = plans.grant_premium(&uid, days, Utc::now()).await?;
            info!(
                "✅ {} is premium until {}",
                uid,
                status
                    .expires_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_default()
            );
        }
        Command::SweepExpired => {
            let count = plans.sweep_expired(Utc::now()).await?;
            info!("✅ Downgraded {} expired premium users.", count);
        }
    }

    Ok(())
}
