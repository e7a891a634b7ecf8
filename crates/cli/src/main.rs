//! eVault CLI - Database migrations, seeding and staff order tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! evault migrate
//!
//! # Create products, tiers and coupons from a YAML or JSON file
//! evault seed catalog.yaml
//!
//! # Price two lines with a coupon, without placing an order
//! evault quote --product 12:2 --product 40:50 --coupon DIWALI15
//!
//! # Staff order actions
//! evault order show 1042
//! evault order advance 1042 shipped --tracking https://track.example/AB12
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Create catalog entries from a file
//! - `quote` - Price products without ordering
//! - `order show` / `order advance` - Inspect and move orders forward

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evault_checkout::config::CheckoutConfig;
use evault_checkout::db::{PgStore, create_pool};
use evault_checkout::models::CartEntry;
use evault_core::{OrderId, OrderStatus};

mod commands;

#[derive(Parser)]
#[command(name = "evault")]
#[command(author, version, about = "eVault CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Create products, bulk-discount tiers and coupons from a file
    Seed {
        /// Path to a YAML or JSON seed file
        file: String,
    },
    /// Price products without placing an order
    Quote {
        /// Line as `PRODUCT_ID:QUANTITY` (repeatable)
        #[arg(short, long = "product", required = true, value_parser = commands::quote::parse_entry)]
        products: Vec<CartEntry>,

        /// Coupon code to apply
        #[arg(short, long)]
        coupon: Option<String>,
    },
    /// Inspect and update orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Show an order with its lines and delivery address
    Show {
        /// Order ID
        id: OrderId,
    },
    /// Move an order forward (`shipped`, `delivered`)
    Advance {
        /// Order ID
        id: OrderId,

        /// New status
        status: OrderStatus,

        /// Tracking URL to record
        #[arg(short, long)]
        tracking: Option<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CheckoutConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let config = CheckoutConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "evault_checkout=info,evault_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if sentry_guard.is_some() {
        tracing::info!("Sentry initialized");
    }

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        // Flush Sentry before exiting
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CheckoutConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Connecting to database...");
    let pool = create_pool(
        &config.database_url,
        config.max_connections,
        config.min_connections,
    )
    .await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&pool).await?,
        Commands::Seed { file } => {
            let store = PgStore::new(pool);
            commands::seed::from_file(&store, &file).await?;
        }
        Commands::Quote { products, coupon } => {
            let store = PgStore::new(pool);
            commands::quote::run(
                store,
                &products,
                coupon.as_deref(),
                config.delivery_charge,
            )
            .await?;
        }
        Commands::Order { action } => {
            let store = PgStore::new(pool);
            match action {
                OrderAction::Show { id } => commands::order::show(&store, id).await?,
                OrderAction::Advance {
                    id,
                    status,
                    tracking,
                } => commands::order::advance(&store, id, status, tracking.as_deref()).await?,
            }
        }
    }
    Ok(())
}
