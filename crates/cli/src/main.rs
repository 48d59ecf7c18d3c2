//! Dogeared CLI - shipping operations for operators.
//!
//! # Usage
//!
//! ```bash
//! # Inspect configured carrier profiles
//! dg-cli profiles list
//!
//! # Verify carrier credentials with a live login round-trip
//! dg-cli profiles check
//!
//! # Book shipments for orders from the fixture file
//! dg-cli book -o ord_1001 -o ord_1002 --carrier shiprocket
//!
//! # Poll tracking, register a pickup, cancel, fetch a label
//! dg-cli track -o ord_1001
//! dg-cli pickup -o ord_1001 --date 2026-09-01
//! dg-cli cancel -o ord_1001
//! dg-cli label -o ord_1001
//! ```
//!
//! Orders and profiles come from JSON fixture files (`--orders-file`,
//! `--profiles-file`); carrier endpoints and the credential key come from
//! the environment (see `dogeared_shipping::config`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use dogeared_core::Carrier;

mod commands;

#[derive(Parser)]
#[command(name = "dg-cli")]
#[command(author, version, about = "Dogeared shipping CLI")]
struct Cli {
    /// JSON fixture file with orders.
    #[arg(long, default_value = "orders.json", global = true)]
    orders_file: String,

    /// JSON fixture file with carrier profiles.
    #[arg(long, default_value = "profiles.json", global = true)]
    profiles_file: String,

    /// Owner id the profiles belong to.
    #[arg(long, default_value_t = 1, global = true)]
    owner: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect carrier profiles
    Profiles {
        #[command(subcommand)]
        action: ProfilesAction,
    },
    /// Book shipments for orders
    Book {
        /// Order ids (repeatable)
        #[arg(short, long = "order", required = true)]
        orders: Vec<String>,

        /// Carrier to book with (`shiprocket`, `bluedart`)
        #[arg(short, long)]
        carrier: Option<Carrier>,
    },
    /// Poll tracking for booked orders
    Track {
        #[arg(short, long = "order", required = true)]
        orders: Vec<String>,

        #[arg(short, long)]
        carrier: Option<Carrier>,
    },
    /// Register a carrier pickup for booked orders
    Pickup {
        #[arg(short, long = "order", required = true)]
        orders: Vec<String>,

        /// Pickup date (YYYY-MM-DD)
        #[arg(short, long)]
        date: chrono::NaiveDate,

        #[arg(short, long)]
        carrier: Option<Carrier>,
    },
    /// Cancel booked shipments
    Cancel {
        #[arg(short, long = "order", required = true)]
        orders: Vec<String>,

        #[arg(short, long)]
        carrier: Option<Carrier>,
    },
    /// Fetch or generate the shipping label for one order
    Label {
        #[arg(short, long)]
        order: String,

        #[arg(short, long)]
        carrier: Option<Carrier>,
    },
}

#[derive(Subcommand)]
enum ProfilesAction {
    /// List configured profiles
    List,
    /// Verify credentials with a live login round-trip
    Check,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let stack = commands::Stack::build(cli.owner, &cli.orders_file, &cli.profiles_file).await?;

    match cli.command {
        Commands::Profiles { action } => match action {
            ProfilesAction::List => commands::profiles::list(&stack).await?,
            ProfilesAction::Check => commands::profiles::check(&stack).await?,
        },
        Commands::Book { orders, carrier } => {
            commands::shipments::book(&stack, &orders, carrier).await;
        }
        Commands::Track { orders, carrier } => {
            commands::shipments::track(&stack, &orders, carrier).await;
        }
        Commands::Pickup {
            orders,
            date,
            carrier,
        } => {
            commands::shipments::pickup(&stack, &orders, date, carrier).await;
        }
        Commands::Cancel { orders, carrier } => {
            commands::shipments::cancel(&stack, &orders, carrier).await;
        }
        Commands::Label { order, carrier } => {
            commands::shipments::label(&stack, &order, carrier).await?;
        }
    }
    Ok(())
}
