// flight-surety/src/main.rs
use clap::{Args, Parser, Subcommand};
use flight_surety::{FlightSurety, OperationLog, SuretyConfig, SuretyService, TracingPayoutSink};
use insurance_ledger::{FlightKey, FlightStatus};
use std::sync::Arc;
use surety_core::{Amount, Timestamp};
use surety_crypto::Address;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flight-surety")]
#[command(about = "Flight delay insurance contract", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "./flight-surety.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

/// Identifies a flight by operating airline, designator and departure time
#[derive(Args, Clone)]
struct FlightArgs {
    /// Operating airline
    #[arg(long)]
    airline: Address,

    /// Flight designator, e.g. ND1309
    #[arg(long)]
    flight: String,

    /// Scheduled departure (unix seconds)
    #[arg(long)]
    timestamp: Timestamp,
}

impl FlightArgs {
    fn key(&self) -> FlightKey {
        FlightKey::new(self.airline, self.flight.clone(), self.timestamp)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Add a pending airline
    AddAirline {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        candidate: Address,
    },

    /// Stake funds for an airline (amount in ether)
    Fund {
        /// Must be the airline itself
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        airline: Address,
        #[arg(long)]
        amount: String,
    },

    /// Vote to admit a candidate airline
    Vote {
        #[arg(long)]
        voter: Address,
        #[arg(long)]
        candidate: Address,
    },

    /// Request admission of a candidate airline
    RegisterAirline {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        candidate: Address,
    },

    /// Register a flight of a funded airline
    RegisterFlight {
        /// Must be the operating airline
        #[arg(long)]
        caller: Address,
        #[command(flatten)]
        flight: FlightArgs,
    },

    /// Buy flight insurance (premium in ether)
    Buy {
        #[arg(long)]
        passenger: Address,
        #[command(flatten)]
        flight: FlightArgs,
        #[arg(long)]
        premium: String,
    },

    /// Report a flight status as the owner or an authorized caller
    ReportStatus {
        #[arg(long)]
        caller: Address,
        #[command(flatten)]
        flight: FlightArgs,
        /// Status name (e.g. late-airline) or code (e.g. 20)
        #[arg(long)]
        status: FlightStatus,
    },

    /// Withdraw a passenger's payout credit
    Withdraw {
        #[arg(long)]
        passenger: Address,
    },

    /// Register an oracle (fee in ether)
    RegisterOracle {
        #[arg(long)]
        oracle: Address,
        #[arg(long, default_value = "1")]
        fee: String,
    },

    /// Ask the oracles for a flight status
    FetchStatus {
        #[arg(long)]
        requester: Address,
        #[command(flatten)]
        flight: FlightArgs,
    },

    /// Submit an oracle response
    OracleResponse {
        #[arg(long)]
        oracle: Address,
        #[arg(long)]
        index: u8,
        #[command(flatten)]
        flight: FlightArgs,
        #[arg(long)]
        status: FlightStatus,
    },

    /// Contract owner operations
    Owner {
        #[command(subcommand)]
        command: OwnerCommands,
    },

    /// Print the contract state as JSON
    Status,

    /// Verify the operation log hash chain and replay it
    VerifyLog,
}

#[derive(Subcommand)]
enum OwnerCommands {
    /// Pause or resume the contract
    SetOperational {
        #[arg(long)]
        caller: Address,
        #[arg(long, action = clap::ArgAction::Set)]
        mode: bool,
    },

    /// Allow an address to report flight statuses
    Authorize {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        address: Address,
    },

    /// Revoke a status reporter
    Deauthorize {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        address: Address,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("flight_surety={}", log_level).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Init { force } => init_config(&cli.config, force),
        Commands::Status => show_status(&cli.config).await,
        Commands::VerifyLog => verify_log(&cli.config),
        command => run_operation(&cli.config, command).await,
    }
}

fn init_config(path: &str, force: bool) -> anyhow::Result<()> {
    if std::path::Path::new(path).exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path);
    }

    SuretyConfig::default().to_file(path)?;

    tracing::info!("Configuration written to {}", path);
    tracing::info!("Edit {} to set the owner and the first airline", path);
    Ok(())
}

/// Load the configuration and rebuild the contract from its log
fn load_contract(config_path: &str) -> anyhow::Result<(SuretyConfig, FlightSurety)> {
    tracing::debug!("Loading configuration from {}", config_path);
    let config = SuretyConfig::from_file(config_path)?;

    let log = OperationLog::load_or_new(&config.log_path)?;
    let surety = FlightSurety::replay(config.clone(), log)?;
    Ok((config, surety))
}

async fn show_status(config_path: &str) -> anyhow::Result<()> {
    let (_, surety) = load_contract(config_path)?;
    println!("{}", serde_json::to_string_pretty(&surety.summary())?);
    Ok(())
}

fn verify_log(config_path: &str) -> anyhow::Result<()> {
    let (config, surety) = load_contract(config_path)?;
    println!(
        "{}: {} entries, head {}",
        config.log_path,
        surety.log().len(),
        surety.log().head_hash()
    );
    Ok(())
}

async fn run_operation(config_path: &str, command: Commands) -> anyhow::Result<()> {
    let (config, surety) = load_contract(config_path)?;
    let service = SuretyService::new(surety, Arc::new(TracingPayoutSink));

    let result = match command {
        Commands::AddAirline { caller, candidate } => {
            let added = service.add_airline(caller, candidate).await?;
            serde_json::json!({ "added": added })
        }
        Commands::Fund { caller, airline, amount } => {
            let amount = Amount::parse_ether(&amount)?;
            let funded = service.fund_airline(caller, airline, amount).await?;
            serde_json::json!({ "became_funded": funded })
        }
        Commands::Vote { voter, candidate } => {
            let votes = service.vote(voter, candidate).await?;
            serde_json::json!({ "votes": votes })
        }
        Commands::RegisterAirline { caller, candidate } => {
            let outcome = service.register_airline(caller, candidate).await?;
            serde_json::to_value(outcome)?
        }
        Commands::RegisterFlight { caller, flight } => {
            let key = flight.key();
            let created = service.register_flight(caller, key.clone()).await?;
            serde_json::json!({ "flight": key.id(), "created": created })
        }
        Commands::Buy { passenger, flight, premium } => {
            let premium = Amount::parse_ether(&premium)?;
            service.buy(passenger, flight.key(), premium).await?;
            serde_json::json!({ "insured": true })
        }
        Commands::ReportStatus { caller, flight, status } => {
            let outcome = service.process_flight_status(caller, flight.key(), status).await?;
            serde_json::to_value(outcome)?
        }
        Commands::Withdraw { passenger } => {
            let payout = service.withdraw(passenger).await?;
            serde_json::to_value(payout)?
        }
        Commands::RegisterOracle { oracle, fee } => {
            let fee = Amount::parse_ether(&fee)?;
            let indexes = service.register_oracle(oracle, fee).await?;
            serde_json::json!({ "indexes": indexes })
        }
        Commands::FetchStatus { requester, flight } => {
            let index = service.fetch_flight_status(requester, flight.key()).await?;
            serde_json::json!({ "index": index })
        }
        Commands::OracleResponse { oracle, index, flight, status } => {
            let report = service.submit_oracle_response(oracle, index, flight.key(), status).await?;
            serde_json::to_value(report)?
        }
        Commands::Owner { command } => {
            handle_owner_command(&service, command).await?;
            serde_json::json!({ "ok": true })
        }
        Commands::Init { .. } | Commands::Status | Commands::VerifyLog => {
            anyhow::bail!("command does not change the contract")
        }
    };

    service.save_log(&config.log_path).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn handle_owner_command(service: &SuretyService, command: OwnerCommands) -> anyhow::Result<()> {
    match command {
        OwnerCommands::SetOperational { caller, mode } => {
            service.set_operating_status(caller, mode).await?;
        }
        OwnerCommands::Authorize { caller, address } => {
            service.authorize_caller(caller, address).await?;
        }
        OwnerCommands::Deauthorize { caller, address } => {
            service.deauthorize_caller(caller, address).await?;
        }
    }
    Ok(())
}
