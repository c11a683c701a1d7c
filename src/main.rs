use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use loyalty_core::{Amount, CallOutcome, LedgerResult, LoyaltyLedger, ProgramId, RewardId};

mod settings;
mod store;

use settings::SettingsError;
use store::StoreError;

/// Loyalty ledger CLI: issue program points and redeem catalog rewards.
///
/// Every invocation loads the ledger snapshot, performs one call, prints the
/// `{success, value | error}` outcome as JSON and persists successful
/// mutations.
#[derive(Parser, Debug)]
#[command(name = "loyalty", version)]
struct Cli {
    /// Ledger snapshot file (JSON); created on the first successful mutation
    #[arg(long, env = "LOYALTY_STATE", default_value = "loyalty-state.json")]
    state: PathBuf,

    /// Optional TOML file with ledger policy
    #[arg(long, env = "LOYALTY_CONFIG")]
    config: Option<PathBuf>,

    /// Identity of the caller; required for mutating commands
    #[arg(long, env = "LOYALTY_CALLER")]
    caller: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Create a loyalty program owned by the caller
    CreateProgram { name: String, point_name: String },
    /// Issue points of a program to a user (owner only)
    IssuePoints {
        program_id: ProgramId,
        user: String,
        amount: Amount,
    },
    /// Deactivate a program (owner only)
    DeactivateProgram { program_id: ProgramId },
    GetProgram { program_id: ProgramId },
    GetBalance { program_id: ProgramId, user: String },
    /// Add a reward to the catalog
    AddReward {
        name: String,
        description: String,
        cost: Amount,
        inventory: Amount,
    },
    /// Redeem units of a reward as the caller
    RedeemReward { reward_id: RewardId, amount: Amount },
    GetReward { reward_id: RewardId },
    GetUserRedemptions { user: String, reward_id: RewardId },
    /// Print the hex state root of the current snapshot
    StateRoot,
    /// Print the mutation journal
    Events,
}

impl Command {
    fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::CreateProgram { .. }
                | Command::IssuePoints { .. }
                | Command::DeactivateProgram { .. }
                | Command::AddReward { .. }
                | Command::RedeemReward { .. }
        )
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("--caller (or LOYALTY_CALLER) is required for this command")]
    MissingCaller,
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

struct Execution {
    output: Value,
    success: bool,
}

fn outcome<V: Serialize>(result: LedgerResult<V>) -> Result<Execution, CliError> {
    let outcome = CallOutcome::from(result);
    Ok(Execution {
        success: outcome.is_success(),
        output: serde_json::to_value(&outcome)?,
    })
}

fn plain<V: Serialize>(value: V) -> Result<Execution, CliError> {
    outcome(Ok(value))
}

fn execute(
    ledger: &LoyaltyLedger,
    caller: Option<&str>,
    command: Command,
) -> Result<Execution, CliError> {
    let caller = || caller.ok_or(CliError::MissingCaller);
    match command {
        Command::CreateProgram { name, point_name } => {
            outcome(ledger.create_program(&name, &point_name, caller()?))
        }
        Command::IssuePoints {
            program_id,
            user,
            amount,
        } => outcome(
            ledger
                .issue_points(program_id, &user, amount, caller()?)
                .map(|()| true),
        ),
        Command::DeactivateProgram { program_id } => outcome(
            ledger
                .deactivate_program(program_id, caller()?)
                .map(|()| true),
        ),
        Command::GetProgram { program_id } => outcome(ledger.get_program(program_id)),
        Command::GetBalance { program_id, user } => plain(ledger.get_balance(program_id, &user)),
        Command::AddReward {
            name,
            description,
            cost,
            inventory,
        } => outcome(ledger.add_reward(&name, &description, cost, inventory, caller()?)),
        Command::RedeemReward { reward_id, amount } => outcome(
            ledger
                .redeem_reward(reward_id, amount, caller()?)
                .map(|()| true),
        ),
        Command::GetReward { reward_id } => outcome(ledger.get_reward(reward_id)),
        Command::GetUserRedemptions { user, reward_id } => {
            plain(ledger.get_user_redemptions(&user, reward_id))
        }
        Command::StateRoot => plain(ledger.snapshot().state_root_hex()),
        Command::Events => plain(ledger.events()),
    }
}

fn run(cli: Cli) -> Result<bool, CliError> {
    let config = settings::load(cli.config.as_deref())?;
    let mutation = cli.command.is_mutation();
    // Held until the snapshot is saved so concurrent runs apply one at a time.
    let _lock = mutation.then(|| store::lock(&cli.state)).transpose()?;
    let ledger = store::open(&cli.state, config)?;

    let execution = execute(&ledger, cli.caller.as_deref(), cli.command)?;
    if mutation && execution.success {
        store::save(&cli.state, &ledger.snapshot())?;
        debug!(state = %cli.state.display(), "ledger snapshot saved");
    }
    println!("{}", serde_json::to_string_pretty(&execution.output)?);
    Ok(execution.success)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!(%err, "command failed");
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}
