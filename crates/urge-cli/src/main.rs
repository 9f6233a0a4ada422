use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use urge_core::CoreError;

mod commands;

#[derive(Parser)]
#[command(name = "urge-cli", version, about = "Urge CLI: wait timer and allowances")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Complete onboarding (first run, or after change-substance)
    Onboard(commands::profile::OnboardArgs),
    /// Take one from the daily allowance and start the wait
    Take {
        /// Take even though the wait is still running
        #[arg(long)]
        force: bool,
    },
    /// Use one from the weekly panic allowance
    Panic,
    /// Stop the running countdown
    Stop,
    /// Print current state as JSON
    Status,
    /// Start the day over (panic allowance is kept)
    ResetDay,
    /// Set remaining counts directly
    Override {
        #[arg(long)]
        daily: u32,
        #[arg(long)]
        panic: u32,
    },
    /// Change limits; a running wait is rescaled
    Settings(commands::profile::SettingsArgs),
    /// Wipe all state and statistics
    ChangeSubstance {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
    /// Usage statistics
    Stats,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the display and rollover ticks in the foreground
    Run,
    /// Act as the companion mirror
    Peer {
        #[command(subcommand)]
        action: commands::peer::PeerAction,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("URGE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Onboard(args) => commands::profile::onboard(args),
        Commands::Take { force } => commands::timer::take(force),
        Commands::Panic => commands::timer::panic(),
        Commands::Stop => commands::timer::stop(),
        Commands::Status => commands::timer::status(),
        Commands::ResetDay => commands::day::reset_day(),
        Commands::Override { daily, panic } => commands::day::apply_override(daily, panic),
        Commands::Settings(args) => commands::profile::settings(args),
        Commands::ChangeSubstance { yes } => commands::profile::change_substance(yes),
        Commands::Stats => commands::stats::run(),
        Commands::Config { action } => commands::config::run(action),
        Commands::Run => commands::run::run(),
        Commands::Peer { action } => commands::peer::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "urge-cli", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        if let Some(CoreError::OutOfAllowance(rejected)) = e.downcast_ref::<CoreError>() {
            println!("{}", serde_json::json!({ "rejected": rejected.kind }));
            std::process::exit(2);
        }
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
