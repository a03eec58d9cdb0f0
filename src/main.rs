use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// sdkpm - keeps third-party SDK dependencies consistent with the build mode
#[derive(Parser)]
#[command(name = "sdkpm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Show details and debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .sdkpm/config.toml with default settings
    Init,

    /// Show or change the build mode
    Mode {
        #[command(subcommand)]
        action: ModeAction,
    },

    /// Install the SDKs required by the current mode
    Install {
        /// Show the planned manifest changes without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove SDKs not allowed in the current mode
    Uninstall {
        /// Show the planned manifest changes without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// List supported SDKs and their install status
    List,

    /// Run the pre-build checks
    Doctor {
        /// Repair what can be repaired, then check again
        #[arg(long)]
        fix: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove stale SDK entries from the Android manifest
    Sanitize {
        /// Show what would be removed without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ModeAction {
    /// Show the current mode
    Show,

    /// Switch mode and bring the project in line with it
    Set {
        /// prototype or full
        mode: String,
    },

    /// Forget the stored mode
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., sanitizer.backup)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SDKPM_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let project = match cli.project {
        Some(path) => path,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    };

    let result = match cli.command {
        Commands::Init => commands::init::run(&project),
        Commands::Mode { action } => match action {
            ModeAction::Show => commands::mode::run_show(&project),
            ModeAction::Set { mode } => commands::mode::run_set(&project, &mode, cli.verbose),
            ModeAction::Clear => commands::mode::run_clear(&project),
        },
        Commands::Install { dry_run } => commands::install::run(&project, dry_run),
        Commands::Uninstall { dry_run } => commands::uninstall::run(&project, dry_run),
        Commands::List => commands::list::run(&project),
        Commands::Doctor { fix, json } => commands::doctor::run(&project, cli.verbose, fix, json),
        Commands::Sanitize { dry_run } => commands::sanitize::run(&project, dry_run),
        Commands::Config { action } => commands::config::run(&project, &action),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "sdkpm", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
