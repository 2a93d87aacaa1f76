/*!
 * PASS Deposit CLI
 */

use clap::{Parser, Subcommand};
use pass_deposit::{
    commands::{self, Runtime},
    config::DepositConfig,
    error::{Result, EXIT_PARTIAL, EXIT_SUCCESS},
    logging,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pass-deposit")]
#[command(version, about = "Deposit submissions into target repositories over SWORD v2 and FTP", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Document store root (overrides store.path)
    #[arg(long = "store", value_name = "DIR", global = true)]
    store: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deposit a submitted submission into all of its target repositories
    Submit {
        /// Submission id
        submission: String,
    },

    /// Assemble the package a packager would send and write it to a file
    Package {
        /// Submission id
        submission: String,

        /// Packager (repository name) to assemble for
        #[arg(short, long)]
        packager: String,

        /// Output file
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,
    },

    /// Resolve and record the remote status of a deposit
    Status {
        /// Deposit id
        deposit: String,

        /// Packager to resolve with (defaults to the deposit's repository name)
        #[arg(short, long)]
        packager: Option<String>,
    },
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => DepositConfig::from_file(path)?,
        None => DepositConfig::default(),
    };
    config.logging.verbose |= cli.verbose;

    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let runtime = Runtime::new(config, cli.store)?;

    match cli.command {
        Commands::Submit { submission } => {
            let report = commands::submit::run(&runtime, &submission)?;
            report.print();
            Ok(if report.complete() {
                EXIT_SUCCESS
            } else {
                EXIT_PARTIAL
            })
        }
        Commands::Package {
            submission,
            packager,
            out,
        } => {
            commands::package::run(&runtime, &submission, &packager, &out)?.print();
            Ok(EXIT_SUCCESS)
        }
        Commands::Status { deposit, packager } => {
            let deposit = commands::status::run(&runtime, &deposit, packager.as_deref())?;
            commands::status::print(&deposit);
            Ok(EXIT_SUCCESS)
        }
    }
}
