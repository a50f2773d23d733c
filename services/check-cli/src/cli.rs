use crate::commands::{run_check, run_diff, run_fingerprint, CheckArgs, DiffArgs, FingerprintArgs};
use address_check::error::AppError;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "address-check",
    about = "Run address verification passes against recorded verifier responses",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one check pass and print the result together with the persisted state
    Check(CheckArgs),
    /// Print the fingerprint (and cache key) of an address
    Fingerprint(FingerprintArgs),
    /// Print a tagged word diff between two field values
    Diff(DiffArgs),
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check(args) => run_check(args).await,
        Command::Fingerprint(args) => run_fingerprint(args),
        Command::Diff(args) => run_diff(args),
    }
}
