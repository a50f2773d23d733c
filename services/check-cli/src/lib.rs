mod cli;
mod commands;
mod infra;

use address_check::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
