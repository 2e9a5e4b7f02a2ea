mod cli;
mod infra;
mod routes;
mod server;

use coi_generator::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
