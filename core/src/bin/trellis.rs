//! Trellis CLI
//!
//! Renders JSON component documents from the command line and prints the
//! effective configuration.

use trellis_core::cli;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
