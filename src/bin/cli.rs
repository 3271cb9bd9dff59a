use clap::Parser;
use plasma_wallet_tracker::api::{Cli, CliHandler};
use plasma_wallet_tracker::config::AppConfig;

#[tokio::main]
async fn main() {
    // Less verbose than the tracker itself
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let handler = CliHandler::new(config);
    if let Err(e) = handler.execute_command(&cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
