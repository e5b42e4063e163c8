//! zabbix-pingdom Server Entry Point

use clap::Parser;
use zabbix_pingdom::cli::{serve::ServeArgs, Cli, Commands};
use zabbix_pingdom::config::AppConfig;
use zabbix_pingdom::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error during starting the app: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(config.debug) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli.command {
        Some(Commands::Check(args)) => {
            match zabbix_pingdom::cli::check::execute(&args, &config).await {
                Ok(code) => std::process::exit(code),
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    std::process::exit(2);
                }
            }
        }
        Some(Commands::Serve(args)) => serve(&args, config).await,
        None => {
            // No subcommand - default to serve
            serve(&ServeArgs::default(), config).await;
        }
    }
}

async fn serve(args: &ServeArgs, config: AppConfig) {
    if let Err(e) = zabbix_pingdom::cli::serve::execute(args, config).await {
        eprintln!("Error during starting the app: {:#}", e);
        std::process::exit(1);
    }
}
