use clap::Parser;
use lexgate::config::load_config;
use lexgate::startup::{build_client, run, schema_value, Invocation};
use lexgate::utils::logger::init_logging;
use serde_json::Value;
use tracing::error;

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{}", rendered),
        Err(e) => eprintln!("Error rendering output: {}", e),
    }
}

#[tokio::main]
async fn main() {
    let invocation = Invocation::parse();

    if invocation.command.is_offline() {
        match schema_value() {
            Ok(schema) => print_json(&schema),
            Err(e) => {
                eprintln!("Error rendering schema: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let config = match load_config(&invocation.config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Error initialising logging: {}", e);
        std::process::exit(1);
    }

    let client = match build_client(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build API client: {}", e);
            std::process::exit(1);
        }
    };

    match run(&client, invocation.command).await {
        Ok(output) => print_json(&output),
        Err(e) => {
            error!("Command failed: {}", e);
            std::process::exit(1);
        }
    }
}
