use anyhow::Context;
use clap::Subcommand;

use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Print the configuration the server would start with (secrets omitted)")]
    Show,
}

pub async fn handle(cmd: ConfigCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let config = AppConfig::from_env().context("invalid configuration")?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                OutputFormat::Text => {
                    println!("Environment: {:?}", config.environment);
                    println!("Port: {}", config.port);
                    println!("Store: {:?}", config.store.backend);
                    if let Some(url) = &config.store.supabase_url {
                        println!("Supabase URL: {}", url);
                    }
                    println!("Token TTL: {}s", config.auth.token_ttl_secs);
                    println!("Role lookup timeout: {}ms", config.auth.role_lookup_timeout_ms);
                    println!("Development secret: {}", config.uses_development_secret());
                }
            }
            Ok(())
        }
    }
}
