use anyhow::Context;
use clap::Subcommand;

use crate::auth::{Role, SubjectId, TokenCodec};
use crate::cli::utils::output_value;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a token for a user id with the configured secret")]
    Issue {
        #[arg(help = "User id placed in the subject claim")]
        subject: SubjectId,
        #[arg(long, help = "Role label to embed as a hint (Administrador, Supervisor, Técnico)")]
        role: Option<String>,
        #[arg(long, help = "Lifetime in seconds (defaults to TOKEN_TTL_SECS)")]
        ttl: Option<u64>,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue { subject, role, ttl } => {
            let config = AppConfig::from_env().context("invalid configuration")?;
            let role = role.as_deref().map(str::parse::<Role>).transpose()?;
            let ttl = ttl.map(std::time::Duration::from_secs).unwrap_or_else(|| config.auth.token_ttl());

            let codec = TokenCodec::new(&config.auth.jwt_secret, ttl, config.auth.token_leeway_secs);
            let token = codec.issue(subject, role)?;
            output_value(&output_format, "token", &token)
        }
    }
}
