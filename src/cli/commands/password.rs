use anyhow::{bail, Context};
use clap::Subcommand;
use serde_json::{json, Value};

use crate::auth::password::{hash_password, is_hashed, verify_password};
use crate::auth::verifier::USER_TABLE;
use crate::cli::utils::{output_success, output_value};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::state::connect_store;
use crate::store::{scalar_text, Query, Row, TableStore};

#[derive(Subcommand)]
pub enum PasswordCommands {
    #[command(about = "Hash a plain-text password")]
    Hash {
        #[arg(help = "Plain-text password")]
        password: String,
    },

    #[command(about = "Check a plain-text password against a stored hash")]
    Verify {
        #[arg(help = "Plain-text password")]
        password: String,
        #[arg(help = "Stored password hash")]
        hash: String,
    },

    #[command(about = "Hash every stored password that is still plain text")]
    RehashAll {
        #[arg(long, help = "Report what would change without writing")]
        dry_run: bool,
    },
}

pub async fn handle(cmd: PasswordCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PasswordCommands::Hash { password } => {
            let hash = hash_password(&password)?;
            output_value(&output_format, "hash", &hash)
        }
        PasswordCommands::Verify { password, hash } => {
            if !verify_password(&password, &hash) {
                bail!("password does not match");
            }
            output_success(&output_format, "Password matches", None)
        }
        PasswordCommands::RehashAll { dry_run } => rehash_all(dry_run, &output_format).await,
    }
}

async fn rehash_all(dry_run: bool, output_format: &OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    let store = connect_store(&config).await.context("failed to initialise table store")?;

    let migrated = rehash_plaintext(store.as_ref(), dry_run).await?;

    let message = if dry_run {
        format!("{} password(s) would be rehashed", migrated.len())
    } else {
        format!("{} password(s) rehashed", migrated.len())
    };
    output_success(output_format, &message, Some(json!({ "users": migrated })))
}

/// Hash every stored password that is still plaintext and return the ids touched.
///
/// Existing argon2 and bcrypt hashes are left alone. With `dry_run` nothing is written.
pub async fn rehash_plaintext(store: &dyn TableStore, dry_run: bool) -> anyhow::Result<Vec<Value>> {
    let users = store
        .select(&Query::table(USER_TABLE).select(&["id", "password"]).order_asc("id"))
        .await?;

    let mut migrated: Vec<Value> = Vec::new();
    for user in users {
        let Some(id) = user.get("id").cloned() else { continue };
        let Some(stored) = user.get("password").and_then(scalar_text) else { continue };
        if stored.is_empty() || is_hashed(&stored) {
            continue;
        }

        if !dry_run {
            let mut patch = Row::new();
            patch.insert("password".into(), Value::from(hash_password(&stored)?));
            store.update(&Query::table(USER_TABLE).eq("id", id.clone()), patch).await?;
        }
        tracing::info!(user = %id, dry_run, "password rehashed");
        migrated.push(id);
    }
    Ok(migrated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const LEGACY: &str = "$2b$10$xU3ixvRG9dWBhRZ4Gyt/TexU5XFJgqK2w9H.6jlX7q3uEret7sqB";

    async fn store_with_mixed_passwords(argon: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .seed(
                USER_TABLE,
                vec![
                    json!({"id": 1, "password": "plain-one"}),
                    json!({"id": 2, "password": argon}),
                    json!({"id": 3, "password": LEGACY}),
                    json!({"id": 4, "password": "plain-four"}),
                    json!({"id": 5, "password": ""}),
                    json!({"id": 6, "password": null}),
                ],
            )
            .await;
        store
    }

    fn password_of(rows: &[Row], id: i64) -> String {
        rows.iter()
            .find(|r| r.get("id") == Some(&json!(id)))
            .and_then(|r| r.get("password"))
            .and_then(scalar_text)
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn only_plaintext_passwords_are_rehashed() {
        let argon = hash_password("already").unwrap();
        let store = store_with_mixed_passwords(&argon).await;

        let migrated = rehash_plaintext(&store, false).await.unwrap();
        assert_eq!(migrated, vec![json!(1), json!(4)]);

        let rows = store.rows(USER_TABLE).await;
        assert!(verify_password("plain-one", &password_of(&rows, 1)));
        assert!(verify_password("plain-four", &password_of(&rows, 4)));
        assert_eq!(password_of(&rows, 2), argon);
        assert_eq!(password_of(&rows, 3), LEGACY);
        assert_eq!(password_of(&rows, 5), "");

        // A second run finds nothing left to do.
        assert!(rehash_plaintext(&store, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let argon = hash_password("already").unwrap();
        let store = store_with_mixed_passwords(&argon).await;
        let before = store.rows(USER_TABLE).await;

        let migrated = rehash_plaintext(&store, true).await.unwrap();
        assert_eq!(migrated, vec![json!(1), json!(4)]);
        assert_eq!(store.rows(USER_TABLE).await, before);
    }
}
