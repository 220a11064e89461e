//! Client construction and the command-line front end.
//!
//! This module wires the configured token store into an `ApiClient` and runs
//! one CLI command against it.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use crate::client::{ApiClient, AuthListener};
use crate::config::{config_schema, ConfigV1, DEFAULT_CONFIG_PATH};
use crate::error::ClientError;
use crate::models::{Envelope, RequestOptions};
use crate::store::create_store;

/// lexgate - talk to an authenticated backend from the command line.
#[derive(Parser, Debug)]
#[command(name = "lexgate")]
#[command(about = "Authenticated API client with transparent session refresh")]
#[command(version)]
pub struct Invocation {
    /// Path to the YAML configuration file
    #[arg(short, long = "config", default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config_path: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Exchange credentials for a session
    Login { username: String, password: String },

    /// Check the stored access token with the backend
    Verify,

    /// Clear the stored session
    Logout,

    /// Print whether a session is stored
    Status,

    /// GET a backend path
    Get { path: String },

    /// DELETE a backend path
    Delete { path: String },

    /// POST a JSON body
    Post {
        path: String,
        #[arg(value_parser = parse_json_body)]
        body: Value,
    },

    /// PUT a JSON body
    Put {
        path: String,
        #[arg(value_parser = parse_json_body)]
        body: Value,
    },

    /// Print the configuration JSON schema
    Schema,
}

impl Command {
    /// Commands that need no backend and no config file.
    pub fn is_offline(&self) -> bool {
        matches!(self, Command::Schema)
    }
}

fn parse_json_body(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON body: {}", e))
}

/// Builds the client described by `config`, with auth transitions logged.
pub fn build_client(config: &ConfigV1) -> Result<Arc<ApiClient>, ClientError> {
    let store = create_store(&config.store)?;
    let client = Arc::new(ApiClient::from_config(&config.api, store));

    let observed = Arc::downgrade(&client);
    let listener: AuthListener = Arc::new(move || {
        if let Some(client) = observed.upgrade() {
            info!(
                authenticated = client.is_authenticated(),
                "Authentication state changed"
            );
        }
    });
    client.add_listener(&listener);

    Ok(client)
}

/// The configuration JSON schema, as printed by the `schema` command.
pub fn schema_value() -> Result<Value, ClientError> {
    Ok(serde_json::from_str(&config_schema()?)?)
}

/// Runs one command against the backend and returns what should be printed.
pub async fn run(client: &ApiClient, command: Command) -> Result<Value, ClientError> {
    let envelope: Envelope = match command {
        Command::Login { username, password } => {
            let ok = client.login(&username, &password).await;
            return Ok(serde_json::json!({ "authenticated": ok }));
        }
        Command::Verify => {
            let valid = client.verify().await?;
            return Ok(serde_json::json!({ "valid": valid }));
        }
        Command::Logout => {
            client.logout();
            return Ok(serde_json::json!({ "authenticated": false }));
        }
        Command::Status => {
            return Ok(serde_json::json!({ "authenticated": client.is_authenticated() }));
        }
        Command::Schema => return schema_value(),
        Command::Get { path } => client.get(&path, RequestOptions::default()).await,
        Command::Delete { path } => client.delete(&path, RequestOptions::default()).await,
        Command::Post { path, body } => client.post(&path, body, RequestOptions::default()).await,
        Command::Put { path, body } => client.put(&path, body, RequestOptions::default()).await,
    };
    Ok(serde_json::to_value(envelope)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(args: &[&str]) -> Result<Invocation, clap::Error> {
        Invocation::try_parse_from(std::iter::once("lexgate").chain(args.iter().copied()))
    }

    #[test]
    fn parses_login_with_default_config() {
        let invocation = parse(&["login", "alice", "secret"]).unwrap();
        assert_eq!(invocation.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(
            invocation.command,
            Command::Login {
                username: "alice".into(),
                password: "secret".into(),
            }
        );
    }

    #[test]
    fn parses_config_flag_anywhere() {
        let after = parse(&["get", "/processos", "--config", "/etc/lexgate.yaml"]).unwrap();
        assert_eq!(after.config_path, PathBuf::from("/etc/lexgate.yaml"));
        assert_eq!(
            after.command,
            Command::Get {
                path: "/processos".into()
            }
        );

        let before = parse(&["-c", "/etc/lexgate.yaml", "status"]).unwrap();
        assert_eq!(before.config_path, PathBuf::from("/etc/lexgate.yaml"));
        assert_eq!(before.command, Command::Status);
    }

    #[test]
    fn parses_json_bodies() {
        let invocation = parse(&["post", "/cidades", r#"{"nome": "Olinda"}"#]).unwrap();
        assert_eq!(
            invocation.command,
            Command::Post {
                path: "/cidades".into(),
                body: json!({"nome": "Olinda"}),
            }
        );
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["login", "alice"]).is_err());
        assert!(parse(&["post", "/cidades", "{oops"]).is_err());
        assert!(parse(&["frobnicate"]).is_err());
        assert!(parse(&["status", "--config"]).is_err());
    }

    #[test]
    fn schema_runs_offline() {
        assert!(Command::Schema.is_offline());
        let schema = schema_value().unwrap();
        assert!(schema.is_object());
    }
}
