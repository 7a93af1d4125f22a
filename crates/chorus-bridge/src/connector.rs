// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spawns one sidecar process per account.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chorus_config::BridgeConfig;
use chorus_core::{AccountConfig, AccountId, ChorusError, Connection, Connector, InboundSink};
use tokio::process::Command;
use tracing::info;

use crate::connection::SidecarConnection;
use crate::protocol::SidecarCommand;

pub struct BridgeConnector {
    config: BridgeConfig,
}

impl BridgeConnector {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Where the sidecar keeps the durable session of `account_id`.
    pub fn session_path(&self, account_id: AccountId) -> PathBuf {
        PathBuf::from(&self.config.session_dir).join(format!("account_{account_id}"))
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }
}

#[async_trait]
impl Connector for BridgeConnector {
    async fn connect(
        &self,
        account: &AccountConfig,
        sink: Arc<dyn InboundSink>,
    ) -> Result<Arc<dyn Connection>, ChorusError> {
        let session_path = self.session_path(account.id);
        if let Some(parent) = session_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ChorusError::Transport {
                    message: format!("cannot create session directory {}", parent.display()),
                    source: Some(Box::new(e)),
                })?;
        }

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .env("CHORUS_ACCOUNT_ID", account.id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| ChorusError::Transport {
            message: format!("failed to spawn sidecar '{}'", self.config.command),
            source: Some(Box::new(e)),
        })?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ChorusError::transport("sidecar stdio was not piped"));
        };

        info!(
            account_id = %account.id,
            command = %self.config.command,
            pid = child.id().unwrap_or_default(),
            "sidecar spawned"
        );

        let connection =
            SidecarConnection::spawn(account.id, stdout, stdin, sink, self.request_timeout());
        connection.attach_child(child).await;

        let started: Result<serde_json::Value, ChorusError> = connection
            .request(|request_id| SidecarCommand::Start {
                request_id,
                phone_number: account.phone_number.clone(),
                api_id: account.api_id,
                api_hash: account.api_hash.clone(),
                session_path: session_path.display().to_string(),
            })
            .await;
        if let Err(e) = started {
            let _ = connection.disconnect().await;
            return Err(e);
        }

        Ok(connection as Arc<dyn Connection>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_paths_are_per_account() {
        let connector = BridgeConnector::new(BridgeConfig {
            session_dir: "/var/lib/chorus/sessions".into(),
            ..BridgeConfig::default()
        });
        assert_eq!(
            connector.session_path(AccountId(12)),
            PathBuf::from("/var/lib/chorus/sessions/account_12")
        );
    }

    #[tokio::test]
    async fn missing_sidecar_binary_is_a_transport_error() {
        struct NullSink;
        impl InboundSink for NullSink {
            fn deliver(&self, _: chorus_core::InboundEvent) {}
        }

        let dir = std::env::temp_dir().join(format!("chorus-bridge-{}", std::process::id()));
        let connector = BridgeConnector::new(BridgeConfig {
            command: "/nonexistent/chorus-sidecar".into(),
            session_dir: dir.display().to_string(),
            ..BridgeConfig::default()
        });
        let account = AccountConfig::new(AccountId(1), "+15550001");

        let err = match connector.connect(&account, Arc::new(NullSink)).await {
            Ok(_) => panic!("connect should fail"),
            Err(e) => e,
        };
        assert!(err.is_transient());
        assert!(err.to_string().contains("failed to spawn sidecar"));
    }
}
