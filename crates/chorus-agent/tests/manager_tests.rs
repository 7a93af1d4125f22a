// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry behaviour.

use std::sync::Arc;
use std::time::Duration;

use chorus_agent::{SessionDeps, SessionManager, SessionRegistry, SessionSettings};
use chorus_core::{AccountConfig, AccountId, AccountStatus, AdminStore, ChorusError};
use chorus_test_utils::{MemoryStore, MockConnection, MockConnector, MockGenerator, fixtures};

struct Fixture {
    store: Arc<MemoryStore>,
    conn: Arc<MockConnection>,
    manager: SessionManager,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let conn = Arc::new(MockConnection::new());
    let deps = SessionDeps::new(
        store.clone(),
        Arc::new(MockConnector::new(Arc::clone(&conn))),
        Arc::new(MockGenerator::new()),
        SessionSettings::from_config(&fixtures::config()),
    );
    Fixture {
        store,
        conn,
        manager: SessionManager::new(deps),
    }
}

async fn wait_online(manager: &SessionManager, account_id: AccountId) {
    for _ in 0..200 {
        if let Some(snapshot) = manager.session_snapshot(account_id).await {
            if snapshot.status == AccountStatus::Online {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("account {account_id} never came online");
}

async fn seeded(f: &Fixture, phone: &str) -> AccountConfig {
    f.store.add_account(fixtures::account(phone)).await
}

#[tokio::test]
async fn added_client_comes_online() {
    let f = fixture();
    let account = seeded(&f, "+1").await;

    f.manager.add_client(account.clone()).await.unwrap();
    wait_online(&f.manager, account.id).await;

    let snapshot = f.manager.session_snapshot(account.id).await.unwrap();
    assert!(snapshot.connected);
    assert_eq!(snapshot.handshake, "unauthenticated");
    assert_eq!(f.manager.active_accounts().await, vec![account.id]);
    f.manager.shutdown().await;
}

#[tokio::test]
async fn adding_again_replaces_and_stops_the_old_session() {
    let f = fixture();
    let account = seeded(&f, "+1").await;

    f.manager.add_client(account.clone()).await.unwrap();
    let first = f.manager.session(account.id).await.unwrap();
    f.manager.add_client(account.clone()).await.unwrap();
    let second = f.manager.session(account.id).await.unwrap();

    assert!(first.is_stopped());
    assert!(!second.is_stopped());
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(f.manager.active_accounts().await.len(), 1);
    f.manager.shutdown().await;
}

#[tokio::test]
async fn remove_client_is_idempotent() {
    let f = fixture();
    let account = seeded(&f, "+1").await;
    f.manager.add_client(account.clone()).await.unwrap();
    wait_online(&f.manager, account.id).await;

    f.manager.remove_client(account.id).await;
    f.manager.remove_client(account.id).await;

    assert!(f.manager.session(account.id).await.is_none());
    assert!(f.manager.auth_handshake(account.id).await.is_none());
    assert_eq!(
        f.store.account(account.id).await.unwrap().status,
        AccountStatus::Offline
    );
}

#[tokio::test]
async fn manual_send_requires_a_live_session() {
    let f = fixture();
    let err = f
        .manager
        .send_message_to_group(AccountId(404), 1, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, ChorusError::SessionNotFound(AccountId(404))));
}

#[tokio::test]
async fn manual_send_reaches_the_conversation() {
    let f = fixture();
    let account = seeded(&f, "+1").await;
    let conversation = f
        .store
        .upsert_conversation(&fixtures::group(321))
        .await
        .unwrap();
    f.manager.add_client(account.clone()).await.unwrap();
    wait_online(&f.manager, account.id).await;

    f.manager
        .send_message_to_group(account.id, conversation.id, "good morning")
        .await
        .unwrap();
    assert_eq!(f.conn.sent_texts(), vec!["good morning"]);
    assert_eq!(f.store.sent_messages().await.len(), 1);

    let err = f
        .manager
        .send_message_to_group(account.id, 9999, "lost")
        .await
        .unwrap_err();
    assert!(matches!(err, ChorusError::NotFound { .. }));
    f.manager.shutdown().await;
}

#[tokio::test]
async fn start_enabled_skips_disabled_accounts() {
    let f = fixture();
    let enabled = seeded(&f, "+1").await;
    let mut disabled = fixtures::account("+2");
    disabled.enabled = false;
    f.store.add_account(disabled).await;

    assert_eq!(f.manager.start_enabled().await.unwrap(), 1);
    assert_eq!(f.manager.active_accounts().await, vec![enabled.id]);

    f.manager.shutdown().await;
    assert!(f.manager.active_accounts().await.is_empty());
}
