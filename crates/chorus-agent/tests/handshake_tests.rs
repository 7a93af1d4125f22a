// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interactive login: code and password submission through the handshake.

use std::sync::Arc;
use std::time::Duration;

use chorus_agent::{AccountSession, AuthHandshake, HandshakePhase, SessionDeps, SessionSettings};
use chorus_core::{AccountId, AccountStatus, ChorusError, HandshakeState};
use chorus_test_utils::{MemoryStore, MockConnection, MockConnector, MockGenerator, fixtures};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

struct Login {
    store: Arc<MemoryStore>,
    conn: Arc<MockConnection>,
    session: Arc<AccountSession>,
    account_id: AccountId,
}

async fn login() -> Login {
    let store = Arc::new(MemoryStore::new());
    let account = store.add_account(fixtures::account("+15550199")).await;
    let conn = Arc::new(MockConnection::new());
    let deps = SessionDeps::new(
        store.clone(),
        Arc::new(MockConnector::new(Arc::clone(&conn))),
        Arc::new(MockGenerator::new()),
        SessionSettings::from_config(&fixtures::config()),
    );
    let account_id = account.id;
    Login {
        session: AccountSession::new(account, deps),
        store,
        conn,
        account_id,
    }
}

async fn wait_for_phase(handshake: &AuthHandshake, phase: HandshakePhase) {
    for _ in 0..500 {
        if handshake.phase() == phase {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("handshake never reached {phase}, stuck in {}", handshake.phase());
}

#[tokio::test(start_paused = true)]
async fn code_without_waiting_handshake_times_out() {
    let store = Arc::new(MemoryStore::new());
    let handshake = AuthHandshake::new(
        AccountId(1),
        "+1",
        store,
        &fixtures::config().handshake,
        CancellationToken::new(),
    );
    let started = tokio::time::Instant::now();

    let err = handshake.submit_code("12345").await.unwrap_err();

    assert!(matches!(err, ChorusError::SubmissionTimeout { step: "code" }));
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn submitted_code_completes_login() {
    let l = login().await;
    l.conn.require_login("24680", None);

    let establishing = {
        let session = Arc::clone(&l.session);
        tokio::spawn(async move { session.establish().await })
    };
    let handshake = l.session.handshake();
    wait_for_phase(&handshake, HandshakePhase::AwaitingCode).await;

    let records = l.store.handshakes(l.account_id).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].state, HandshakeState::WaitingCode);
    assert!(records[0].expires_at > chrono::Utc::now());

    handshake.submit_code("24680").await.unwrap();
    establishing.await.unwrap().unwrap();

    assert_eq!(handshake.phase(), HandshakePhase::Completed);
    assert_eq!(
        l.store.handshakes(l.account_id).await[0].state,
        HandshakeState::Completed
    );
    assert_eq!(l.session.status(), AccountStatus::Online);
}

#[tokio::test(start_paused = true)]
async fn second_factor_password_is_requested_after_code() {
    let l = login().await;
    l.conn.require_login("11111", Some("correct horse"));

    let establishing = {
        let session = Arc::clone(&l.session);
        tokio::spawn(async move { session.establish().await })
    };
    let handshake = l.session.handshake();
    wait_for_phase(&handshake, HandshakePhase::AwaitingCode).await;
    handshake.submit_code("11111").await.unwrap();

    wait_for_phase(&handshake, HandshakePhase::AwaitingPassword).await;
    assert_eq!(
        l.store.handshakes(l.account_id).await[0].state,
        HandshakeState::WaitingPassword
    );
    handshake
        .submit_password(SecretString::from("correct horse"))
        .await
        .unwrap();

    establishing.await.unwrap().unwrap();
    assert_eq!(handshake.phase(), HandshakePhase::Completed);
    assert_eq!(
        l.store.handshakes(l.account_id).await[0].state,
        HandshakeState::Completed
    );
}

#[tokio::test(start_paused = true)]
async fn wrong_code_fails_startup() {
    let l = login().await;
    l.conn.require_login("24680", None);

    let starting = {
        let session = Arc::clone(&l.session);
        tokio::spawn(async move { session.start().await })
    };
    let handshake = l.session.handshake();
    wait_for_phase(&handshake, HandshakePhase::AwaitingCode).await;
    handshake.submit_code("00000").await.unwrap();

    let err = starting.await.unwrap().unwrap_err();
    assert!(matches!(err, ChorusError::Authentication(_)));
    assert_eq!(handshake.phase(), HandshakePhase::Failed);
    assert_eq!(
        l.store.account(l.account_id).await.unwrap().status,
        AccountStatus::Error
    );
}

#[tokio::test(start_paused = true)]
async fn unanswered_code_times_out_after_input_timeout() {
    let l = login().await;
    l.conn.require_login("24680", None);
    let started = tokio::time::Instant::now();

    let err = l.session.start().await.unwrap_err();

    assert!(matches!(err, ChorusError::Authentication(_)));
    assert!(started.elapsed() >= Duration::from_secs(300));
    assert_eq!(l.session.handshake().phase(), HandshakePhase::Failed);
    assert_eq!(
        l.store.account(l.account_id).await.unwrap().status,
        AccountStatus::Error
    );
}

#[tokio::test(start_paused = true)]
async fn stopping_during_login_cancels_the_wait() {
    let l = login().await;
    l.conn.require_login("24680", None);

    let establishing = {
        let session = Arc::clone(&l.session);
        tokio::spawn(async move { session.establish().await })
    };
    wait_for_phase(&l.session.handshake(), HandshakePhase::AwaitingCode).await;

    l.session.stop().await;

    let err = establishing.await.unwrap().unwrap_err();
    assert!(matches!(err, ChorusError::Cancelled));
    assert_eq!(
        l.store.account(l.account_id).await.unwrap().status,
        AccountStatus::Offline
    );
}
