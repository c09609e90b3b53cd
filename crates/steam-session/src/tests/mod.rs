//! Crate-level integration and BDD tests.

use std::sync::Arc;
use std::time::Duration;

use steam_state::{Password, RateLimitStore, SessionStore, SteamId};
use tempfile::TempDir;
use time::macros::datetime;

use crate::auth::{AuthService, LoginStatus};
use crate::connection::{ConnectionManager, NoDaemon, Route, SessionTimeouts};
use crate::governor::{ATTEMPT_SPACING, RateLimitGovernor};
use crate::test_support::{ClientCall, LoginScript, ManualClock, ScriptedFactory};


/// Builds a service over a temporary state directory with a frozen clock.
fn scripted_service(
    dir: &TempDir,
    factory: &Arc<ScriptedFactory>,
    clock: &Arc<ManualClock>,
) -> AuthService {
    let governor = RateLimitGovernor::with_clock(
        RateLimitStore::new(dir.path().join("rate_limit.json")),
        clock.clone(),
    );
    let manager = ConnectionManager::new(
        factory.clone(),
        SessionStore::new(dir.path().join("session.json")),
        governor,
        Arc::new(NoDaemon),
    )
    .with_timeouts(SessionTimeouts {
        connect: Duration::from_secs(2),
        login: Duration::from_secs(2),
    });
    AuthService::new(manager)
}

#[test]
fn login_then_message_reuses_the_live_handle() {
    let dir = TempDir::new().expect("temp dir");
    let factory = ScriptedFactory::new(vec![LoginScript::Succeed(SteamId::new(11))]);
    let clock = ManualClock::starting_at(datetime!(2025-06-01 09:00 UTC));
    let service = scripted_service(&dir, &factory, &clock);

    let report = service
        .login("alice", Password::new("hunter2"))
        .expect("login");
    assert_eq!(
        report.status,
        LoginStatus::Authenticated {
            steam_id: SteamId::new(11)
        }
    );
    clock.advance(ATTEMPT_SPACING);

    let connection = service
        .send_message(SteamId::new(22), "hi")
        .expect("send");
    assert_eq!(connection.route(), Route::Reused);
    assert_eq!(factory.opened().len(), 1);

    let client = factory.latest().expect("client");
    assert!(client.calls().contains(&ClientCall::SendMessage {
        recipient: SteamId::new(22),
        text: String::from("hi"),
    }));
}
