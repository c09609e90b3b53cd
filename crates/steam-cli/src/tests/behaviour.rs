//! Behaviour-driven tests for the session commands.

use std::process::ExitCode;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use steam_session::EResult;
use steam_session::test_support::LoginScript;
use steam_state::SteamId;

use super::{Harness, Invocation};

// ---------------------------------------------------------------------------
// Test world
// ---------------------------------------------------------------------------

struct TestWorld {
    harness: Harness,
    last: Option<Invocation>,
}

#[fixture]
fn world() -> TestWorld {
    TestWorld {
        harness: Harness::new(),
        last: None,
    }
}

fn last(world: &TestWorld) -> &Invocation {
    world.last.as_ref().expect("no command run")
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("the server accepts the login as {steam_id}")]
fn given_accepts(world: &mut TestWorld, steam_id: u64) {
    world
        .harness
        .factory
        .push_logins([LoginScript::Succeed(SteamId::new(steam_id))]);
}

#[given("the server asks for a guard code")]
fn given_guard_prompt(world: &mut TestWorld) {
    world
        .harness
        .factory
        .push_logins([LoginScript::Fail(EResult::ACCOUNT_LOGON_DENIED)]);
}

#[given("the server rejects the password")]
fn given_wrong_password(world: &mut TestWorld) {
    world
        .harness
        .factory
        .push_logins([LoginScript::Fail(EResult::INVALID_PASSWORD)]);
}

#[given("a stored session authenticated as {steam_id}")]
fn given_stored_session(world: &mut TestWorld, steam_id: u64) {
    world.harness.store_session(SteamId::new(steam_id));
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when("the operator runs {command}")]
fn when_runs(world: &mut TestWorld, command: String) {
    let args: Vec<&str> = command.trim_matches('"').split_whitespace().collect();
    world.last = Some(world.harness.invoke(&args));
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("the command succeeds")]
fn then_succeeds(world: &mut TestWorld) {
    let run = last(world);
    assert_eq!(run.exit, ExitCode::SUCCESS, "stderr: {}", run.stderr);
}

#[then("the command fails")]
fn then_fails(world: &mut TestWorld) {
    let run = last(world);
    assert_eq!(run.exit, ExitCode::FAILURE, "stdout: {}", run.stdout);
}

#[then("the output mentions {text}")]
fn then_output_mentions(world: &mut TestWorld, text: String) {
    let expected = text.trim_matches('"');
    let run = last(world);
    assert!(
        run.stdout.contains(expected),
        "expected {expected:?} in {:?}",
        run.stdout
    );
}

#[then("the error mentions {text}")]
fn then_error_mentions(world: &mut TestWorld, text: String) {
    let expected = text.trim_matches('"');
    let run = last(world);
    assert!(
        run.stderr.contains(expected),
        "expected {expected:?} in {:?}",
        run.stderr
    );
}

#[then("the status output mentions {text}")]
fn then_status_mentions(world: &mut TestWorld, text: String) {
    let expected = text.trim_matches('"');
    let status = world.harness.invoke(&["auth", "status"]);
    assert!(
        status.stdout.contains(expected),
        "expected {expected:?} in {:?}",
        status.stdout
    );
}

// ---------------------------------------------------------------------------
// Scenario registration
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/cli_session.feature")]
fn cli_session_behaviour(world: TestWorld) {
    let _ = world;
}
