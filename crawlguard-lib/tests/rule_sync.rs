mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{rules_json, MockAuthority, TestResult};
use crawlguard_lib::rules::{RuleManager, RuleSource};
use crawlguard_lib::{GuardBuilder, GuardError};
use tokio_util::sync::CancellationToken;

fn source(mock: &MockAuthority) -> RuleSource {
    RuleSource::new(reqwest::Client::new(), format!("{}/v1/rules", mock.url()), "test-key".into())
}

#[tokio::test]
async fn fetch_decodes_rule_set_with_bearer_auth() -> TestResult {
    let mock = MockAuthority::start().await?;
    mock.state.serve_rules(200, rules_json(9, &["EvilBot"]));

    let rules = source(&mock).fetch().await?;
    assert_eq!(rules.version, 9);
    assert_eq!(rules.blocked_uas, vec!["EvilBot"]);
    assert_eq!(mock.state.auth_headers(), vec!["Bearer test-key"]);
    Ok(())
}

#[tokio::test]
async fn fetch_reports_status_and_decode_errors() -> TestResult {
    let mock = MockAuthority::start().await?;

    mock.state.serve_rules(503, "unavailable");
    assert!(matches!(source(&mock).fetch().await, Err(GuardError::RuleStatus(503))));

    mock.state.serve_rules(200, "{not json");
    assert!(matches!(source(&mock).fetch().await, Err(GuardError::RuleDecode(_))));
    Ok(())
}

#[tokio::test]
async fn guard_applies_newer_rules_on_start() -> TestResult {
    let mock = MockAuthority::start().await?;
    mock.state.serve_rules(200, rules_json(5, &["EvilBot"]));

    let guard = GuardBuilder::new(mock.guard_config()).start()?;
    // Built-in rules are active immediately.
    assert!(guard.rules().is_blocked_ua("GPTBot"));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while guard.rules_version() != 5 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(guard.rules_version(), 5);
    assert!(guard.rules().is_blocked_ua("evilbot/1.0"));
    assert!(!guard.rules().is_blocked_ua("GPTBot"));
    assert!(guard.rules().is_blocked_ip("198.51.100.7"));

    guard.close().await;
    Ok(())
}

#[tokio::test]
async fn stale_or_failed_fetches_keep_current_rules() -> TestResult {
    let mock = MockAuthority::start().await?;
    let rm = RuleManager::new(None);
    let src = source(&mock);

    // Same version as the built-in set.
    mock.state.serve_rules(200, rules_json(1, &["Other"]));
    assert!(!rm.sync_once(&src).await?);

    mock.state.serve_rules(500, "");
    assert!(rm.sync_once(&src).await.is_err());

    mock.state.serve_rules(200, r#"{"version": "seven"}"#);
    assert!(rm.sync_once(&src).await.is_err());

    assert_eq!(rm.version(), 1);
    assert!(rm.is_blocked_ua("ClaudeBot"));
    assert!(!rm.is_blocked_ua("Other"));
    Ok(())
}

#[tokio::test]
async fn refresh_loop_polls_until_cancelled() -> TestResult {
    let mock = MockAuthority::start().await?;
    mock.state.serve_rules(503, "");

    let rm = Arc::new(RuleManager::new(None));
    let cancel = CancellationToken::new();
    let period = Duration::from_millis(200);
    let task = tokio::spawn(Arc::clone(&rm).run(source(&mock), period, cancel.clone()));

    assert!(mock.wait_until(Duration::from_secs(5), |s| s.rule_hits() >= 1).await);
    assert_eq!(rm.version(), 1);

    mock.state.serve_rules(200, rules_json(2, &["LaterBot"]));
    assert!(mock.wait_until(Duration::from_secs(5), |_| rm.version() == 2).await);
    assert!(rm.is_blocked_ua("LaterBot"));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), task).await??;

    let hits = mock.state.rule_hits();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(mock.state.rule_hits(), hits, "loop kept polling after cancel");
    Ok(())
}

#[tokio::test]
async fn cancel_lets_in_flight_fetch_finish() -> TestResult {
    let mock = MockAuthority::start().await?;
    mock.state.serve_rules(200, rules_json(3, &["SlowBot"]));
    mock.state.set_rules_delay(Duration::from_millis(400));

    let rm = Arc::new(RuleManager::new(None));
    let cancel = CancellationToken::new();
    let task = tokio::spawn(Arc::clone(&rm).run(
        source(&mock),
        Duration::from_secs(60),
        cancel.clone(),
    ));

    // The first fetch is on the wire when shutdown is requested.
    assert!(mock.wait_until(Duration::from_secs(5), |s| s.rule_hits() >= 1).await);
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task).await??;

    assert_eq!(rm.version(), 3);
    assert!(rm.is_blocked_ua("slowbot/2"));
    assert_eq!(mock.state.rule_hits(), 1);
    Ok(())
}
