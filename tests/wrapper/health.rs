use safeguard::{
    BreakerSettings, BulkheadSettings, HealthStatus, ProtectConfig, Resilience, StaticConfigSource,
};
use safeguard_core::{Classify, ErrorKind};
use serde_json::json;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
struct DbError(String);

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Classify for DbError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ServiceUnavailable
    }
}

fn resilience() -> Resilience {
    Resilience::builder()
        .config_source(
            StaticConfigSource::new()
                .breaker("search", BreakerSettings::new(3, Duration::from_secs(30)))
                .bulkhead("db_pool", BulkheadSettings::new(2, None)),
        )
        .build()
}

#[tokio::test]
async fn snapshot_serializes_every_mechanism() {
    let resilience = resilience();
    let config = ProtectConfig::<u32, ErrorKind>::new("lookup")
        .circuit_breaker("search")
        .bulkhead("db_pool");
    resilience.protect(&config, || async { Ok(1) }).await.unwrap();

    let health = resilience.health();
    assert_eq!(health.status, HealthStatus::Healthy);

    let json = serde_json::to_value(&health).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(
        json["breakers"][0],
        json!({
            "name": "search",
            "state": "closed",
            "failure_count": 0,
            "success_count": 1,
            "rejected_count": 0,
        })
    );
    assert_eq!(json["bulkheads"][0]["name"], "db_pool");
    assert_eq!(json["bulkheads"][0]["capacity"], 2);
    assert_eq!(json["bulkheads"][0]["active_count"], 0);
    assert_eq!(json["monitoring"]["total_successes"], 1);
    assert_eq!(json["recovery"]["total_recoveries"], 0);
}

#[tokio::test(start_paused = true)]
async fn breaker_states_drive_the_overall_status() {
    let resilience = resilience();
    let search = resilience.circuit_breaker("search").unwrap();
    resilience.circuit_breaker("billing").unwrap();

    search.force_open();
    let health = resilience.health();
    assert_eq!(health.status, HealthStatus::Unhealthy);
    let names: Vec<_> = health.breakers.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["billing", "search"]);

    tokio::time::advance(Duration::from_secs(30)).await;
    let probe = search.try_acquire().unwrap();
    assert_eq!(resilience.health().status, HealthStatus::Degraded);

    probe.record_success();
    assert_eq!(resilience.health().status, HealthStatus::Healthy);
}

#[tokio::test]
async fn user_facing_errors_carry_no_internal_detail() {
    let resilience = resilience();
    let config = ProtectConfig::<(), DbError>::new("lookup").user_friendly_errors(true);

    let err = resilience
        .protect(&config, || async {
            Err(DbError("connect to 10.0.0.12:5432 refused".to_string()))
        })
        .await
        .unwrap_err();

    let user_facing = err.user_facing().unwrap();
    let json = serde_json::to_value(user_facing).unwrap();
    assert_eq!(json["code"], "service_unavailable");
    assert_eq!(json["reference"], user_facing.reference.as_str());
    assert!(!json.to_string().contains("10.0.0.12"));

    // The monitor still sees the real cause.
    let events = resilience.monitor().recent_events(1);
    assert!(events[0].message().contains("10.0.0.12"));
}
