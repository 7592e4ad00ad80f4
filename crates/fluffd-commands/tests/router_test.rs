//! Targeted and broadcast routing.

use std::sync::Arc;

use fluffd_commands::{
    ActionDispatcher, CommandRegistry, CommandRouter, DispatchError, DispatchOutcome, Params,
};
use fluffd_devices::{DeviceRegistry, SimulatedTransport, WriteChannel};

const A: &str = "AA:00:00:00:00:0A";
const B: &str = "AA:00:00:00:00:0B";
const C: &str = "AA:00:00:00:00:0C";

async fn router_with(connected: &[&str]) -> (Arc<SimulatedTransport>, CommandRouter) {
    let sim = SimulatedTransport::with_devices([("Furby", A), ("Furby", B), ("Furby", C)]);
    let devices = Arc::new(DeviceRegistry::new(sim.clone()));
    for address in connected {
        devices.connect_device(address).await.unwrap();
    }
    let dispatcher = ActionDispatcher::new(Arc::new(CommandRegistry::builtin()));
    (sim, CommandRouter::new(devices, dispatcher))
}

fn debug_frames(sim: &SimulatedTransport, address: &str) -> usize {
    sim.writes_on(address, WriteChannel::Control)
        .iter()
        .filter(|f| f.as_slice() == [0xDB])
        .count()
}

#[tokio::test]
async fn test_targeted_dispatch() {
    let (sim, router) = router_with(&[A, B]).await;

    let outcome = router.dispatch("debug", &Params::new(), Some(A)).await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Targeted { ref address } if address == A));
    assert_eq!(outcome.details(), serde_json::json!(true));
    assert_eq!(debug_frames(&sim, A), 1);
    assert_eq!(debug_frames(&sim, B), 0);
    router.devices().disconnect_all().await;
}

#[tokio::test]
async fn test_targeted_unknown_device() {
    let (_sim, router) = router_with(&[A]).await;
    let err = router.dispatch("debug", &Params::new(), Some(C)).await.unwrap_err();
    assert!(matches!(err, DispatchError::TargetNotFound(ref t) if t == C));
    assert_eq!(
        err.to_string(),
        format!("Error: Target Furby {} not found or not connected.", C)
    );
    router.devices().disconnect_all().await;
}

#[tokio::test]
async fn test_targeted_failure_is_reported() {
    let (_sim, router) = router_with(&[A]).await;
    let err = router
        .dispatch("set_name", &Params::new().with("name", 200), Some(A))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Failed(_)));
    router.devices().disconnect_all().await;
}

#[tokio::test]
async fn test_broadcast_without_devices() {
    let (_sim, router) = router_with(&[]).await;
    let err = router.dispatch("debug", &Params::new(), None).await.unwrap_err();
    assert!(matches!(err, DispatchError::NoDevicesConnected));
    assert_eq!(err.to_string(), "Error: No Furbys connected for broadcast.");
}

#[tokio::test]
async fn test_broadcast_isolates_failures() {
    let (sim, router) = router_with(&[A, B, C]).await;
    sim.set_fail_writes(B, true);

    let outcome = router.dispatch("debug", &Params::new(), None).await.unwrap();
    let DispatchOutcome::Broadcast(summary) = outcome else {
        panic!("expected broadcast outcome");
    };
    assert_eq!(summary.success_count(), 2);
    assert_eq!(summary.failure_count(), 1);
    assert_eq!(summary.failed[0].0, B);
    assert!(summary
        .to_string()
        .starts_with("Broadcast 'debug': 2 successful, 1 failed. Failures: [AA:00:00:00:00:0B: "));
    assert_eq!(debug_frames(&sim, A), 1);
    assert_eq!(debug_frames(&sim, C), 1);

    sim.set_fail_writes(B, false);
    router.devices().disconnect_all().await;
}

#[tokio::test]
async fn test_broadcast_all_failed_is_failure() {
    let (sim, router) = router_with(&[A, B]).await;
    sim.set_fail_writes(A, true);
    sim.set_fail_writes(B, true);

    let err = router.dispatch("debug", &Params::new(), None).await.unwrap_err();
    let DispatchError::Failed(message) = err else {
        panic!("expected failure");
    };
    assert!(message.starts_with("Broadcast 'debug': 0 successful, 2 failed."));
}

#[tokio::test]
async fn test_broadcast_summary_without_failures() {
    let (_sim, router) = router_with(&[A, B]).await;
    let outcome = router
        .dispatch("other/antennablue", &Params::new(), None)
        .await
        .unwrap();
    assert_eq!(
        outcome.details(),
        serde_json::json!("Broadcast 'other/antennablue': 2 successful, 0 failed.")
    );
    router.devices().disconnect_all().await;
}
