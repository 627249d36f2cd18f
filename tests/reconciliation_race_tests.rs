//! End-to-end reconciliation against an in-memory host whose policy gets
//! reset while corrections are pending.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use takeaway_reconciler::host::memory::{MemoryMethod, MemoryOrder, MemorySession};
use takeaway_reconciler::{
    EngineConfig, EventBinding, HostEvent, HostKey, OrderKey, PolicyCatalog, PolicyObject,
    ReconciliationEngine, SharedOrder,
};

fn piso1() -> Arc<MemorySession> {
    MemorySession::new()
        .with_id(1)
        .with_name("Piso 1")
        .with_config("takeaway_fiscal_position_id", 42)
        .with_catalog(PolicyCatalog::mapping(vec![
            PolicyObject::new(7, "Dine in"),
            PolicyObject::new(42, "Takeaway"),
        ]))
        .build()
}

fn binding() -> EventBinding {
    EventBinding::new(Arc::new(ReconciliationEngine::new(EngineConfig::default()).unwrap()))
}

#[tokio::test(start_paused = true)]
async fn customer_assignment_survives_host_reset_inside_window() {
    let b = binding();
    let session = piso1();
    let order = MemoryOrder::snake_case("o-1").with_session(&session).into_handle();

    let run = b
        .dispatch(HostEvent::CustomerAssigned {
            order: order.clone(),
            customer: Some(json!({"id": 5})),
        })
        .await
        .expect("customer assignment schedules a run");
    assert_eq!(run.planned_corrections(), 5);

    tokio::time::sleep(Duration::from_millis(200)).await;
    order.lock().await.overwrite_policy(json!({"id": 7, "name": "Dine in"}));
    assert_eq!(order.lock().await.policy_key(), Some(HostKey::from(7)));

    let report = run.finished().await.unwrap();
    assert!(report.converged);
    assert_eq!(report.corrections, 5);

    let guard = order.lock().await;
    assert!(guard.is_takeaway());
    assert_eq!(guard.policy_key(), Some(HostKey::from(42)));
    assert_eq!(guard.field("computed_totals"), Some(&json!({"takeaway": true, "policy": 42})));
}

#[tokio::test(start_paused = true)]
async fn customer_tail_covers_reset_after_regular_offsets() {
    let b = binding();
    let session = piso1();
    let order = MemoryOrder::snake_case("o-6").with_session(&session).into_handle();

    let run = b
        .dispatch(HostEvent::CustomerAssigned {
            order: order.clone(),
            customer: Some(json!(5)),
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    order.lock().await.overwrite_policy(7);

    let report = run.finished().await.unwrap();
    assert!(report.converged);
    assert_eq!(report.corrections, 5);
    assert_eq!(order.lock().await.policy_key(), Some(HostKey::from(42)));
}

#[tokio::test(start_paused = true)]
async fn activation_runs_without_customer_tail() {
    let b = binding();
    let session = piso1();
    let order = MemoryOrder::snake_case("o-7").with_session(&session).into_handle();

    let run = b
        .dispatch(HostEvent::OrderActivated {
            session: session.clone(),
            order: order.clone(),
        })
        .await
        .unwrap();
    assert_eq!(run.planned_corrections(), 4);

    tokio::time::sleep(Duration::from_millis(500)).await;
    order.lock().await.overwrite_policy(7);

    let report = run.finished().await.unwrap();
    assert_eq!(report.corrections, 4);
    tokio::time::sleep(Duration::from_secs(1)).await;

    let guard = order.lock().await;
    assert_eq!(guard.policy_key(), Some(HostKey::from(7)));
    assert_eq!(guard.calls_to("set_fiscal_position").len(), 4);
}

#[tokio::test(start_paused = true)]
async fn reset_after_window_needs_policy_change_event() {
    let b = binding();
    let session = piso1();
    let order = MemoryOrder::camel_case("o-2").with_session(&session).into_handle();

    let run = b
        .dispatch(HostEvent::OrderActivated {
            session: session.clone(),
            order: order.clone(),
        })
        .await
        .unwrap();
    assert!(run.finished().await.unwrap().converged);

    tokio::time::sleep(Duration::from_secs(5)).await;
    order.lock().await.overwrite_policy(7);
    {
        let mut guard = order.lock().await;
        let check = b.engine().corrector().invariant().check(session.as_ref(), &mut *guard);
        assert!(!check.satisfied);
    }

    let run = b
        .dispatch(HostEvent::PolicyChanged {
            order: order.clone(),
            new_policy: json!(7),
        })
        .await
        .expect("drifted policy is reasserted");
    assert!(run.finished().await.unwrap().converged);
    assert_eq!(order.lock().await.policy_key(), Some(HostKey::from(42)));
}

#[tokio::test(start_paused = true)]
async fn failing_policy_setter_leaves_run_unconverged() {
    let b = binding();
    let session = piso1();
    let order = MemoryOrder::snake_case("o-3")
        .with_method("set_fiscal_position", MemoryMethod::Fail("order locked".to_string()))
        .with_session(&session)
        .into_handle();

    let run = b
        .dispatch(HostEvent::OrderActivated { session, order: order.clone() })
        .await
        .unwrap();
    let report = run.finished().await.unwrap();

    assert!(!report.converged);
    assert!(order.lock().await.is_takeaway());

    let snapshot = b.engine().metrics().snapshot().await;
    assert_eq!(snapshot.unconverged_runs, 1);
    assert_eq!(snapshot.failed_steps, 4);
}

#[tokio::test(start_paused = true)]
async fn installed_binding_processes_stream() {
    let engine = Arc::new(ReconciliationEngine::new(EngineConfig::default()).unwrap());
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = engine.install(UnboundedReceiverStream::new(rx)).unwrap();

    let session = piso1();
    let governed: SharedOrder = MemoryOrder::snake_case("o-4").with_session(&session).into_handle();
    session.set_current_order(Some(governed.clone()));

    let other = MemorySession::new()
        .with_name("Terraza")
        .with_config("takeawayPolicyId", 42)
        .build();
    let ungoverned = MemoryOrder::snake_case("o-5").with_session(&other).into_handle();

    tx.send(HostEvent::SessionInitialized { session: session.clone() }).unwrap();
    tx.send(HostEvent::OrderActivated {
        session: other.clone(),
        order: ungoverned.clone(),
    })
    .unwrap();
    tx.send(HostEvent::PolicyChanged {
        order: governed.clone(),
        new_policy: json!(42),
    })
    .unwrap();
    drop(tx);

    handle.await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(engine.is_enrolled(&OrderKey::new("o-4")));
    assert!(!engine.is_enrolled(&OrderKey::new("o-5")));
    assert!(ungoverned.lock().await.calls().is_empty());

    let snapshot = engine.metrics().snapshot().await;
    assert_eq!(snapshot.runs_scheduled, 1);
    assert_eq!(snapshot.corrections, 4);
    assert_eq!(snapshot.skipped_retriggers, 1);
}
