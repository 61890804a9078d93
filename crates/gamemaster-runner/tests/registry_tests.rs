mod common;

use common::{connect, start_server, start_server_on, wait_for};
use gamemaster_chain::{SimulatedChain, Transition};
use gamemaster_runner::{ClerkError, RegistryError, ResourceId};

fn id(raw: &str) -> ResourceId {
    ResourceId::from(raw)
}

#[tokio::test]
async fn test_attach() {
    let server = start_server().await;
    let clerk = connect(&server).await;

    clerk.attach("0x1").await.unwrap();
    assert!(server.registry().is_operated(&id("0x1")).await);

    server.shutdown().await;
}

#[tokio::test]
async fn test_repeated_attach() {
    let server = start_server().await;
    let clerk = connect(&server).await;

    clerk.attach("0x1").await.unwrap();
    let err = clerk.attach("0x1").await.unwrap_err();
    assert!(matches!(
        err,
        ClerkError::Registry(RegistryError::AlreadyOperated(ref rid)) if *rid == id("0x1")
    ));
    assert_eq!(server.registry().len().await, 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_multiple_attach() {
    let server = start_server().await;
    let clerk = connect(&server).await;

    for raw in ["0x1", "0x2", "0x3"] {
        clerk.attach(raw).await.unwrap();
    }
    assert_eq!(server.registry().len().await, 3);

    server.shutdown().await;
}

#[tokio::test]
async fn test_detach() {
    let server = start_server().await;
    let clerk = connect(&server).await;

    clerk.attach("0x1").await.unwrap();
    clerk.detach("0x1").await.unwrap();
    assert!(server.registry().is_empty().await);

    server.shutdown().await;
}

#[tokio::test]
async fn test_repeated_detach() {
    let server = start_server().await;
    let clerk = connect(&server).await;

    clerk.attach("0x1").await.unwrap();
    clerk.detach("0x1").await.unwrap();
    let err = clerk.detach("0x1").await.unwrap_err();
    assert!(matches!(
        err,
        ClerkError::Registry(RegistryError::NotOperated(ref rid)) if *rid == id("0x1")
    ));

    server.shutdown().await;
}

#[tokio::test]
async fn test_basic_scenario() {
    let server = start_server().await;
    let clerk = connect(&server).await;

    clerk.attach("0x1").await.unwrap();
    clerk.attach("0x2").await.unwrap();
    assert!(matches!(
        clerk.attach("0x1").await,
        Err(ClerkError::Registry(RegistryError::AlreadyOperated(_)))
    ));
    clerk.detach("0x1").await.unwrap();
    assert!(matches!(
        clerk.detach("0x3").await,
        Err(ClerkError::Registry(RegistryError::NotOperated(_)))
    ));
    clerk.attach("0x1").await.unwrap();

    let operated: Vec<String> = clerk
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|status| status.resource_id)
        .collect();
    assert_eq!(operated, vec!["0x1", "0x2"]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_detach_one_of_many() {
    let server = start_server().await;
    let clerk = connect(&server).await;
    let registry = server.registry();

    for raw in ["0x1", "0x2", "0x3"] {
        clerk.attach(raw).await.unwrap();
    }
    assert_eq!(registry.len().await, 3);

    clerk.detach("0x1").await.unwrap();
    assert_eq!(registry.len().await, 2);
    assert!(!registry.is_operated(&id("0x1")).await);
    assert!(registry.is_operated(&id("0x2")).await);
    assert!(registry.is_operated(&id("0x3")).await);

    assert!(matches!(
        clerk.detach("0x1").await,
        Err(ClerkError::Registry(RegistryError::NotOperated(ref rid))) if *rid == id("0x1")
    ));
    assert_eq!(registry.len().await, 2);

    clerk.attach("0x1").await.unwrap();
    assert_eq!(registry.len().await, 3);

    server.shutdown().await;
}

/// Attach `0x0`..`0x9` from concurrent tasks, then detach them the same way.
/// Each task gets its own clerk, or a clone of one shared clerk.
async fn attach_then_detach_concurrently(shared_clerk: bool) {
    let server = start_server().await;
    let shared = connect(&server).await;

    let mut clerks = Vec::new();
    for _ in 0..10 {
        if shared_clerk {
            clerks.push(shared.clone());
        } else {
            clerks.push(connect(&server).await);
        }
    }
    let ids: Vec<String> = (0..10).map(|i| format!("0x{i}")).collect();

    let mut handles = Vec::new();
    for (clerk, rid) in clerks.iter().cloned().zip(ids.clone()) {
        handles.push(tokio::spawn(async move { clerk.attach(rid.as_str()).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(server.registry().len().await, 10);
    for rid in &ids {
        assert!(server.registry().is_operated(&id(rid)).await);
    }

    let mut handles = Vec::new();
    for (clerk, rid) in clerks.into_iter().zip(ids) {
        handles.push(tokio::spawn(async move { clerk.detach(rid.as_str()).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert!(server.registry().is_empty().await);

    server.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_attach_detach_on_one_clerk() {
    attach_then_detach_concurrently(true).await;
}

#[tokio::test]
async fn test_concurrent_attach_detach_on_many_clerks() {
    attach_then_detach_concurrently(false).await;
}

#[tokio::test]
async fn test_concurrent_requests_on_one_clerk() {
    let server = start_server().await;
    let clerk = connect(&server).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let clerk = clerk.clone();
        handles.push(tokio::spawn(async move {
            let rid = format!("0x{:x}", i + 1);
            clerk.attach(rid.as_str()).await.unwrap();
            assert!(matches!(
                clerk.attach(rid.as_str()).await,
                Err(ClerkError::Registry(RegistryError::AlreadyOperated(_)))
            ));
            clerk.detach(rid.as_str()).await.unwrap();
            clerk.attach(rid.as_str()).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(server.registry().len().await, 10);
    server.shutdown().await;
}

#[tokio::test]
async fn test_many_clerks_racing_for_one_game() {
    let server = start_server().await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let clerk = connect(&server).await;
        handles.push(tokio::spawn(async move { clerk.attach("0xabc").await }));
    }

    let mut attached = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => attached += 1,
            Err(ClerkError::Registry(RegistryError::AlreadyOperated(_))) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(attached, 1);
    assert_eq!(server.registry().len().await, 1);
    server.shutdown().await;
}

#[tokio::test]
async fn test_operated_game_cycles_through_phases() {
    let chain = SimulatedChain::new();
    let server = start_server_on(&chain, None).await;
    let clerk = connect(&server).await;

    clerk.attach("0x1").await.unwrap();
    wait_for(|| chain.history(&id("0x1")).len() >= 3).await;
    clerk.detach("0x1").await.unwrap();

    let settled = chain.history(&id("0x1")).len();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(chain.history(&id("0x1")).len(), settled);
    assert_eq!(
        chain.history(&id("0x1"))[..3],
        [Transition::ForceReveal, Transition::ForcePayout, Transition::Reset]
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_list_reports_worker_stats() {
    let chain = SimulatedChain::new();
    let server = start_server_on(&chain, None).await;
    let clerk = connect(&server).await;

    clerk.attach("0x1").await.unwrap();
    wait_for(|| chain.tx_count() >= 2).await;

    let resources = clerk.list().await.unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].resource_id, "0x1");
    assert!(resources[0].ticks >= 2);
    assert!(resources[0].forced >= 2);
    assert_eq!(resources[0].failures, 0);
    assert!(resources[0].last_state.is_some());

    server.shutdown().await;
}

#[tokio::test]
async fn test_requests_after_teardown_are_refused() {
    let server = start_server().await;
    let clerk = connect(&server).await;

    clerk.attach("0x1").await.unwrap();
    server.registry().teardown().await;

    assert!(server.registry().is_empty().await);
    assert!(matches!(
        clerk.attach("0x2").await,
        Err(ClerkError::Registry(RegistryError::ShuttingDown))
    ));
    assert!(matches!(
        clerk.detach("0x1").await,
        Err(ClerkError::Registry(RegistryError::ShuttingDown))
    ));
    assert!(matches!(
        clerk.list().await,
        Err(ClerkError::Registry(RegistryError::ShuttingDown))
    ));
    // The transport itself still answers
    assert_eq!(
        clerk.echo("still there").await.unwrap(),
        "This is your message: still there"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_detach_of_stuck_operator_times_out() {
    let chain = SimulatedChain::new();
    chain.set_latency(std::time::Duration::from_secs(30));
    let server = start_server_on(&chain, Some(100)).await;
    let clerk = connect(&server).await;

    clerk.attach("0x1").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let err = clerk.detach("0x1").await.unwrap_err();
    assert!(matches!(
        err,
        ClerkError::Registry(RegistryError::CancelTimedOut(ref rid)) if *rid == id("0x1")
    ));
    assert!(!server.registry().is_operated(&id("0x1")).await);

    server.shutdown().await;
}
