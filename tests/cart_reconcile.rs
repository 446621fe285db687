mod common;

use std::{sync::Arc, time::Duration};

use cartsync::{
    backend::{BackendError, CartBackend, InMemoryBackend},
    core::cart::CartState,
    op::{tools, CartOp},
    runtime::{
        events::CartEvent,
        handle::{spawn_cart, CartError, SyncOutcome},
    },
    types::LineKey,
};

use common::{catalog, draft, init_tracing, quiet_config, GatedBackend, PanickingBackend};

fn key(product: &str) -> LineKey {
    LineKey::new(product, "default")
}

fn quantities(items: &[cartsync::item::CartItem]) -> Vec<(String, u32)> {
    items
        .iter()
        .map(|i| (i.product_id.clone(), i.quantity))
        .collect()
}

fn seeded(lines: &[(&str, u32, f64)]) -> CartState {
    let mut state = CartState::with_items(Vec::new());
    for (product, qty, price) in lines {
        state.apply(&CartOp::Add {
            draft: draft(product, *qty, *price),
        });
    }
    state
}

#[tokio::test]
async fn failed_add_restores_the_pre_call_snapshot() {
    init_tracing();
    let backend = Arc::new(InMemoryBackend::new(catalog()));
    backend.fail_next(tools::ADD_TO_CART, 1);
    let cart = spawn_cart(seeded(&[("A", 1, 1.0)]), backend.clone(), quiet_config());

    let err = cart.add_item(draft("B", 1, 2.0)).await.unwrap_err();
    assert!(matches!(err, CartError::Backend(BackendError::Injected { .. })));

    assert_eq!(quantities(&cart.items()), vec![("A".to_string(), 1)]);
    assert!(!cart.snapshot().has_pending_mutations());
    cart.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn tool_error_in_response_also_rolls_back() {
    let backend = Arc::new(InMemoryBackend::new(catalog()));
    let cart = spawn_cart(CartState::new(), backend.clone(), quiet_config());

    let err = cart
        .add_item(draft("not-in-catalog", 1, 3.0))
        .await
        .unwrap_err();
    match err {
        CartError::Backend(BackendError::Tool { message, .. }) => {
            assert!(message.contains("Product not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(cart.items().is_empty());
    cart.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn optimistic_line_is_visible_before_the_server_answers() {
    let backend = GatedBackend::new(catalog());
    backend.hold_next(tools::ADD_TO_CART);
    let cart = spawn_cart(seeded(&[("A", 1, 1.0)]), backend.clone(), quiet_config());

    let pending = cart.add_item(draft("B", 1, 2.0));
    backend.wait_arrived().await;

    let items = cart.items();
    assert!(items.iter().any(|i| i.product_id == "B" && i.quantity == 1));
    let snap = cart.snapshot();
    assert!(snap.pending_mutations().contains(pending.id()));
    assert_eq!(quantities(snap.backup()), vec![("A".to_string(), 1)]);
    assert_eq!(cart.queue_status().active.as_ref(), Some(pending.id()));

    backend.release();
    let outcome = pending.await.expect("add");
    assert_eq!(outcome.item.expect("line").product_id, "B");
    assert!(!cart.snapshot().has_pending_mutations());
    cart.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn resync_is_a_noop_while_a_mutation_is_in_flight() {
    let backend = GatedBackend::new(catalog());
    backend.hold_next(tools::ADD_TO_CART);
    let cart = spawn_cart(CartState::new(), backend.clone(), quiet_config());

    let pending = cart.add_item(draft("B", 1, 2.0));
    backend.wait_arrived().await;

    let before = cart.items();
    assert_eq!(cart.sync_cart().await, SyncOutcome::Skipped);
    assert_eq!(cart.items(), before);
    assert_eq!(backend.store.call_count(tools::GET_CART_STATE), 0);

    backend.release();
    pending.await.expect("add");

    match cart.sync_cart().await {
        SyncOutcome::Applied { lines, total } => {
            assert_eq!(lines, 1);
            assert_eq!(total, 2.0);
        }
        other => panic!("expected applied resync, got {other:?}"),
    }
    cart.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn panicking_backend_rolls_back_and_later_mutations_still_run() {
    let backend = PanickingBackend::new(catalog(), tools::SET_CART_QUANTITY);
    let cart = spawn_cart(CartState::new(), backend.clone(), quiet_config());

    cart.add_item(draft("A", 1, 1.0)).await.expect("add");
    let failing = cart.update_quantity(key("A"), 4);
    let failing_id = failing.id().clone();
    let after = cart.add_item(draft("B", 1, 2.0));

    match tokio::time::timeout(Duration::from_secs(1), failing)
        .await
        .expect("panicked mutation settles")
    {
        Err(CartError::Panicked(id)) => assert_eq!(id, failing_id),
        other => panic!("unexpected outcome: {other:?}"),
    }
    tokio::time::timeout(Duration::from_secs(1), after)
        .await
        .expect("next mutation settles")
        .expect("next add");

    assert_eq!(
        quantities(&cart.items()),
        vec![("A".to_string(), 1), ("B".to_string(), 1)]
    );
    assert!(!cart.snapshot().has_pending_mutations());
    assert!(matches!(cart.sync_cart().await, SyncOutcome::Applied { lines: 2, .. }));
    cart.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn quantity_zero_removes_and_repeats_are_noops() {
    let backend = Arc::new(InMemoryBackend::new(catalog()));
    let cart = spawn_cart(CartState::new(), backend.clone(), quiet_config());

    cart.add_item(draft("X", 3, 10.0)).await.expect("add");
    let removed = cart.update_quantity(key("X"), 0).await.expect("zero");
    assert!(removed.item.is_none());
    assert!(cart.items().is_empty());

    let again = cart.update_quantity(key("X"), 0).await.expect("repeat");
    assert!(again.item.is_none());
    let positive = cart.update_quantity(key("X"), 4).await.expect("absent line");
    assert!(positive.item.is_none());
    assert!(cart.items().is_empty());

    assert_eq!(backend.call_count(tools::SET_CART_QUANTITY), 1);
    cart.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn end_to_end_add_update_then_failed_remove() {
    init_tracing();
    let backend = Arc::new(InMemoryBackend::new(catalog()));
    let cart = spawn_cart(CartState::new(), backend.clone(), quiet_config());
    assert!(cart.items().is_empty());

    cart.add_item(draft("X", 2, 10.0)).await.expect("add");
    assert_eq!(quantities(&cart.items()), vec![("X".to_string(), 2)]);
    assert_eq!(cart.total(), 20.0);

    let updated = cart.update_quantity(key("X"), 5).await.expect("update");
    assert_eq!(updated.item.expect("line").quantity, 5);
    assert_eq!(quantities(&cart.items()), vec![("X".to_string(), 5)]);
    assert_eq!(cart.total(), 50.0);

    backend.fail_next(tools::REMOVE_FROM_CART, 1);
    let err = cart.remove_item(key("X")).await.unwrap_err();
    assert!(matches!(err, CartError::Backend(_)));
    assert_eq!(quantities(&cart.items()), vec![("X".to_string(), 5)]);
    assert_eq!(cart.total(), 50.0);

    let server = backend.cart(common::SESSION);
    assert_eq!(server.items.len(), 1);
    assert_eq!(server.items[0].quantity, 5);
    cart.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn concurrent_callers_reach_the_server_in_call_order() {
    let backend = Arc::new(InMemoryBackend::new(catalog()));
    let cart = spawn_cart(CartState::new(), backend.clone(), quiet_config());

    let a = cart.add_item(draft("A", 1, 1.0));
    let b = cart.add_item(draft("B", 2, 2.0));
    let set = cart.update_quantity(key("A"), 3);
    let rm = cart.remove_item(key("B"));
    let clear = cart.clear_cart();
    let (a, b, set, rm, clear) = tokio::join!(a, b, set, rm, clear);
    for res in [a, b, set, rm, clear] {
        res.expect("mutation");
    }

    let order: Vec<String> = backend.calls().into_iter().map(|c| c.tool_name).collect();
    assert_eq!(
        order,
        vec![
            tools::ADD_TO_CART,
            tools::ADD_TO_CART,
            tools::SET_CART_QUANTITY,
            tools::REMOVE_FROM_CART,
            tools::CLEAR_CART,
        ]
    );
    assert!(cart.items().is_empty());
    cart.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failure_of_one_mutation_only_undoes_its_own_effect() {
    let backend = Arc::new(InMemoryBackend::new(catalog()));
    let cart = spawn_cart(CartState::new(), backend.clone(), quiet_config());

    backend.fail_next(tools::SET_CART_QUANTITY, 1);
    let first = cart.add_item(draft("A", 1, 1.0));
    let failing = cart.update_quantity(key("A"), 9);
    let last = cart.add_item(draft("B", 1, 2.0));

    first.await.expect("first");
    failing.await.unwrap_err();
    last.await.expect("last");

    assert_eq!(
        quantities(&cart.items()),
        vec![("A".to_string(), 1), ("B".to_string(), 1)]
    );
    cart.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn events_report_optimism_then_confirmation_or_rollback() {
    let backend = Arc::new(InMemoryBackend::new(catalog()));
    let cart = spawn_cart(CartState::new(), backend.clone(), quiet_config());
    let mut events = cart.subscribe();

    let ok = cart.add_item(draft("A", 1, 1.0));
    let ok_id = ok.id().clone();
    ok.await.expect("add");

    backend.fail_next(tools::CLEAR_CART, 1);
    let bad = cart.clear_cart();
    let bad_id = bad.id().clone();
    bad.await.unwrap_err();

    let mut seen = Vec::new();
    while seen.len() < 4 {
        let evt = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event")
            .expect("recv");
        seen.push(evt);
    }

    assert_eq!(
        seen[0],
        CartEvent::Optimistic {
            op_id: ok_id.clone(),
            tool: tools::ADD_TO_CART
        }
    );
    assert_eq!(seen[1], CartEvent::Confirmed { op_id: ok_id });
    assert!(matches!(&seen[2], CartEvent::Optimistic { op_id, .. } if *op_id == bad_id));
    assert!(matches!(&seen[3], CartEvent::RolledBack { op_id, .. } if *op_id == bad_id));
    assert_eq!(cart.items().len(), 1);
    cart.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn clearing_the_queue_cancels_waiting_mutations_without_touching_state() {
    let backend = GatedBackend::new(catalog());
    backend.hold_next(tools::ADD_TO_CART);
    let cart = spawn_cart(CartState::new(), backend.clone(), quiet_config());

    let running = cart.add_item(draft("A", 1, 1.0));
    let waiting = cart.add_item(draft("B", 1, 2.0));
    backend.wait_arrived().await;

    assert_eq!(cart.clear_queue(), 1);
    backend.release();

    running.await.expect("running mutation settles");
    assert!(matches!(waiting.await, Err(CartError::Cancelled(_))));
    assert_eq!(quantities(&cart.items()), vec![("A".to_string(), 1)]);
    assert_eq!(backend.store.call_count(tools::ADD_TO_CART), 1);
    cart.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn shutdown_twice_reports_closed_runtime() {
    let backend: Arc<dyn CartBackend> = Arc::new(InMemoryBackend::new(catalog()));
    let cart = spawn_cart(CartState::new(), backend, quiet_config());
    cart.shutdown().await.expect("shutdown");
    tokio::task::yield_now().await;
    assert!(matches!(cart.shutdown().await, Err(CartError::ChannelClosed)));
    assert!(matches!(cart.request_resync(), Err(CartError::ChannelClosed)));
}
