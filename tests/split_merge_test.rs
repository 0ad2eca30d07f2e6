mod common;

use assert_matches::assert_matches;
use common::{create_order, quantity_payload, spawn_app};
use loomtrack_api::{
    commands::production::AdvancePayload,
    entities::production_order::ProductionStage,
    errors::ServiceError,
    services::{production_orders::OrderListFilter, reconciler},
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn same_stage_split_conserves_quantity() {
    let app = spawn_app().await;
    let order = create_order(&app, "SO2001", 100, None).await;

    let (source, child) = app
        .services
        .production_orders
        .split(order.id, 30)
        .await
        .expect("split");
    assert_eq!(source.quantity, 70);
    assert_eq!(child.quantity, 30);
    assert_eq!(child.order_no, "SO2001-1");
    assert_eq!(child.stage, ProductionStage::Received);
    assert_eq!(child.parent_id, Some(order.id));

    // A second split continues the suffix sequence.
    let (source, child) = app
        .services
        .production_orders
        .split(source.id, 20)
        .await
        .expect("second split");
    assert_eq!(source.quantity, 50);
    assert_eq!(child.order_no, "SO2001-2");
    assert_eq!(source.quantity + child.quantity, 70);
}

#[tokio::test]
async fn split_rejects_full_and_zero_quantities() {
    let app = spawn_app().await;
    let order = create_order(&app, "SO2002", 100, None).await;

    let err = app
        .services
        .production_orders
        .split(order.id, 100)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = app
        .services
        .production_orders
        .split(order.id, 0)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = app
        .services
        .production_orders
        .split(order.id, 120)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::QuantityExceeded {
            requested: 120,
            available: 100
        }
    );
}

#[tokio::test]
async fn weaving_in_progress_cannot_be_split_directly() {
    let app = spawn_app().await;
    let order = create_order(&app, "SO2003", 100, Some(2)).await;
    let record = common::advance_through(
        &app,
        order.id,
        &[
            ProductionStage::WeavingWait,
            ProductionStage::WeavingInProgress,
        ],
        "W-01",
    )
    .await;

    let err = app
        .services
        .production_orders
        .split(record.id, 40)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn cancel_merges_into_a_compatible_sibling() {
    let app = spawn_app().await;
    let order = create_order(&app, "SO2004", 100, None).await;

    // Advance part of the quantity, leaving the rest behind at received.
    let records = app
        .services
        .production_orders
        .advance(order.id, ProductionStage::WeavingWait, quantity_payload(40))
        .await
        .expect("partial advance");
    let child_id = records[1].id;

    // Cancelling the child folds it back into the waiting remainder.
    let records = app
        .services
        .production_orders
        .cancel(child_id)
        .await
        .expect("cancel");
    assert_eq!(records.len(), 1);
    let survivor = &records[0];
    assert_eq!(survivor.id, order.id);
    assert_eq!(survivor.stage, ProductionStage::Received);
    assert_eq!(survivor.quantity, 100);

    let err = app
        .services
        .production_orders
        .get(child_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn cancel_keeps_incompatible_records_apart() {
    let app = spawn_app().await;
    let order = create_order(&app, "SO2005", 100, None).await;

    // The advanced portion is repriced, so it no longer matches its sibling.
    let records = app
        .services
        .production_orders
        .advance(
            order.id,
            ProductionStage::WeavingWait,
            AdvancePayload {
                quantity: Some(40),
                unit_price: Some(dec!(1200)),
                ..Default::default()
            },
        )
        .await
        .expect("partial advance");
    let child_id = records[1].id;

    let records = app
        .services
        .production_orders
        .cancel(child_id)
        .await
        .expect("cancel");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, child_id, "reverted in place, not merged");
    assert_eq!(records[0].stage, ProductionStage::Received);

    let lineage = app
        .services
        .production_orders
        .lineage(order.id)
        .await
        .unwrap();
    assert_eq!(lineage.len(), 2);
    let total: i32 = lineage.iter().map(|r| r.quantity).sum();
    assert_eq!(total, 100);
}

#[tokio::test]
async fn retry_cycles_do_not_fragment_the_lineage() {
    let app = spawn_app().await;
    let order = create_order(&app, "SO2006", 100, None).await;

    for _ in 0..3 {
        let records = app
            .services
            .production_orders
            .advance(order.id, ProductionStage::WeavingWait, quantity_payload(40))
            .await
            .expect("partial advance");
        app.services
            .production_orders
            .cancel(records[1].id)
            .await
            .expect("cancel");
    }

    let lineage = app
        .services
        .production_orders
        .lineage(order.id)
        .await
        .unwrap();
    assert_eq!(lineage.len(), 1, "merges keep the lineage to one record");
    assert_eq!(lineage[0].quantity, 100);
}

#[tokio::test]
async fn child_suffixes_never_repeat_after_a_merge() {
    let app = spawn_app().await;
    let order = create_order(&app, "SO2007", 100, None).await;

    let (source, first) = app
        .services
        .production_orders
        .split(order.id, 30)
        .await
        .expect("split");
    assert_eq!(first.order_no, "SO2007-1");

    app.services
        .production_orders
        .cancel(first.id)
        .await
        .expect_err("same-stage child has no predecessor merge; received cannot cancel");

    // Advance and merge back instead, then split again.
    let records = app
        .services
        .production_orders
        .advance(source.id, ProductionStage::WeavingWait, quantity_payload(20))
        .await
        .expect("partial advance");
    app.services
        .production_orders
        .cancel(records[1].id)
        .await
        .expect("cancel");

    let (_, next) = app
        .services
        .production_orders
        .split(source.id, 10)
        .await
        .expect("split after merge");
    assert_eq!(next.order_no, "SO2007-3", "suffix counter never reuses");
}

#[tokio::test]
async fn lineage_spans_root_and_descendants() {
    let app = spawn_app().await;
    let order = create_order(&app, "SO2008", 100, Some(2)).await;
    common::advance_through(
        &app,
        order.id,
        &[
            ProductionStage::WeavingWait,
            ProductionStage::WeavingInProgress,
        ],
        "W-02",
    )
    .await;
    for qty in [60, 40] {
        app.services
            .production_orders
            .advance(order.id, ProductionStage::WeavingDone, quantity_payload(qty))
            .await
            .expect("roll");
    }

    // Lineage includes the retired parent even though listings hide it.
    let lineage = app
        .services
        .production_orders
        .lineage(order.id)
        .await
        .unwrap();
    assert_eq!(lineage.len(), 3);
    assert!(lineage
        .iter()
        .any(|r| r.stage == ProductionStage::WeavingClosed));

    let filter = OrderListFilter {
        page: 1,
        per_page: 50,
        ..Default::default()
    };
    let (listed, _) = app
        .services
        .production_orders
        .list(&filter)
        .await
        .unwrap();
    assert!(listed
        .iter()
        .all(|r| r.stage != ProductionStage::WeavingClosed));
}

#[tokio::test]
async fn stale_split_cannot_double_spend_quantity() {
    let app = spawn_app().await;
    let order = create_order(&app, "SO2009", 100, None).await;
    let stale = app.services.production_orders.get(order.id).await.unwrap();

    // Another writer moves quantity off the record after the read above.
    app.services
        .production_orders
        .split(order.id, 30)
        .await
        .expect("split");

    let err = reconciler::split_within(&*app.db, stale, 60, ProductionStage::Received, |_| {})
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let lineage = app
        .services
        .production_orders
        .lineage(order.id)
        .await
        .unwrap();
    let total: i32 = lineage.iter().map(|r| r.quantity).sum();
    assert_eq!(total, 100, "the rejected write must not create quantity");
}

#[tokio::test]
async fn stale_merge_cannot_overwrite_a_newer_quantity() {
    let app = spawn_app().await;
    let order = create_order(&app, "SO2010", 100, None).await;
    let (source, child) = app
        .services
        .production_orders
        .split(order.id, 30)
        .await
        .expect("split");

    let stale = source.clone();
    app.services
        .production_orders
        .split(source.id, 10)
        .await
        .expect("second split");

    let err = reconciler::merge_within(&*app.db, stale, vec![child.clone()])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    // The absorbed record survives the failed merge.
    let kept = app.services.production_orders.get(child.id).await.unwrap();
    assert_eq!(kept.quantity, 30);
}

#[tokio::test]
async fn merging_with_no_absorbed_records_is_a_no_op() {
    let app = spawn_app().await;
    let order = create_order(&app, "SO2011", 100, None).await;
    let before = app.services.production_orders.get(order.id).await.unwrap();

    let survivor = reconciler::merge_within(&*app.db, before.clone(), Vec::new())
        .await
        .expect("empty merge");
    assert_eq!(survivor, before, "nothing to absorb means nothing written");
}
