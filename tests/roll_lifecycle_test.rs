mod common;

use assert_matches::assert_matches;
use common::{create_order, quantity_payload, spawn_app};
use loomtrack_api::{
    commands::production::AdvancePayload, entities::production_order::ProductionStage,
    errors::ServiceError,
};
use uuid::Uuid;

/// Puts a multi-roll order onto a machine and returns its id.
async fn start_weaving(app: &common::TestApp, order_no: &str, quantity: i32, rolls: i32) -> Uuid {
    let order = create_order(app, order_no, quantity, Some(rolls)).await;
    let record = common::advance_through(
        app,
        order.id,
        &[
            ProductionStage::WeavingWait,
            ProductionStage::WeavingInProgress,
        ],
        "W-01",
    )
    .await;
    assert_eq!(record.stage, ProductionStage::WeavingInProgress);
    record.id
}

#[tokio::test]
async fn roll_completions_fork_children_and_close_the_parent() {
    let app = spawn_app().await;
    let parent_id = start_weaving(&app, "JB7", 100, 2).await;

    // First roll: 60 units come off the machine.
    let records = app
        .services
        .production_orders
        .advance(parent_id, ProductionStage::WeavingDone, quantity_payload(60))
        .await
        .expect("first roll");
    assert_eq!(records.len(), 2);
    let (parent, child) = (&records[0], &records[1]);
    assert_eq!(parent.stage, ProductionStage::WeavingInProgress);
    assert_eq!(parent.quantity, 40);
    assert_eq!(parent.completed_rolls, 1);
    assert_eq!(child.order_no, "JB7-1");
    assert_eq!(child.stage, ProductionStage::WeavingDone);
    assert_eq!(child.quantity, 60);
    assert_eq!(child.roll_no, Some(1));
    assert_eq!(child.machine_no.as_deref(), Some("W-01"));

    // Second (last) roll retires the parent.
    let records = app
        .services
        .production_orders
        .advance(parent_id, ProductionStage::WeavingDone, quantity_payload(40))
        .await
        .expect("second roll");
    let (parent, child) = (&records[0], &records[1]);
    assert_eq!(parent.stage, ProductionStage::WeavingClosed);
    assert_eq!(parent.quantity, 0);
    assert_eq!(parent.completed_rolls, 2);
    assert_eq!(child.order_no, "JB7-2");
    assert_eq!(child.roll_no, Some(2));
    assert_eq!(child.quantity, 40);

    // Machine freed once the run is over.
    assert!(!app.services.machines.is_busy("W-01").await.unwrap());

    // Children carry the original quantity between them.
    let lineage = app
        .services
        .production_orders
        .lineage(parent_id)
        .await
        .unwrap();
    let child_total: i32 = lineage
        .iter()
        .filter(|r| r.stage == ProductionStage::WeavingDone)
        .map(|r| r.quantity)
        .sum();
    assert_eq!(child_total, 100);
}

#[tokio::test]
async fn closed_parent_rejects_further_rolls() {
    let app = spawn_app().await;
    let parent_id = start_weaving(&app, "JB8", 100, 2).await;
    for qty in [60, 40] {
        app.services
            .production_orders
            .advance(parent_id, ProductionStage::WeavingDone, quantity_payload(qty))
            .await
            .expect("roll");
    }

    let err = app
        .services
        .production_orders
        .advance(parent_id, ProductionStage::WeavingDone, quantity_payload(1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));
}

#[tokio::test]
async fn roll_completion_requires_quantity() {
    let app = spawn_app().await;
    let parent_id = start_weaving(&app, "JB9", 100, 2).await;

    let err = app
        .services
        .production_orders
        .advance(
            parent_id,
            ProductionStage::WeavingDone,
            AdvancePayload::default(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn roll_cannot_exceed_remaining_quantity() {
    let app = spawn_app().await;
    let parent_id = start_weaving(&app, "JB10", 100, 2).await;

    let err = app
        .services
        .production_orders
        .advance(
            parent_id,
            ProductionStage::WeavingDone,
            quantity_payload(150),
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::QuantityExceeded {
            requested: 150,
            available: 100
        }
    );
}

#[tokio::test]
async fn non_final_roll_must_leave_quantity_for_the_rest() {
    let app = spawn_app().await;
    let parent_id = start_weaving(&app, "JB17", 100, 2).await;

    // Draining the run on roll 1 of 2 would leave roll 2 with nothing while
    // the parent still sits on the machine.
    let err = app
        .services
        .production_orders
        .advance(
            parent_id,
            ProductionStage::WeavingDone,
            quantity_payload(100),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // A roll that leaves a remainder goes through, and the final roll may
    // take everything that is left.
    app.services
        .production_orders
        .advance(parent_id, ProductionStage::WeavingDone, quantity_payload(60))
        .await
        .expect("first roll");
    let records = app
        .services
        .production_orders
        .advance(parent_id, ProductionStage::WeavingDone, quantity_payload(40))
        .await
        .expect("final roll takes the remainder");
    assert_eq!(records[0].stage, ProductionStage::WeavingClosed);
    assert_eq!(records[0].quantity, 0);
}

#[tokio::test]
async fn cancelling_a_roll_child_restores_the_parent() {
    let app = spawn_app().await;
    let parent_id = start_weaving(&app, "JB11", 100, 3).await;
    let records = app
        .services
        .production_orders
        .advance(parent_id, ProductionStage::WeavingDone, quantity_payload(30))
        .await
        .expect("roll");
    let child_id = records[1].id;

    let records = app
        .services
        .production_orders
        .cancel(child_id)
        .await
        .expect("cancel roll child");
    assert_eq!(records.len(), 1);
    let parent = &records[0];
    assert_eq!(parent.id, parent_id);
    assert_eq!(parent.quantity, 100);
    assert_eq!(parent.completed_rolls, 0);
    assert_eq!(parent.stage, ProductionStage::WeavingInProgress);

    let err = app
        .services
        .production_orders
        .get(child_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn cancelling_the_last_roll_reopens_a_closed_parent() {
    let app = spawn_app().await;
    let parent_id = start_weaving(&app, "JB12", 100, 2).await;
    for qty in [60, 40] {
        app.services
            .production_orders
            .advance(parent_id, ProductionStage::WeavingDone, quantity_payload(qty))
            .await
            .expect("roll");
    }
    assert!(!app.services.machines.is_busy("W-01").await.unwrap());

    let lineage = app
        .services
        .production_orders
        .lineage(parent_id)
        .await
        .unwrap();
    let last_child = lineage
        .iter()
        .find(|r| r.roll_no == Some(2))
        .expect("second roll child");

    let records = app
        .services
        .production_orders
        .cancel(last_child.id)
        .await
        .expect("cancel last roll");
    let parent = &records[0];
    assert_eq!(parent.stage, ProductionStage::WeavingInProgress);
    assert_eq!(parent.quantity, 40);
    assert_eq!(parent.completed_rolls, 1);

    // The reopened run holds its machine again.
    assert!(app.services.machines.is_busy("W-01").await.unwrap());
}

#[tokio::test]
async fn reopening_fails_when_the_machine_was_taken() {
    let app = spawn_app().await;
    let parent_id = start_weaving(&app, "JB13", 100, 2).await;
    let mut child_id = None;
    for qty in [60, 40] {
        let records = app
            .services
            .production_orders
            .advance(parent_id, ProductionStage::WeavingDone, quantity_payload(qty))
            .await
            .expect("roll");
        child_id = Some(records[1].id);
    }
    let child_id = child_id.expect("last roll child");

    // Another order takes W-01 while the run is closed.
    let other = create_order(&app, "JB14", 20, None).await;
    common::advance_through(
        &app,
        other.id,
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
        .cancel(child_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::MachineBusy(_));
}

#[tokio::test]
async fn weaving_parent_with_completed_rolls_cannot_be_cancelled() {
    let app = spawn_app().await;
    let parent_id = start_weaving(&app, "JB15", 100, 2).await;
    app.services
        .production_orders
        .advance(parent_id, ProductionStage::WeavingDone, quantity_payload(60))
        .await
        .expect("roll");

    let err = app
        .services
        .production_orders
        .cancel(parent_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn roll_child_continues_down_the_pipeline() {
    let app = spawn_app().await;
    let parent_id = start_weaving(&app, "JB16", 100, 2).await;
    let records = app
        .services
        .production_orders
        .advance(parent_id, ProductionStage::WeavingDone, quantity_payload(60))
        .await
        .expect("roll");
    let child_id = records[1].id;

    let records = app
        .services
        .production_orders
        .advance(
            child_id,
            ProductionStage::DyeingInProgress,
            AdvancePayload {
                partner: Some("SunDye".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("advance roll child");
    assert_eq!(records[0].stage, ProductionStage::DyeingInProgress);
    assert_eq!(records[0].partner.as_deref(), Some("SunDye"));
}
