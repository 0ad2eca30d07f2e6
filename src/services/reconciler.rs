//! Split/merge reconciliation over the flat record store.
//!
//! Splitting decrements the source and inserts a child in the same
//! transaction; merging sums quantities into a survivor and deletes the rest.
//! Every helper here runs on the caller's connection so compound writes stay
//! atomic.

use crate::{
    entities::production_order::{self, root_order_no, ProductionStage},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

/// Builds a child record copying the source's product attributes and pricing
/// terms. The caller finishes stage-specific fields before inserting.
pub(crate) fn new_child_from(
    source: &production_order::Model,
    child_no: i32,
    stage: ProductionStage,
    quantity: i32,
    now: DateTime<Utc>,
) -> production_order::ActiveModel {
    production_order::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_no: Set(format!("{}-{}", source.order_no, child_no)),
        parent_id: Set(Some(source.id)),
        product_code: Set(source.product_code.clone()),
        customer: Set(source.customer.clone()),
        color: Set(source.color.clone()),
        size: Set(source.size.clone()),
        weight: Set(source.weight),
        stage: Set(stage),
        quantity: Set(quantity),
        machine_no: Set(None),
        roll_no: Set(None),
        total_rolls: Set(None),
        completed_rolls: Set(0),
        split_count: Set(0),
        partner: Set(source.partner.clone()),
        unit_price: Set(source.unit_price),
        vat_included: Set(source.vat_included),
        defect_qty: Set(None),
        stage_date: Set(source.stage_date),
        note: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

/// Forks `qty` off `source` into a new child at `child_stage`, decrementing
/// the source in the same transaction. Precondition `0 < qty <
/// source.quantity`; postcondition: the two quantities sum to the pre-split
/// value.
pub async fn split_within<C, F>(
    conn: &C,
    source: production_order::Model,
    qty: i32,
    child_stage: ProductionStage,
    mutate_child: F,
) -> Result<(production_order::Model, production_order::Model), ServiceError>
where
    C: ConnectionTrait,
    F: FnOnce(&mut production_order::ActiveModel),
{
    if qty <= 0 {
        return Err(ServiceError::ValidationError(
            "split quantity must be positive".to_string(),
        ));
    }
    if qty > source.quantity {
        return Err(ServiceError::QuantityExceeded {
            requested: qty,
            available: source.quantity,
        });
    }
    if qty == source.quantity {
        return Err(ServiceError::ValidationError(
            "split quantity must be less than the record quantity".to_string(),
        ));
    }

    let now = Utc::now();
    let child_no = source.split_count + 1;

    let mut child = new_child_from(&source, child_no, child_stage, qty, now);
    mutate_child(&mut child);

    // The decrement is guarded on the values the caller read. Under read
    // committed another transaction can change the source between that read
    // and this write; a blind write-back would lose its update.
    let patch = production_order::ActiveModel {
        quantity: Set(source.quantity - qty),
        split_count: Set(child_no),
        updated_at: Set(now),
        ..Default::default()
    };
    let guarded = production_order::Entity::update_many()
        .set(patch)
        .filter(production_order::Column::Id.eq(source.id))
        .filter(production_order::Column::Quantity.eq(source.quantity))
        .filter(production_order::Column::SplitCount.eq(source.split_count))
        .exec(conn)
        .await?;
    if guarded.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "production order {} was modified concurrently",
            source.order_no
        )));
    }

    let updated_source = production_order::Entity::find_by_id(source.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("production order {}", source.id)))?;
    let child = child.insert(conn).await?;

    Ok((updated_source, child))
}

/// First same-lineage record waiting at `stage` with identical product
/// attributes and pricing terms, if any. Candidates are fetched by lineage
/// and compared in memory so `None` fields compare as equal.
pub async fn find_merge_candidate<C: ConnectionTrait>(
    conn: &C,
    record: &production_order::Model,
    stage: ProductionStage,
) -> Result<Option<production_order::Model>, ServiceError> {
    let root = root_order_no(&record.order_no);

    let candidates = production_order::Entity::find()
        .filter(production_order::Column::Stage.eq(stage))
        .filter(
            production_order::Column::OrderNo
                .eq(root.clone())
                .or(production_order::Column::OrderNo.starts_with(format!("{root}-"))),
        )
        .order_by_asc(production_order::Column::CreatedAt)
        .all(conn)
        .await?;

    Ok(candidates.into_iter().find(|c| {
        c.id != record.id
            && c.product_code == record.product_code
            && c.customer == record.customer
            && c.color == record.color
            && c.size == record.size
            && c.weight == record.weight
            && c.unit_price == record.unit_price
            && c.vat_included == record.vat_included
    }))
}

/// Folds `absorbed` into `survivor`: the survivor's quantity becomes the sum
/// of all inputs and the absorbed rows are deleted. With no absorbed records
/// this is a no-op, which makes re-merging a merge output idempotent.
pub async fn merge_within<C: ConnectionTrait>(
    conn: &C,
    survivor: production_order::Model,
    absorbed: Vec<production_order::Model>,
) -> Result<production_order::Model, ServiceError> {
    if absorbed.is_empty() {
        return Ok(survivor);
    }

    let added: i32 = absorbed.iter().map(|r| r.quantity).sum();

    // Same guard as the split path: the sum only lands if the survivor still
    // holds the quantity the caller read.
    let patch = production_order::ActiveModel {
        quantity: Set(survivor.quantity + added),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    let guarded = production_order::Entity::update_many()
        .set(patch)
        .filter(production_order::Column::Id.eq(survivor.id))
        .filter(production_order::Column::Quantity.eq(survivor.quantity))
        .exec(conn)
        .await?;
    if guarded.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "production order {} was modified concurrently",
            survivor.order_no
        )));
    }

    for record in &absorbed {
        let deleted = production_order::Entity::delete_by_id(record.id)
            .exec(conn)
            .await?;
        // An absorbed row that vanished mid-merge means its quantity was
        // already accounted elsewhere; summing it here would double-count.
        if deleted.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "production order {} was modified concurrently",
                record.order_no
            )));
        }
    }

    production_order::Entity::find_by_id(survivor.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("production order {}", survivor.id)))
}
