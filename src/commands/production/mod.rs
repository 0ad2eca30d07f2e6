pub mod advance_order_command;
pub mod cancel_order_command;
pub mod create_order_command;
pub mod split_order_command;

pub use advance_order_command::{AdvanceOrderCommand, AdvancePayload};
pub use cancel_order_command::CancelOrderCommand;
pub use create_order_command::CreateOrderCommand;
pub use split_order_command::SplitOrderCommand;

use crate::entities::production_order::{self, ProductionStage};
use chrono::{DateTime, Utc};
use sea_orm::Set;

/// Writes the stage-specific side effects of a forward transition onto the
/// record that ends up at `target` (the record itself for a full advance, the
/// child for a partial one).
pub(crate) fn apply_stage_effects(
    active: &mut production_order::ActiveModel,
    target: ProductionStage,
    payload: &AdvancePayload,
    now: DateTime<Utc>,
) {
    active.stage = Set(target);
    active.updated_at = Set(now);
    active.stage_date = Set(Some(payload.stage_date.unwrap_or_else(|| now.date_naive())));

    if target == ProductionStage::WeavingInProgress {
        if let Some(machine_no) = &payload.machine_no {
            active.machine_no = Set(Some(machine_no.clone()));
        }
        if let Some(total_rolls) = payload.total_rolls {
            active.total_rolls = Set(Some(total_rolls));
        }
    }

    if matches!(
        target,
        ProductionStage::DyeingInProgress | ProductionStage::SewingInProgress
    ) {
        if let Some(partner) = &payload.partner {
            active.partner = Set(Some(partner.clone()));
        }
    }

    if let Some(unit_price) = payload.unit_price {
        active.unit_price = Set(Some(unit_price));
    }
    if let Some(vat_included) = payload.vat_included {
        active.vat_included = Set(vat_included);
    }
    if target.is_done_stage() {
        if let Some(defect_qty) = payload.defect_qty {
            active.defect_qty = Set(Some(defect_qty));
        }
    }
    if let Some(weight) = payload.weight {
        active.weight = Set(Some(weight));
    }
    if let Some(note) = &payload.note {
        active.note = Set(Some(note.clone()));
    }
}
