use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Pipeline stage of a production order.
///
/// `WeavingClosed` is the lineage-only retirement state of a weaving parent
/// whose rolls are all complete; it is excluded from stage listings and
/// aggregations.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductionStage {
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "weaving_wait")]
    WeavingWait,
    #[sea_orm(string_value = "weaving_in_progress")]
    WeavingInProgress,
    #[sea_orm(string_value = "weaving_done")]
    WeavingDone,
    #[sea_orm(string_value = "dyeing_in_progress")]
    DyeingInProgress,
    #[sea_orm(string_value = "dyeing_done")]
    DyeingDone,
    #[sea_orm(string_value = "sewing_in_progress")]
    SewingInProgress,
    #[sea_orm(string_value = "sewing_done")]
    SewingDone,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "weaving_closed")]
    WeavingClosed,
}

impl ProductionStage {
    /// The only stage `advance` may move a record to from this one.
    pub fn successor(self) -> Option<ProductionStage> {
        use ProductionStage::*;
        match self {
            Received => Some(WeavingWait),
            WeavingWait => Some(WeavingInProgress),
            WeavingInProgress => Some(WeavingDone),
            WeavingDone => Some(DyeingInProgress),
            DyeingInProgress => Some(DyeingDone),
            DyeingDone => Some(SewingInProgress),
            SewingInProgress => Some(SewingDone),
            SewingDone => Some(Shipped),
            Shipped | WeavingClosed => None,
        }
    }

    /// The stage `cancel` reverts a record to.
    pub fn predecessor(self) -> Option<ProductionStage> {
        use ProductionStage::*;
        match self {
            Received => None,
            WeavingWait => Some(Received),
            WeavingInProgress => Some(WeavingWait),
            WeavingDone => Some(WeavingInProgress),
            DyeingInProgress => Some(WeavingDone),
            DyeingDone => Some(DyeingInProgress),
            SewingInProgress => Some(DyeingDone),
            SewingDone => Some(SewingInProgress),
            Shipped => Some(SewingDone),
            WeavingClosed => None,
        }
    }

    /// Whether the stage appears in listings and ledger aggregation.
    pub fn is_listed(self) -> bool {
        !matches!(self, ProductionStage::WeavingClosed)
    }

    /// Done-stages record defect quantities and pricing terms.
    pub fn is_done_stage(self) -> bool {
        matches!(
            self,
            ProductionStage::WeavingDone
                | ProductionStage::DyeingDone
                | ProductionStage::SewingDone
        )
    }
}

/// A quantity of one product at one pipeline stage.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Business key; children get `-N` suffixes on their source's number.
    pub order_no: String,
    /// Weak back-reference to the record this one was split from. Never
    /// treated as ownership.
    pub parent_id: Option<Uuid>,
    pub product_code: String,
    pub customer: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub weight: Option<Decimal>,
    pub stage: ProductionStage,
    pub quantity: i32,
    /// Set when entering weaving; retained afterwards as provenance. The
    /// exclusivity invariant is scoped to `stage == weaving_in_progress`.
    pub machine_no: Option<String>,
    pub roll_no: Option<i32>,
    pub total_rolls: Option<i32>,
    pub completed_rolls: i32,
    /// Lineage counter; names the next child suffix.
    pub split_count: i32,
    pub partner: Option<String>,
    pub unit_price: Option<Decimal>,
    pub vat_included: bool,
    pub defect_qty: Option<i32>,
    pub stage_date: Option<NaiveDate>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A weaving parent running the multi-roll sub-machine.
    pub fn is_roll_parent(&self) -> bool {
        self.total_rolls.map_or(false, |t| t > 1)
    }

    /// A `weaving_done` child spawned by a roll completion.
    pub fn is_roll_child(&self) -> bool {
        self.parent_id.is_some()
            && self.roll_no.is_some()
            && self.stage == ProductionStage::WeavingDone
    }

    /// Root business key of the lineage: the order number with all trailing
    /// `-<digits>` split suffixes stripped.
    pub fn root_order_no(&self) -> String {
        root_order_no(&self.order_no)
    }
}

pub fn root_order_no(order_no: &str) -> String {
    let mut root = order_no;
    while let Some((head, tail)) = root.rsplit_once('-') {
        if !head.is_empty() && !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
            root = head;
        } else {
            break;
        }
    }
    root.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_order_is_total() {
        use ProductionStage::*;
        let pipeline = [
            Received,
            WeavingWait,
            WeavingInProgress,
            WeavingDone,
            DyeingInProgress,
            DyeingDone,
            SewingInProgress,
            SewingDone,
            Shipped,
        ];
        for pair in pipeline.windows(2) {
            assert_eq!(pair[0].successor(), Some(pair[1]));
            assert_eq!(pair[1].predecessor(), Some(pair[0]));
        }
        assert_eq!(Shipped.successor(), None);
        assert_eq!(Received.predecessor(), None);
        assert_eq!(WeavingClosed.successor(), None);
    }

    #[test]
    fn closed_stage_is_hidden() {
        assert!(!ProductionStage::WeavingClosed.is_listed());
        assert!(ProductionStage::Shipped.is_listed());
    }

    #[test]
    fn stage_strings_are_snake_case() {
        assert_eq!(
            ProductionStage::WeavingInProgress.to_string(),
            "weaving_in_progress"
        );
        assert_eq!(ProductionStage::Received.to_string(), "received");
    }

    #[test]
    fn root_order_no_strips_split_suffixes() {
        assert_eq!(root_order_no("A100"), "A100");
        assert_eq!(root_order_no("A100-1"), "A100");
        assert_eq!(root_order_no("A100-1-2"), "A100");
        // Alphanumeric tails are part of the business key, not split suffixes.
        assert_eq!(root_order_no("JB-X2"), "JB-X2");
    }
}
