pub mod ledger;
pub mod machines;
pub mod master_data;
pub mod production_orders;
pub mod reconciler;
