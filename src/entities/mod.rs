pub mod machine;
pub mod partner;
pub mod product;
pub mod production_order;

pub use production_order::ProductionStage;
