#![allow(elided_lifetimes_in_paths)]

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240115_000001_create_production_orders_table::Migration),
            Box::new(m20240115_000002_create_machines_table::Migration),
            Box::new(m20240115_000003_create_products_table::Migration),
            Box::new(m20240115_000004_create_partners_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240115_000001_create_production_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000001_create_production_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductionOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionOrders::OrderNo).string().not_null())
                        .col(ColumnDef::new(ProductionOrders::ParentId).uuid().null())
                        .col(
                            ColumnDef::new(ProductionOrders::ProductCode)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionOrders::Customer).string().not_null())
                        .col(ColumnDef::new(ProductionOrders::Color).string().null())
                        .col(ColumnDef::new(ProductionOrders::Size).string().null())
                        .col(ColumnDef::new(ProductionOrders::Weight).decimal().null())
                        .col(ColumnDef::new(ProductionOrders::Stage).string().not_null())
                        .col(
                            ColumnDef::new(ProductionOrders::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(ProductionOrders::MachineNo).string().null())
                        .col(ColumnDef::new(ProductionOrders::RollNo).integer().null())
                        .col(ColumnDef::new(ProductionOrders::TotalRolls).integer().null())
                        .col(
                            ColumnDef::new(ProductionOrders::CompletedRolls)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::SplitCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(ProductionOrders::Partner).string().null())
                        .col(ColumnDef::new(ProductionOrders::UnitPrice).decimal().null())
                        .col(
                            ColumnDef::new(ProductionOrders::VatIncluded)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(ProductionOrders::DefectQty).integer().null())
                        .col(ColumnDef::new(ProductionOrders::StageDate).date().null())
                        .col(ColumnDef::new(ProductionOrders::Note).string().null())
                        .col(
                            ColumnDef::new(ProductionOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_orders_order_no")
                        .table(ProductionOrders::Table)
                        .col(ProductionOrders::OrderNo)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_orders_stage")
                        .table(ProductionOrders::Table)
                        .col(ProductionOrders::Stage)
                        .to_owned(),
                )
                .await?;

            // Supports the machine-exclusivity check and the busy-machines view
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_orders_stage_machine")
                        .table(ProductionOrders::Table)
                        .col(ProductionOrders::Stage)
                        .col(ProductionOrders::MachineNo)
                        .to_owned(),
                )
                .await?;

            // The exclusivity invariant itself: at most one record may hold a
            // machine while weaving, enforced by the database so concurrent
            // transactions cannot both pass the application-level check.
            // Partial unique indexes need raw SQL; the statement is valid on
            // both Postgres and SQLite.
            manager
                .get_connection()
                .execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_production_orders_machine_exclusive \
                     ON production_orders (machine_no) \
                     WHERE stage = 'weaving_in_progress'",
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_orders_parent_id")
                        .table(ProductionOrders::Table)
                        .col(ProductionOrders::ParentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_orders_product_code")
                        .table(ProductionOrders::Table)
                        .col(ProductionOrders::ProductCode)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductionOrders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum ProductionOrders {
        Table,
        Id,
        OrderNo,
        ParentId,
        ProductCode,
        Customer,
        Color,
        Size,
        Weight,
        Stage,
        Quantity,
        MachineNo,
        RollNo,
        TotalRolls,
        CompletedRolls,
        SplitCount,
        Partner,
        UnitPrice,
        VatIncluded,
        DefectQty,
        StageDate,
        Note,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240115_000002_create_machines_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000002_create_machines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Machines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Machines::MachineNo)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Machines::Name).string().null())
                        .col(
                            ColumnDef::new(Machines::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Machines::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Machines::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Machines {
        Table,
        MachineNo,
        Name,
        Active,
        CreatedAt,
    }
}

mod m20240115_000003_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000003_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::ProductCode)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Color).string().null())
                        .col(ColumnDef::new(Products::Size).string().null())
                        .col(ColumnDef::new(Products::Weight).decimal().null())
                        .col(ColumnDef::new(Products::UnitPrice).decimal().null())
                        .col(
                            ColumnDef::new(Products::VatIncluded)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Products {
        Table,
        ProductCode,
        Name,
        Color,
        Size,
        Weight,
        UnitPrice,
        VatIncluded,
        CreatedAt,
    }
}

mod m20240115_000004_create_partners_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000004_create_partners_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Partners::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Partners::Name)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Partners::Kind).string().not_null())
                        .col(ColumnDef::new(Partners::Phone).string().null())
                        .col(ColumnDef::new(Partners::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Partners::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Partners {
        Table,
        Name,
        Kind,
        Phone,
        CreatedAt,
    }
}
