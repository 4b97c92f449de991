#![allow(elided_lifetimes_in_paths)]

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_orders_tables::Migration),
            Box::new(m20250101_000002_create_payment_tables::Migration),
            Box::new(m20250101_000003_create_email_tables::Migration),
            Box::new(m20250101_000004_create_leads_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_orders_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_orders_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerName).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerEmail).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string().not_null())
                        .col(ColumnDef::new(Orders::Subtotal).big_integer().not_null())
                        .col(
                            ColumnDef::new(Orders::DeliveryFee)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Total).big_integer().not_null())
                        .col(ColumnDef::new(Orders::Currency).string().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::PaymentStatus).string().not_null())
                        .col(ColumnDef::new(Orders::DeliveryMethod).string().not_null())
                        .col(ColumnDef::new(Orders::DeliveryAddress).string().null())
                        .col(ColumnDef::new(Orders::PickupLocation).string().null())
                        .col(ColumnDef::new(Orders::PaymentReference).string().null())
                        .col(ColumnDef::new(Orders::IdempotencyKey).string().null())
                        .col(ColumnDef::new(Orders::Metadata).json().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_order_number")
                        .table(Orders::Table)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_email")
                        .table(Orders::Table)
                        .col(Orders::CustomerEmail)
                        .to_owned(),
                )
                .await?;

            // Unique key is the checkout replay gate
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_idempotency_key")
                        .table(Orders::Table)
                        .col(Orders::IdempotencyKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().null())
                        .col(ColumnDef::new(OrderItems::ProductName).string().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::LineTotal)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::ProductSnapshot).json().null())
                        .col(ColumnDef::new(OrderItems::CreatedAt).timestamp().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Orders {
        Table,
        Id,
        OrderNumber,
        CustomerName,
        CustomerEmail,
        CustomerPhone,
        Subtotal,
        DeliveryFee,
        Total,
        Currency,
        Status,
        PaymentStatus,
        DeliveryMethod,
        DeliveryAddress,
        PickupLocation,
        PaymentReference,
        IdempotencyKey,
        Metadata,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        ProductName,
        UnitPrice,
        Quantity,
        LineTotal,
        ProductSnapshot,
        CreatedAt,
    }
}

mod m20250101_000002_create_payment_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_payment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PaymentAttempts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentAttempts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentAttempts::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(PaymentAttempts::Reference)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentAttempts::Provider)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentAttempts::Amount)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentAttempts::Currency)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentAttempts::Status).string().not_null())
                        .col(
                            ColumnDef::new(PaymentAttempts::AttemptNumber)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(PaymentAttempts::FailureReason)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentAttempts::ProviderPayload)
                                .json()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PaymentAttempts::InitiatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentAttempts::CompletedAt)
                                .timestamp()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payment_attempts_order_id")
                                .from(PaymentAttempts::Table, PaymentAttempts::OrderId)
                                .to(
                                    super::m20250101_000001_create_orders_tables::Orders::Table,
                                    super::m20250101_000001_create_orders_tables::Orders::Id,
                                ),
                        )
                        .to_owned(),
                )
                .await?;

            // Unique reference is the idempotency race gate
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_attempts_reference")
                        .table(PaymentAttempts::Table)
                        .col(PaymentAttempts::Reference)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_attempts_order_id")
                        .table(PaymentAttempts::Table)
                        .col(PaymentAttempts::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Payments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::Reference).string().not_null())
                        .col(ColumnDef::new(Payments::OrderId).uuid().null())
                        .col(ColumnDef::new(Payments::Amount).big_integer().not_null())
                        .col(ColumnDef::new(Payments::Status).string().not_null())
                        .col(ColumnDef::new(Payments::PaymentMethod).string().not_null())
                        .col(ColumnDef::new(Payments::Email).string().null())
                        .col(ColumnDef::new(Payments::Metadata).json().null())
                        .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Payments::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_reference")
                        .table(Payments::Table)
                        .col(Payments::Reference)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PaymentAttempts::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum PaymentAttempts {
        Table,
        Id,
        OrderId,
        Reference,
        Provider,
        Amount,
        Currency,
        Status,
        AttemptNumber,
        FailureReason,
        ProviderPayload,
        InitiatedAt,
        CompletedAt,
    }

    #[derive(Iden)]
    pub enum Payments {
        Table,
        Id,
        Reference,
        OrderId,
        Amount,
        Status,
        PaymentMethod,
        Email,
        Metadata,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000003_create_email_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_email_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(EmailQueue::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(EmailQueue::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(EmailQueue::Recipient).string().not_null())
                        .col(ColumnDef::new(EmailQueue::Subject).string().not_null())
                        .col(ColumnDef::new(EmailQueue::Html).text().not_null())
                        .col(
                            ColumnDef::new(EmailQueue::Attempts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(EmailQueue::LastError).text().null())
                        .col(ColumnDef::new(EmailQueue::NextTry).timestamp().not_null())
                        .col(ColumnDef::new(EmailQueue::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_email_queue_next_try")
                        .table(EmailQueue::Table)
                        .col(EmailQueue::NextTry)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(EmailDeliveries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(EmailDeliveries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EmailDeliveries::Recipient)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(EmailDeliveries::Subject)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(EmailDeliveries::Status).string().not_null())
                        .col(
                            ColumnDef::new(EmailDeliveries::Provider)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(EmailDeliveries::Payload).json().not_null())
                        .col(
                            ColumnDef::new(EmailDeliveries::SentAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(EmailDeliveries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(EmailQueue::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum EmailQueue {
        Table,
        Id,
        Recipient,
        Subject,
        Html,
        Attempts,
        LastError,
        NextTry,
        CreatedAt,
    }

    #[derive(Iden)]
    pub enum EmailDeliveries {
        Table,
        Id,
        Recipient,
        Subject,
        Status,
        Provider,
        Payload,
        SentAt,
    }
}

mod m20250101_000004_create_leads_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_leads_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Leads::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Leads::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Leads::Name).string().not_null())
                        .col(ColumnDef::new(Leads::Email).string().not_null())
                        .col(ColumnDef::new(Leads::Phone).string().null())
                        .col(ColumnDef::new(Leads::Source).string().null())
                        .col(ColumnDef::new(Leads::Message).text().null())
                        .col(ColumnDef::new(Leads::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Leads::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Leads {
        Table,
        Id,
        Name,
        Email,
        Phone,
        Source,
        Message,
        CreatedAt,
    }
}
