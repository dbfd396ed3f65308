//! Initial schema migration - creates all tables from scratch.
//!
//! - `users`: authentication
//! - `invoices`: payable records created by the external invoicing flow
//! - `transactions`: payment attempts bound to gateway orders
//! - `auth_tokens`: cached bearer credentials for the gateway

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Password,
}

#[derive(Iden)]
enum Invoices {
    Table,
    Id,
    UserId,
    VendorId,
    AmountMinor,
    Status,
    TransactionId,
    PaidAt,
    CreatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    InvoiceId,
    UserId,
    VendorId,
    AmountMinor,
    FeeMinor,
    RewardsMinor,
    Status,
    GatewayOrderId,
    GatewayOrderToken,
    MerchantRef,
    GatewayStatus,
    ResponseData,
    StatusCheckCount,
    LastStatusCheckAt,
    CompletedAt,
    FailureReason,
    CreatedAt,
}

#[derive(Iden)]
enum AuthTokens {
    Table,
    Id,
    AccessToken,
    TokenType,
    ExpiresAt,
    IsActive,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .col(
                        ColumnDef::new(Invoices::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Invoices::UserId).string().not_null())
                    .col(ColumnDef::new(Invoices::VendorId).string().not_null())
                    .col(ColumnDef::new(Invoices::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Invoices::Status).string().not_null())
                    .col(ColumnDef::new(Invoices::TransactionId).string())
                    .col(ColumnDef::new(Invoices::PaidAt).timestamp())
                    .col(ColumnDef::new(Invoices::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::InvoiceId).string().not_null())
                    .col(ColumnDef::new(Transactions::UserId).string().not_null())
                    .col(ColumnDef::new(Transactions::VendorId).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::FeeMinor).big_integer().not_null())
                    .col(
                        ColumnDef::new(Transactions::RewardsMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Status).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::GatewayOrderId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::GatewayOrderToken)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::MerchantRef).string().not_null())
                    .col(ColumnDef::new(Transactions::GatewayStatus).string())
                    .col(ColumnDef::new(Transactions::ResponseData).text())
                    .col(
                        ColumnDef::new(Transactions::StatusCheckCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Transactions::LastStatusCheckAt).timestamp())
                    .col(ColumnDef::new(Transactions::CompletedAt).timestamp())
                    .col(ColumnDef::new(Transactions::FailureReason).string())
                    .col(ColumnDef::new(Transactions::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // The merchant reference doubles as the idempotency key for a
        // payment attempt; uniqueness guards against double order creation.
        manager
            .create_index(
                Index::create()
                    .name("uidx-transactions-merchant_ref")
                    .table(Transactions::Table)
                    .col(Transactions::MerchantRef)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-gateway_order_id")
                    .table(Transactions::Table)
                    .col(Transactions::GatewayOrderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuthTokens::Table)
                    .col(
                        ColumnDef::new(AuthTokens::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuthTokens::AccessToken).string().not_null())
                    .col(ColumnDef::new(AuthTokens::TokenType).string().not_null())
                    .col(ColumnDef::new(AuthTokens::ExpiresAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(AuthTokens::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(AuthTokens::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuthTokens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Invoices::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}
