use sea_orm_migration::prelude::*;

use crate::m20250301_000001_create_users_and_gifts::{Gifts, Users};

#[derive(DeriveIden)]
enum Contributions {
    Table,
    Id,
    GiftId,
    Amount,
    Commission,
    Status,
    IsAsoebi,
    AsoebiQuantity,
    AsoebiQtyMen,
    AsoebiQtyWomen,
    AsoebiBrideMenQty,
    AsoebiBrideWomenQty,
    AsoebiGroomMenQty,
    AsoebiGroomWomenQty,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Withdrawals {
    Table,
    Id,
    UserId,
    Amount,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ReferralTransactions {
    Table,
    Id,
    ReferrerId,
    ReferredUserId,
    Amount,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Contributions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Contributions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Contributions::GiftId).uuid().not_null())
                    .col(ColumnDef::new(Contributions::Amount).double().not_null())
                    .col(
                        ColumnDef::new(Contributions::Commission)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Contributions::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Contributions::IsAsoebi)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Contributions::AsoebiQuantity).integer().null())
                    .col(ColumnDef::new(Contributions::AsoebiQtyMen).integer().null())
                    .col(ColumnDef::new(Contributions::AsoebiQtyWomen).integer().null())
                    .col(
                        ColumnDef::new(Contributions::AsoebiBrideMenQty)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Contributions::AsoebiBrideWomenQty)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Contributions::AsoebiGroomMenQty)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Contributions::AsoebiGroomWomenQty)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Contributions::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Contributions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contributions_gift")
                            .from(Contributions::Table, Contributions::GiftId)
                            .to(Gifts::Table, Gifts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_contributions_gift_asoebi")
                    .table(Contributions::Table)
                    .col(Contributions::GiftId)
                    .col(Contributions::IsAsoebi)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Withdrawals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Withdrawals::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Withdrawals::UserId).uuid().not_null())
                    .col(ColumnDef::new(Withdrawals::Amount).double().not_null())
                    .col(
                        ColumnDef::new(Withdrawals::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Withdrawals::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Withdrawals::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_withdrawals_user")
                            .from(Withdrawals::Table, Withdrawals::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // deleting either party removes the referral row
        manager
            .create_table(
                Table::create()
                    .table(ReferralTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReferralTransactions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReferralTransactions::ReferrerId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReferralTransactions::ReferredUserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReferralTransactions::Amount)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(ReferralTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_referral_tx_referrer")
                            .from(ReferralTransactions::Table, ReferralTransactions::ReferrerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_referral_tx_referred")
                            .from(
                                ReferralTransactions::Table,
                                ReferralTransactions::ReferredUserId,
                            )
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReferralTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Withdrawals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Contributions::Table).to_owned())
            .await?;
        Ok(())
    }
}
