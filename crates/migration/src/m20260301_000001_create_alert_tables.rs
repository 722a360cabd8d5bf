use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260301_000000_create_hansard_tables::Politician;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PoliticianAlert::Table)
                    .if_not_exists()
                    .col(pk_auto(PoliticianAlert::Id))
                    .col(integer(PoliticianAlert::PoliticianId))
                    .col(string(PoliticianAlert::Email))
                    .col(
                        timestamp_with_time_zone(PoliticianAlert::CreatedAt)
                            .default(Expr::current_timestamp())
                            .to_owned(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_politician_alert_politician")
                            .from(PoliticianAlert::Table, PoliticianAlert::PoliticianId)
                            .to(Politician::Table, Politician::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AlertUser::Table)
                    .if_not_exists()
                    .col(pk_auto(AlertUser::Id))
                    .col(string(AlertUser::Email).unique_key().to_owned())
                    .col(
                        timestamp_with_time_zone(AlertUser::CreatedAt)
                            .default(Expr::current_timestamp())
                            .to_owned(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Subscription::Table)
                    .if_not_exists()
                    .col(pk_auto(Subscription::Id))
                    .col(integer(Subscription::UserId))
                    .col(text(Subscription::Query))
                    .col(string(Subscription::Topic))
                    .col(boolean(Subscription::Active).default(true).to_owned())
                    .col(
                        timestamp_with_time_zone(Subscription::CreatedAt)
                            .default(Expr::current_timestamp())
                            .to_owned(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_user")
                            .from(Subscription::Table, Subscription::UserId)
                            .to(AlertUser::Table, AlertUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // get_or_create on subscriptions depends on this constraint.
        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_user_query_unique")
                    .table(Subscription::Table)
                    .col(Subscription::UserId)
                    .col(Subscription::Query)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_subscription_user_query_unique")
                    .table(Subscription::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Subscription::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AlertUser::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PoliticianAlert::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PoliticianAlert {
    Table,
    Id,
    PoliticianId,
    Email,
    CreatedAt,
}

#[derive(Iden)]
enum AlertUser {
    Table,
    Id,
    Email,
    CreatedAt,
}

#[derive(Iden)]
enum Subscription {
    Table,
    Id,
    UserId,
    Query,
    Topic,
    Active,
    CreatedAt,
}
