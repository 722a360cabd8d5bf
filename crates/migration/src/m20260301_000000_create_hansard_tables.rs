use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Politician::Table)
                    .if_not_exists()
                    .col(pk_auto(Politician::Id))
                    .col(string(Politician::Name))
                    .col(string(Politician::Identifier).unique_key().to_owned())
                    .col(boolean(Politician::CurrentMember).default(true).to_owned())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Hansard::Table)
                    .if_not_exists()
                    .col(pk_auto(Hansard::Id))
                    .col(date(Hansard::Date))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Statement::Table)
                    .if_not_exists()
                    .col(pk_auto(Statement::Id))
                    .col(integer(Statement::HansardId))
                    .col(integer_null(Statement::PoliticianId))
                    .col(integer(Statement::Sequence))
                    .col(string(Statement::Topic))
                    .col(text(Statement::Content))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_statement_hansard")
                            .from(Statement::Table, Statement::HansardId)
                            .to(Hansard::Table, Hansard::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_statement_politician")
                            .from(Statement::Table, Statement::PoliticianId)
                            .to(Politician::Table, Politician::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_statement_hansard_sequence")
                    .table(Statement::Table)
                    .col(Statement::HansardId)
                    .col(Statement::Sequence)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Statement::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Hansard::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Politician::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub(crate) enum Politician {
    Table,
    Id,
    Name,
    Identifier,
    CurrentMember,
}

#[derive(Iden)]
enum Hansard {
    Table,
    Id,
    Date,
}

#[derive(Iden)]
enum Statement {
    Table,
    Id,
    HansardId,
    PoliticianId,
    Sequence,
    Topic,
    Content,
}
