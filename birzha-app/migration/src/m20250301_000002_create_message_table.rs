use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Message::Table)
                    .if_not_exists()
                    .col(pk_uuid(Message::Id))
                    .col(string(Message::FromRef))
                    .col(string(Message::ToRef))
                    .col(text(Message::Content))
                    .col(timestamp(Message::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // Conversation listing filters on both orderings of the pair.
        manager
            .create_index(
                Index::create()
                    .table(Message::Table)
                    .name("idx_message_from_to_created")
                    .col(Message::FromRef)
                    .col(Message::ToRef)
                    .col(Message::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        unimplemented!()
    }
}

#[derive(DeriveIden)]
enum Message {
    Table,
    Id,
    FromRef,
    ToRef,
    Content,
    CreatedAt,
}
