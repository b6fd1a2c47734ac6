use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CollectionJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CollectionJobs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CollectionJobs::JobId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(CollectionJobs::Token).string().not_null())
                    .col(ColumnDef::new(CollectionJobs::Network).string().not_null())
                    .col(ColumnDef::new(CollectionJobs::Timestamps).json().not_null())
                    .col(
                        ColumnDef::new(CollectionJobs::State)
                            .string()
                            .not_null()
                            .default("queued"),
                    )
                    .col(
                        ColumnDef::new(CollectionJobs::Total)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CollectionJobs::Processed)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CollectionJobs::Succeeded)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CollectionJobs::FailedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(CollectionJobs::LastError).string().null())
                    .col(
                        ColumnDef::new(CollectionJobs::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(ColumnDef::new(CollectionJobs::StartedAt).timestamp().null())
                    .col(
                        ColumnDef::new(CollectionJobs::FinishedAt)
                            .timestamp()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Workers poll for the oldest queued job
        manager
            .create_index(
                Index::create()
                    .name("idx_collection_jobs_state_created")
                    .table(CollectionJobs::Table)
                    .col(CollectionJobs::State)
                    .col(CollectionJobs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CollectionJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CollectionJobs {
    Table,
    Id,
    JobId,
    Token,
    Network,
    Timestamps,
    State,
    Total,
    Processed,
    Succeeded,
    FailedCount,
    LastError,
    CreatedAt,
    StartedAt,
    FinishedAt,
}
