use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Descending timestamp index for nearest-before / latest scans
        manager
            .create_index(
                Index::create()
                    .name("idx_price_points_series_ts_desc")
                    .table(PricePoints::Table)
                    .col(PricePoints::Token)
                    .col(PricePoints::Network)
                    .col((PricePoints::Timestamp, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        // Source lookups (e.g. recount interpolated points)
        manager
            .create_index(
                Index::create()
                    .name("idx_price_points_source")
                    .table(PricePoints::Table)
                    .col(PricePoints::Source)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_price_points_series_ts_desc")
                    .table(PricePoints::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_price_points_source")
                    .table(PricePoints::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum PricePoints {
    Table,
    Token,
    Network,
    Timestamp,
    Source,
}
