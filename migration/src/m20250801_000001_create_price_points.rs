use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PricePoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PricePoints::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PricePoints::Token).string().not_null())
                    .col(ColumnDef::new(PricePoints::Network).string().not_null())
                    .col(
                        ColumnDef::new(PricePoints::Timestamp)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::Price)
                            .decimal_len(78, 18)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::Volume)
                            .decimal_len(78, 18)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PricePoints::MarketCap)
                            .decimal_len(78, 18)
                            .null(),
                    )
                    .col(ColumnDef::new(PricePoints::Source).string().not_null())
                    .col(
                        ColumnDef::new(PricePoints::Confidence)
                            .double()
                            .not_null()
                            .default(1.0),
                    )
                    .col(ColumnDef::new(PricePoints::Metadata).json().null())
                    .col(
                        ColumnDef::new(PricePoints::CreatedAt)
                            .timestamp()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique constraint: one price per token/network/timestamp
        manager
            .create_index(
                Index::create()
                    .name("idx_price_points_unique")
                    .table(PricePoints::Table)
                    .col(PricePoints::Token)
                    .col(PricePoints::Network)
                    .col(PricePoints::Timestamp)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PricePoints::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PricePoints {
    Table,
    Id,
    Token,
    Network,
    Timestamp,
    Price,
    Volume,
    MarketCap,
    Source,
    Confidence,
    Metadata,
    CreatedAt,
}
