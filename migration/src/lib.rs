pub use sea_orm_migration::prelude::*;

mod m20250801_000001_create_price_points;
mod m20250801_000002_create_collection_jobs;
mod m20250802_000001_add_price_points_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250801_000001_create_price_points::Migration),
            Box::new(m20250801_000002_create_collection_jobs::Migration),
            Box::new(m20250802_000001_add_price_points_indexes::Migration),
        ]
    }
}
