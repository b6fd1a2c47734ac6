pub use super::collection_jobs::Entity as CollectionJobs;
pub use super::price_points::Entity as PricePoints;
