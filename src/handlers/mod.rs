pub mod jobs;
pub mod price;
