pub mod build_data;
pub mod fetcher;
pub mod personalized_dialog;

pub use fetcher::{DatasetFetcher, DatasetSpec};
