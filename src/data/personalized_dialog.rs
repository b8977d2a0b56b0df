use super::fetcher::{DatasetFetcher, DatasetSpec};
use crate::core::config::DataOptions;
use crate::core::errors::DataError;

pub const DATASET: DatasetSpec<'static> = DatasetSpec {
    name: "personalized-dialog",
    url: "https://www.dropbox.com/s/4i9u4y24pt3paba/personalized-dialog-dataset.tar.gz?dl=1",
    archive: "personalized-dialog-dataset.tar.gz",
    version: None,
};

/// Downloads and unpacks the dataset into `<datapath>/personalized-dialog`
/// unless it is already built.
pub async fn build(opt: &DataOptions) -> Result<(), DataError> {
    let fetcher = DatasetFetcher::new()?;
    fetcher.fetch(&opt.datapath, &DATASET).await?;
    Ok(())
}
