use std::path::{Path, PathBuf};

use super::build_data;
use crate::core::errors::DataError;

/// A downloadable dataset: one archive unpacked into `<datapath>/<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSpec<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub archive: &'a str,
    pub version: Option<&'a str>,
}

pub struct DatasetFetcher {
    client: reqwest::Client,
}

impl DatasetFetcher {
    pub fn new() -> Result<Self, DataError> {
        Ok(Self::with_client(build_data::http_client()?))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Makes sure `spec` is built under `datapath` and returns its directory.
    ///
    /// A directory whose marker already matches the requested version is
    /// left untouched. Anything else is wiped and rebuilt from a fresh
    /// download. Failures are returned as-is; a half-extracted directory is
    /// left behind without a marker, so the next call rebuilds it.
    pub async fn fetch(&self, datapath: &Path, spec: &DatasetSpec<'_>) -> Result<PathBuf, DataError> {
        let dpath = datapath.join(spec.name);

        if build_data::built(&dpath, spec.version) {
            tracing::debug!(path = %dpath.display(), "dataset already built");
            return Ok(dpath);
        }

        tracing::info!("[building data: {}]", dpath.display());
        if build_data::built(&dpath, None) {
            // an older version exists, so remove these outdated files
            tracing::info!(path = %dpath.display(), "removing outdated build");
            build_data::remove_dir(&dpath)?;
        }
        build_data::make_dir(&dpath)?;

        build_data::download(&self.client, spec.url, &dpath, spec.archive).await?;

        let unpack_dir = dpath.clone();
        let archive = spec.archive.to_string();
        tokio::task::spawn_blocking(move || build_data::untar(&unpack_dir, &archive))
            .await
            .map_err(|e| DataError::Archive(e.to_string()))??;

        build_data::mark_done(&dpath, spec.version)?;
        Ok(dpath)
    }
}
