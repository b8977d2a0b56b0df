//! Filesystem and download primitives shared by dataset builders.
//!
//! A built dataset directory carries a `.built` marker whose first line is
//! the build timestamp and whose optional second line is the version token.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use reqwest::header;
use tar::Archive;

use crate::core::errors::DataError;

pub const BUILT_MARKER: &str = ".built";
const USER_AGENT: &str = concat!("knowledge-ranker/", env!("CARGO_PKG_VERSION"));

/// Whether `path` holds a finished build. With a version, the marker must
/// also record that exact version.
pub fn built(path: &Path, version: Option<&str>) -> bool {
    let marker = path.join(BUILT_MARKER);
    match version.filter(|v| !v.is_empty()) {
        None => marker.is_file(),
        Some(expected) => match fs::read_to_string(&marker) {
            Ok(text) => text.split('\n').nth(1) == Some(expected),
            Err(_) => false,
        },
    }
}

pub fn mark_done(path: &Path, version: Option<&str>) -> Result<(), DataError> {
    let marker = path.join(BUILT_MARKER);
    let mut contents = Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
    if let Some(version) = version.filter(|v| !v.is_empty()) {
        contents.push('\n');
        contents.push_str(version);
    }
    fs::write(&marker, contents).map_err(|e| DataError::io(&marker, e))
}

pub fn remove_dir(path: &Path) -> Result<(), DataError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DataError::io(path, e)),
    }
}

pub fn make_dir(path: &Path) -> Result<(), DataError> {
    fs::create_dir_all(path).map_err(|e| DataError::io(path, e))
}

pub fn http_client() -> Result<reqwest::Client, DataError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Streams `url` into `path/fname`. Bytes land in `fname.part` first and
/// the file is renamed once the body has been fully received.
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    fname: &str,
) -> Result<PathBuf, DataError> {
    let target = path.join(fname);
    let partial = path.join(format!("{}.part", fname));
    tracing::info!(url = %url, target = %target.display(), "downloading");

    let response = client
        .get(url)
        .header(header::ACCEPT, "application/octet-stream")
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DataError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let total = response.content_length().unwrap_or(0);
    let mut stream = response.bytes_stream();
    let mut file = fs::File::create(&partial).map_err(|e| DataError::io(&partial, e))?;
    let mut downloaded: u64 = 0;
    let mut last_decile = 0;

    while let Some(chunk) = stream.next().await {
        let data = chunk?;
        file.write_all(&data)
            .map_err(|e| DataError::io(&partial, e))?;
        downloaded += data.len() as u64;
        if total > 0 {
            let decile = downloaded * 10 / total;
            if decile > last_decile {
                last_decile = decile;
                tracing::debug!(
                    "Downloading {}... {:.1} MB / {:.1} MB",
                    fname,
                    downloaded as f64 / (1024_f64 * 1024_f64),
                    total as f64 / (1024_f64 * 1024_f64)
                );
            }
        }
    }
    file.flush().map_err(|e| DataError::io(&partial, e))?;
    drop(file);

    fs::rename(&partial, &target).map_err(|e| DataError::io(&target, e))?;
    tracing::info!(bytes = downloaded, file = %target.display(), "download complete");
    Ok(target)
}

/// Extracts the gzip tarball `path/fname` into `path`, then deletes it.
pub fn untar(path: &Path, fname: &str) -> Result<(), DataError> {
    let archive_path = path.join(fname);
    tracing::info!(archive = %archive_path.display(), "unpacking");
    extract_tar_gz_archive(&archive_path, path)?;
    fs::remove_file(&archive_path).map_err(|e| DataError::io(&archive_path, e))
}

fn normalize_archive_member_path(raw: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => normalized.push(part),
            Component::RootDir | Component::ParentDir | Component::Prefix(_) => return None,
        }
    }
    if normalized.as_os_str().is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn extract_tar_gz_archive(archive_path: &Path, destination: &Path) -> Result<(), DataError> {
    let archive_err = |e: std::io::Error| DataError::Archive(e.to_string());
    let file = fs::File::open(archive_path).map_err(|e| DataError::io(archive_path, e))?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);
    for item in archive.entries().map_err(archive_err)? {
        let mut entry = item.map_err(archive_err)?;
        let raw_path = entry.path().map_err(archive_err)?.into_owned();
        let entry_type = entry.header().entry_type();
        // "./" style root entries normalize to nothing
        if entry_type.is_dir() && raw_path.components().all(|c| c == Component::CurDir) {
            continue;
        }
        let Some(relative) = normalize_archive_member_path(&raw_path) else {
            return Err(DataError::UnsafeArchiveEntry(
                raw_path.to_string_lossy().to_string(),
            ));
        };
        let target = destination.join(relative);
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            return Err(DataError::UnsafeArchiveEntry(format!(
                "link entry {}",
                raw_path.to_string_lossy()
            )));
        }
        if entry_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| DataError::io(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))?;
        }
        entry.unpack(&target).map_err(|e| DataError::io(&target, e))?;
    }
    Ok(())
}
