//! Stager (SPEC_FULL.md §4.I).
//!
//! Downloads or locates the external transcoder binary and each File's
//! source media into a local staging directory, verifying SHA-256
//! checksums before any probe runs. A checksum mismatch is a `StageError`
//! and aborts the whole run — spec.md's Non-goal "media validation beyond
//! checksum" means content is never otherwise inspected.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::StageError;
use crate::model::BenchmarkPlan;

/// The Stager's output: the staged transcoder executable path plus the
/// staged path for each named media file, consumed by the Plan Driver's
/// `File.path` field.
#[derive(Debug, Clone)]
pub struct StagingManifest {
    pub executable: PathBuf,
    pub files: Vec<(String, PathBuf)>,
}

/// Describes where to fetch one piece of staged content from, and what it
/// must hash to once downloaded.
#[derive(Debug, Clone)]
pub struct RemoteAsset {
    pub url: String,
    pub sha256: String,
}

/// Stages the transcoder executable and every File named in `plan`.
///
/// Each asset is downloaded into `staging_dir` only if it is not already
/// present with a matching checksum — re-running a benchmark against an
/// already-staged directory re-verifies rather than re-downloads.
pub async fn stage(
    client: &reqwest::Client,
    plan: &BenchmarkPlan,
    staging_dir: &Path,
    executable: &RemoteAsset,
    media: &[(&str, RemoteAsset)],
) -> Result<StagingManifest, StageError> {
    tokio::fs::create_dir_all(staging_dir)
        .await
        .map_err(|source| StageError::Io { name: staging_dir.display().to_string(), source })?;

    let executable_path = staging_dir.join("transcoder");
    fetch_and_verify(client, executable, &executable_path).await?;
    make_executable(&executable_path)?;

    let mut files = Vec::with_capacity(media.len());
    for (name, asset) in media {
        let dest = staging_dir.join(name);
        fetch_and_verify(client, asset, &dest).await?;
        files.push(((*name).to_string(), dest));
    }

    for file in &plan.files {
        if !files.iter().any(|(name, _)| name == &file.name) && !file.path.exists() {
            return Err(StageError::MissingFile(file.name.clone()));
        }
    }

    Ok(StagingManifest { executable: executable_path, files })
}

/// Downloads `asset.url` to `dest` (unless a correctly-hashed copy already
/// exists there), unpacking `.zip` payloads in place, then verifies the
/// final file's SHA-256 digest.
async fn fetch_and_verify(
    client: &reqwest::Client,
    asset: &RemoteAsset,
    dest: &Path,
) -> Result<(), StageError> {
    if dest.exists() {
        if let Ok(actual) = sha256_of(dest).await {
            if actual.eq_ignore_ascii_case(&asset.sha256) {
                tracing::debug!(path = %dest.display(), "asset already staged, checksum matches");
                return Ok(());
            }
        }
    }

    tracing::info!(url = %asset.url, "downloading staged asset");
    let response = client
        .get(&asset.url)
        .send()
        .await
        .map_err(|source| StageError::Download { url: asset.url.clone(), source })?;
    let bytes = response
        .bytes()
        .await
        .map_err(|source| StageError::Download { url: asset.url.clone(), source })?;

    if asset.url.ends_with(".zip") {
        unpack_zip(&bytes, dest)?;
    } else {
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|source| StageError::Io { name: dest.display().to_string(), source })?;
    }

    let actual = sha256_of(dest)
        .await
        .map_err(|source| StageError::Io { name: dest.display().to_string(), source })?;
    if !actual.eq_ignore_ascii_case(&asset.sha256) {
        return Err(StageError::ChecksumMismatch {
            name: dest.display().to_string(),
            expected: asset.sha256.clone(),
            actual,
        });
    }

    Ok(())
}

fn unpack_zip(bytes: &[u8], dest: &Path) -> Result<(), StageError> {
    let name = dest.display().to_string();
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|source| StageError::Unpack { name: name.clone(), source })?;

    // Single-entry archives (the common case for a packaged transcoder
    // binary) are extracted directly to `dest`; anything else unpacks
    // alongside it under a directory named after the destination file.
    if archive.len() == 1 {
        let mut entry = archive
            .by_index(0)
            .map_err(|source| StageError::Unpack { name: name.clone(), source })?;
        let mut out = std::fs::File::create(dest)
            .map_err(|source| StageError::Io { name: name.clone(), source })?;
        std::io::copy(&mut entry, &mut out)
            .map_err(|source| StageError::Io { name: name.clone(), source })?;
    } else {
        let extract_dir = dest.with_extension("unpacked");
        archive
            .extract(&extract_dir)
            .map_err(|source| StageError::Unpack { name: name.clone(), source })?;
    }

    Ok(())
}

async fn sha256_of(path: &Path) -> std::io::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let digest = Sha256::digest(&bytes);
    Ok(hex::encode(digest))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), StageError> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = std::fs::metadata(path)
        .map_err(|source| StageError::Io { name: path.display().to_string(), source })?;
    let mut perms = metadata.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms)
        .map_err(|source| StageError::Io { name: path.display().to_string(), source })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), StageError> {
    Ok(())
}
