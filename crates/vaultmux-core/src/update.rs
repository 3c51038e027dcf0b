use log::debug;
use semver::Version;
use serde::Deserialize;

use vaultmux_backend::{BackendError, Engine, EngineKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendUpdate {
    pub backend: EngineKind,
    pub current_version: String,
    pub latest_version: String,
    pub release_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    pub html_url: String,
}

/// Version part of a release tag: `v2.4.0`, `1.9.5` and project-prefixed
/// tags such as `cryfs-0.11.4` are all accepted.
fn release_version(tag: &str) -> &str {
    let tag = tag
        .rsplit_once('-')
        .filter(|(project, _)| project.chars().all(|ch| ch.is_ascii_alphabetic()))
        .map_or(tag, |(_, version)| version);
    tag.strip_prefix('v').unwrap_or(tag)
}

fn backend_update_from_release(
    backend: EngineKind,
    release: GitHubRelease,
    current_version: &str,
) -> Option<BackendUpdate> {
    let latest = release_version(&release.tag_name);
    let current = current_version.strip_prefix('v').unwrap_or(current_version);

    if is_newer_version(latest, current) {
        Some(BackendUpdate {
            backend,
            current_version: current.to_string(),
            latest_version: latest.to_string(),
            release_url: release.html_url,
        })
    } else {
        None
    }
}

/// # Errors
/// Returns a network error when the request fails or the response cannot be
/// parsed.
pub async fn check_for_backend_update(
    client: &reqwest::Client,
    engine: &dyn Engine,
    current_version: &str,
) -> Result<Option<BackendUpdate>, BackendError> {
    let Some(repository) = engine.capabilities().release_repository else {
        return Ok(None);
    };

    let url = format!("https://api.github.com/repos/{repository}/releases/latest");
    debug!("Checking {} releases at {url}", engine.name());

    let response = client
        .get(&url)
        .header("User-Agent", "vaultmux")
        .send()
        .await
        .map_err(|error| BackendError::network_request_from("backend update check", error))?;

    if !response.status().is_success() {
        debug!(
            "{} update check returned HTTP {}",
            engine.name(),
            response.status()
        );
        return Ok(None);
    }

    let release: GitHubRelease = response
        .json()
        .await
        .map_err(|error| BackendError::network_parse_from("backend update check", error))?;

    Ok(backend_update_from_release(
        engine.kind(),
        release,
        current_version,
    ))
}

/// Semver comparison tolerant of short versions (`1.2`) on either side.
#[must_use]
pub fn is_newer_version(latest: &str, current: &str) -> bool {
    match (parse_semver(latest), parse_semver(current)) {
        (Some(latest), Some(current)) => latest > current,
        _ => latest != current,
    }
}

fn parse_semver(version: &str) -> Option<Version> {
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }

    let suffix_idx = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(suffix_idx);
    let parts = core
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;

    let normalized = match parts.as_slice() {
        [major] => format!("{major}.0.0{suffix}"),
        [major, minor] => format!("{major}.{minor}.0{suffix}"),
        _ => return None,
    };

    Version::parse(&normalized).ok()
}
