use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use regex::Regex;

const USER_AGENT: &str = "webmap-generator";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

pub fn build_client() -> anyhow::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .context("Building HTTP client")
}

/// Pull the file id out of a Google Drive share link. Both the
/// `/file/d/{id}/...` path form and the `?id={id}` query form are
/// understood.
pub fn extract_drive_id(url: &str) -> Option<String> {
    let path_form = Regex::new(r"/file/d/([^/]+)/").unwrap();
    if let Some(captures) = path_form.captures(url) {
        return Some(captures[1].to_string());
    }
    let query_form = Regex::new(r"[?&]id=([^&]+)").unwrap();
    query_form
        .captures(url)
        .map(|captures| captures[1].to_string())
}

/// Whether a bare string looks like an opaque Drive file id rather than
/// an address.
pub fn is_drive_file_id(s: &str) -> bool {
    s.len() >= 20 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn drive_download_url(url: &str) -> anyhow::Result<String> {
    let file_id = extract_drive_id(url)
        .with_context(|| format!("Could not extract a Drive file id from {}", url))?;
    Ok(format!(
        "https://drive.google.com/uc?export=download&id={}",
        file_id
    ))
}

/// Download a boundary or points source to `output_filepath`. Drive share
/// links go through the dedicated direct-download endpoint; everything
/// else is fetched as-is. A non-success status is an error; there are no
/// retries.
pub fn download_any(
    client: &reqwest::blocking::Client,
    url: &str,
    output_filepath: &Path,
) -> anyhow::Result<()> {
    let fetch_url = if url.contains("drive.google.com") {
        drive_download_url(url)?
    } else {
        url.to_string()
    };
    log::info!("Downloading {} to {:?}", url, output_filepath);
    let response = client
        .get(&fetch_url)
        .send()
        .and_then(|response| response.error_for_status())
        .with_context(|| format!("Downloading {}", fetch_url))?;
    let content = response.bytes().context("Reading download body")?;
    fs::write(output_filepath, &content)
        .with_context(|| format!("Writing download to {:?}", output_filepath))?;
    Ok(())
}

/// Stage a source into the data directory under a fixed name, creating
/// the directory first. Always re-downloads; stale boundary data must not
/// leak into a fresh map.
pub fn sync_source_to_file(
    client: &reqwest::blocking::Client,
    url: &str,
    data_dir: &Path,
    filename: &str,
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Creating data directory {:?}", data_dir))?;
    let output_filepath = data_dir.join(filename);
    download_any(client, url, &output_filepath)?;
    Ok(output_filepath)
}
