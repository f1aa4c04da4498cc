use crate::error::FetchError;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::Write;
use std::path::Path;

async fn get_checked(client: &reqwest::Client, url: &str) -> Result<reqwest::Response, FetchError> {
    tracing::debug!("GET {}", url);
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }
    Ok(response)
}

fn progress_bar(total_size: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total_size);
    let style = ProgressStyle::default_bar()
        .template("{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(format!("Downloading {}", label));
    pb
}

/// Stream the body at `url` into `local_path`. The file is only created once
/// the server has answered with a success status.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    local_path: &Path,
) -> Result<(), FetchError> {
    let label = local_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| url.to_string());
    tracing::info!("Downloading {}...", label);

    let response = get_checked(client, url).await?;
    let pb = progress_bar(response.content_length().unwrap_or(0), &label);

    let mut file = fs::File::create(local_path)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    file.flush()?;

    pb.finish_and_clear();
    Ok(())
}

/// Read the whole body at `url` into memory.
pub async fn download_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    tracing::info!("Downloading {}...", url);
    let response = get_checked(client, url).await?;
    Ok(response.bytes().await?.to_vec())
}
