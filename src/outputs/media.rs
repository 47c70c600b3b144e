//! Digest text and audio writers.
//!
//! Both writers create their target directory on demand and name files by
//! date, so one digest per region per day and nothing from earlier days is
//! touched.

use std::error::Error;
use tokio::fs;
use tracing::{info, instrument};

/// Write the normalized digest text to `{output_dir}/{date}.txt` and return
/// the path.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir, date = %date))]
pub async fn write_digest_text(
    output_dir: &str,
    date: &str,
    text: &str,
) -> Result<String, Box<dyn Error>> {
    fs::create_dir_all(output_dir).await?;
    let path = format!("{}/{}.txt", output_dir.trim_end_matches('/'), date);
    fs::write(&path, text).await?;
    info!(path = %path, bytes = text.len(), "Wrote digest text");
    Ok(path)
}

/// Write the synthesized audio to `{audio_dir}/{date}.mp3` and return the
/// path.
#[instrument(level = "info", skip_all, fields(audio_dir = %audio_dir, date = %date))]
pub async fn write_audio(
    audio_dir: &str,
    date: &str,
    bytes: &[u8],
) -> Result<String, Box<dyn Error>> {
    fs::create_dir_all(audio_dir).await?;
    let path = format!("{}/{}.mp3", audio_dir.trim_end_matches('/'), date);
    fs::write(&path, bytes).await?;
    info!(path = %path, bytes = bytes.len(), "Wrote digest audio");
    Ok(path)
}
