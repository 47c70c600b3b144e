//! Artifact manifest output.
//!
//! Each run serializes its [`DigestArtifact`] next to the text file it
//! describes, plus a `latest.json` pointer that clients read to find the
//! newest digest without listing the directory.

use crate::models::DigestArtifact;
use std::error::Error;
use tokio::fs;
use tracing::{info, instrument};

/// Write the dated manifest and refresh `latest.json`.
///
/// Creates the output directory if needed. The dated file is named after
/// the artifact's local date (the stem of its text path); `latest.json` is
/// overwritten on every run.
#[instrument(level = "info", skip_all, fields(region = %artifact.region, output_dir = %output_dir))]
pub async fn write_artifact(
    artifact: &DigestArtifact,
    output_dir: &str,
    date: &str,
) -> Result<String, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(artifact)?;

    fs::create_dir_all(output_dir).await?;

    let manifest_path = format!("{}/{}.json", output_dir.trim_end_matches('/'), date);
    fs::write(&manifest_path, &json).await?;
    info!(path = %manifest_path, "Wrote artifact manifest");

    let latest_path = format!("{}/latest.json", output_dir.trim_end_matches('/'));
    fs::write(&latest_path, &json).await?;
    info!(path = %latest_path, "Updated latest pointer");

    Ok(manifest_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> DigestArtifact {
        DigestArtifact {
            region: "en_GB".to_string(),
            generated_at: "2026-08-04T06:30:00Z".to_string(),
            text_path: "docs/en_GB/2026-08-04.txt".to_string(),
            audio_path: None,
            word_count: 280,
            duration_estimate_secs: 140,
        }
    }

    #[tokio::test]
    async fn test_writes_dated_manifest_and_latest() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();

        let path = write_artifact(&artifact(), dir, "2026-08-04").await.unwrap();
        assert!(path.ends_with("2026-08-04.json"));

        let dated = fs::read_to_string(&path).await.unwrap();
        let latest = fs::read_to_string(format!("{dir}/latest.json")).await.unwrap();
        assert_eq!(dated, latest);

        let parsed: DigestArtifact = serde_json::from_str(&latest).unwrap();
        assert_eq!(parsed.region, "en_GB");
        assert_eq!(parsed.word_count, 280);
    }

    #[tokio::test]
    async fn test_latest_is_overwritten_by_next_run() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();

        write_artifact(&artifact(), dir, "2026-08-03").await.unwrap();
        let mut newer = artifact();
        newer.generated_at = "2026-08-04T06:30:00Z".to_string();
        newer.word_count = 300;
        write_artifact(&newer, dir, "2026-08-04").await.unwrap();

        // Both dated manifests survive; latest points at the newer one.
        assert!(fs::try_exists(format!("{dir}/2026-08-03.json")).await.unwrap());
        let latest: DigestArtifact =
            serde_json::from_str(&fs::read_to_string(format!("{dir}/latest.json")).await.unwrap())
                .unwrap();
        assert_eq!(latest.word_count, 300);
    }
}
