/*!
    Moving the finished file to its durable location.
*/

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::Result;

/**
    File name for a result created at `now`:
    `<prefix>_<YYYYmmdd_HHMMSS_mmm>.mp4`.
*/
pub fn output_name(prefix: &str, now: DateTime<Local>) -> String {
    format!("{prefix}_{}.mp4", now.format("%Y%m%d_%H%M%S_%3f"))
}

/**
    Copy `merged` into `output_dir` under a fresh timestamped name.

    The copy is written under a `.part` name and renamed once complete, so a
    partially written file is never visible under the final name. Existing
    files are never overwritten.
*/
pub fn publish(merged: &Path, output_dir: &Path, prefix: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let name = output_name(prefix, Local::now());
    let mut target = output_dir.join(&name);
    let mut attempt = 1;
    while target.exists() {
        let stem = name.trim_end_matches(".mp4");
        target = output_dir.join(format!("{stem}-{attempt}.mp4"));
        attempt += 1;
    }

    let partial = target.with_extension("mp4.part");
    let copied = std::fs::copy(merged, &partial).and_then(|_| std::fs::rename(&partial, &target));
    if let Err(e) = copied {
        let _ = std::fs::remove_file(&partial);
        return Err(e.into());
    }

    info!(path = %target.display(), "result published");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn name_embeds_timestamp_with_millis() {
        let now = Local
            .with_ymd_and_hms(2026, 3, 7, 9, 5, 2)
            .unwrap()
            + chrono::Duration::milliseconds(45);
        assert_eq!(
            output_name("reverse_video", now),
            "reverse_video_20260307_090502_045.mp4"
        );
    }

    #[test]
    fn publishes_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let merged = dir.path().join("merged.mp4");
        std::fs::write(&merged, b"movie").unwrap();
        let out = dir.path().join("out/nested");

        let first = publish(&merged, &out, "clip").unwrap();
        let second = publish(&merged, &out, "clip").unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"movie");
        assert_eq!(std::fs::read(&second).unwrap(), b"movie");
        assert!(first.file_name().unwrap().to_string_lossy().starts_with("clip_"));

        let leftovers = std::fs::read_dir(&out)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "part"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn missing_source_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        assert!(publish(&dir.path().join("nope.mp4"), &out, "clip").is_err());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }
}
