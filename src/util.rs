use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

pub fn utc_string(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

/// Parses an ISO-8601 instant; values without an offset are read as UTC.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn sanitize_file_component(value: &str) -> String {
    value
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() || character == '-' || character == '_' {
                character
            } else {
                '_'
            }
        })
        .collect::<String>()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

fn atomic_tmp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("artifact");
    path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()))
}

/// Writes `data` next to `path` and renames it over the target so readers never
/// observe a partial file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let tmp = atomic_tmp_path(path);
    {
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to create temp file: {}", tmp.display()))?;
        file.write_all(data)
            .with_context(|| format!("failed to write temp file: {}", tmp.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to flush temp file: {}", tmp.display()))?;
    }

    fs::rename(&tmp, path).with_context(|| {
        format!(
            "failed to replace {} -> {}",
            tmp.display(),
            path.display()
        )
    })
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;
    data.push(b'\n');
    write_atomic(path, &data)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{parse_instant, sanitize_file_component, utc_compact_string, write_json_pretty};

    #[test]
    fn parse_instant_accepts_offsets_and_naive_utc() {
        let expected = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_instant("2026-05-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_instant("2026-05-01T14:00:00+02:00"), Some(expected));
        assert_eq!(parse_instant("2026-05-01T12:00:00"), Some(expected));
        assert_eq!(parse_instant("next tuesday"), None);
        assert_eq!(parse_instant(""), None);
    }

    #[test]
    fn compact_run_ids_are_filesystem_safe() {
        let ts = Utc.with_ymd_and_hms(2026, 5, 1, 12, 3, 4).unwrap();
        let compact = utc_compact_string(ts);
        assert_eq!(compact, "20260501T120304000Z");
        assert_eq!(sanitize_file_component(&compact), compact);
        assert_eq!(sanitize_file_component("2026-05-01T12:03:04.5Z"), "2026-05-01T12_03_04_5Z");
    }

    #[test]
    fn write_json_pretty_replaces_target_and_ends_with_newline() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("nested").join("doc.json");

        write_json_pretty(&path, &serde_json::json!({"v": 1})).expect("first write");
        write_json_pretty(&path, &serde_json::json!({"v": 2})).expect("second write");

        let raw = std::fs::read_to_string(&path).expect("file should exist");
        assert!(raw.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(value["v"], 2);

        let leftovers = std::fs::read_dir(path.parent().unwrap())
            .expect("dir should list")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
