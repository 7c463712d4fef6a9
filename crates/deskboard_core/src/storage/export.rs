use crate::error::AppError;
use crate::model::ExportArtifact;
use std::path::{Path, PathBuf};

pub fn render_export(artifact: &ExportArtifact) -> Result<String, AppError> {
    serde_json::to_string_pretty(&artifact.records)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// Write `artifact` into `dir` under its own file name and return the path.
pub fn write_export(dir: &Path, artifact: &ExportArtifact) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(dir).map_err(|err| AppError::io(err.to_string()))?;

    let path = dir.join(&artifact.file_name);
    let content = render_export(artifact)?;
    std::fs::write(&path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, permissions)
            .map_err(|err| AppError::io(err.to_string()))?;
    }

    tracing::debug!(path = %path.display(), records = artifact.records.len(), "export written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::{render_export, write_export};
    use crate::model::{ExportArtifact, ExportRecord};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("deskboard-{nanos}-{name}"))
    }

    fn artifact() -> ExportArtifact {
        ExportArtifact {
            file_name: "ticket_analysis_20240302_080910.json".to_string(),
            mime_type: "application/json",
            records: vec![ExportRecord {
                timestamp: "2024-03-01 10:00:00".to_string(),
                ticket_type: "bug".to_string(),
                summary: "Login crash".to_string(),
                original_ticket: "App crashes on login".to_string(),
            }],
        }
    }

    #[test]
    fn render_export_is_json_array_with_type_key() {
        let rendered = render_export(&artifact()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        let records = value.as_array().expect("array");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["type"], "bug");
        assert_eq!(records[0]["timestamp"], "2024-03-01 10:00:00");
        assert_eq!(records[0]["summary"], "Login crash");
        assert_eq!(records[0]["original_ticket"], "App crashes on login");
    }

    #[test]
    fn write_export_creates_directory_and_file() {
        let dir = temp_dir("exports");
        let path = write_export(&dir, &artifact()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        fs::remove_dir_all(&dir).ok();

        assert!(path.ends_with("ticket_analysis_20240302_080910.json"));
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(1));
    }
}
