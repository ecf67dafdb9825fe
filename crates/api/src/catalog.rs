//! Schedule seeding for the read-only catalog.

use std::path::{Path, PathBuf};

use domain::Schedule;
use thiserror::Error;

/// Errors loading a schedules file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read schedules file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid schedules file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Parses a JSON array of schedules.
pub fn parse_schedules(path: &Path, json: &str) -> Result<Vec<Schedule>, CatalogError> {
    serde_json::from_str(json).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads schedules from a JSON file.
pub async fn load_schedules(path: &Path) -> Result<Vec<Schedule>, CatalogError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_schedules(path, &json)
}

#[cfg(test)]
mod tests {
    use domain::SeatLayout;

    use super::*;

    #[test]
    fn test_parse_schedules() {
        let json = r#"[
            {
                "schedule_id": "6f1c1c1e-8d9a-4f5e-9a57-0f3b2f0c6a11",
                "capacity": 14,
                "price_per_seat": 500,
                "departure_time": "2026-10-18T06:30:00Z"
            },
            {
                "schedule_id": "0d8e4a52-3b7f-4c1d-8e2a-5b9c7d6e1f20",
                "capacity": 25,
                "price_per_seat": 450,
                "departure_time": "2026-10-18T07:00:00Z"
            }
        ]"#;
        let schedules = parse_schedules(Path::new("schedules.json"), json).unwrap();
        assert_eq!(schedules.len(), 2);
        assert_eq!(schedules[0].layout, SeatLayout::Fourteen);
        assert_eq!(schedules[1].capacity(), 25);
    }

    #[test]
    fn test_parse_rejects_unknown_layout() {
        let json = r#"[{
            "schedule_id": "6f1c1c1e-8d9a-4f5e-9a57-0f3b2f0c6a11",
            "capacity": 12,
            "price_per_seat": 500,
            "departure_time": "2026-10-18T06:30:00Z"
        }]"#;
        let err = parse_schedules(Path::new("schedules.json"), json).unwrap_err();
        assert!(matches!(err, CatalogError::Parse { .. }));
        assert!(err.to_string().contains("schedules.json"));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load_schedules(Path::new("/nonexistent/schedules.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
