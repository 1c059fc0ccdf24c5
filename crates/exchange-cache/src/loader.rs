//! JSON file loaders for the two plan entries (`"apps"`, `"dsps"`).

use exchange_core::error::CacheError;
use exchange_core::model::{App, AppsSnapshot, Dsp, DspRoster};

fn read_source(path: &str) -> Result<String, CacheError> {
    std::fs::read_to_string(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            CacheError::SourceUnavailable(format!("{path}: {err}"))
        } else {
            CacheError::Io(format!("{path}: {err}"))
        }
    })
}

pub(crate) fn load_apps(path: &str) -> Result<AppsSnapshot, CacheError> {
    let raw = read_source(path)?;
    let apps: Vec<App> =
        serde_json::from_str(&raw).map_err(|err| CacheError::DecodeError(err.to_string()))?;
    Ok(AppsSnapshot::from_apps(apps))
}

pub(crate) fn load_dsps(path: &str) -> Result<DspRoster, CacheError> {
    let raw = read_source(path)?;
    let dsps: Vec<Dsp> =
        serde_json::from_str(&raw).map_err(|err| CacheError::DecodeError(err.to_string()))?;
    Ok(DspRoster::from_dsps(dsps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn load_apps_parses_a_json_array() {
        let file = write_tmp(
            r#"[{"id":1250,"name":"app-1250","publisher":{"id":1,"name":"publisher-1"}}]"#,
        );
        let snapshot = load_apps(file.path().to_str().unwrap()).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(1250).unwrap().name, "app-1250");
    }

    #[test]
    fn load_apps_missing_file_is_source_unavailable() {
        let err = load_apps("/nonexistent/path/apps.json").unwrap_err();
        assert!(matches!(err, CacheError::SourceUnavailable(_)));
    }

    #[test]
    fn load_apps_malformed_json_is_decode_error() {
        let file = write_tmp("not json");
        let err = load_apps(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, CacheError::DecodeError(_)));
    }

    #[test]
    fn load_dsps_preserves_order() {
        let file = write_tmp(
            r#"[{"id":1,"name":"a","endpoint":"https://a/bid"},{"id":2,"name":"b","endpoint":"https://b/bid","latency":"200ms"}]"#,
        );
        let roster = load_dsps(file.path().to_str().unwrap()).unwrap();
        assert_eq!(roster.len(), 2);
        let ids: Vec<i64> = roster.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(roster.iter().nth(1).unwrap().has_latency_directive());
    }
}
