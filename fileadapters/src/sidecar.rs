use std::path::{Path, PathBuf};

use common::err::{CResult, ReError};
use common::row::TableInfo;
use serde::{Deserialize, Serialize};

/// Schema and index metadata persisted alongside a data file as
/// `<datafile>.meta.json`. When present, schema is adopted verbatim instead
/// of being re-inferred from the file's own shape, and `indexes` is
/// rebuilt into the hydrated MVCC table before the adapter starts serving
/// queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarMeta {
    pub schema: TableInfo,
    #[serde(default)]
    pub indexes: Vec<String>,
}

pub fn sidecar_path(data_path: &Path) -> PathBuf {
    let mut name = data_path.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

pub fn load(data_path: &Path) -> CResult<Option<SidecarMeta>> {
    let path = sidecar_path(data_path);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)?;
    let meta: SidecarMeta =
        serde_json::from_str(&text).map_err(|e| ReError::Error(format!("invalid sidecar metadata: {e}")))?;
    Ok(Some(meta))
}

pub fn save(data_path: &Path, meta: &SidecarMeta) -> CResult<()> {
    let path = sidecar_path(data_path);
    let text =
        serde_json::to_string_pretty(meta).map_err(|e| ReError::Error(format!("sidecar encode error: {e}")))?;
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use common::row::ColumnInfo;

    #[test]
    fn sidecar_path_appends_meta_json() {
        let path = sidecar_path(Path::new("/tmp/data.csv"));
        assert_eq!(path, PathBuf::from("/tmp/data.csv.meta.json"));
    }

    #[test]
    fn missing_sidecar_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("data.csv");
        assert!(load(&data_path).unwrap().is_none());
    }

    #[test]
    fn round_trips_schema_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("data.csv");
        let meta = SidecarMeta {
            schema: TableInfo::new("csv_data", vec![ColumnInfo::new("id", "bigint").primary_key()]),
            indexes: vec!["email".to_string()],
        };
        save(&data_path, &meta).unwrap();
        let loaded = load(&data_path).unwrap().unwrap();
        assert_eq!(loaded.schema.name, "csv_data");
        assert_eq!(loaded.indexes, vec!["email".to_string()]);
    }
}
