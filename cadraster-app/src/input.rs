use std::fs;
use std::path::{Path, PathBuf};

use cadraster_core::document::Document;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("读取文档 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析文档 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 读取 JSON 格式的文档。未设置资源目录时，使用文档所在目录解析图像相对路径。
pub fn load_document(path: impl AsRef<Path>) -> Result<Document, InputError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut document: Document = serde_json::from_str(&content).map_err(|source| InputError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if document.base_dir().is_none() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            document.set_base_dir(parent);
        }
    }
    info!(path = %path.display(), entities = document.entity_count(), "文档加载完成");
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadraster_core::geometry::Point2;

    #[test]
    fn document_round_trips_through_json_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut document = Document::new();
        document.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 5.0), "WALL");
        let path = dir.path().join("plan.json");
        fs::write(&path, serde_json::to_string(&document).expect("serialize")).expect("write");

        let loaded = load_document(&path).expect("load");
        assert_eq!(loaded.entity_count(), 1);
        assert!(loaded.layer("WALL").is_some());
        assert_eq!(loaded.base_dir(), Some(&dir.path().to_path_buf()));
    }

    #[test]
    fn invalid_json_reports_parse_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").expect("write");
        assert!(matches!(load_document(&path), Err(InputError::Parse { .. })));
    }
}
