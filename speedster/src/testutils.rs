use crate::auditor::Auditor;
use crate::config::AuditorConfig;
use crate::store::{ScanStore, StoreError, parse_id};
use crate::types::Scan;
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// In-memory stand-in for the Mongo-backed store, mirroring its id parsing
/// and its delete trichotomy.
#[derive(Clone, Default)]
pub struct MemoryScanStore {
    scans: Arc<Mutex<Vec<Scan>>>,
}

#[async_trait]
impl ScanStore for MemoryScanStore {
    async fn list(&self) -> Result<Vec<Scan>, StoreError> {
        Ok(self.scans.lock().unwrap().clone())
    }

    async fn insert(&self, scan: &Scan) -> Result<(), StoreError> {
        let mut scans = self.scans.lock().unwrap();
        if scans.iter().any(|existing| existing.id == scan.id) {
            return Err(StoreError::DuplicateId(scan.id.to_hex()));
        }
        scans.push(scan.clone());
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Scan, StoreError> {
        let oid = parse_id(id)?;
        self.scans
            .lock()
            .unwrap()
            .iter()
            .find(|scan| scan.id == oid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let oid = parse_id(id)?;
        let mut scans = self.scans.lock().unwrap();
        let before = scans.len();
        scans.retain(|scan| scan.id != oid);

        match before - scans.len() {
            1 => Ok(()),
            0 => Err(StoreError::NotFound(id.to_string())),
            n => Err(StoreError::MultipleDeleted(n as u64)),
        }
    }
}

/// Stub auditor script that honors the real argv contract: it pulls the
/// prefix out of `--output-path=` and fabricates both report files.
pub const STUB_AUDITOR_OK: &str = r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    --output-path=*) prefix="${arg#--output-path=}" ;;
  esac
done
printf '{"performance": 0.99}' > "$prefix.report.json"
printf '<html>report</html>' > "$prefix.report.html"
"#;

/// Writes `script` as an executable into `dir` and returns an Auditor that
/// runs it with `dir` as the artifact directory.
pub fn write_stub_auditor(dir: &Path, script: &str) -> Auditor {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("stub-auditor.sh");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

    Auditor::new(&AuditorConfig {
        command: path.display().to_string(),
        output_dir: dir.to_path_buf(),
    })
}
