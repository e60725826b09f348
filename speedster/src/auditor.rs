//! Shell-out to the external page-performance auditor.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;

use crate::config::AuditorConfig;

#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    #[error("failed to launch auditor command `{command}`: {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },

    #[error("auditor exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("could not read auditor artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The two report payloads one audit produces.
#[derive(Debug, Default)]
pub struct AuditReports {
    pub json: String,
    pub html: String,
}

impl AuditReports {
    pub fn empty() -> Self {
        AuditReports::default()
    }
}

/// Runs the external auditor against a target URL and captures the report
/// files it writes to disk.
pub struct Auditor {
    command: String,
    output_dir: PathBuf,
}

impl Auditor {
    pub fn new(config: &AuditorConfig) -> Self {
        Auditor {
            command: config.command.clone(),
            output_dir: config.output_dir.clone(),
        }
    }

    /// Runs one audit to completion and reads both reports into memory.
    ///
    /// `name` must be unique per invocation (the caller passes the scan id),
    /// so overlapping audits never share an output path. Both report files
    /// are removed from disk before returning, whether or not the reads
    /// succeeded. No timeout is enforced here; the child runs as long as it
    /// needs to.
    pub async fn audit(&self, url: &str, name: &str) -> Result<AuditReports, AuditError> {
        let prefix = self.output_dir.join(name);
        tracing::info!(command = %self.command, url, prefix = %prefix.display(), "running auditor");

        let output = Command::new(&self.command)
            .arg("--chrome-flags=--headless")
            .arg(url)
            .arg("--output=json")
            .arg("--output=html")
            .arg(format!("--output-path={}", prefix.display()))
            .output()
            .await
            .map_err(|source| AuditError::Launch {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AuditError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let json_path = artifact_path(&prefix, "json");
        let html_path = artifact_path(&prefix, "html");
        let _cleanup = ArtifactCleanup {
            paths: [json_path.clone(), html_path.clone()],
        };

        let json = read_artifact(&json_path).await?;
        let html = read_artifact(&html_path).await?;

        Ok(AuditReports { json, html })
    }
}

fn artifact_path(prefix: &Path, kind: &str) -> PathBuf {
    PathBuf::from(format!("{}.report.{kind}", prefix.display()))
}

async fn read_artifact(path: &Path) -> Result<String, AuditError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AuditError::Artifact {
            path: path.to_path_buf(),
            source,
        })
}

/// Removes the report files once the audit result has been captured,
/// including on the early-return paths where only one of them was read.
struct ArtifactCleanup {
    paths: [PathBuf; 2],
}

impl Drop for ArtifactCleanup {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(err) = std::fs::remove_file(path) {
                tracing::debug!(path = %path.display(), %err, "could not remove auditor artifact");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{STUB_AUDITOR_OK, write_stub_auditor};

    #[tokio::test]
    async fn audit_reads_and_removes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let auditor = write_stub_auditor(dir.path(), STUB_AUDITOR_OK);

        let reports = auditor
            .audit("https://example.com", "abc123")
            .await
            .expect("audit succeeds");

        assert_eq!(reports.json, r#"{"performance": 0.99}"#);
        assert_eq!(reports.html, "<html>report</html>");
        assert!(!dir.path().join("abc123.report.json").exists());
        assert!(!dir.path().join("abc123.report.html").exists());
    }

    #[tokio::test]
    async fn nonzero_exit_carries_status_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let auditor = write_stub_auditor(dir.path(), "#!/bin/sh\necho boom >&2\nexit 3\n");

        let err = auditor
            .audit("https://example.com", "abc123")
            .await
            .expect_err("audit fails");

        match err {
            AuditError::Failed { status, stderr } => {
                assert_eq!(status.code(), Some(3));
                assert!(stderr.contains("boom"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_artifact_is_reported_and_partial_state_removed() {
        let dir = tempfile::tempdir().unwrap();
        // Writes the JSON report only; the HTML read must fail.
        let script = r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    --output-path=*) prefix="${arg#--output-path=}" ;;
  esac
done
printf 'partial' > "$prefix.report.json"
"#;
        let auditor = write_stub_auditor(dir.path(), script);

        let err = auditor
            .audit("https://example.com", "abc123")
            .await
            .expect_err("audit fails");

        match err {
            AuditError::Artifact { path, .. } => {
                assert!(path.to_string_lossy().ends_with("abc123.report.html"));
            }
            other => panic!("expected Artifact, got {other:?}"),
        }
        // The half-written state is cleaned up, not kept for a retry.
        assert!(!dir.path().join("abc123.report.json").exists());
    }

    #[tokio::test]
    async fn launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let auditor = Auditor {
            command: dir.path().join("no-such-binary").display().to_string(),
            output_dir: dir.path().to_path_buf(),
        };

        let err = auditor
            .audit("https://example.com", "abc123")
            .await
            .expect_err("launch fails");
        assert!(matches!(err, AuditError::Launch { .. }));
    }
}
