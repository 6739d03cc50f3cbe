use std::path::PathBuf;
use tokio::process::Command;
use waymark_core::milestone::{CommitScope, SnapshotOperation};
use waymark_milestone::{GitSnapshotExecutor, GitSnapshotResult, SnapshotRequest};

/// Takes snapshots by shelling out to the `git` binary in the workspace root.
pub struct GitCli {
    repo_root: PathBuf,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    /// Run `git <args>`; trimmed stdout on success, a message on failure.
    async fn git(&self, args: &[&str]) -> Result<String, String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .await
            .map_err(|e| format!("git not available: {e}"))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            ))
        }
    }

    /// Stage per the commit scope, commit, and return the new HEAD sha.
    async fn commit(&self, request: &SnapshotRequest) -> Result<String, String> {
        match request.form.commit_scope {
            CommitScope::Document => {
                self.git(&["add", "--", request.document_path.as_str()])
                    .await?
            }
            CommitScope::All => self.git(&["add", "-A"]).await?,
        };
        self.git(&[
            "commit",
            "--allow-empty",
            "-m",
            request.commit_message.as_str(),
        ])
        .await?;
        self.git(&["rev-parse", "HEAD"]).await
    }

    async fn snapshot(&self, request: &SnapshotRequest) -> Result<GitSnapshotResult, String> {
        let mut result = GitSnapshotResult {
            success: true,
            ..Default::default()
        };
        if request.operation() == SnapshotOperation::None {
            return Ok(result);
        }

        result.commit_sha = Some(self.commit(request).await?);
        result.commit_message = Some(request.commit_message.clone());

        match request.operation() {
            SnapshotOperation::CommitAndPush => {
                self.git(&["push"]).await?;
            }
            SnapshotOperation::Branch => {
                self.git(&["branch", request.branch_name.as_str()]).await?;
                result.branch_name = Some(request.branch_name.clone());
            }
            SnapshotOperation::Tag => {
                self.git(&["tag", request.tag_name.as_str()]).await?;
                result.tag_name = Some(request.tag_name.clone());
            }
            SnapshotOperation::Commit | SnapshotOperation::None => {}
        }
        Ok(result)
    }
}

#[async_trait::async_trait]
impl GitSnapshotExecutor for GitCli {
    async fn execute_snapshot(&self, request: &SnapshotRequest) -> GitSnapshotResult {
        match self.snapshot(request).await {
            Ok(result) => {
                tracing::info!(
                    document = %request.document_path,
                    sha = result.commit_sha.as_deref().unwrap_or("-"),
                    "snapshot taken"
                );
                result
            }
            Err(e) => {
                tracing::warn!(document = %request.document_path, error = %e, "snapshot failed");
                GitSnapshotResult::failed(e)
            }
        }
    }
}

/// Reports the rendered snapshot without running git (`--no-git`).
pub struct DryRunSnapshot;

#[async_trait::async_trait]
impl GitSnapshotExecutor for DryRunSnapshot {
    async fn execute_snapshot(&self, request: &SnapshotRequest) -> GitSnapshotResult {
        let mut result = GitSnapshotResult {
            success: true,
            commit_message: Some(request.commit_message.clone()),
            ..Default::default()
        };
        match request.operation() {
            SnapshotOperation::Branch => result.branch_name = Some(request.branch_name.clone()),
            SnapshotOperation::Tag => result.tag_name = Some(request.tag_name.clone()),
            _ => {}
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_core::milestone::SnapshotForm;
    use waymark_core::template::milestone_variables;

    fn request(operation: SnapshotOperation, document: &str) -> SnapshotRequest {
        let form = SnapshotForm {
            operation,
            ..Default::default()
        };
        let vars = milestone_variables(document, 0.9, "Polished", 0);
        SnapshotRequest::render(&form, document, &vars)
    }

    async fn init_repo(dir: &std::path::Path) -> Option<GitCli> {
        let git = GitCli::new(dir);
        git.git(&["init", "-q"]).await.ok()?;
        git.git(&["config", "user.email", "test@example.com"]).await.ok()?;
        git.git(&["config", "user.name", "Test"]).await.ok()?;
        git.git(&["config", "commit.gpgsign", "false"]).await.ok()?;
        Some(git)
    }

    #[tokio::test]
    async fn outside_a_repo_fails_as_data() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new(dir.path());
        let result = git
            .execute_snapshot(&request(SnapshotOperation::Commit, "a.md"))
            .await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn commit_and_tag() {
        let dir = tempfile::tempdir().unwrap();
        // Skip where git is not installed.
        let Some(git) = init_repo(dir.path()).await else {
            return;
        };
        std::fs::write(dir.path().join("a.md"), "# A\n").unwrap();

        let result = git
            .execute_snapshot(&request(SnapshotOperation::Tag, "a.md"))
            .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.commit_sha.as_deref().map(str::len), Some(40));
        assert_eq!(result.tag_name.as_deref(), Some("a-Polished-1970-01-01"));

        let tags = git.git(&["tag", "--list"]).await.unwrap();
        assert_eq!(tags, "a-Polished-1970-01-01");
        let log = git.git(&["log", "-1", "--format=%s"]).await.unwrap();
        assert_eq!(log, "milestone: Polished reached in a");
    }

    #[tokio::test]
    async fn no_operation_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new(dir.path());
        let result = git
            .execute_snapshot(&request(SnapshotOperation::None, "a.md"))
            .await;
        assert!(result.success);
        assert!(result.commit_sha.is_none());
    }

    #[tokio::test]
    async fn dry_run_reports_names() {
        let result = DryRunSnapshot
            .execute_snapshot(&request(SnapshotOperation::Branch, "notes/b.md"))
            .await;
        assert!(result.success);
        assert_eq!(result.branch_name.as_deref(), Some("milestone/b-1970-01-01"));
        assert!(result.commit_sha.is_none());
    }
}
