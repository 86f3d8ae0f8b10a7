use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use sea_orm::{ConnectionTrait, EntityTrait, Set};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use common::entity::source_file;
use common::storage::ObjectStore;

use crate::config::FetcherConfig;
use crate::error::AppError;

/// Clones a repository and ingests its Python sources into blob storage and
/// the database.
pub struct SourceFetcher {
    config: FetcherConfig,
}

impl SourceFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    /// Reject URLs whose scheme is not in the allow-list.
    ///
    /// A reference that does not match the allow-list is an unsupported
    /// repository location, the same failure class as an unreachable one.
    /// The URL is later passed to a git subprocess, so this is the single
    /// gate against file:// and ssh-style remotes.
    pub fn validate_repo_url(&self, url: &str) -> Result<(), AppError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(AppError::SourceUnavailable(
                "repository URL is required".into(),
            ));
        }

        let scheme = trimmed
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase());

        match scheme {
            Some(s) if self.config.allowed_schemes.iter().any(|a| *a == s) => Ok(()),
            _ => Err(AppError::SourceUnavailable(format!(
                "repository URL must use one of: {}",
                self.config.allowed_schemes.join(", ")
            ))),
        }
    }

    /// Shallow-clone the repository into a fresh temporary directory.
    pub async fn fetch(&self, repo_url: &str) -> Result<tempfile::TempDir, AppError> {
        self.validate_repo_url(repo_url)?;

        let dir = tempfile::tempdir()
            .map_err(|e| AppError::Internal(format!("failed to create clone dir: {e}")))?;

        let child = Command::new(&self.config.git_bin)
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg(repo_url)
            .arg(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Internal(format!("failed to spawn git: {e}")))?;

        let timeout = Duration::from_secs(self.config.clone_timeout_secs);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => {
                result.map_err(|e| AppError::Internal(format!("git clone failed: {e}")))?
            }
            Err(_) => {
                return Err(AppError::SourceUnavailable(format!(
                    "clone timed out after {}s",
                    self.config.clone_timeout_secs
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::SourceUnavailable(format!(
                "git clone exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        info!(repo_url, "Cloned repository");
        Ok(dir)
    }
}

/// Walk `root` for Python files, upload each to blob storage under
/// `{project_id}/{relative_path}` and insert a `source_file` row.
///
/// Returns the number of files ingested. Fails with [`AppError::EmptySource`]
/// when the tree holds no Python files at all; any other failure leaves the
/// caller responsible for rolling back partial state.
pub async fn ingest_directory<C: ConnectionTrait>(
    db: &C,
    store: &dyn ObjectStore,
    project_id: Uuid,
    root: &Path,
) -> Result<i32, AppError> {
    let mut models = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("py") {
            continue;
        }
        // The clone's own metadata is never source code.
        if entry
            .path()
            .strip_prefix(root)
            .ok()
            .is_some_and(|p| p.starts_with(".git"))
        {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| AppError::Internal(format!("path outside clone root: {e}")))?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let content = tokio::fs::read(entry.path())
            .await
            .map_err(|e| AppError::FetchFailed(format!("failed to read {relative}: {e}")))?;

        let loc = String::from_utf8_lossy(&content)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count() as i32;

        let key = format!("{project_id}/{relative}");
        store
            .put(&key, &content)
            .await
            .map_err(|e| AppError::FetchFailed(format!("failed to store {relative}: {e}")))?;

        debug!(key, loc, "Stored source file");

        models.push(source_file::ActiveModel {
            id: Set(Uuid::new_v4()),
            file_path: Set(relative),
            loc: Set(loc),
            project_id: Set(project_id),
            created_at: Set(Utc::now()),
        });
    }

    if models.is_empty() {
        return Err(AppError::EmptySource);
    }

    let file_count = models.len() as i32;
    source_file::Entity::insert_many(models).exec(db).await?;

    info!(%project_id, file_count, "Ingested source files");
    Ok(file_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;
    use common::entity::project;
    use common::storage::filesystem::FilesystemObjectStore;
    use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, QueryFilter};

    fn fetcher() -> SourceFetcher {
        SourceFetcher::new(FetcherConfig::default())
    }

    #[test]
    fn url_validation_accepts_https() {
        assert!(fetcher().validate_repo_url("https://example.com/a/b.git").is_ok());
        assert!(fetcher().validate_repo_url("HTTPS://example.com/a/b").is_ok());
    }

    #[test]
    fn url_validation_rejects_other_schemes_as_unavailable() {
        let f = fetcher();
        assert!(matches!(
            f.validate_repo_url("file:///etc"),
            Err(AppError::SourceUnavailable(_))
        ));
        assert!(matches!(
            f.validate_repo_url("git@github.com:a/b.git"),
            Err(AppError::SourceUnavailable(_))
        ));
        assert!(matches!(
            f.validate_repo_url("   "),
            Err(AppError::SourceUnavailable(_))
        ));
    }

    async fn temp_store(dir: &tempfile::TempDir) -> FilesystemObjectStore {
        FilesystemObjectStore::new(dir.path().join("blobs"), 10 * 1024 * 1024)
            .await
            .unwrap()
    }

    async fn insert_project(db: &DatabaseConnection) -> Uuid {
        let id = Uuid::new_v4();
        project::ActiveModel {
            id: Set(id),
            name: Set(format!("ingest-{id}")),
            repo_url: Set("https://example.com/repo.git".into()),
            file_count: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn ingest_uploads_and_records_python_files() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir).await;

        let repo = dir.path().join("repo");
        std::fs::create_dir_all(repo.join("pkg")).unwrap();
        std::fs::write(repo.join("main.py"), "import os\n\nprint(1)\n").unwrap();
        std::fs::write(repo.join("pkg/util.py"), "x = 1\n").unwrap();
        std::fs::write(repo.join("README.md"), "not python\n").unwrap();

        let project_id = insert_project(&db).await;
        let count = ingest_directory(&db, &store, project_id, &repo)
            .await
            .unwrap();
        assert_eq!(count, 2);

        let rows = source_file::Entity::find()
            .filter(source_file::Column::ProjectId.eq(project_id))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let main = rows.iter().find(|r| r.file_path == "main.py").unwrap();
        // Blank line excluded.
        assert_eq!(main.loc, 2);

        let util = rows.iter().find(|r| r.file_path == "pkg/util.py").unwrap();
        assert_eq!(util.loc, 1);

        let blob = store
            .get(&format!("{project_id}/pkg/util.py"))
            .await
            .unwrap();
        assert_eq!(blob, b"x = 1\n");
    }

    #[tokio::test]
    async fn ingest_skips_git_metadata() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir).await;

        let repo = dir.path().join("repo");
        std::fs::create_dir_all(repo.join(".git/hooks")).unwrap();
        std::fs::write(repo.join(".git/hooks/gen.py"), "pass\n").unwrap();
        std::fs::write(repo.join("app.py"), "pass\n").unwrap();

        let project_id = insert_project(&db).await;
        let count = ingest_directory(&db, &store, project_id, &repo)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn ingest_empty_tree_fails() {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir).await;

        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::write(repo.join("notes.txt"), "nothing here\n").unwrap();

        let result = ingest_directory(&db, &store, Uuid::new_v4(), &repo).await;
        assert!(matches!(result, Err(AppError::EmptySource)));
    }
}
