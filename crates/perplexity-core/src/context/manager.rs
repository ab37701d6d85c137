//! Workspace analysis served through the context cache

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::cache::ContextCache;
use super::git::{git_context, GitContext};
use super::rate_limiter::RateLimiter;
use super::scan::{extension_of, find_files, language_for_extension};
use crate::logging::Logger;
use crate::types::Workspace;

pub const WORKSPACE_CONTEXT_KEY: &str = "workspaceContext";

const LANGUAGE_SCAN_LIMIT: usize = 1000;
const FILE_TYPE_SCAN_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("No workspace folder is open.")]
    NoWorkspace,

    #[error("Failed to analyze workspace: {0}")]
    Analysis(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ContextResult<T> = Result<T, ContextError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyInfo {
    pub name: String,
    pub version: String,
    /// Manifest file the entry came from
    pub source: String,
    pub dev: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceContext {
    pub project_name: Option<String>,
    pub project_version: Option<String>,
    pub project_type: String,
    pub languages: Vec<String>,
    /// Extensions seen among the first files of the workspace
    pub file_types: Vec<String>,
    pub frameworks: Vec<String>,
    pub git_info: Option<GitContext>,
    pub dependencies: Vec<DependencyInfo>,
}

impl WorkspaceContext {
    /// Plain-text summary handed to the model
    pub fn summary(&self) -> String {
        let names = |dev: bool| {
            self.dependencies
                .iter()
                .filter(|d| d.dev == dev)
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut out = String::from("Workspace Analysis:\n");
        if self.dependencies.is_empty() && self.project_name.is_none() {
            out.push_str("- No package.json or Cargo.toml found.\n");
        } else {
            out.push_str(&format!("- Project Name: {}\n", self.project_name.as_deref().unwrap_or("N/A")));
            out.push_str(&format!("- Version: {}\n", self.project_version.as_deref().unwrap_or("N/A")));
            out.push_str(&format!("- Dependencies: {}\n", names(false)));
            out.push_str(&format!("- DevDependencies: {}\n", names(true)));
        }
        out.push_str(&format!("- Project Type: {}\n", self.project_type));
        if !self.frameworks.is_empty() {
            out.push_str(&format!("- Frameworks: {}\n", self.frameworks.join(", ")));
        }
        out.push_str(&format!("- Languages: {}\n", self.languages.join(", ")));
        out.push_str(&format!("- Detected File Types: {}\n", self.file_types.join(", ")));
        if let Some(git) = &self.git_info {
            out.push_str(&format!("- Git: branch {} ({})\n", git.branch, git.status));
        }
        out
    }
}

#[derive(Debug, Default)]
struct Manifest {
    name: Option<String>,
    version: Option<String>,
    dependencies: Vec<DependencyInfo>,
    is_cargo: bool,
}

/// Builds and caches the workspace analysis
///
/// Full re-analysis is rate limited. Once the limiter says no, callers get
/// the last cached analysis (or `None`) instead of an error.
pub struct ContextManager {
    cache: Arc<ContextCache>,
    limiter: RateLimiter,
    logger: Arc<dyn Logger>,
}

impl ContextManager {
    pub fn new(cache: Arc<ContextCache>, logger: Arc<dyn Logger>) -> Self {
        Self::with_rate_limiter(cache, RateLimiter::default(), logger)
    }

    pub fn with_rate_limiter(cache: Arc<ContextCache>, limiter: RateLimiter, logger: Arc<dyn Logger>) -> Self {
        Self { cache, limiter, logger }
    }

    pub fn cache(&self) -> &Arc<ContextCache> {
        &self.cache
    }

    /// Analyze the workspace, serving from cache when possible
    pub async fn analyze_workspace(&self, workspace: &Workspace) -> ContextResult<Option<WorkspaceContext>> {
        if !self.limiter.try_acquire() {
            self.logger.warn("[ContextManager] Analysis rate limit exceeded, serving cached context");
            return Ok(self.cache.get_as(WORKSPACE_CONTEXT_KEY));
        }
        if let Some(cached) = self.cache.get_as::<WorkspaceContext>(WORKSPACE_CONTEXT_KEY) {
            self.logger.debug("[ContextManager] Workspace context cache hit");
            return Ok(Some(cached));
        }

        let root = workspace.root().ok_or(ContextError::NoWorkspace)?.to_path_buf();
        self.logger.info(&format!("[ContextManager] Analyzing workspace {}", root.display()));

        let manifest = read_manifests(&root).await?;
        let scan_root = root.clone();
        let files = tokio::task::spawn_blocking(move || find_files(&scan_root, "**/*", LANGUAGE_SCAN_LIMIT))
            .await
            .map_err(|e| ContextError::Analysis(e.to_string()))?
            .map_err(|e| ContextError::Analysis(e.to_string()))?;
        let git_info = git_context(&root).await;

        let context = WorkspaceContext {
            project_type: determine_project_type(&manifest),
            frameworks: detect_frameworks(&manifest.dependencies),
            languages: distinct(files.iter().filter_map(|f| {
                extension_of(f).and_then(|e| language_for_extension(&e)).map(str::to_string)
            })),
            file_types: distinct(files.iter().take(FILE_TYPE_SCAN_LIMIT).filter_map(|f| extension_of(f))),
            project_name: manifest.name,
            project_version: manifest.version,
            git_info,
            dependencies: manifest.dependencies,
        };

        if !self.cache.set_as(WORKSPACE_CONTEXT_KEY, &context) {
            self.logger.warn("[ContextManager] Workspace context too large to cache");
        }
        Ok(Some(context))
    }

    /// Drop the cached workspace analysis so the next call recomputes it
    pub fn invalidate(&self) {
        self.cache.remove(WORKSPACE_CONTEXT_KEY);
    }
}

impl std::fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextManager")
            .field("cache", &self.cache)
            .field("limiter", &self.limiter)
            .finish()
    }
}

fn distinct(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items.filter(|i| seen.insert(i.clone())).collect()
}

async fn read_manifests(root: &Path) -> ContextResult<Manifest> {
    let mut manifest = Manifest::default();

    let package_json = root.join("package.json");
    if let Some(content) = read_optional(&package_json).await? {
        // A broken package.json is reported as "no manifest" rather than failing analysis
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) {
            parse_package_json(&value, &mut manifest);
        }
    }

    let cargo_toml = root.join("Cargo.toml");
    if let Some(content) = read_optional(&cargo_toml).await? {
        if let Ok(value) = content.parse::<toml::Table>() {
            parse_cargo_toml(&value, &mut manifest);
        }
    }
    Ok(manifest)
}

async fn read_optional(path: &Path) -> ContextResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ContextError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse_package_json(value: &serde_json::Value, manifest: &mut Manifest) {
    manifest.name = value.get("name").and_then(|v| v.as_str()).map(str::to_string);
    manifest.version = value.get("version").and_then(|v| v.as_str()).map(str::to_string);
    for (field, dev) in [("dependencies", false), ("devDependencies", true)] {
        if let Some(deps) = value.get(field).and_then(|v| v.as_object()) {
            manifest.dependencies.extend(deps.iter().map(|(name, version)| DependencyInfo {
                name: name.clone(),
                version: version.as_str().unwrap_or("*").to_string(),
                source: "package.json".to_string(),
                dev,
            }));
        }
    }
}

fn parse_cargo_toml(value: &toml::Table, manifest: &mut Manifest) {
    manifest.is_cargo = true;
    if let Some(package) = value.get("package").and_then(|p| p.as_table()) {
        if manifest.name.is_none() {
            manifest.name = package.get("name").and_then(|v| v.as_str()).map(str::to_string);
        }
        if manifest.version.is_none() {
            manifest.version = package.get("version").and_then(|v| v.as_str()).map(str::to_string);
        }
    }

    let workspace_deps = value
        .get("workspace")
        .and_then(|w| w.get("dependencies"))
        .and_then(|d| d.as_table());
    let sections = [
        (value.get("dependencies").and_then(|d| d.as_table()), false),
        (workspace_deps, false),
        (value.get("dev-dependencies").and_then(|d| d.as_table()), true),
    ];
    for (table, dev) in sections {
        let Some(table) = table else { continue };
        for (name, spec) in table {
            let version = match spec {
                toml::Value::String(v) => v.clone(),
                toml::Value::Table(t) => t
                    .get("version")
                    .and_then(|v| v.as_str())
                    .unwrap_or("*")
                    .to_string(),
                _ => "*".to_string(),
            };
            manifest.dependencies.push(DependencyInfo {
                name: name.clone(),
                version,
                source: "Cargo.toml".to_string(),
                dev,
            });
        }
    }
}

fn detect_frameworks(deps: &[DependencyInfo]) -> Vec<String> {
    const KNOWN: &[(&str, &str)] = &[
        ("react", "React"),
        ("express", "Express"),
        ("vue", "Vue"),
        ("angular", "Angular"),
        ("@angular/core", "Angular"),
        ("axum", "Axum"),
        ("actix-web", "Actix Web"),
        ("rocket", "Rocket"),
        ("tokio", "Tokio"),
    ];
    distinct(
        KNOWN
            .iter()
            .filter(|(dep, _)| deps.iter().any(|d| d.name == *dep))
            .map(|(_, name)| name.to_string()),
    )
}

fn determine_project_type(manifest: &Manifest) -> String {
    let has = |name: &str| manifest.dependencies.iter().any(|d| d.name == name);
    let kind = if has("react") {
        "React"
    } else if has("express") {
        "Node.js"
    } else if has("vue") {
        "Vue"
    } else if has("angular") || has("@angular/core") {
        "Angular"
    } else if manifest.is_cargo {
        "Rust"
    } else {
        "Unknown"
    };
    kind.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use std::fs;
    use std::time::Duration;

    fn manager(cache: Arc<ContextCache>) -> ContextManager {
        ContextManager::new(cache, Arc::new(NoOpLogger::new()))
    }

    fn node_workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"name":"chat-ui","version":"1.2.0","dependencies":{"react":"^18.0.0","express":"^4"},"devDependencies":{"jest":"^29"}}"#,
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/App.tsx"), "export {}").unwrap();
        fs::write(dir.path().join("src/server.js"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_analyze_node_workspace() {
        let dir = node_workspace();
        let cache = Arc::new(ContextCache::default());
        let ctx = manager(cache.clone())
            .analyze_workspace(&Workspace::new(dir.path()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ctx.project_name.as_deref(), Some("chat-ui"));
        assert_eq!(ctx.project_type, "React");
        assert_eq!(ctx.frameworks, vec!["React", "Express"]);
        assert!(ctx.languages.contains(&"typescriptreact".to_string()));
        assert!(ctx.languages.contains(&"json".to_string()));
        assert!(ctx.dependencies.iter().any(|d| d.name == "jest" && d.dev));
        assert!(ctx.git_info.is_none());
        assert!(cache.get(WORKSPACE_CONTEXT_KEY).is_some());

        let summary = ctx.summary();
        assert!(summary.starts_with("Workspace Analysis:\n- Project Name: chat-ui\n- Version: 1.2.0\n"));
        assert!(summary.contains("- DevDependencies: jest\n"));
    }

    #[tokio::test]
    async fn test_analyze_cargo_workspace() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"svc\"\nversion = \"0.3.0\"\n\n[dependencies]\ntokio = { version = \"1\", features = [\"full\"] }\nserde = \"1.0\"\n\n[dev-dependencies]\ntempfile = \"3\"\n",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();

        let ctx = manager(Arc::new(ContextCache::default()))
            .analyze_workspace(&Workspace::new(dir.path()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ctx.project_type, "Rust");
        assert_eq!(ctx.frameworks, vec!["Tokio"]);
        let tokio_dep = ctx.dependencies.iter().find(|d| d.name == "tokio").unwrap();
        assert_eq!(tokio_dep.version, "1");
        assert_eq!(tokio_dep.source, "Cargo.toml");
        assert!(ctx.dependencies.iter().any(|d| d.name == "tempfile" && d.dev));
        assert!(ctx.languages.contains(&"rust".to_string()));
    }

    #[tokio::test]
    async fn test_no_workspace_root() {
        let result = manager(Arc::new(ContextCache::default()))
            .analyze_workspace(&Workspace::default())
            .await;
        assert!(matches!(result, Err(ContextError::NoWorkspace)));
    }

    #[tokio::test]
    async fn test_rate_limited_serves_cache_or_none() {
        let dir = node_workspace();
        let cache = Arc::new(ContextCache::default());
        let limited = ContextManager::with_rate_limiter(
            cache.clone(),
            RateLimiter::new(1, Duration::from_secs(60)),
            Arc::new(NoOpLogger::new()),
        );
        let ws = Workspace::new(dir.path());

        let first = limited.analyze_workspace(&ws).await.unwrap();
        assert!(first.is_some());
        // Limiter exhausted: served from cache, no error
        assert_eq!(limited.analyze_workspace(&ws).await.unwrap(), first);

        cache.clear();
        assert_eq!(limited.analyze_workspace(&ws).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_recompute() {
        let dir = node_workspace();
        let cache = Arc::new(ContextCache::default());
        let mgr = manager(cache.clone());
        let ws = Workspace::new(dir.path());

        mgr.analyze_workspace(&ws).await.unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name":"renamed"}"#).unwrap();
        let again = mgr.analyze_workspace(&ws).await.unwrap().unwrap();
        assert_eq!(again.project_name.as_deref(), Some("chat-ui"));

        mgr.invalidate();
        let fresh = mgr.analyze_workspace(&ws).await.unwrap().unwrap();
        assert_eq!(fresh.project_name.as_deref(), Some("renamed"));
    }
}
