//! Glob-based file listing under the workspace root

use std::path::{Component, Path, PathBuf};

use glob::Pattern;

/// Directory names never descended into
pub const EXCLUDED_DIRS: &[&str] = &["node_modules", "target", ".git"];

/// Upper bound on glob entries visited per scan, matched or not
const MAX_VISITED: usize = 20_000;

#[derive(Debug, thiserror::Error)]
#[error("Invalid glob pattern '{pattern}': {message}")]
pub struct InvalidPattern {
    pub pattern: String,
    pub message: String,
}

/// Files under `root` matching the relative `pattern`, at most `limit`
///
/// Paths inside [`EXCLUDED_DIRS`] are skipped. Results keep glob's
/// alphabetical order. Absolute patterns and patterns with `..` segments are
/// rejected so a scan never leaves `root`.
pub fn find_files(root: &Path, pattern: &str, limit: usize) -> Result<Vec<PathBuf>, InvalidPattern> {
    let relative = pattern.trim_start_matches("./");
    if escapes_root(relative) {
        return Err(InvalidPattern {
            pattern: pattern.to_string(),
            message: "pattern must be relative to the workspace root".to_string(),
        });
    }
    let full = format!("{}/{}", Pattern::escape(&root.to_string_lossy()), relative);
    let entries = glob::glob(&full).map_err(|e| InvalidPattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries.take(MAX_VISITED).flatten() {
        if files.len() >= limit {
            break;
        }
        if is_excluded(root, &entry) || !entry.is_file() {
            continue;
        }
        files.push(entry);
    }
    Ok(files)
}

fn escapes_root(pattern: &str) -> bool {
    let path = Path::new(pattern);
    path.has_root() || path.components().any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
}

fn is_excluded(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|c| match c {
        Component::Normal(name) => name
            .to_str()
            .is_some_and(|n| EXCLUDED_DIRS.contains(&n)),
        _ => false,
    })
}

/// Lowercase extension without the dot
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Editor language id for a file extension
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "rs" => "rust",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "typescriptreact",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascriptreact",
        "py" => "python",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "md" => "markdown",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "sh" | "bash" => "shellscript",
        "sql" => "sql",
        "vue" => "vue",
        _ => return None,
    })
}
