/// Directory and file names skipped by every indexing run
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "__pycache__",
    "node_modules",
    ".git",
    ".venv",
    "venv",
    "env",
    "build",
    "dist",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    "htmlcov",
    ".eggs",
    "*.egg-info",
];

/// Exclusion rules applied to repo-relative paths
///
/// A pattern without `/` is a glob matched against every path component
/// (`build`, `*.egg-info`). A pattern with `/` is matched against the whole
/// path, as a glob when it has wildcards and as a directory prefix otherwise.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    component_globs: Vec<glob::Pattern>,
    path_globs: Vec<glob::Pattern>,
    path_prefixes: Vec<String>,
    rejected: Vec<String>,
}

impl ExclusionSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut set = Self::default();
        for raw in patterns {
            set.add(raw.as_ref());
        }
        set
    }

    /// [`DEFAULT_EXCLUSIONS`] plus caller-supplied patterns.
    pub fn with_defaults<S: AsRef<str>>(extra: &[S]) -> Self {
        let mut set = Self::new(DEFAULT_EXCLUSIONS);
        for raw in extra {
            set.add(raw.as_ref());
        }
        set
    }

    fn add(&mut self, raw: &str) {
        let normalized = normalize_filter_path(raw);
        if normalized.is_empty() {
            return;
        }

        let has_wildcard = normalized.contains(['*', '?', '[']);
        if !normalized.contains('/') {
            match glob::Pattern::new(&normalized) {
                Ok(pattern) => self.component_globs.push(pattern),
                Err(_) => self.rejected.push(raw.to_string()),
            }
        } else if has_wildcard {
            match glob::Pattern::new(&normalized) {
                Ok(pattern) => self.path_globs.push(pattern),
                Err(_) => self.rejected.push(raw.to_string()),
            }
        } else {
            self.path_prefixes.push(normalized);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.component_globs.is_empty()
            && self.path_globs.is_empty()
            && self.path_prefixes.is_empty()
    }

    /// Patterns that failed to compile as globs and were skipped.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// Whether a single file or directory name is excluded.
    pub fn excludes_name(&self, name: &str) -> bool {
        self.component_globs.iter().any(|p| p.matches(name))
    }

    /// Whether a repo-relative path (or any of its parents) is excluded.
    pub fn excludes(&self, rel_path: &str) -> bool {
        let rel_path = rel_path.replace('\\', "/");
        let rel_path = rel_path.trim_start_matches("./");

        if rel_path.split('/').any(|component| self.excludes_name(component)) {
            return true;
        }
        if self.path_globs.iter().any(|p| p.matches(rel_path)) {
            return true;
        }
        self.path_prefixes
            .iter()
            .any(|prefix| path_prefix_matches_normalized(prefix, rel_path))
    }
}

fn normalize_filter_path(raw: &str) -> String {
    let mut value = raw.trim().replace('\\', "/");
    while value.starts_with("./") {
        value = value[2..].to_string();
    }
    let value = value.trim_matches('/');
    if value == "." {
        return String::new();
    }
    value.to_string()
}

fn path_prefix_matches_normalized(prefix: &str, path: &str) -> bool {
    if path == prefix {
        return true;
    }

    if !path.starts_with(prefix) {
        return false;
    }

    path.as_bytes().get(prefix.len()) == Some(&b'/')
}
