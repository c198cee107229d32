use coderag_graph::SourceAnalyzer;
use coderag_protocol::path_filters::ExclusionSet;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

/// Scanner for finding analyzable source files in a repository
pub struct FileScanner {
    root: PathBuf,
    exclusions: ExclusionSet,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            exclusions: ExclusionSet::with_defaults::<&str>(&[]),
        }
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Scan for source files (.gitignore aware), sorted by path.
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let exclusions = self.exclusions.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true) // do not index hidden files by default
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b));
        builder.filter_entry(move |entry| !is_excluded(entry.path(), &root, &exclusions));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if !SourceAnalyzer::supports(path) {
                        continue;
                    }

                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > MAX_FILE_SIZE_BYTES {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                MAX_FILE_SIZE_BYTES
                            );
                            continue;
                        }
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        log::info!("Found {} source files", files.len());
        files
    }
}

fn is_excluded(path: &Path, root: &Path, exclusions: &ExclusionSet) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    if relative.as_os_str().is_empty() {
        return false;
    }
    exclusions.excludes(&relative_path_string(relative))
}

/// Forward-slash rendering of a repo-relative path.
pub(crate) fn relative_path_string(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
