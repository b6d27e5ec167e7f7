//! Source Enumerator
//!
//! Walks a tree with walkdir and counts the lines of every recognized source
//! file in parallel with rayon. Unreadable files are logged and skipped.

use cfgcover_core::config::ScanConfig;
use cfgcover_core::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One recognized source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path on disk (root joined with the relative path)
    pub path: PathBuf,
    /// Path relative to the tree root, `/`-separated
    pub relative: String,
    /// Total lines, also the last line number
    pub lines: u32,
    /// Lines with any non-whitespace content
    pub non_empty: usize,
}

/// Result of enumerating a tree
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Files in path order
    pub files: Vec<SourceFile>,
    /// Files that matched but could not be read
    pub unreadable: Vec<(PathBuf, String)>,
}

impl ScanSummary {
    pub fn total_lines(&self) -> u64 {
        self.files.iter().map(|f| u64::from(f.lines)).sum()
    }

    pub fn non_empty_lines(&self) -> usize {
        self.files.iter().map(|f| f.non_empty).sum()
    }

    /// Every `(file, line)` unit, lines 1-based
    pub fn units(&self) -> impl Iterator<Item = (&SourceFile, u32)> + '_ {
        self.files
            .iter()
            .flat_map(|f| (1..=f.lines).map(move |line| (f, line)))
    }
}

/// Walks a source tree for files with recognized extensions
pub struct SourceEnumerator {
    extensions: Vec<String>,
    exclude: GlobSet,
}

impl SourceEnumerator {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude {
            let glob = Glob::new(pattern)
                .map_err(|e| Error::Config(format!("invalid exclude pattern {pattern}: {e}")))?;
            builder.add(glob);
        }
        let exclude = builder
            .build()
            .map_err(|e| Error::Config(format!("invalid exclude patterns: {e}")))?;

        Ok(Self {
            extensions: config.extensions.clone(),
            exclude,
        })
    }

    /// Enumerate `root`. Fails only when the root itself cannot be read.
    pub fn enumerate(&self, root: &Path) -> Result<ScanSummary> {
        if fs::read_dir(root).is_err() {
            return Err(Error::TreeRootUnreadable(root.to_path_buf()));
        }

        let candidates = self.collect_candidates(root);
        info!("Found {} source files under {:?}", candidates.len(), root);

        let counted: Vec<_> = candidates
            .par_iter()
            .map(|(path, relative)| (path, relative, count_lines(path)))
            .collect();

        let mut summary = ScanSummary::default();
        for (path, relative, result) in counted {
            match result {
                Ok((lines, non_empty)) => summary.files.push(SourceFile {
                    path: path.clone(),
                    relative: relative.clone(),
                    lines,
                    non_empty,
                }),
                Err(e) => {
                    warn!("Cannot read {:?}: {}", path, e);
                    summary.unreadable.push((path.clone(), e.to_string()));
                }
            }
        }

        debug!(
            "Counted {} lines ({} non-empty) in {} files",
            summary.total_lines(),
            summary.non_empty_lines(),
            summary.files.len()
        );
        Ok(summary)
    }

    fn collect_candidates(&self, root: &Path) -> Vec<(PathBuf, String)> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded(root, e.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.has_source_extension(entry.path()) {
                continue;
            }
            if let Some(relative) = relative_path(root, entry.path()) {
                files.push((entry.path().to_path_buf(), relative));
            }
        }

        files
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        match relative_path(root, path) {
            Some(relative) if !relative.is_empty() => self.exclude.is_match(&relative),
            _ => false,
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Count `(total, non_empty)` lines. Invalid UTF-8 is read lossily.
///
/// A file with more lines than a `u32` line number can address is an
/// `InvalidData` error.
pub fn count_lines(path: &Path) -> io::Result<(u32, usize)> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    let mut total = 0;
    let mut non_empty = 0;
    for line in content.lines() {
        total += 1;
        if !line.trim().is_empty() {
            non_empty += 1;
        }
    }
    Ok((line_bound(total)?, non_empty))
}

fn line_bound(total: usize) -> io::Result<u32> {
    u32::try_from(total).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{total} lines exceed the line number range"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_enumerate_counts_lines() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "kernel/setup.c", "int a;\n\nint b;\n");
        write(dir.path(), "kernel/head.S", "nop\nnop");
        write(dir.path(), "include/asm/io.h", "");
        write(dir.path(), "Makefile", "obj-y += setup.o\n");
        write(dir.path(), "kernel/notes.txt", "x\n");

        let enumerator = SourceEnumerator::new(&ScanConfig::default()).unwrap();
        let summary = enumerator.enumerate(dir.path()).unwrap();

        let rels: Vec<&str> = summary.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(rels, vec!["include/asm/io.h", "kernel/head.S", "kernel/setup.c"]);
        assert_eq!(summary.total_lines(), 5);
        assert_eq!(summary.non_empty_lines(), 4);
        assert_eq!(summary.units().count(), 5);
    }

    #[test]
    fn test_exclude_patterns() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "kernel/a.c", "x\n");
        write(dir.path(), "boot/dts/b.c", "x\n");

        let config = ScanConfig {
            exclude: vec!["boot/**".into()],
            ..ScanConfig::default()
        };
        let summary = SourceEnumerator::new(&config).unwrap().enumerate(dir.path()).unwrap();
        assert_eq!(summary.files.len(), 1);
        assert_eq!(summary.files[0].relative, "kernel/a.c");
    }

    #[test]
    fn test_unreadable_root() {
        let enumerator = SourceEnumerator::new(&ScanConfig::default()).unwrap();
        let err = enumerator.enumerate(Path::new("/nonexistent/tree")).unwrap_err();
        assert!(matches!(err, Error::TreeRootUnreadable(_)));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_line_count_beyond_u32_is_an_error() {
        assert_eq!(line_bound(7).unwrap(), 7);
        assert_eq!(line_bound(u32::MAX as usize).unwrap(), u32::MAX);
        let err = line_bound(u32::MAX as usize + 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_count_lines_lossy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bin.c");
        fs::write(&path, b"ok\n\xff\xfe\n   \n").unwrap();
        assert_eq!(count_lines(&path).unwrap(), (3, 2));
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let config = ScanConfig {
            exclude: vec!["[".into()],
            ..ScanConfig::default()
        };
        assert!(matches!(SourceEnumerator::new(&config), Err(Error::Config(_))));
    }
}
