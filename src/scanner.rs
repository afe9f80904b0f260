use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use glob::Pattern;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{FilesystemError, ScanWarning};
use crate::utils::is_ignored;

/// Byte size and file count of a subtree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubtreeStats {
    pub size: u64,
    pub files: u64,
}

impl SubtreeStats {
    pub fn new(size: u64, files: u64) -> Self {
        Self { size, files }
    }

    fn file(size: u64) -> Self {
        Self { size, files: 1 }
    }
}

impl Add for SubtreeStats {
    type Output = SubtreeStats;

    fn add(self, rhs: SubtreeStats) -> SubtreeStats {
        SubtreeStats {
            size: self.size + rhs.size,
            files: self.files + rhs.files,
        }
    }
}

impl AddAssign for SubtreeStats {
    fn add_assign(&mut self, rhs: SubtreeStats) {
        *self = *self + rhs;
    }
}

impl Sum for SubtreeStats {
    fn sum<I: Iterator<Item = SubtreeStats>>(iter: I) -> Self {
        iter.fold(SubtreeStats::default(), Add::add)
    }
}

/// Per top-level entry totals for one root.
#[derive(Debug, Clone)]
pub struct AggregationResult {
    pub root: PathBuf,
    pub entries: BTreeMap<String, SubtreeStats>,
    pub warnings: Vec<ScanWarning>,
}

impl AggregationResult {
    pub fn new(
        root: impl Into<PathBuf>,
        entries: impl IntoIterator<Item = (String, SubtreeStats)>,
    ) -> Self {
        Self {
            root: root.into(),
            entries: entries.into_iter().collect(),
            warnings: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<SubtreeStats> {
        self.entries.get(name).copied()
    }

    /// Sum over every top-level bucket.
    pub fn total(&self) -> SubtreeStats {
        self.entries.values().copied().sum()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScanOptions {
    pub ignore_patterns: Vec<Pattern>,
    /// Worker threads for per-entry walks; 0 lets rayon decide.
    pub jobs: usize,
}

/// Reported after each top-level entry has been measured.
#[derive(Debug, Clone)]
pub struct ScanProgress<'a> {
    pub root: &'a Path,
    pub processed: usize,
    pub total: Option<usize>,
    pub size_so_far: u64,
}

pub type ProgressFn<'a> = dyn Fn(&ScanProgress<'_>) + Sync + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
}

#[derive(Debug)]
struct TopLevelEntry {
    name: String,
    path: PathBuf,
    kind: EntryKind,
}

/// Walks `root` and totals every direct child's subtree.
///
/// Only problems with `root` itself are returned as errors; unreadable or
/// vanished descendants end up in [`AggregationResult::warnings`].
pub fn aggregate(
    root: &Path,
    opts: &ScanOptions,
    progress: Option<&ProgressFn<'_>>,
) -> Result<AggregationResult, FilesystemError> {
    let meta = fs::metadata(root).map_err(|e| FilesystemError::from_io(root, e))?;
    if !meta.is_dir() {
        return Err(FilesystemError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut warnings = Vec::new();
    let children = list_top_level(root, opts, &mut warnings)?;
    let total = children.len();
    debug!(root = %root.display(), entries = total, "listed top-level entries");

    let processed = AtomicUsize::new(0);
    let size_so_far = AtomicU64::new(0);

    let measure_all = || {
        children
            .par_iter()
            .map(|child| {
                let (stats, child_warnings) = measure(root, child, &opts.ignore_patterns);
                if let Some(s) = stats {
                    debug!(entry = %child.name, size = s.size, files = s.files, "measured");
                }
                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                let added = stats.map(|s| s.size).unwrap_or(0);
                let size = size_so_far.fetch_add(added, Ordering::Relaxed) + added;
                if let Some(cb) = progress {
                    cb(&ScanProgress {
                        root,
                        processed: done,
                        total: Some(total),
                        size_so_far: size,
                    });
                }
                (child, stats, child_warnings)
            })
            .collect::<Vec<_>>()
    };

    let measured = match rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs)
        .build()
    {
        Ok(pool) => pool.install(measure_all),
        Err(e) => {
            warn!("falling back to the global thread pool: {e}");
            measure_all()
        }
    };

    let mut entries: BTreeMap<String, SubtreeStats> = BTreeMap::new();
    for (child, stats, child_warnings) in measured {
        warnings.extend(child_warnings);
        let Some(stats) = stats else { continue };
        // Lossy names can collide; fold them so no bytes drop out of the totals.
        let seen = entries.contains_key(&child.name);
        *entries.entry(child.name.clone()).or_default() += stats;
        if seen {
            warnings.push(ScanWarning::new(
                &child.path,
                format!("name is not valid UTF-8, merged into {:?}", child.name),
            ));
        }
    }

    for w in &warnings {
        warn!("{}: {}", w.path.display(), w.message);
    }

    let result = AggregationResult {
        root: root.to_path_buf(),
        entries,
        warnings,
    };
    let grand = result.total();
    info!(
        root = %root.display(),
        entries = result.entries.len(),
        size = grand.size,
        files = grand.files,
        skipped = result.warnings.len(),
        "aggregated"
    );
    Ok(result)
}

fn list_top_level(
    root: &Path,
    opts: &ScanOptions,
    warnings: &mut Vec<ScanWarning>,
) -> Result<Vec<TopLevelEntry>, FilesystemError> {
    let dir = fs::read_dir(root).map_err(|e| FilesystemError::from_io(root, e))?;

    let mut children = Vec::new();
    for entry in dir {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warnings.push(ScanWarning::new(root, e));
                continue;
            }
        };
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_ignored(Path::new(&name), &opts.ignore_patterns) {
            continue;
        }
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                warnings.push(ScanWarning::new(path, e));
                continue;
            }
        };

        let kind = if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() || (file_type.is_symlink() && points_to_file(&path)) {
            EntryKind::File
        } else {
            continue;
        };
        children.push(TopLevelEntry { name, path, kind });
    }
    Ok(children)
}

fn measure(
    root: &Path,
    child: &TopLevelEntry,
    patterns: &[Pattern],
) -> (Option<SubtreeStats>, Vec<ScanWarning>) {
    match child.kind {
        // symlink_metadata: a link is sized by the link itself, not its target
        EntryKind::File => match fs::symlink_metadata(&child.path) {
            Ok(m) => (Some(SubtreeStats::file(m.len())), Vec::new()),
            Err(e) => (None, vec![ScanWarning::new(&child.path, e)]),
        },
        EntryKind::Dir => measure_dir(root, &child.path, patterns),
    }
}

fn measure_dir(
    root: &Path,
    dir: &Path,
    patterns: &[Pattern],
) -> (Option<SubtreeStats>, Vec<ScanWarning>) {
    let mut stats = SubtreeStats::default();
    let mut warnings = Vec::new();
    let mut visited = HashSet::new();

    let walker = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() > 0 {
                if let Ok(rel) = e.path().strip_prefix(root) {
                    if is_ignored(rel, patterns) {
                        return false;
                    }
                }
            }
            if e.file_type().is_dir() {
                if let Some(id) = dir_identity(e) {
                    return visited.insert(id);
                }
            }
            true
        });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| dir.to_path_buf());
                if err.depth() == 0 {
                    // the entry directory itself could not be opened
                    warnings.push(ScanWarning::new(path, err));
                    return (None, warnings);
                }
                warnings.push(ScanWarning::new(path, err));
                continue;
            }
        };
        match file_weight(&entry) {
            Ok(Some(s)) => stats += s,
            Ok(None) => {}
            Err(err) => warnings.push(ScanWarning::new(entry.path(), err)),
        }
    }

    (Some(stats), warnings)
}

fn file_weight(entry: &DirEntry) -> Result<Option<SubtreeStats>, walkdir::Error> {
    let file_type = entry.file_type();
    if file_type.is_file() || (file_type.is_symlink() && points_to_file(entry.path())) {
        // walkdir does not follow links here, so this is the link's own metadata
        let len = entry.metadata()?.len();
        return Ok(Some(SubtreeStats::file(len)));
    }
    Ok(None)
}

fn points_to_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(unix)]
fn dir_identity(entry: &DirEntry) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    entry.metadata().ok().map(|m| (m.dev(), m.ino()))
}

#[cfg(not(unix))]
fn dir_identity(_entry: &DirEntry) -> Option<(u64, u64)> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, len: usize) {
        let p = dir.join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(p, vec![b'x'; len]).unwrap();
    }

    #[test]
    fn stats_are_additive() {
        let a = SubtreeStats::new(10, 1);
        let b = SubtreeStats::new(5, 2);
        assert_eq!(a + b, SubtreeStats::new(15, 3));
        let total: SubtreeStats = vec![a, b, a].into_iter().sum();
        assert_eq!(total, SubtreeStats::new(25, 4));
    }

    #[test]
    fn loose_files_and_dirs_get_their_own_buckets() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.txt", 7);
        write(tmp.path(), "sub/one.bin", 100);
        write(tmp.path(), "sub/deep/two.bin", 23);
        fs::create_dir(tmp.path().join("empty")).unwrap();

        let res = aggregate(tmp.path(), &ScanOptions::default(), None).unwrap();
        assert_eq!(res.get("a.txt"), Some(SubtreeStats::new(7, 1)));
        assert_eq!(res.get("sub"), Some(SubtreeStats::new(123, 2)));
        assert_eq!(res.get("empty"), Some(SubtreeStats::default()));
        assert_eq!(res.total(), SubtreeStats::new(130, 3));
        assert!(res.warnings.is_empty());
    }

    #[test]
    fn missing_root_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = aggregate(&tmp.path().join("gone"), &ScanOptions::default(), None).unwrap_err();
        assert!(matches!(err, FilesystemError::NotFound { .. }));
    }

    #[test]
    fn file_root_is_not_a_directory() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "plain.txt", 3);
        let err = aggregate(&tmp.path().join("plain.txt"), &ScanOptions::default(), None)
            .unwrap_err();
        assert!(matches!(err, FilesystemError::NotADirectory { .. }));
    }

    #[test]
    fn ignore_patterns_skip_entries() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "keep.txt", 4);
        write(tmp.path(), "drop.log", 40);
        write(tmp.path(), "dir/inner.log", 9);
        write(tmp.path(), "dir/inner.txt", 1);

        let opts = ScanOptions {
            ignore_patterns: vec![Pattern::new("*.log").unwrap()],
            jobs: 2,
        };
        let res = aggregate(tmp.path(), &opts, None).unwrap();
        assert_eq!(res.get("drop.log"), None);
        assert_eq!(res.get("dir"), Some(SubtreeStats::new(1, 1)));
        assert_eq!(res.total(), SubtreeStats::new(5, 2));
    }

    #[test]
    fn progress_fires_once_per_top_level_entry() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a", 1);
        write(tmp.path(), "b", 2);
        write(tmp.path(), "c/d", 3);

        let seen = Mutex::new(Vec::new());
        let cb = |p: &ScanProgress<'_>| {
            seen.lock().unwrap().push((p.processed, p.total, p.size_so_far));
        };
        let with_cb = aggregate(tmp.path(), &ScanOptions::default(), Some(&cb)).unwrap();
        let without = aggregate(tmp.path(), &ScanOptions::default(), None).unwrap();
        assert_eq!(with_cb.entries, without.entries);

        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.iter().map(|s| s.0).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(seen.iter().all(|s| s.1 == Some(3)));
        assert_eq!(seen.iter().map(|s| s.2).max(), Some(6));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_with_same_display_are_folded() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(OsStr::from_bytes(b"a\xff")), vec![0u8; 100]).unwrap();
        fs::write(tmp.path().join(OsStr::from_bytes(b"a\xfe")), vec![0u8; 7]).unwrap();

        let res = aggregate(tmp.path(), &ScanOptions::default(), None).unwrap();
        assert_eq!(res.entries.len(), 1);
        assert_eq!(res.get("a\u{FFFD}"), Some(SubtreeStats::new(107, 2)));
        assert_eq!(res.total(), SubtreeStats::new(107, 2));
        assert_eq!(res.warnings.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn fifos_and_sockets_are_not_counted() {
        use std::os::unix::net::UnixListener;
        use std::process::Command;

        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "dir/real.txt", 12);
        let status = Command::new("mkfifo")
            .arg(tmp.path().join("pipe"))
            .arg(tmp.path().join("dir/pipe"))
            .status()
            .unwrap();
        assert!(status.success());
        let _top = UnixListener::bind(tmp.path().join("sock")).unwrap();
        let _nested = UnixListener::bind(tmp.path().join("dir/sock")).unwrap();

        let res = aggregate(tmp.path(), &ScanOptions::default(), None).unwrap();
        assert_eq!(res.get("pipe"), None);
        assert_eq!(res.get("sock"), None);
        assert_eq!(res.get("dir"), Some(SubtreeStats::new(12, 1)));
        assert_eq!(res.total(), SubtreeStats::new(12, 1));
        assert!(res.warnings.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directories_are_skipped_with_warnings() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "dir/ok.txt", 5);
        write(tmp.path(), "dir/locked/secret.bin", 50);
        write(tmp.path(), "top_locked/hidden.bin", 70);
        write(tmp.path(), "loose.txt", 3);

        let nested = tmp.path().join("dir/locked");
        let top = tmp.path().join("top_locked");
        let lock = |p: &Path, mode: u32| {
            fs::set_permissions(p, fs::Permissions::from_mode(mode)).unwrap();
        };
        lock(&nested, 0o000);
        lock(&top, 0o000);

        // privileged users read through mode 000
        if fs::read_dir(&nested).is_ok() {
            lock(&nested, 0o755);
            lock(&top, 0o755);
            return;
        }

        let res = aggregate(tmp.path(), &ScanOptions::default(), None);
        lock(&nested, 0o755);
        lock(&top, 0o755);
        let res = res.unwrap();

        assert_eq!(res.get("dir"), Some(SubtreeStats::new(5, 1)));
        assert_eq!(res.get("top_locked"), None);
        assert_eq!(res.total(), SubtreeStats::new(8, 2));
        assert_eq!(res.warnings.len(), 2);
        assert!(res.warnings.iter().any(|w| w.path.ends_with("dir/locked")));
        assert!(res.warnings.iter().any(|w| w.path.ends_with("top_locked")));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_count_as_link_sized_files_and_are_not_followed() {
        use std::os::unix::fs::symlink;

        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "target.bin", 500);
        write(tmp.path(), "dir/real.bin", 10);
        symlink(tmp.path().join("target.bin"), tmp.path().join("link.bin")).unwrap();
        symlink(tmp.path().join("target.bin"), tmp.path().join("dir/inner_link")).unwrap();
        symlink(tmp.path().join("dir"), tmp.path().join("dir_link")).unwrap();
        symlink(tmp.path(), tmp.path().join("dir/loop")).unwrap();
        symlink(tmp.path().join("missing"), tmp.path().join("broken")).unwrap();

        let res = aggregate(tmp.path(), &ScanOptions::default(), None).unwrap();
        let link_len = fs::symlink_metadata(tmp.path().join("link.bin")).unwrap().len();
        let inner_len = fs::symlink_metadata(tmp.path().join("dir/inner_link")).unwrap().len();

        assert_eq!(res.get("link.bin"), Some(SubtreeStats::new(link_len, 1)));
        assert_eq!(res.get("dir"), Some(SubtreeStats::new(10 + inner_len, 2)));
        assert_eq!(res.get("dir_link"), None);
        assert_eq!(res.get("broken"), None);
        assert!(res.warnings.is_empty());
    }
}
