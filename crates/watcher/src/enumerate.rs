//! Directory enumeration over selected mountpoints

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use inventory::MountTarget;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::exclude::ExclusionFilter;

/// The set of directories to watch
///
/// Built once at startup and immutable afterwards: directories created
/// later are not picked up, and watches on deleted directories are left to
/// the kernel to reclaim.
pub type WatchSet = BTreeSet<PathBuf>;

/// Walk every selected mountpoint and collect watchable directories
pub fn enumerate_watch_dirs(mounts: &[MountTarget], filters: &ExclusionFilter) -> WatchSet {
    let mut watch_dirs = WatchSet::new();

    for mount in mounts {
        info!(
            disk = %mount.name,
            mountpoint = %mount.mountpoint.display(),
            kind = %mount.kind,
            filesystem = %mount.filesystem,
            rotational = mount.rotational,
            "watching disk"
        );
        if let Err(err) = walk_mount(&mount.mountpoint, filters, &mut watch_dirs) {
            error!(disk = %mount.name, error = %err, "error walking directory for disk");
        }
    }

    info!(count = watch_dirs.len(), "watch folders");
    watch_dirs
}

/// Walk one mountpoint, aborting this mount on the first walk error
fn walk_mount(
    root: &Path,
    filters: &ExclusionFilter,
    watch_dirs: &mut WatchSet,
) -> Result<(), walkdir::Error> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;

        if entry.path_is_symlink() {
            debug!(link = %entry.path().display(), "skipping symlink");
            continue;
        }
        // The mountpoint root gets constant OPEN activity from unrelated
        // background processes, which would flood the log.
        if entry.depth() == 0 {
            continue;
        }
        if !entry.file_type().is_dir() {
            continue;
        }
        // An excluded directory is only omitted itself; the walk still
        // descends, and children are tested independently.
        if let Some(pattern) = filters.matched(entry.path()) {
            debug!(directory = %entry.path().display(), filter = pattern, "skipping excluded directory");
            continue;
        }
        watch_dirs.insert(entry.path().to_path_buf());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory::DiskKind;
    use std::fs;
    use tempfile::TempDir;

    fn mount(root: &Path) -> MountTarget {
        MountTarget {
            name: "disk1".to_string(),
            mountpoint: root.to_path_buf(),
            kind: DiskKind::Array,
            filesystem: "xfs".to_string(),
            rotational: true,
        }
    }

    fn filter(patterns: &[&str]) -> ExclusionFilter {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        ExclusionFilter::compile(&patterns).unwrap()
    }

    /// Three-level tree with one excluded subdirectory
    fn build_tree(root: &Path) {
        fs::create_dir_all(root.join("media/movies/hd")).unwrap();
        fs::create_dir_all(root.join("media/music")).unwrap();
        fs::create_dir_all(root.join("appdata")).unwrap();
        fs::write(root.join("media/movies/file.mkv"), b"x").unwrap();
    }

    #[test]
    fn test_root_skip_invariant() {
        let temp_dir = TempDir::new().unwrap();
        build_tree(temp_dir.path());

        let set = enumerate_watch_dirs(&[mount(temp_dir.path())], &filter(&[]));

        assert!(!set.contains(temp_dir.path()));
        assert!(set.contains(&temp_dir.path().join("media")));
        assert!(set.contains(&temp_dir.path().join("media/movies")));
        assert!(set.contains(&temp_dir.path().join("media/movies/hd")));
    }

    #[test]
    fn test_exclusion_and_counts() {
        let temp_dir = TempDir::new().unwrap();
        build_tree(temp_dir.path());

        // 5 directories besides the root; `appdata` is excluded
        let set = enumerate_watch_dirs(&[mount(temp_dir.path())], &filter(&["appdata"]));

        assert_eq!(set.len(), 4);
        assert!(!set.contains(&temp_dir.path().join("appdata")));
    }

    #[test]
    fn test_exclusion_idempotence() {
        let temp_dir = TempDir::new().unwrap();
        build_tree(temp_dir.path());
        let filters = filter(&["appdata"]);
        let mounts = [mount(temp_dir.path())];

        let first = enumerate_watch_dirs(&mounts, &filters);
        let second = enumerate_watch_dirs(&mounts, &filters);

        assert_eq!(first, second);
        assert!(!second.contains(&temp_dir.path().join("appdata")));
    }

    #[test]
    fn test_excluded_directory_children_tested_independently() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("staging/media")).unwrap();

        // Anchored pattern matches only the parent, not its children
        let set = enumerate_watch_dirs(&[mount(temp_dir.path())], &filter(&["staging$"]));

        assert!(!set.contains(&temp_dir.path().join("staging")));
        assert!(set.contains(&temp_dir.path().join("staging/media")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_skipped() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(temp_dir.path().join("real"), temp_dir.path().join("link"))
            .unwrap();

        let set = enumerate_watch_dirs(&[mount(temp_dir.path())], &filter(&[]));

        assert!(set.contains(&temp_dir.path().join("real")));
        assert!(!set.contains(&temp_dir.path().join("link")));
    }

    #[test]
    fn test_missing_mountpoint_does_not_abort_others() {
        let temp_dir = TempDir::new().unwrap();
        build_tree(temp_dir.path());
        let missing = MountTarget {
            name: "disk2".to_string(),
            mountpoint: temp_dir.path().join("does-not-exist"),
            kind: DiskKind::Array,
            filesystem: "xfs".to_string(),
            rotational: true,
        };

        let set = enumerate_watch_dirs(&[missing, mount(temp_dir.path())], &filter(&[]));

        assert!(set.contains(&temp_dir.path().join("media")));
    }
}
