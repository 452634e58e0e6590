//! `.merlin` project file discovery.

use std::path::{Path, PathBuf};

pub const PROJECT_FILE: &str = ".merlin";

/// Look for a project file in `dir`, then in up to `max_depth` of its parents.
#[must_use]
pub fn find_project_file(dir: &Path, max_depth: usize) -> Option<PathBuf> {
    dir.ancestors()
        .take(max_depth + 1)
        .map(|candidate| candidate.join(PROJECT_FILE))
        .find(|candidate| candidate.is_file())
}

/// Project file governing the source file at `path`.
#[must_use]
pub fn project_for_file(path: &Path, max_depth: usize) -> Option<PathBuf> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty())?;
    find_project_file(dir, max_depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, "PKG lwt\n").unwrap();
    }

    #[test]
    fn finds_file_in_same_directory() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join(PROJECT_FILE));

        let found = find_project_file(root.path(), 0).unwrap();
        assert_eq!(found, root.path().join(PROJECT_FILE));
    }

    #[test]
    fn walks_up_within_depth() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("src").join("lib").join("core");
        fs::create_dir_all(&nested).unwrap();
        touch(&root.path().join(PROJECT_FILE));

        assert_eq!(
            find_project_file(&nested, 3),
            Some(root.path().join(PROJECT_FILE))
        );
        assert_eq!(find_project_file(&nested, 2), None);
    }

    #[test]
    fn nearest_file_wins() {
        let root = tempfile::tempdir().unwrap();
        let sub = root.path().join("sub");
        fs::create_dir_all(&sub).unwrap();
        touch(&root.path().join(PROJECT_FILE));
        touch(&sub.join(PROJECT_FILE));

        assert_eq!(find_project_file(&sub, 3), Some(sub.join(PROJECT_FILE)));
    }

    #[test]
    fn directory_named_like_project_file_is_ignored() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join(PROJECT_FILE)).unwrap();
        assert_eq!(find_project_file(root.path(), 0), None);
    }

    #[test]
    fn project_for_file_starts_at_parent() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join(PROJECT_FILE));
        let source = root.path().join("main.ml");

        assert_eq!(
            project_for_file(&source, 0),
            Some(root.path().join(PROJECT_FILE))
        );
        assert_eq!(project_for_file(Path::new("main.ml"), 3), None);
    }
}
