use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::error::{Result, SyError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    /// Path relative to the walk base, `/`-separated; the index key.
    pub key: String,
}

/// Regular files under `base`, never descending into the index root.
pub struct TreeWalker {
    base: PathBuf,
    skip: PathBuf,
}

impl TreeWalker {
    /// Both directories must exist.
    pub fn new(base: &Path, index_root: &Path) -> Result<Self> {
        let canon = |p: &Path| {
            p.canonicalize().map_err(|source| SyError::FileIo {
                path: p.to_path_buf(),
                source,
            })
        };
        Ok(Self {
            base: canon(base)?,
            skip: canon(index_root)?,
        })
    }

    /// Files in name order. Symlinks are not followed.
    pub fn files(&self) -> Result<Vec<WalkEntry>> {
        let mut out = Vec::new();
        let walk = WalkDir::new(&self.base)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.path() != self.skip.as_path());
        for e in walk {
            let e = e.map_err(|err| {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.base.clone());
                SyError::FileIo {
                    path,
                    source: err.into(),
                }
            })?;
            if !e.file_type().is_file() {
                continue;
            }
            let rel = e.path().strip_prefix(&self.base).unwrap_or(e.path());
            let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
            // lossy keys could collide, so such files are left out
            let Some(parts) = parts else {
                warn!(path = %e.path().display(), "skipping path that is not valid UTF-8");
                continue;
            };
            let key = parts.join("/");
            out.push(WalkEntry {
                path: e.path().to_path_buf(),
                key,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn skips_index_root_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();
        fs::create_dir_all(base.join(".sy/idx/ab")).unwrap();
        fs::write(base.join(".sy/db"), b"").unwrap();
        fs::write(base.join(".sy/idx/ab/abcd"), b"cached").unwrap();
        fs::create_dir_all(base.join("docs/deep")).unwrap();
        fs::write(base.join("b.txt"), b"b").unwrap();
        fs::write(base.join("a.txt"), b"a").unwrap();
        fs::write(base.join("docs/deep/c.txt"), b"c").unwrap();

        let walker = TreeWalker::new(base, &base.join(".sy")).unwrap();
        let keys: Vec<String> = walker.files().unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["a.txt", "b.txt", "docs/deep/c.txt"]);
    }

    #[test]
    fn missing_base_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let err = TreeWalker::new(&tmp.path().join("gone"), tmp.path())
            .err()
            .unwrap();
        assert!(matches!(err, SyError::FileIo { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();
        fs::create_dir_all(base.join(".sy")).unwrap();
        fs::write(base.join("ok.txt"), b"ok").unwrap();
        // both would map to the same lossy key
        fs::write(base.join(OsStr::from_bytes(b"bad\xff")), b"one").unwrap();
        fs::write(base.join(OsStr::from_bytes(b"bad\xfe")), b"two").unwrap();

        let walker = TreeWalker::new(base, &base.join(".sy")).unwrap();
        let keys: Vec<String> = walker.files().unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["ok.txt"]);
    }
}
