//! Three-tier layered root filesystem.
//!
//! ```text
//! <root>/readlayer    extracted image (lower)
//! <root>/writelayer   container writes (upper)
//! <root>/mountpoint   union view, becomes `/` in the container
//! ```

use std::path::{Path, PathBuf};

use nestbox_common::constants::{MOUNT_POINT, READ_LAYER, WRITE_LAYER};
use nestbox_common::error::{NestboxError, Result};

use super::extract::ArchiveExtractor;
use super::io_error;
use super::overlayfs::UnionMount;

/// Directory layout of a composed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayeredRoot {
    root: PathBuf,
}

impl LayeredRoot {
    /// Describes the layout under `root`; nothing is created.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory holding all three layers.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The read-only image layer.
    #[must_use]
    pub fn read_layer(&self) -> PathBuf {
        self.root.join(READ_LAYER)
    }

    /// The writable layer.
    #[must_use]
    pub fn write_layer(&self) -> PathBuf {
        self.root.join(WRITE_LAYER)
    }

    /// The union view.
    #[must_use]
    pub fn mount_point(&self) -> PathBuf {
        self.root.join(MOUNT_POINT)
    }
}

/// Builds and tears down layered roots.
pub struct Composer {
    extractor: Box<dyn ArchiveExtractor>,
    union: Box<dyn UnionMount>,
}

impl Composer {
    /// Creates a composer from an extraction tool and a union mount provider.
    #[must_use]
    pub fn new(extractor: Box<dyn ArchiveExtractor>, union: Box<dyn UnionMount>) -> Self {
        Self { extractor, union }
    }

    /// Creates `root_dir`, extracts `image` into its read layer, and
    /// mounts the union view.
    ///
    /// Steps run strictly in order and stop at the first failure. Nothing
    /// already created is rolled back here; [`Composer::teardown`] cleans
    /// up partial state.
    ///
    /// # Errors
    ///
    /// Returns [`NestboxError::RootExists`] if `root_dir` is already
    /// present, or the error of the first failing step.
    pub fn build(&self, image: &Path, root_dir: &Path) -> Result<LayeredRoot> {
        let layered = LayeredRoot::new(root_dir);
        if let Some(parent) = root_dir.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        std::fs::create_dir(root_dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                NestboxError::RootExists {
                    path: root_dir.to_path_buf(),
                }
            } else {
                io_error(root_dir)(e)
            }
        })?;

        let read_layer = layered.read_layer();
        create_layer_dir(&read_layer)?;
        self.extractor.extract(image, &read_layer)?;

        let write_layer = layered.write_layer();
        create_layer_dir(&write_layer)?;

        let mount_point = layered.mount_point();
        create_layer_dir(&mount_point)?;
        self.union.mount(&read_layer, &write_layer, &mount_point)?;

        tracing::info!(
            root = %root_dir.display(),
            image = %image.display(),
            "layered root composed"
        );
        Ok(layered)
    }

    /// Unmounts the union view and removes the whole layered root.
    ///
    /// Works on partially built roots; a missing root is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount or the removal fails.
    pub fn teardown(&self, layered: &LayeredRoot) -> Result<()> {
        let mount_point = layered.mount_point();
        if mount_point.exists() {
            self.union.unmount(&mount_point)?;
        }
        match std::fs::remove_dir_all(layered.root()) {
            Ok(()) => {
                tracing::info!(root = %layered.root().display(), "layered root removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(layered.root())(e)),
        }
    }
}

fn create_layer_dir(path: &Path) -> Result<()> {
    std::fs::create_dir(path).map_err(io_error(path))?;
    tracing::debug!(path = %path.display(), "layer directory created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Writes a marker file and records which layers existed at the time.
    struct FakeExtractor {
        log: Log,
        fail: bool,
    }

    impl ArchiveExtractor for FakeExtractor {
        fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
            let root = dest.parent().unwrap();
            self.log.lock().unwrap().push(format!(
                "extract {} write_layer_exists={}",
                archive.display(),
                root.join(WRITE_LAYER).exists()
            ));
            if self.fail {
                return Err(NestboxError::ExternalTool {
                    tool: "tar".into(),
                    status: "exit status: 2".into(),
                });
            }
            std::fs::write(dest.join("etc-os-release"), "alpine").unwrap();
            Ok(())
        }
    }

    struct FakeUnion {
        log: Log,
    }

    impl UnionMount for FakeUnion {
        fn mount(&self, lower: &Path, upper: &Path, target: &Path) -> Result<()> {
            assert!(lower.is_dir() && upper.is_dir() && target.is_dir());
            self.log.lock().unwrap().push(format!(
                "mount {} {} {}",
                lower.file_name().unwrap().to_string_lossy(),
                upper.file_name().unwrap().to_string_lossy(),
                target.file_name().unwrap().to_string_lossy()
            ));
            Ok(())
        }

        fn unmount(&self, target: &Path) -> Result<()> {
            self.log.lock().unwrap().push(format!(
                "unmount {}",
                target.file_name().unwrap().to_string_lossy()
            ));
            Ok(())
        }
    }

    fn composer(log: &Log, fail_extract: bool) -> Composer {
        Composer::new(
            Box::new(FakeExtractor {
                log: Arc::clone(log),
                fail: fail_extract,
            }),
            Box::new(FakeUnion { log: Arc::clone(log) }),
        )
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn build_creates_three_layers_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("c1");
        let log = Log::default();

        let layered = composer(&log, false).build(Path::new("/images/alpine.tar"), &root).unwrap();

        assert_eq!(entries(&root), vec![MOUNT_POINT, READ_LAYER, WRITE_LAYER]);
        assert_eq!(entries(&layered.read_layer()), vec!["etc-os-release"]);
        assert!(entries(&layered.write_layer()).is_empty());
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "extract /images/alpine.tar write_layer_exists=false",
                "mount readlayer writelayer mountpoint",
            ]
        );
    }

    #[test]
    fn build_refuses_existing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Log::default();

        let err = composer(&log, false)
            .build(Path::new("/images/alpine.tar"), tmp.path())
            .unwrap_err();

        assert!(matches!(err, NestboxError::RootExists { .. }));
        assert!(log.lock().unwrap().is_empty());
        assert!(entries(tmp.path()).is_empty());
    }

    #[test]
    fn failed_extraction_stops_before_write_layer() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("c1");
        let log = Log::default();

        let err = composer(&log, true).build(Path::new("/images/broken.tar"), &root).unwrap_err();

        assert!(matches!(err, NestboxError::ExternalTool { .. }));
        assert_eq!(entries(&root), vec![READ_LAYER]);
    }

    #[test]
    fn teardown_unmounts_then_removes_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("c1");
        let log = Log::default();
        let composer = composer(&log, false);
        let layered = composer.build(Path::new("/images/alpine.tar"), &root).unwrap();

        composer.teardown(&layered).unwrap();

        assert!(!root.exists());
        assert_eq!(log.lock().unwrap().last().unwrap(), "unmount mountpoint");
    }

    #[test]
    fn teardown_handles_partial_and_missing_roots() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("c1");
        let log = Log::default();
        let composer = composer(&log, true);
        let _ = composer.build(Path::new("/images/broken.tar"), &root).unwrap_err();

        let layered = LayeredRoot::new(&root);
        composer.teardown(&layered).unwrap();
        assert!(!root.exists());
        assert!(!log.lock().unwrap().iter().any(|l| l.starts_with("unmount")));

        composer.teardown(&layered).unwrap();
    }

    #[test]
    fn layout_paths_are_fixed_names() {
        let layered = LayeredRoot::new("/tmp/c1");
        assert_eq!(layered.read_layer(), PathBuf::from("/tmp/c1/readlayer"));
        assert_eq!(layered.write_layer(), PathBuf::from("/tmp/c1/writelayer"));
        assert_eq!(layered.mount_point(), PathBuf::from("/tmp/c1/mountpoint"));
    }
}
