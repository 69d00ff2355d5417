use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::info;

use crate::error::Error;

/// Writable directory for annotated outputs.
///
/// Output names are a deterministic function of the source filename, so
/// re-running detection on the same image overwrites the previous result.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Output filename for a source image: `result_<basename>`.
    pub fn result_name(source_name: &str) -> Option<String> {
        Path::new(source_name)
            .file_name()
            .and_then(|n| n.to_str())
            .map(|base| format!("result_{base}"))
    }

    /// Full output path for a source image.
    pub fn path_for(&self, source_name: &str) -> Option<PathBuf> {
        Self::result_name(source_name).map(|name| self.dir.join(name))
    }

    /// Encode `image` to `result_<source_name>` inside the store directory,
    /// creating the directory first if needed. Returns the written path.
    pub fn save(&self, source_name: &str, image: &RgbImage) -> Result<PathBuf, Error> {
        let path = self.path_for(source_name).ok_or_else(|| {
            Error::ResultWrite(format!("invalid source name: {source_name:?}"))
        })?;

        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::ResultWrite(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        image
            .save(&path)
            .map_err(|e| Error::ResultWrite(format!("cannot write {}: {e}", path.display())))?;

        info!(path = %path.display(), "result saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb([120, 130, 140]))
    }

    #[test]
    fn result_path_uses_exact_prefix_naming() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let path = store.save("apple.jpg", &small_image(10, 10)).unwrap();
        assert_eq!(path, dir.path().join("result_apple.jpg"));
        assert!(path.is_file());
    }

    #[test]
    fn saved_image_keeps_source_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let path = store.save("test.png", &small_image(10, 10)).unwrap();

        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.width(), 10);
        assert_eq!(reloaded.height(), 10);
    }

    #[test]
    fn missing_directory_is_created_and_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("deep").join("results"));

        store.save("a.png", &small_image(4, 4)).unwrap();
        // second save into the now-existing directory succeeds as well
        store.save("b.png", &small_image(4, 4)).unwrap();
        assert!(store.dir().join("result_a.png").is_file());
        assert!(store.dir().join("result_b.png").is_file());
    }

    #[test]
    fn repeated_save_overwrites_previous_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());

        store.save("apple.jpg", &small_image(10, 10)).unwrap();
        let path = store.save("apple.jpg", &small_image(20, 20)).unwrap();

        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.width(), 20);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn unwritable_destination_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        // a plain file where the store expects a directory
        let blocker = dir.path().join("results");
        fs::write(&blocker, b"occupied").unwrap();

        let store = ResultStore::new(&blocker);
        let result = store.save("a.png", &small_image(4, 4));
        assert!(matches!(result, Err(Error::ResultWrite(_))));
    }

    #[test]
    fn source_name_is_reduced_to_its_basename() {
        let store = ResultStore::new("out");
        assert_eq!(
            ResultStore::result_name("shelf/apple.jpg").as_deref(),
            Some("result_apple.jpg")
        );
        assert_eq!(
            store.path_for("apple.jpg"),
            Some(PathBuf::from("out").join("result_apple.jpg"))
        );
    }
}
