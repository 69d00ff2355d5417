use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Error;

/// Extensions eligible for selection. The match is case-sensitive, so
/// `photo.PNG` is not offered.
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Read-only directory of pre-existing images available for selection.
#[derive(Debug, Clone)]
pub struct ImageRepository {
    root: PathBuf,
}

impl ImageRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List the selectable image filenames, sorted for a stable UI.
    pub fn list(&self) -> Result<Vec<String>, Error> {
        let entries = fs::read_dir(&self.root).map_err(|_| Error::NotFound(self.root.clone()))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| Error::NotFound(self.root.clone()))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if has_image_extension(name) {
                names.push(name.to_string());
            }
        }
        names.sort();
        debug!(count = names.len(), root = %self.root.display(), "listed repository");
        Ok(names)
    }

    /// Resolve a listed filename back to its full path.
    ///
    /// Names the repository would not list (wrong extension, path components,
    /// or a file that has since disappeared) fail with `NotFound`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, Error> {
        let is_bare_name = Path::new(name)
            .components()
            .eq([std::path::Component::Normal(name.as_ref())]);
        if !is_bare_name || !has_image_extension(name) {
            return Err(Error::NotFound(self.root.join(name)));
        }

        let path = self.root.join(name);
        if !path.is_file() {
            return Err(Error::NotFound(path));
        }
        Ok(path)
    }
}

fn has_image_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext))
}
