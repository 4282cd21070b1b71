//! Confines file-system access to one base directory.

use std::path::{Component, Path, PathBuf};

use woda_common::CapabilityError;

/// A canonical base directory that every relative path resolves under.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Root the sandbox at `base`, which must already exist.
    pub fn new(base: impl AsRef<Path>) -> Result<Self, CapabilityError> {
        let base = base.as_ref();
        let root = std::fs::canonicalize(base)
            .map_err(|_| CapabilityError::DirectoryNotFound(base.display().to_string()))?;
        if !root.is_dir() {
            return Err(CapabilityError::DirectoryNotFound(root.display().to_string()));
        }
        Ok(Self { root })
    }

    /// Like [`Sandbox::new`], creating `base` first when `create` is set.
    pub fn open(base: impl AsRef<Path>, create: bool) -> Result<Self, CapabilityError> {
        if create {
            std::fs::create_dir_all(base.as_ref())?;
        }
        Self::new(base)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Turn a script-supplied path into a clean relative path.
    ///
    /// Leading separators are stripped, `.` segments dropped and `..`
    /// segments folded. Folding past the root is rejected rather than clamped.
    pub fn normalize(path: &str) -> Result<PathBuf, CapabilityError> {
        let trimmed = path.trim_start_matches(['/', '\\']);
        let mut parts: Vec<&str> = Vec::new();

        for segment in trimmed.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if parts.pop().is_none() {
                        return Err(CapabilityError::PathTraversal(path.to_string()));
                    }
                }
                other => {
                    // Drive prefixes and the like would replace the base on join.
                    let mut components = Path::new(other).components();
                    match (components.next(), components.next()) {
                        (Some(Component::Normal(_)), None) => parts.push(other),
                        _ => return Err(CapabilityError::PathTraversal(path.to_string())),
                    }
                }
            }
        }

        Ok(parts.iter().collect())
    }

    /// Resolve `path` to an absolute location inside the base directory.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, CapabilityError> {
        let relative = Self::normalize(path)?;
        let absolute = self.root.join(&relative);
        self.ensure_contained(&absolute, path)?;
        Ok(absolute)
    }

    /// Canonicalize the deepest existing ancestor of `absolute` and check it
    /// is still under the root. Catches symlinks that point outside.
    fn ensure_contained(&self, absolute: &Path, original: &str) -> Result<(), CapabilityError> {
        for ancestor in absolute.ancestors() {
            if std::fs::symlink_metadata(ancestor).is_err() {
                continue;
            }
            // A dangling link cannot be canonicalized and is refused.
            let canonical = std::fs::canonicalize(ancestor)
                .map_err(|_| CapabilityError::PathTraversal(original.to_string()))?;
            if canonical.starts_with(&self.root) {
                return Ok(());
            }
            return Err(CapabilityError::PathTraversal(original.to_string()));
        }
        Err(CapabilityError::PathTraversal(original.to_string()))
    }

    /// Whether `absolute` is the base directory itself.
    pub fn is_root(&self, absolute: &Path) -> bool {
        absolute == self.root
    }
}

/// Render a relative path with `/` separators, the form script sees.
pub fn relative_display(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
