use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("relative path is empty")]
    Empty,
    #[error("relative path contains unsupported component")]
    UnsupportedComponent,
    #[error("path is not valid UTF-8")]
    NotUtf8,
    #[error("path lies outside the project root")]
    OutsideRoot,
}

/// Maps a project-relative remote path ("src/main.rs") to its location under
/// the local project root.
pub fn local_path_for(project_root: &Path, relative_path: &str) -> Result<PathBuf, PathError> {
    if relative_path.is_empty() {
        return Err(PathError::Empty);
    }

    let mut out = project_root.to_path_buf();
    for component in Path::new(relative_path).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::CurDir => continue,
            Component::ParentDir | Component::Prefix(_) => {
                return Err(PathError::UnsupportedComponent);
            }
        }
    }
    Ok(out)
}

/// Inverse mapping: a local file under the project root becomes a `/`-joined
/// relative path, regardless of the platform separator.
pub fn relative_path_of(project_root: &Path, local_path: &Path) -> Result<String, PathError> {
    let stripped = local_path
        .strip_prefix(project_root)
        .map_err(|_| PathError::OutsideRoot)?;

    let mut parts = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or(PathError::NotUtf8)?),
            Component::CurDir => continue,
            Component::RootDir | Component::ParentDir | Component::Prefix(_) => {
                return Err(PathError::UnsupportedComponent);
            }
        }
    }
    if parts.is_empty() {
        return Err(PathError::Empty);
    }
    Ok(parts.join("/"))
}
