//! Source path → board volume path.
//!
//! Stripping is done on path components rather than on strings, so the
//! host's separator convention never reaches the destination.

use std::path::{Component, Path};

use crate::error::MapError;
use crate::types::{DestinationPath, VolumeId};

/// Map `source` (absolute, under `root`) onto `volume`.
///
/// `destination_path("/a", "V", "/a/b/c")` renders as `V:b/c`.
pub fn destination_path(
    root: &Path,
    volume: &VolumeId,
    source: &Path,
) -> Result<DestinationPath, MapError> {
    let outside = || MapError::OutsideRoot {
        path: source.to_path_buf(),
        root: root.to_path_buf(),
    };

    let relative = source.strip_prefix(root).map_err(|_| outside())?;

    let mut components = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let name = part
                    .to_str()
                    .ok_or_else(|| MapError::NonUtf8(source.to_path_buf()))?;
                components.push(name.to_owned());
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(outside())
            }
        }
    }

    if components.is_empty() {
        return Err(MapError::RootItself(source.to_path_buf()));
    }

    Ok(DestinationPath::new(volume.clone(), components))
}
