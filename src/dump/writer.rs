use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{error::WriteError, kube::Object};

const CLUSTERSCOPED_DIR: &str = "clusterscoped";
const NAMESPACED_DIR: &str = "namespaced";
const EXTENSION: &str = "yaml";

/// `<root>/{clusterscoped|namespaced/<ns>}/<resource-and-group>`
pub fn object_dir(out_dir: &Path, resource_and_group: &str, obj: &Object) -> PathBuf {
    let scope = if obj.is_namespaced() {
        Path::new(NAMESPACED_DIR).join(obj.namespace())
    } else {
        PathBuf::from(CLUSTERSCOPED_DIR)
    };

    out_dir.join(scope).join(resource_and_group)
}

/// Colons are not allowed in Windows file names.
pub fn file_name(name: &str) -> String {
    format!("{}.{}", name.replace(':', "_"), EXTENSION)
}

/// Serializes `obj` and writes it below `out_dir`, replacing any previous file.
/// Serialization runs first, so a failure leaves nothing behind.
/// Uses blocking `std::fs`; async callers run it on the blocking pool.
pub fn write_yaml(
    out_dir: &Path,
    resource_and_group: &str,
    obj: &Object,
) -> Result<PathBuf, WriteError> {
    let yaml = serde_yaml::to_string(obj)?;

    let dir = object_dir(out_dir, resource_and_group, obj);

    fs::create_dir_all(&dir).map_err(|source| WriteError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let path = dir.join(file_name(obj.name()));

    fs::write(&path, yaml).map_err(|source| WriteError::WriteFile {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}
