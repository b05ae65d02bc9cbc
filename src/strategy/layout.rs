//! Resolution of configuration files inside the folder.

use std::path::{Path, PathBuf};

use crate::memory::FileIdentity;

/// Extensions in precedence order: the main extension, then the scanning
/// order, without duplicates.
pub fn extension_order(main_extension: &str, scanning: &[String]) -> Vec<String> {
    let mut order = vec![main_extension.to_string()];
    for ext in scanning {
        if !order.contains(ext) {
            order.push(ext.clone());
        }
    }
    order
}

/// The active file for `key_prefix`: the first extension in precedence
/// order that exists on disk.
pub fn find_config_file(
    folder: &Path,
    key_prefix: &str,
    main_extension: &str,
    scanning: &[String],
) -> Option<(PathBuf, String)> {
    extension_order(main_extension, scanning)
        .into_iter()
        .map(|ext| (folder.join(format!("{}{}", key_prefix, ext)), ext))
        .find(|(path, _)| path.is_file())
}

/// Identity of an extra resource file, `None` when its extension is not allowed.
pub fn extra_identity(folder: &Path, relative: &str, allowed: &[String]) -> Option<FileIdentity> {
    let extension = allowed.iter().find(|ext| relative.ends_with(ext.as_str()))?;
    let full = folder.join(relative);
    let name = full.file_name()?.to_str()?;
    let stem = name.strip_suffix(extension.as_str())?;
    let parent = full.parent().unwrap_or(folder);
    Some(FileIdentity::new(parent, stem, extension))
}
