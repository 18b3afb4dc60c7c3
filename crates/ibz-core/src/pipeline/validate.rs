use std::path::{MAIN_SEPARATOR, Path};

use crate::error::IbzError;
use crate::types::Result;

/// Characters rejected anywhere in a destination path.
const INVALID_PATH_CHARS: &[char] = &['<', '>', '"', '|'];
/// Characters additionally rejected in the final path component.
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '/', '\\'];

/// Checks run arguments before any file is opened.
///
/// The source must be an existing regular file. The destination must name a
/// file whose final component is non-empty and free of characters that any
/// mainstream platform forbids in file names.
pub fn validate_arguments(source: &Path, destination: &Path) -> Result<()> {
    if !source.is_file() {
        return Err(IbzError::SourceNotFound(source.to_path_buf()));
    }
    if !is_valid_destination(destination) {
        return Err(IbzError::InvalidDestinationName(destination.to_path_buf()));
    }
    Ok(())
}

pub fn is_valid_destination(destination: &Path) -> bool {
    let path = destination.to_string_lossy();
    if path.is_empty() {
        return false;
    }
    if path
        .chars()
        .any(|c| c.is_control() || INVALID_PATH_CHARS.contains(&c))
    {
        return false;
    }

    let file_name = path
        .rsplit(|c: char| c == MAIN_SEPARATOR || c == '/')
        .next()
        .unwrap_or_default();
    !file_name.is_empty()
        && !file_name
            .chars()
            .any(|c| c.is_control() || INVALID_FILE_NAME_CHARS.contains(&c))
}
