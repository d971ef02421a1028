use std::path::Path;

pub use inisync::types::validate_file_name;

/// Validate file path exists and is readable
pub fn validate_file_path(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("File does not exist: {}", path.display()));
    }

    if !path.is_file() {
        return Err(format!("Path is not a file: {}", path.display()));
    }

    Ok(())
}

/// Validate output file's directory exists or can be created
pub fn validate_output_path(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        validate_output_dir(parent)?;
    }
    Ok(())
}

/// Validate output directory exists or can be created
pub fn validate_output_dir(dir: &Path) -> Result<(), String> {
    if dir.is_file() {
        return Err(format!("Output path is a file: {}", dir.display()));
    }
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("Cannot create output directory: {}", e))?;
    }
    Ok(())
}
