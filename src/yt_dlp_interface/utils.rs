use std::path::{Path, PathBuf};

pub fn is_executable_present(path: &Path) -> bool {
    path.is_file() && is_executable(path)
}

pub fn is_executable(path: &Path) -> bool {
    #[cfg(windows)]
    {
        path.extension().map_or(false, |ext| ext == "exe")
    }
    #[cfg(not(windows))]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path).map_or(false, |metadata| {
            let permissions = metadata.permissions();
            permissions.mode() & 0o111 != 0
        })
    }
}

pub fn executable_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Finds an external tool: an explicitly configured path wins, then the
/// bundled copy under `lib/`, then the first match on `PATH`.
pub fn locate_tool(explicit: Option<&Path>, name: &str, bundled: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return is_executable_present(path).then(|| path.to_path_buf());
    }
    if is_executable_present(bundled) {
        return Some(bundled.to_path_buf());
    }
    let file_name = executable_name(name);
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(&file_name))
            .find(|candidate| is_executable_present(candidate))
    })
}

/// The most useful line of a tool's stderr: the last `ERROR:` line, or the
/// last non-empty line when none is marked.
pub fn last_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find_map(|line| line.strip_prefix("ERROR:"))
        .or_else(|| lines.last().copied())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}
