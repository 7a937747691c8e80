//! Mapping command names to executable files on the search path.

use crate::state::ShellState;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

const PATH_KEY: &str = "PATH";

#[cfg(windows)]
const DEFAULT_PATHEXT: &str = ".COM;.EXE;.BAT;.CMD";

/// Resolve `name` the way the shell launches external commands.
///
/// Uses the state's `PATH` and working directory; on Windows the `PATHEXT`
/// extensions are tried for names without one.
pub fn resolve(name: &str, state: &ShellState) -> Option<PathBuf> {
    let search_paths = state.get_var(PATH_KEY).unwrap_or_default();
    let found = find_command_path(
        OsStr::new(&search_paths),
        &state.current_dir,
        Path::new(name),
        &executable_extensions(state),
    );
    log::debug!("resolve {name:?} -> {found:?}");
    found
}

/// Extensions tried for extension-less names, lower-cased, in configured order.
#[cfg(windows)]
pub fn executable_extensions(state: &ShellState) -> Vec<String> {
    state
        .get_var("PATHEXT")
        .unwrap_or_else(|| DEFAULT_PATHEXT.to_string())
        .split(';')
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(not(windows))]
pub fn executable_extensions(_state: &ShellState) -> Vec<String> {
    Vec::new()
}

/// Resolve a command path.
///
/// Behavior:
/// - Empty name: `None`.
/// - Name with more than one component (`/bin/sh`, `./run`, `bin/tool`): checked
///   directly, relative names against `cwd`.
/// - Single component: each directory of `search_paths` is tried in order, an empty
///   entry meaning `cwd`; the first executable match wins.
pub fn find_command_path(
    search_paths: &OsStr,
    cwd: &Path,
    name: &Path,
    extensions: &[String],
) -> Option<PathBuf> {
    let mut components = name.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(_), None) if !name.is_absolute() => {
            find_in_path(search_paths, cwd, name.as_os_str(), extensions)
        }
        _ => executable_at(&cwd.join(name), extensions),
    }
}

fn find_in_path(
    search_paths: &OsStr,
    cwd: &Path,
    cmd: &OsStr,
    extensions: &[String],
) -> Option<PathBuf> {
    std::env::split_paths(search_paths).find_map(|dir| {
        let dir = if dir.as_os_str().is_empty() {
            cwd.to_path_buf()
        } else {
            cwd.join(dir)
        };
        executable_at(&dir.join(cmd), extensions)
    })
}

/// Try `path` itself when it already has an extension (or none are configured),
/// otherwise `path` + each extension in order.
fn executable_at(path: &Path, extensions: &[String]) -> Option<PathBuf> {
    if extensions.is_empty() || path.extension().is_some() {
        return is_executable(path).then(|| path.to_path_buf());
    }
    extensions.iter().find_map(|ext| {
        let mut candidate = path.as_os_str().to_owned();
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        is_executable(&candidate).then_some(candidate)
    })
}

/// Regular file the current user may execute, as decided by `access(2)`.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use nix::unistd::{AccessFlags, access};
    path.is_file() && access(path, AccessFlags::X_OK).is_ok()
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}
