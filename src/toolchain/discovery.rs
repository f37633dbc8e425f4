//! Compiler discovery on the search path.

use std::env;
use std::path::PathBuf;

use crate::core::error::ToolchainError;

/// Compilers tried after the caller's candidates.
pub const DEFAULT_COMPILERS: &[&str] = &["gcc", "cc", "clang"];

/// Caller candidates first, then [`DEFAULT_COMPILERS`], without duplicates.
pub fn candidate_list(preferred: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(preferred.len() + DEFAULT_COMPILERS.len());
    for name in preferred
        .iter()
        .map(String::as_str)
        .chain(DEFAULT_COMPILERS.iter().copied())
    {
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// Find the first executable candidate.
///
/// Names are looked up in `search_path` when given and in `PATH` otherwise;
/// candidates containing a path separator are checked as paths.
pub fn find_compiler(
    preferred: &[String],
    search_path: Option<&[PathBuf]>,
) -> Result<PathBuf, ToolchainError> {
    let candidates = candidate_list(preferred);
    let joined = match search_path {
        Some(dirs) => env::join_paths(dirs).ok(),
        None => env::var_os("PATH"),
    };
    let cwd = env::current_dir().unwrap_or_default();

    for name in &candidates {
        let found = match &joined {
            Some(paths) => which::which_in(name, Some(paths), &cwd),
            None => which::which(name),
        };
        match found {
            Ok(path) => {
                log::debug!("using compiler {}", path.display());
                return Ok(path);
            }
            Err(err) => log::trace!("compiler candidate `{}` rejected: {}", name, err),
        }
    }
    Err(ToolchainError::CompilerNotFound { candidates })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_candidates_come_first() {
        let list = candidate_list(&["clang".to_string(), "aarch64-linux-gnu-gcc".to_string()]);
        assert_eq!(list, vec!["clang", "aarch64-linux-gnu-gcc", "gcc", "cc"]);
    }

    #[test]
    fn empty_search_path_finds_nothing() {
        let err = find_compiler(&["kgen-no-such-cc".to_string()], Some(&[])).unwrap_err();
        match err {
            ToolchainError::CompilerNotFound { candidates } => {
                assert_eq!(candidates[0], "kgen-no-such-cc");
                assert_eq!(candidates.len(), 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
