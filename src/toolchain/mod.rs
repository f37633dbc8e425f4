// This module is the toolchain driver of kernelgen. It turns one thread's specialized lines
// into a callable routine: the lines are written to <tmpdir>/<name>_<thread>.s, an external
// C compiler found on the search path (caller candidates first, then gcc, cc and clang)
// builds <tmpdir>/<name>_<thread>.so with -fPIC -shared plus the backend's own flags, and
// the shared object is opened with libloading and the benchmark symbol resolved. Compiler
// diagnostics on success are logged as warnings; a failing compiler, an object that cannot
// be loaded and a missing symbol are distinct errors. When the symbol is missing the
// object's symbol table is read with the object crate so the error lists what it exports.

//! External compiler and dynamic loading.
//!
//! - [`discovery`] - compiler search
//! - [`compile`] - assembly file output and the compiler subprocess
//! - [`artifact`] - loaded routine and its teardown

pub mod artifact;
pub mod compile;
pub mod discovery;

use std::path::{Path, PathBuf};

pub use artifact::{exported_symbols, KernelFn, RuntimeTestArtifact};
pub use compile::{compile, write_assembly};
pub use discovery::{find_compiler, DEFAULT_COMPILERS};

use crate::core::config::GeneratorConfig;
use crate::core::error::ToolchainError;
use crate::isa::IsaBackend;

/// `<dir>/<name>_<thread>.s` and `<dir>/<name>_<thread>.so`.
pub fn artifact_paths(dir: &Path, name: &str, thread_id: usize) -> (PathBuf, PathBuf) {
    let stem = format!("{}_{}", name, thread_id);
    (
        dir.join(format!("{}.s", stem)),
        dir.join(format!("{}.so", stem)),
    )
}

/// A resolved compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    compiler: PathBuf,
}

impl Toolchain {
    /// Search for a compiler using the configured candidates and path.
    pub fn discover(config: &GeneratorConfig) -> Result<Self, ToolchainError> {
        let compiler = find_compiler(&config.compiler_candidates, config.search_path.as_deref())?;
        Ok(Self { compiler })
    }

    pub fn with_compiler(compiler: impl Into<PathBuf>) -> Self {
        Self {
            compiler: compiler.into(),
        }
    }

    pub fn compiler(&self) -> &Path {
        &self.compiler
    }

    /// Write, compile and load one thread's routine.
    pub fn build(
        &self,
        backend: &dyn IsaBackend,
        lines: &[String],
        name: &str,
        thread_id: usize,
        dir: &Path,
    ) -> Result<RuntimeTestArtifact, ToolchainError> {
        let (asm_path, object_path) = artifact_paths(dir, name, thread_id);
        write_assembly(&asm_path, lines)?;
        compile(
            &self.compiler,
            backend.compiler_flags(),
            &asm_path,
            &object_path,
        )?;
        RuntimeTestArtifact::load(
            thread_id,
            asm_path,
            object_path,
            self.compiler.clone(),
            name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_thread_paths() {
        let (asm, obj) = artifact_paths(Path::new("/tmp"), "triad", 3);
        assert_eq!(asm, PathBuf::from("/tmp/triad_3.s"));
        assert_eq!(obj, PathBuf::from("/tmp/triad_3.so"));
    }
}
