//! Generator configuration.
//!
//! Settings come from code, from the `kgen` command line, or from the
//! environment through [`GeneratorConfig::from_env`]:
//!
//! - `KGEN_ARCH` - architecture name, e.g. `x86-64` or `armv8-sve`
//! - `KGEN_TMPDIR` - directory for the `.s` and `.so` artifacts
//! - `KGEN_COMPILER` - whitespace-separated compilers tried before the defaults

use std::env;
use std::path::PathBuf;

use super::error::ConfigError;
use crate::isa::Arch;

pub const ENV_ARCH: &str = "KGEN_ARCH";
pub const ENV_TMPDIR: &str = "KGEN_TMPDIR";
pub const ENV_COMPILER: &str = "KGEN_COMPILER";

/// Settings shared by every thread's pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub arch: Arch,
    /// Where `<name>_<thread>.s` and `.so` are written.
    pub temp_dir: PathBuf,
    /// Compiler names or paths tried before `gcc`, `cc` and `clang`.
    pub compiler_candidates: Vec<String>,
    /// Directories searched for compilers instead of `PATH`.
    pub search_path: Option<Vec<PathBuf>>,
}

impl GeneratorConfig {
    pub fn new(arch: Arch) -> Self {
        Self {
            arch,
            temp_dir: env::temp_dir(),
            compiler_candidates: Vec::new(),
            search_path: None,
        }
    }

    /// Configuration for the build target, overridden by the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let arch = match env::var(ENV_ARCH) {
            Ok(name) if !name.trim().is_empty() => name.parse()?,
            _ => Arch::default_target()?,
        };
        let mut config = Self::new(arch);
        if let Some(dir) = env::var_os(ENV_TMPDIR).filter(|d| !d.is_empty()) {
            config.temp_dir = PathBuf::from(dir);
        }
        if let Ok(compilers) = env::var(ENV_COMPILER) {
            config.compiler_candidates = compilers.split_whitespace().map(str::to_string).collect();
        }
        log::debug!("configuration from environment: {:?}", config);
        Ok(config)
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler_candidates.push(compiler.into());
        self
    }

    pub fn with_search_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_path = Some(dirs);
        self
    }
}
