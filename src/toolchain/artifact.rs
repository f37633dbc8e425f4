//! Loaded per-thread routines.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use libloading::Library;
use object::{Object, ObjectSymbol};

use crate::core::error::ToolchainError;

/// Signature of a generated routine. Addresses and sizes are baked in, so
/// it takes no arguments.
pub type KernelFn = unsafe extern "C" fn();

/// Files, loader handle and entry point of one thread's routine.
pub struct RuntimeTestArtifact {
    pub thread_id: usize,
    pub asm_path: PathBuf,
    pub object_path: PathBuf,
    pub compiler: PathBuf,
    pub symbol: String,
    library: Option<Library>,
    function: Option<KernelFn>,
}

impl RuntimeTestArtifact {
    /// Open `object_path` and resolve `symbol` in it.
    pub fn load(
        thread_id: usize,
        asm_path: PathBuf,
        object_path: PathBuf,
        compiler: PathBuf,
        symbol: &str,
    ) -> Result<Self, ToolchainError> {
        let library = unsafe { Library::new(&object_path) }.map_err(|source| {
            ToolchainError::Load {
                path: object_path.clone(),
                source,
            }
        })?;

        let mut name = symbol.as_bytes().to_vec();
        name.push(0);
        let function: KernelFn = unsafe {
            *library.get::<KernelFn>(&name).map_err(|source| ToolchainError::Symbol {
                symbol: symbol.to_string(),
                path: object_path.clone(),
                exported: exported_symbols(&object_path),
                source,
            })?
        };
        log::info!(
            "thread {}: loaded `{}` from {}",
            thread_id,
            symbol,
            object_path.display()
        );

        Ok(Self {
            thread_id,
            asm_path,
            object_path,
            compiler,
            symbol: symbol.to_string(),
            library: Some(library),
            function: Some(function),
        })
    }

    /// Entry point, or `None` after [`teardown`](Self::teardown).
    pub fn function(&self) -> Option<KernelFn> {
        self.function
    }

    pub fn is_loaded(&self) -> bool {
        self.library.is_some()
    }

    /// Run the routine once.
    ///
    /// # Safety
    ///
    /// The routine dereferences the stream addresses it was specialized
    /// with; those buffers must be alive and large enough.
    pub unsafe fn call(&self) -> bool {
        match self.function {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }

    /// Release the loader handle. The `.s` and `.so` files are kept.
    pub fn teardown(&mut self) {
        self.function = None;
        if self.library.take().is_some() {
            log::debug!("thread {}: unloaded {}", self.thread_id, self.object_path.display());
        }
    }
}

impl fmt::Debug for RuntimeTestArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeTestArtifact")
            .field("thread_id", &self.thread_id)
            .field("asm_path", &self.asm_path)
            .field("object_path", &self.object_path)
            .field("compiler", &self.compiler)
            .field("symbol", &self.symbol)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Names of the defined global symbols of a shared object.
///
/// The dynamic symbol table is preferred; objects without one fall back to
/// the static table. Unreadable files yield an empty list.
pub fn exported_symbols(path: &Path) -> Vec<String> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            log::debug!("cannot read {}: {}", path.display(), err);
            return Vec::new();
        }
    };
    let file = match object::File::parse(&*data) {
        Ok(file) => file,
        Err(err) => {
            log::debug!("cannot parse {}: {}", path.display(), err);
            return Vec::new();
        }
    };

    let mut names = global_definitions(file.dynamic_symbols());
    if names.is_empty() {
        names = global_definitions(file.symbols());
    }
    names.sort();
    names.dedup();
    names
}

fn global_definitions<'data, S: ObjectSymbol<'data>>(
    symbols: impl Iterator<Item = S>,
) -> Vec<String> {
    symbols
        .filter(|s| s.is_definition() && s.is_global())
        .filter_map(|s| s.name().ok().map(str::to_string))
        .filter(|n| !n.is_empty())
        .collect()
}
