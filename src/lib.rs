//! kernelgen - micro-benchmark kernel compiler.
//!
//! kernelgen expands a small block-keyword templating language into one
//! specialized assembly routine per worker thread, with that thread's stream
//! addresses and sizes baked in as literal constants, compiles it with an
//! external C compiler and loads it for timed execution.
//!
//! # Primary Usage
//!
//! ```ignore
//! use kernelgen::{Arch, DataType, GeneratorConfig, KernelGenerator, StreamBuffer, StreamDecl, Template, ThreadBinding};
//!
//! let template = Template::builder("copy")
//!     .body("LOOP(l, rax=0, <, rdi=N, 1)\nmov rdx, [STR0 + 8*rax]\nLOOPEND(l)")
//!     .stream(StreamDecl::new("STR0", DataType::Double, &["N"]))
//!     .build();
//! let generator = KernelGenerator::new(&template, GeneratorConfig::new(Arch::X86_64))?;
//!
//! let mut buffer = StreamBuffer::allocate(DataType::Double, &[1024])?;
//! let binding = ThreadBinding::new(0, vec![buffer.binding()]);
//! let artifact = generator.build_thread(&binding)?;
//! unsafe { artifact.call() };
//! ```
//!
//! # Architecture
//!
//! - [`core`] - errors, the template model and configuration
//! - [`isa`] - per-architecture emission backends
//! - [`parser`] - keyword registry and recursive block expansion
//! - [`replacement`] - per-thread symbolic binding
//! - [`stream`] - thread bindings and aligned stream buffers
//! - [`toolchain`] - compiler discovery, compilation and loading
//! - [`generator`] - the end-to-end pipeline

pub mod core;
pub mod generator;
pub mod isa;
pub mod parser;
pub mod replacement;
pub mod stream;
pub mod toolchain;

pub use crate::core::{
    // Errors
    ConfigError, GrammarError, KernelError, KernelResult, ToolchainError,
    // Template model
    DataType, StreamDecl, Template, TemplateBuilder,
    // Configuration
    GeneratorConfig,
};
pub use generator::{KernelGenerator, KernelSkeleton};
pub use isa::{Arch, CodeLines, Direction, IsaBackend, LoopSpec, STREAM_POINTER_SENTINEL};
pub use parser::{BlockParser, KeywordContext, KeywordDefinition, KEYWORDS};
pub use replacement::ReplacementTable;
pub use stream::{StreamBinding, StreamBuffer, ThreadBinding};
pub use toolchain::{KernelFn, RuntimeTestArtifact, Toolchain};
