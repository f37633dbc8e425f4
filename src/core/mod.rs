// This module gathers the data kernelgen works on and the types every other module shares.
// It exports the error enums of the generation pipeline, the in-memory benchmark template
// (name, body lines, declared streams with their element type and size tokens, constants,
// variables, metrics and parameters) and the generator configuration. Nothing here emits
// code; the parser, the ISA backends, the replacement engine and the toolchain driver all
// read these types and report failures through the shared error enums.

//! Core kernelgen types.
//!
//! - [`error`] - grammar, configuration and toolchain errors
//! - [`template`] - parsed benchmark description and its builder
//! - [`config`] - generator settings and environment overrides

pub mod config;
pub mod error;
pub mod template;

pub use config::GeneratorConfig;
pub use error::{ConfigError, GrammarError, KernelError, KernelResult, ToolchainError};
pub use template::{DataType, StreamDecl, Template, TemplateBuilder};
