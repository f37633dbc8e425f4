// This module defines error types for kernelgen using the thiserror crate for idiomatic
// Rust error handling. GrammarError covers every way a template body can be structurally
// malformed: missing, mismatched or re-opened begin/end markers, wrong argument counts,
// label mismatches, bad register bindings, and loop directions that are unknown or that
// the target cannot express. ConfigError covers problems binding a template to a concrete
// thread (too many streams for the backend's register table, extents that do not match
// the declared size tokens, unknown arch or element type names, stream sizes that do not
// fit in memory). ToolchainError covers compiler discovery, the compiler subprocess and
// dynamic loading, keeping load and symbol-resolution failures distinct. KernelError
// wraps all three, and KernelResult<T> is the convenience alias used by the pipeline.

//! Error types for kernelgen.
//!
//! Using thiserror for more idiomatic error handling.

use std::path::PathBuf;
use thiserror::Error;

/// Structural errors in the block-keyword template language.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    #[error("expected `{tag}(` on line `{line}`")]
    MissingPrefix { tag: &'static str, line: String },

    #[error("malformed keyword marker `{line}`: {reason}")]
    MalformedMarker { line: String, reason: &'static str },

    #[error("{tag} expects {expected} arguments, found {found} in `{line}`")]
    ArgumentCount {
        tag: &'static str,
        expected: usize,
        found: usize,
        line: String,
    },

    #[error("{tag} block `{open}` closed by label `{close}`")]
    LabelMismatch {
        tag: &'static str,
        open: String,
        close: String,
    },

    #[error("block `{label}` opened by {open_tag} closed by {close_tag}")]
    KeywordMismatch {
        label: String,
        open_tag: &'static str,
        close_tag: &'static str,
    },

    #[error("{tag} block `{label}` opened again inside itself")]
    DuplicateLabel { tag: &'static str, label: String },

    #[error("{tag} block `{label}` is never closed")]
    UnmatchedOpen { tag: &'static str, label: String },

    #[error("{tag} for `{label}` without a preceding open")]
    UnmatchedClose { tag: &'static str, label: String },

    #[error("expected `register=value` in {tag} argument `{arg}`")]
    RegisterBinding { tag: &'static str, arg: String },

    #[error("unknown loop direction `{0}`")]
    Direction(String),

    #[error("loop direction `{direction}` has no {arch} loop form")]
    UnsupportedDirection {
        arch: &'static str,
        direction: &'static str,
    },

    #[error("{tag} block `{label}` has an empty body")]
    EmptyBody { tag: &'static str, label: String },

    #[error("expansion made no progress on `{line}`")]
    NoProgress { line: String },
}

/// Errors binding a parsed template to one worker thread.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{streams} streams declared but only {free} registers are free on {arch}")]
    RegistersExhausted {
        arch: &'static str,
        streams: usize,
        free: usize,
    },

    #[error("stream `{stream}` declares {declared} dimensions, binding has {bound}")]
    ExtentMismatch {
        stream: String,
        declared: usize,
        bound: usize,
    },

    #[error("template declares {declared} streams, binding has {bound}")]
    StreamCount { declared: usize, bound: usize },

    #[error("unknown architecture `{0}`")]
    UnknownArch(String),

    #[error("unknown data type `{0}`")]
    UnknownDataType(String),

    #[error("{dtype} stream of extents {extents:?} does not fit in memory")]
    StreamTooLarge {
        dtype: &'static str,
        extents: Vec<u64>,
    },
}

/// Errors from the external compiler and the dynamic loader.
#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("no compiler found, tried {candidates:?}")]
    CompilerNotFound { candidates: Vec<String> },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}:\n{output}")]
    CompilerFailed {
        command: String,
        status: String,
        output: String,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("symbol `{symbol}` not found in {path} (exports: {exported:?}): {source}")]
    Symbol {
        symbol: String,
        path: PathBuf,
        exported: Vec<String>,
        #[source]
        source: libloading::Error,
    },
}

/// Top-level error of the kernel generation pipeline.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("grammar error in template `{template}`: {source}")]
    Grammar {
        template: String,
        #[source]
        source: GrammarError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
}

impl KernelError {
    /// Attach the template name to a grammar error.
    pub fn grammar(template: &str, source: GrammarError) -> Self {
        KernelError::Grammar {
            template: template.to_string(),
            source,
        }
    }
}

/// Result type alias for the generation pipeline.
pub type KernelResult<T> = Result<T, KernelError>;
