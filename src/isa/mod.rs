// This module defines the per-architecture code-emission layer of kernelgen. Every target
// ISA implements the IsaBackend trait: an immutable, ordered register table plus the
// stack, base and link register names, and five emission primitives producing lines of
// GNU-assembler text (function header with prologue, function footer with epilogue, loop
// header, loop footer and stream-pointer load). Backends never call each other; the
// block parser and the kernel generator compose them. Arch names the five supported ISAs
// (x86, x86-64, ARMv7, ARMv8 with an SVE variant, POWER ppc64), parses target triples and
// arch names, and hands out the static backend instance, so selection is a runtime
// strategy choice rather than conditional compilation and several backends can coexist.

//! Architecture backends.
//!
//! All backends emit plain text lines; nothing here assembles or encodes.
//!
//! - [`x86`] - 32-bit and 64-bit x86 in GAS Intel syntax
//! - [`armv7`] - 32-bit ARM
//! - [`armv8`] - AArch64, optionally using SVE predicates for loop control
//! - [`ppc64`] - POWER with the hardware CTR loop counter

pub mod armv7;
pub mod armv8;
pub mod ppc64;
pub mod x86;

use std::fmt;
use std::str::FromStr;

use crate::core::error::{ConfigError, GrammarError};

pub use armv7::ArmV7Backend;
pub use armv8::ArmV8Backend;
pub use ppc64::Ppc64Backend;
pub use x86::{X86Backend, X86_64Backend};

/// Lines of assembly text.
pub type CodeLines = Vec<String>;

/// Line emitted at the end of every header, replaced by the stream-pointer loads.
pub const STREAM_POINTER_SENTINEL: &str = "#STREAM_POINTERS#";

/// Comparison between the loop register and the end register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl Direction {
    pub const fn symbol(self) -> &'static str {
        match self {
            Direction::Less => "<",
            Direction::LessEqual => "<=",
            Direction::Greater => ">",
            Direction::GreaterEqual => ">=",
            Direction::Equal => "==",
            Direction::NotEqual => "!=",
        }
    }

    /// Whether the loop register moves towards smaller values.
    pub const fn counts_down(self) -> bool {
        matches!(self, Direction::Greater | Direction::GreaterEqual)
    }

    /// Whether the end value itself is part of the iteration space.
    pub const fn is_inclusive(self) -> bool {
        matches!(self, Direction::LessEqual | Direction::GreaterEqual)
    }

    pub(crate) const fn x86_jump(self) -> &'static str {
        match self {
            Direction::Less => "jl",
            Direction::LessEqual => "jle",
            Direction::Greater => "jg",
            Direction::GreaterEqual => "jge",
            Direction::Equal => "je",
            Direction::NotEqual => "jne",
        }
    }

    /// Condition suffix of the ARM `b<cc>` and AArch64 `b.<cc>` branches.
    pub(crate) const fn arm_condition(self) -> &'static str {
        match self {
            Direction::Less => "lt",
            Direction::LessEqual => "le",
            Direction::Greater => "gt",
            Direction::GreaterEqual => "ge",
            Direction::Equal => "eq",
            Direction::NotEqual => "ne",
        }
    }
}

impl FromStr for Direction {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<" => Ok(Direction::Less),
            "<=" => Ok(Direction::LessEqual),
            ">" => Ok(Direction::Greater),
            ">=" => Ok(Direction::GreaterEqual),
            "==" => Ok(Direction::Equal),
            "!=" => Ok(Direction::NotEqual),
            other => Err(GrammarError::Direction(other.to_string())),
        }
    }
}

/// Operands of one `LOOP` region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSpec<'a> {
    pub label: &'a str,
    pub loop_reg: &'a str,
    pub start: &'a str,
    pub cond_reg: &'a str,
    pub end: &'a str,
    pub direction: Direction,
    pub step: &'a str,
}

impl LoopSpec<'_> {
    /// Start value is the literal zero and can use the target's zeroing idiom.
    pub fn starts_at_zero(&self) -> bool {
        is_zero_literal(self.start)
    }
}

pub(crate) fn is_zero_literal(value: &str) -> bool {
    matches!(value.trim(), "0" | "0x0" | "0x00")
}

/// Parse a literal integer in decimal or `0x` hexadecimal notation.
pub(crate) fn parse_literal(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -parsed } else { parsed })
}

/// Code emission primitives for one instruction set.
///
/// Implementations are stateless; the register table is immutable data owned
/// by the backend. The stream-load sentinel must be the last header line.
pub trait IsaBackend: fmt::Debug + Send + Sync {
    fn arch(&self) -> Arch;

    /// Registers that may be claimed for stream base pointers, in claim order.
    fn registers(&self) -> &[&'static str];

    fn stack_register(&self) -> &'static str;

    fn base_register(&self) -> &'static str;

    fn link_register(&self) -> Option<&'static str>;

    /// Line comment prefix understood by the assembler for this target.
    fn comment_prefix(&self) -> &'static str;

    /// Extra flags passed to the compiler driver for this target.
    fn compiler_flags(&self) -> &[&'static str] {
        &[]
    }

    /// Section/symbol directives, prologue and the stream-pointer sentinel.
    fn header(&self, function: &str) -> CodeLines;

    /// Epilogue, return and size/stack-note directives.
    fn footer(&self, function: &str) -> CodeLines;

    /// Whether `loop_header`/`loop_footer` can express this comparison.
    fn supports_direction(&self, _direction: Direction) -> bool {
        true
    }

    fn loop_header(&self, spec: &LoopSpec<'_>) -> CodeLines;

    fn loop_footer(&self, spec: &LoopSpec<'_>) -> CodeLines;

    /// Load the literal address `pointer` into `register`.
    fn stream_header(&self, register: &str, pointer: usize) -> CodeLines;

    fn comment(&self, text: &str) -> String {
        format!("{} {}", self.comment_prefix(), text)
    }
}

/// Target instruction sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86,
    X86_64,
    ArmV7,
    ArmV8,
    ArmV8Sve,
    Ppc64,
}

static X86: X86Backend = X86Backend::new();
static X86_64: X86_64Backend = X86_64Backend::new();
static ARMV7: ArmV7Backend = ArmV7Backend::new();
static ARMV8: ArmV8Backend = ArmV8Backend::new(false);
static ARMV8_SVE: ArmV8Backend = ArmV8Backend::new(true);
static PPC64: Ppc64Backend = Ppc64Backend::new();

impl Arch {
    pub const ALL: [Arch; 6] = [
        Arch::X86,
        Arch::X86_64,
        Arch::ArmV7,
        Arch::ArmV8,
        Arch::ArmV8Sve,
        Arch::Ppc64,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86-64",
            Arch::ArmV7 => "armv7",
            Arch::ArmV8 => "armv8",
            Arch::ArmV8Sve => "armv8-sve",
            Arch::Ppc64 => "ppc64",
        }
    }

    /// The backend instance for this architecture.
    pub fn backend(self) -> &'static dyn IsaBackend {
        match self {
            Arch::X86 => &X86,
            Arch::X86_64 => &X86_64,
            Arch::ArmV7 => &ARMV7,
            Arch::ArmV8 => &ARMV8,
            Arch::ArmV8Sve => &ARMV8_SVE,
            Arch::Ppc64 => &PPC64,
        }
    }

    /// Map a target triple such as `aarch64-unknown-linux-gnu` to an arch.
    ///
    /// SVE cannot be read from the triple, so the caller states it.
    pub fn from_triple(triple: &str, sve: bool) -> Result<Self, ConfigError> {
        let machine = triple.split('-').next().unwrap_or_default();
        match machine {
            "x86_64" | "amd64" => Ok(Arch::X86_64),
            "i386" | "i486" | "i586" | "i686" | "x86" => Ok(Arch::X86),
            "aarch64" | "arm64" if sve => Ok(Arch::ArmV8Sve),
            "aarch64" | "arm64" => Ok(Arch::ArmV8),
            m if m.starts_with("armv7") || m.starts_with("thumbv7") || m == "arm" => {
                Ok(Arch::ArmV7)
            }
            "powerpc64" | "powerpc64le" | "ppc64" | "ppc64le" => Ok(Arch::Ppc64),
            _ => Err(ConfigError::UnknownArch(triple.to_string())),
        }
    }

    /// The arch of the target this crate was built for.
    pub fn default_target() -> Result<Self, ConfigError> {
        Self::from_triple(
            env!("KGEN_DEFAULT_TARGET"),
            env!("KGEN_DEFAULT_SVE") == "1",
        )
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Arch {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some(arch) = Arch::ALL.iter().find(|a| a.name() == lower) {
            return Ok(*arch);
        }
        match lower.as_str() {
            "x86_64" | "amd64" => Ok(Arch::X86_64),
            "aarch64" | "arm64" => Ok(Arch::ArmV8),
            "aarch64-sve" | "sve" => Ok(Arch::ArmV8Sve),
            "power" | "ppc64le" => Ok(Arch::Ppc64),
            _ => Err(ConfigError::UnknownArch(s.to_string())),
        }
    }
}
