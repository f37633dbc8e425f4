//! In-memory benchmark template.
//!
//! A [`Template`] is what the (external) description-file loader produces: the
//! benchmark name, the body text in the block-keyword language, the declared
//! streams and the named constants, variables, metrics and parameters. The
//! generator only ever reads it.

use std::fmt;
use std::str::FromStr;

use super::error::ConfigError;

/// Numeric kind of a stream element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    Int64,
    Float,
    Double,
}

impl DataType {
    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            DataType::Int | DataType::Float => 4,
            DataType::Int64 | DataType::Double => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DataType::Int => "int",
            DataType::Int64 => "int64",
            DataType::Float => "float",
            DataType::Double => "double",
        }
    }
}

impl FromStr for DataType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "int32" => Ok(DataType::Int),
            "int64" | "long" => Ok(DataType::Int64),
            "float" | "single" => Ok(DataType::Float),
            "double" => Ok(DataType::Double),
            other => Err(ConfigError::UnknownDataType(other.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A declared data stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDecl {
    /// Token used for the stream's base register in the body, e.g. `STR0`.
    pub name: String,
    pub dtype: DataType,
    /// One size token per dimension, e.g. `["N"]` or `["ROWS", "COLS"]`.
    pub dims: Vec<String>,
}

impl StreamDecl {
    pub fn new(name: impl Into<String>, dtype: DataType, dims: &[&str]) -> Self {
        Self {
            name: name.into(),
            dtype,
            dims: dims.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dims.len()
    }
}

/// Parsed benchmark description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub body: Vec<String>,
    pub streams: Vec<StreamDecl>,
    pub constants: Vec<(String, String)>,
    pub variables: Vec<(String, String)>,
    pub metrics: Vec<(String, String)>,
    pub parameters: Vec<(String, String)>,
}

impl Template {
    pub fn builder(name: impl Into<String>) -> TemplateBuilder {
        TemplateBuilder {
            template: Template {
                name: name.into(),
                ..Template::default()
            },
        }
    }
}

/// Incremental construction of a [`Template`].
#[derive(Debug)]
pub struct TemplateBuilder {
    template: Template,
}

impl TemplateBuilder {
    /// Append body text; multi-line strings are split into lines.
    pub fn body(mut self, text: &str) -> Self {
        self.template
            .body
            .extend(text.lines().map(|l| l.to_string()));
        self
    }

    pub fn stream(mut self, stream: StreamDecl) -> Self {
        self.template.streams.push(stream);
        self
    }

    pub fn constant(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.template.constants.push((key.into(), value.into()));
        self
    }

    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.template.variables.push((key.into(), value.into()));
        self
    }

    pub fn metric(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.template.metrics.push((key.into(), value.into()));
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.template.parameters.push((key.into(), value.into()));
        self
    }

    pub fn build(self) -> Template {
        self.template
    }
}
