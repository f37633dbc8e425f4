//! Template language parser.
//!
//! - [`args`] - marker syntax `TAG(arg0, ...)`
//! - [`keyword`] - keyword registry and the built-in `LOOP`/`BLOCK` keywords
//! - [`expand`] - recursive pre/body/post expansion driver

pub mod args;
pub mod expand;
pub mod keyword;

pub use expand::BlockParser;
pub use keyword::{KeywordContext, KeywordDefinition, ParseFn, BLOCK, KEYWORDS, LOOP};

use crate::core::error::GrammarError;
use crate::core::template::Template;
use crate::isa::{CodeLines, IsaBackend};

/// Expand a template body with the built-in keywords.
pub fn expand_body(template: &Template, backend: &dyn IsaBackend) -> Result<CodeLines, GrammarError> {
    let ctx = KeywordContext { backend, template };
    BlockParser::new(KEYWORDS, ctx).expand(template.body.clone())
}
