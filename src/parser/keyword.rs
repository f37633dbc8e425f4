// This module holds the keyword grammar of the template language. A KeywordDefinition pairs
// a begin tag and an end tag with the parse function that turns one complete region (both
// marker lines included) into backend-specific lines. The process-wide registry KEYWORDS
// is an immutable static slice; new keywords are added by appending entries. Two
// keywords are built in. LOOP(label, reg=start, direction, reg=end, step) ... LOOPEND(label)
// wraps its interior in the active backend's loop header and footer. BLOCK(label) ...
// BLOCKEND(label) is a pass-through delimiter whose only effect is to comment out its own
// markers. Both keep their marker lines as comments so the emitted assembly can be traced
// back to the template. Nested regions inside the interior are left to the block parser.

//! Keyword definitions and the built-in `LOOP` and `BLOCK` keywords.

use crate::core::error::GrammarError;
use crate::core::template::Template;
use crate::isa::{CodeLines, Direction, IsaBackend, LoopSpec};

use super::args::{has_tag, parse_arguments, split_binding};

/// Read-only state available to keyword parse functions.
#[derive(Clone, Copy)]
pub struct KeywordContext<'a> {
    pub backend: &'a dyn IsaBackend,
    pub template: &'a Template,
}

/// Expands one region, marker lines included, into plain lines.
pub type ParseFn = fn(&KeywordContext<'_>, &[String]) -> Result<CodeLines, GrammarError>;

/// A block keyword: begin tag, end tag and expansion.
#[derive(Clone, Copy)]
pub struct KeywordDefinition {
    pub begin_tag: &'static str,
    pub end_tag: &'static str,
    pub parse: ParseFn,
}

impl KeywordDefinition {
    pub fn opens(&self, line: &str) -> bool {
        has_tag(line, self.begin_tag)
    }

    pub fn closes(&self, line: &str) -> bool {
        has_tag(line, self.end_tag)
    }
}

impl std::fmt::Debug for KeywordDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordDefinition")
            .field("begin_tag", &self.begin_tag)
            .field("end_tag", &self.end_tag)
            .finish()
    }
}

pub const LOOP: KeywordDefinition = KeywordDefinition {
    begin_tag: "LOOP",
    end_tag: "LOOPEND",
    parse: parse_loop,
};

pub const BLOCK: KeywordDefinition = KeywordDefinition {
    begin_tag: "BLOCK",
    end_tag: "BLOCKEND",
    parse: parse_passthrough,
};

/// Built-in keyword registry.
pub static KEYWORDS: &[KeywordDefinition] = &[LOOP, BLOCK];

/// Marker lines of a region plus their arguments.
struct Region<'b> {
    begin: &'b str,
    end: &'b str,
    begin_args: Vec<String>,
    interior: &'b [String],
}

fn split_region<'b>(
    keyword: &KeywordDefinition,
    body: &'b [String],
    begin_arity: usize,
) -> Result<Region<'b>, GrammarError> {
    let begin = body.first().map(String::as_str).unwrap_or_default();
    if !keyword.opens(begin) {
        return Err(GrammarError::MissingPrefix {
            tag: keyword.begin_tag,
            line: begin.to_string(),
        });
    }
    let end = match body.last() {
        Some(line) if body.len() > 1 && keyword.closes(line) => line.as_str(),
        other => {
            return Err(GrammarError::MissingPrefix {
                tag: keyword.end_tag,
                line: other.cloned().unwrap_or_default(),
            })
        }
    };

    let begin_args = parse_arguments(begin)?;
    if begin_args.len() != begin_arity {
        return Err(GrammarError::ArgumentCount {
            tag: keyword.begin_tag,
            expected: begin_arity,
            found: begin_args.len(),
            line: begin.trim().to_string(),
        });
    }
    let end_args = parse_arguments(end)?;
    if end_args.len() != 1 {
        return Err(GrammarError::ArgumentCount {
            tag: keyword.end_tag,
            expected: 1,
            found: end_args.len(),
            line: end.trim().to_string(),
        });
    }
    if end_args[0] != begin_args[0] {
        return Err(GrammarError::LabelMismatch {
            tag: keyword.begin_tag,
            open: begin_args[0].clone(),
            close: end_args[0].clone(),
        });
    }

    Ok(Region {
        begin,
        end,
        begin_args,
        interior: &body[1..body.len() - 1],
    })
}

/// `LOOP(label, reg=start, direction, reg=end, step)` ... `LOOPEND(label)`.
pub fn parse_loop(ctx: &KeywordContext<'_>, body: &[String]) -> Result<CodeLines, GrammarError> {
    let region = split_region(&LOOP, body, 5)?;
    let args = &region.begin_args;

    let (loop_reg, start) = split_binding(LOOP.begin_tag, &args[1])?;
    let direction: Direction = args[2].parse()?;
    if !ctx.backend.supports_direction(direction) {
        return Err(GrammarError::UnsupportedDirection {
            arch: ctx.backend.arch().name(),
            direction: direction.symbol(),
        });
    }
    let (cond_reg, end) = split_binding(LOOP.begin_tag, &args[3])?;
    let spec = LoopSpec {
        label: &args[0],
        loop_reg,
        start,
        cond_reg,
        end,
        direction,
        step: &args[4],
    };
    log::trace!(
        "loop `{}`: {}={} {} {}={} step {}",
        spec.label,
        loop_reg,
        start,
        direction.symbol(),
        cond_reg,
        end,
        spec.step
    );

    let mut code = Vec::with_capacity(region.interior.len() + 16);
    code.push(ctx.backend.comment(region.begin.trim()));
    code.extend(ctx.backend.loop_header(&spec));
    code.extend(region.interior.iter().cloned());
    code.extend(ctx.backend.loop_footer(&spec));
    code.push(ctx.backend.comment(region.end.trim()));
    Ok(code)
}

/// `BLOCK(label)` ... `BLOCKEND(label)`: comments out the markers only.
pub fn parse_passthrough(
    ctx: &KeywordContext<'_>,
    body: &[String],
) -> Result<CodeLines, GrammarError> {
    let region = split_region(&BLOCK, body, 1)?;
    if region.interior.is_empty() {
        return Err(GrammarError::EmptyBody {
            tag: BLOCK.begin_tag,
            label: region.begin_args[0].clone(),
        });
    }

    let mut code = Vec::with_capacity(region.interior.len() + 2);
    code.push(ctx.backend.comment(region.begin.trim()));
    code.extend(region.interior.iter().cloned());
    code.push(ctx.backend.comment(region.end.trim()));
    Ok(code)
}
