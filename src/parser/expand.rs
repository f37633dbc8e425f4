//! Recursive block expansion.
//!
//! The parser works on the flat line buffer. One pass splits the buffer into
//! *pre*, *body* and *post* around the first keyword region, hands *body* to
//! the keyword's parse function, fully expands what comes back and splices
//! it between *pre* and *post*. [`BlockParser::expand`] repeats passes until
//! no marker is left, which peels sibling regions off one at a time.

use crate::core::error::GrammarError;
use crate::isa::CodeLines;

use super::args::parse_arguments;
use super::keyword::{KeywordContext, KeywordDefinition};

/// Nesting depth at which expansion is abandoned.
const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Marker {
    Open(usize, String),
    Close(usize, String),
}

/// Expands keyword regions using a keyword registry and one backend.
pub struct BlockParser<'a> {
    registry: &'a [KeywordDefinition],
    ctx: KeywordContext<'a>,
}

impl<'a> BlockParser<'a> {
    pub fn new(registry: &'a [KeywordDefinition], ctx: KeywordContext<'a>) -> Self {
        Self { registry, ctx }
    }

    /// Fully expand `lines`.
    pub fn expand(&self, lines: CodeLines) -> Result<CodeLines, GrammarError> {
        self.expand_at(lines, 0)
    }

    /// Whether any line is a begin or end marker of a registered keyword.
    pub fn has_markers(&self, lines: &[String]) -> bool {
        lines
            .iter()
            .any(|line| self.registry.iter().any(|kw| kw.opens(line) || kw.closes(line)))
    }

    fn expand_at(&self, lines: CodeLines, depth: usize) -> Result<CodeLines, GrammarError> {
        let mut current = lines;
        loop {
            match self.expand_once(&current, depth)? {
                None => return Ok(current),
                Some(next) if next == current => {
                    return Err(self.no_progress(&current));
                }
                Some(next) => current = next,
            }
        }
    }

    fn no_progress(&self, lines: &[String]) -> GrammarError {
        let line = lines
            .iter()
            .find(|l| self.registry.iter().any(|kw| kw.opens(l) || kw.closes(l)))
            .cloned()
            .unwrap_or_default();
        GrammarError::NoProgress { line }
    }

    fn classify(&self, line: &str) -> Result<Option<Marker>, GrammarError> {
        for (idx, kw) in self.registry.iter().enumerate() {
            let open = kw.opens(line);
            if open || kw.closes(line) {
                let label = parse_arguments(line)?.into_iter().next().unwrap_or_default();
                return Ok(Some(if open {
                    Marker::Open(idx, label)
                } else {
                    Marker::Close(idx, label)
                }));
            }
        }
        Ok(None)
    }

    /// Expand the first region of `lines`, or `None` when there is none.
    fn expand_once(
        &self,
        lines: &[String],
        depth: usize,
    ) -> Result<Option<CodeLines>, GrammarError> {
        let mut first = None;
        for (idx, line) in lines.iter().enumerate() {
            match self.classify(line)? {
                Some(Marker::Open(kw, label)) => {
                    first = Some((idx, kw, label));
                    break;
                }
                Some(Marker::Close(kw, label)) => {
                    return Err(GrammarError::UnmatchedClose {
                        tag: self.registry[kw].end_tag,
                        label,
                    });
                }
                None => {}
            }
        }
        let Some((open_idx, keyword, label)) = first else {
            return Ok(None);
        };

        if depth >= MAX_NESTING {
            return Err(GrammarError::NoProgress {
                line: lines[open_idx].clone(),
            });
        }

        let mut open: Vec<(usize, String)> = vec![(keyword, label)];
        let mut close_idx = None;
        for (idx, line) in lines.iter().enumerate().skip(open_idx + 1) {
            match self.classify(line)? {
                Some(Marker::Open(kw, label)) => {
                    // A same-label end tag would close the outer region first.
                    if open.iter().any(|(k, l)| *k == kw && *l == label) {
                        return Err(GrammarError::DuplicateLabel {
                            tag: self.registry[kw].begin_tag,
                            label,
                        });
                    }
                    open.push((kw, label));
                }
                Some(Marker::Close(kw, label)) => {
                    let Some((open_kw, open_label)) = open.pop() else {
                        unreachable!("region closed before its end was found");
                    };
                    if open_kw != kw {
                        return Err(GrammarError::KeywordMismatch {
                            label: open_label,
                            open_tag: self.registry[open_kw].begin_tag,
                            close_tag: self.registry[kw].end_tag,
                        });
                    }
                    if open_label != label {
                        return Err(GrammarError::LabelMismatch {
                            tag: self.registry[open_kw].begin_tag,
                            open: open_label,
                            close: label,
                        });
                    }
                    if open.is_empty() {
                        close_idx = Some(idx);
                        break;
                    }
                }
                None => {}
            }
        }
        let Some(close_idx) = close_idx else {
            let (kw, label) = open.pop().unwrap_or_default();
            return Err(GrammarError::UnmatchedOpen {
                tag: self.registry[kw].begin_tag,
                label,
            });
        };

        let definition = &self.registry[keyword];
        log::trace!(
            "expanding {} region at lines {}..={} (depth {})",
            definition.begin_tag,
            open_idx,
            close_idx,
            depth
        );
        let produced = (definition.parse)(&self.ctx, &lines[open_idx..=close_idx])?;
        let expanded = self.expand_at(produced, depth + 1)?;

        let mut out = Vec::with_capacity(lines.len() + expanded.len());
        out.extend_from_slice(&lines[..open_idx]);
        out.extend(expanded);
        out.extend_from_slice(&lines[close_idx + 1..]);
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::template::Template;
    use crate::isa::Arch;
    use crate::parser::KEYWORDS;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn expand(text: &str) -> Result<CodeLines, GrammarError> {
        let t = Template::default();
        let ctx = KeywordContext {
            backend: Arch::X86_64.backend(),
            template: &t,
        };
        BlockParser::new(KEYWORDS, ctx).expand(lines(text))
    }

    #[test]
    fn plain_lines_pass_through() {
        let out = expand("mov rax, 1\nadd rax, rbx").unwrap();
        assert_eq!(out, vec!["mov rax, 1", "add rax, rbx"]);
    }

    #[test]
    fn pre_and_post_are_kept_in_place() {
        let out = expand("vzeroall\nLOOP(l, rax=0, <, rdi=N, 1)\nnop\nLOOPEND(l)\nsfence").unwrap();
        assert_eq!(out.first().unwrap(), "vzeroall");
        assert_eq!(out.last().unwrap(), "sfence");
        assert!(out.contains(&"nop".to_string()));
    }

    #[test]
    fn sibling_regions_are_all_expanded() {
        let out = expand(
            "LOOP(a, rax=0, <, rdi=N, 1)\nnop\nLOOPEND(a)\nBLOCK(b)\nmfence\nBLOCKEND(b)\nLOOP(c, rax=0, <, rdi=M, 2)\nnop\nLOOPEND(c)",
        )
        .unwrap();
        assert!(out.contains(&"a:".to_string()));
        assert!(out.contains(&"c:".to_string()));
        assert!(out.contains(&"# BLOCK(b)".to_string()));
        assert!(out.contains(&"jl c".to_string()));
    }

    #[test]
    fn nested_regions_nest_scaffolding() {
        let out = expand(
            "LOOP(outer, rcx=0, <, rdx=M, 1)\nLOOP(inner, rax=0, <, rdi=N, 1)\nnop\nLOOPEND(inner)\nLOOPEND(outer)",
        )
        .unwrap();
        let pos = |needle: &str| out.iter().position(|l| l == needle).unwrap();
        assert!(pos("outer:") < pos("inner:"));
        assert!(pos("inner:") < pos("nop"));
        assert!(pos("nop") < pos("jl inner"));
        assert!(pos("jl inner") < pos("jl outer"));
    }

    #[test]
    fn same_label_nesting_is_rejected() {
        let err = expand("BLOCK(x)\nBLOCK(x)\nnop\nBLOCKEND(x)\nBLOCKEND(x)").unwrap_err();
        assert_eq!(
            err,
            GrammarError::DuplicateLabel {
                tag: "BLOCK",
                label: "x".to_string()
            }
        );
        let err = expand(
            "LOOP(x, rax=0, <, rdi=N, 1)\nLOOP(x, rbx=0, <, rcx=M, 1)\nnop\nLOOPEND(x)\nLOOPEND(x)",
        )
        .unwrap_err();
        assert!(matches!(err, GrammarError::DuplicateLabel { tag: "LOOP", .. }));
    }

    #[test]
    fn same_label_in_other_family_nests() {
        let out = expand("BLOCK(x)\nLOOP(x, rax=0, <, rdi=N, 1)\nnop\nLOOPEND(x)\nBLOCKEND(x)")
            .unwrap();
        assert_eq!(out.iter().filter(|l| *l == "x:").count(), 1);
    }

    #[test]
    fn mismatched_label() {
        let err = expand("LOOP(a, rax=0, <, rdi=N, 1)\nnop\nLOOPEND(b)").unwrap_err();
        assert_eq!(
            err,
            GrammarError::LabelMismatch {
                tag: "LOOP",
                open: "a".to_string(),
                close: "b".to_string()
            }
        );
    }

    #[test]
    fn mismatched_keyword() {
        let err = expand("LOOP(a, rax=0, <, rdi=N, 1)\nnop\nBLOCKEND(a)").unwrap_err();
        assert!(matches!(err, GrammarError::KeywordMismatch { .. }));
    }

    #[test]
    fn unmatched_open_and_close() {
        assert_eq!(
            expand("LOOP(a, rax=0, <, rdi=N, 1)\nnop").unwrap_err(),
            GrammarError::UnmatchedOpen {
                tag: "LOOP",
                label: "a".to_string()
            }
        );
        assert_eq!(
            expand("nop\nLOOPEND(a)").unwrap_err(),
            GrammarError::UnmatchedClose {
                tag: "LOOPEND",
                label: "a".to_string()
            }
        );
    }

    #[test]
    fn stalling_keyword_is_reported() {
        fn echo(_: &KeywordContext<'_>, body: &[String]) -> Result<CodeLines, GrammarError> {
            Ok(body.to_vec())
        }
        let registry = [KeywordDefinition {
            begin_tag: "ECHO",
            end_tag: "ECHOEND",
            parse: echo,
        }];
        let t = Template::default();
        let ctx = KeywordContext {
            backend: Arch::X86_64.backend(),
            template: &t,
        };
        let err = BlockParser::new(&registry, ctx)
            .expand(lines("ECHO(a)\nnop\nECHOEND(a)"))
            .unwrap_err();
        assert!(matches!(err, GrammarError::NoProgress { .. }));
    }
}
