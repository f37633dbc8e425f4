//! Keyword marker syntax: `TAG(arg0, arg1, ...)`.

use crate::core::error::GrammarError;

/// Whether `line` is a `tag(` marker, ignoring leading whitespace.
///
/// The parenthesis must follow the tag directly, so `LOOPEND(` never matches
/// the tag `LOOP`.
pub fn has_tag(line: &str, tag: &str) -> bool {
    line.trim_start()
        .strip_prefix(tag)
        .is_some_and(|rest| rest.starts_with('('))
}

/// Split the argument list between the first `(` and its matching `)`.
///
/// Commas inside nested parentheses do not split. Each argument is trimmed;
/// an empty list yields no arguments.
pub fn parse_arguments(line: &str) -> Result<Vec<String>, GrammarError> {
    let open = line.find('(').ok_or_else(|| GrammarError::MalformedMarker {
        line: line.to_string(),
        reason: "missing opening parenthesis",
    })?;

    let mut depth = 0usize;
    let mut close = None;
    for (idx, ch) in line[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close.ok_or_else(|| GrammarError::MalformedMarker {
        line: line.to_string(),
        reason: "missing closing parenthesis",
    })?;

    let inner = &line[open + 1..close];
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in inner.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    args.push(current.trim().to_string());
    Ok(args)
}

/// Split a `register=value` loop argument.
pub fn split_binding<'a>(tag: &'static str, arg: &'a str) -> Result<(&'a str, &'a str), GrammarError> {
    match arg.split_once('=') {
        Some((reg, value)) if !reg.trim().is_empty() && !value.trim().is_empty() => {
            Ok((reg.trim(), value.trim()))
        }
        _ => Err(GrammarError::RegisterBinding {
            tag,
            arg: arg.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_detection() {
        assert!(has_tag("LOOP(a, rax=0, <, rdi=N, 1)", "LOOP"));
        assert!(has_tag("    LOOPEND(a)", "LOOPEND"));
        assert!(!has_tag("LOOPEND(a)", "LOOP"));
        assert!(!has_tag("LOOP a", "LOOP"));
        assert!(!has_tag("# LOOP(a, rax=0, <, rdi=N, 1)", "LOOP"));
    }

    #[test]
    fn arguments_are_trimmed() {
        assert_eq!(
            parse_arguments("LOOP( a ,rax=0,<, rdi = N , 1 )").unwrap(),
            vec!["a", "rax=0", "<", "rdi = N", "1"]
        );
        assert!(parse_arguments("BLOCK()").unwrap().is_empty());
    }

    #[test]
    fn nested_parentheses_do_not_split() {
        assert_eq!(
            parse_arguments("LOOP(l, rax=(A,B), <, rdi=N, 1)").unwrap(),
            vec!["l", "rax=(A,B)", "<", "rdi=N", "1"]
        );
    }

    #[test]
    fn missing_close_is_malformed() {
        assert!(matches!(
            parse_arguments("LOOP(l, rax=0"),
            Err(GrammarError::MalformedMarker { .. })
        ));
    }

    #[test]
    fn bindings() {
        assert_eq!(split_binding("LOOP", "rdi = N").unwrap(), ("rdi", "N"));
        assert!(matches!(
            split_binding("LOOP", "rdi"),
            Err(GrammarError::RegisterBinding { .. })
        ));
        assert!(split_binding("LOOP", "=4").is_err());
    }
}
