//! Template source parsing.
//!
//! Grammar:
//!
//! ```text
//! template := (text | action)*
//! action   := "{{" ["- "] body [" -"] "}}"
//! body     := "." | ".First" N | ".Last" N | ".Hashed" | "/*" ... "*/"
//! ```

/// A piece of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Action(Action),
}

/// An operation applied to the template value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `{{ . }}`
    Value,
    /// `{{ .First N }}`
    First(usize),
    /// `{{ .Last N }}`
    Last(usize),
    /// `{{ .Hashed }}`
    Hashed,
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

pub fn parse(source: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut rest = source;
    let mut trim_leading = false;

    loop {
        let Some(start) = rest.find(OPEN) else {
            push_text(&mut segments, rest, trim_leading, false);
            break;
        };

        let mut after = &rest[start + OPEN.len()..];
        let trim_trailing = has_left_trim_marker(after);
        if trim_trailing {
            after = &after[1..];
        }
        push_text(&mut segments, &rest[..start], trim_leading, trim_trailing);

        let end = after
            .find(CLOSE)
            .ok_or_else(|| format!("unclosed action at offset {}", source.len() - rest.len() + start))?;

        let mut body = &after[..end];
        trim_leading = has_right_trim_marker(body);
        if trim_leading {
            body = &body[..body.len() - 1];
        }
        rest = &after[end + CLOSE.len()..];

        let body = body.trim();
        if let Some(comment) = body.strip_prefix("/*") {
            if !comment.ends_with("*/") {
                return Err("unterminated comment".to_string());
            }
            continue;
        }

        segments.push(Segment::Action(parse_action(body)?));
    }

    Ok(segments)
}

/// `{{- ` trims whitespace before the action.
fn has_left_trim_marker(after_open: &str) -> bool {
    let mut chars = after_open.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

/// ` -}}` trims whitespace after the action.
fn has_right_trim_marker(body: &str) -> bool {
    let Some(head) = body.strip_suffix('-') else {
        return false;
    };
    head.chars().next_back().is_some_and(char::is_whitespace)
}

fn push_text(segments: &mut Vec<Segment>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if text.is_empty() {
        return;
    }
    // Adjacent text (e.g. around a comment) is merged into one segment.
    if let Some(Segment::Text(prev)) = segments.last_mut() {
        prev.push_str(text);
    } else {
        segments.push(Segment::Text(text.to_string()));
    }
}

fn parse_action(body: &str) -> Result<Action, String> {
    let words: Vec<&str> = body.split_whitespace().collect();
    let Some((&head, args)) = words.split_first() else {
        return Err("missing value for command".to_string());
    };

    match head {
        "." => {
            expect_args(".", args, 0)?;
            Ok(Action::Value)
        }
        ".First" => {
            expect_args("First", args, 1)?;
            Ok(Action::First(parse_count("First", args[0])?))
        }
        ".Last" => {
            expect_args("Last", args, 1)?;
            Ok(Action::Last(parse_count("Last", args[0])?))
        }
        ".Hashed" => {
            expect_args("Hashed", args, 0)?;
            Ok(Action::Hashed)
        }
        field if field.starts_with('.') => Err(format!(
            "can't evaluate field {} (available: First, Last, Hashed)",
            &field[1..]
        )),
        other => Err(format!("unsupported command {:?}", other)),
    }
}

fn expect_args(name: &str, args: &[&str], want: usize) -> Result<(), String> {
    if args.len() != want {
        return Err(format!(
            "wrong number of args for {}: want {} got {}",
            name,
            want,
            args.len()
        ));
    }
    Ok(())
}

fn parse_count(name: &str, arg: &str) -> Result<usize, String> {
    arg.parse::<usize>().map_err(|_| {
        format!(
            "invalid argument {:?} for {}: expected a non-negative integer",
            arg, name
        )
    })
}
