//! Placeholder substitution for SQL template text.
//!
//! Templates use `{name}` tokens; `{{` and `}}` are escapes for literal
//! braces. Every token must have a value in the substitution map, so a
//! rendered query never carries an unresolved `{...}` token.

use std::collections::BTreeMap;

/// Substitution values applied uniformly to every SQL file in a run
pub type Substitutions = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("no substitution provided for placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("unterminated placeholder starting at byte {0}")]
    Unterminated(usize),

    #[error("empty placeholder at byte {0}")]
    Empty(usize),

    #[error("unmatched '}}' at byte {0}")]
    UnmatchedClose(usize),
}

/// Render a template by replacing each `{name}` token with its mapped value.
pub fn substitute(text: &str, subs: &Substitutions) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' => {
                if let Some(&(_, '{')) = chars.peek() {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, c)) => name.push(c),
                        None => return Err(TemplateError::Unterminated(pos)),
                    }
                }
                if name.is_empty() {
                    return Err(TemplateError::Empty(pos));
                }
                match subs.get(&name) {
                    Some(value) => out.push_str(value),
                    None => return Err(TemplateError::UnknownPlaceholder(name)),
                }
            }
            '}' => {
                if let Some(&(_, '}')) = chars.peek() {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::UnmatchedClose(pos));
                }
            }
            c => out.push(c),
        }
    }

    Ok(out)
}
