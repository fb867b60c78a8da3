//! Hole rendering: turn a runtime value into shell text that the real shell
//! reads back as exactly that value, given the quote state it lands in.

use log::debug;

use crate::config::Config;
use crate::error::{Error, RenderError};
use crate::template::{Template, Value};

use super::tokenize::lex_str;
use super::types::{Enclosing, Fragment, Lexeme, QuoteState, Token};

/// Rendering policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// How a [`Value::List`] is laid out unquoted. Whitespace keeps one word
    /// per element; anything else joins the elements into a single word.
    pub list_separator: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            list_separator: " ".into(),
        }
    }
}

impl RenderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            list_separator: config.render.list_separator.clone(),
        }
    }

    fn splits_words(&self) -> bool {
        !self.list_separator.is_empty() && self.list_separator.chars().all(char::is_whitespace)
    }
}

/// Wrap `s` in single quotes; embedded `'` becomes `'\''`.
pub fn single_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    out.push_str(&escape_single(s));
    out.push('\'');
    out
}

fn escape_single(s: &str) -> String {
    s.replace('\'', r"'\''")
}

fn escape_double(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Add the backslashes the shell strips when it reads a backtick body.
pub(crate) fn escape_backtick(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '`' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render `value` for `state` with default options.
pub fn render(value: &Value, state: QuoteState) -> Result<String, RenderError> {
    render_with(value, state, &RenderOptions::default())
}

/// Render `value` for `state`.
///
/// The result is shell text, not the value: the shell's own quote removal
/// turns it back into the original bytes.
pub fn render_with(
    value: &Value,
    state: QuoteState,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    render_in(value, state, Enclosing::default(), options)
}

/// Render `value` for `state` nested inside the constructs in `enclosing`.
pub fn render_in(
    value: &Value,
    state: QuoteState,
    enclosing: Enclosing,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    Ok(render_words(value, state, enclosing, options)?
        .into_iter()
        .map(|f| f.raw)
        .collect::<Vec<_>>()
        .join(" "))
}

/// Render a non-raw value into word fragments. More than one fragment means
/// separate words.
fn render_words(
    value: &Value,
    state: QuoteState,
    enclosing: Enclosing,
    options: &RenderOptions,
) -> Result<Vec<Fragment>, RenderError> {
    if enclosing.parameter || state == QuoteState::InsideParameterExpansion {
        return Err(RenderError::UnsupportedContext {
            context: "parameter expansion `${...}`",
        });
    }
    // Backslash removal there depends on the shell.
    if enclosing.quoted_backticks {
        return Err(RenderError::UnsupportedContext {
            context: "backticks inside double quotes",
        });
    }

    let words: Vec<String> = match value {
        Value::Raw(text) => {
            if state != QuoteState::Unquoted {
                return Err(RenderError::RawInQuotedContext { state });
            }
            return Ok(vec![Fragment::literal(text.clone(), text.clone())]);
        }
        Value::List(items) => {
            if state.is_quoted() {
                return Err(RenderError::AmbiguousMultiWordInQuotedContext { state });
            }
            if options.splits_words() {
                items.clone()
            } else if items.is_empty() {
                Vec::new()
            } else {
                vec![items.join(&options.list_separator)]
            }
        }
        Value::Str(s) | Value::Scalar(s) => vec![s.clone()],
        Value::Joined { items, separator } => vec![items.join(separator)],
    };

    Ok(words
        .into_iter()
        .map(|word| {
            let mut raw = match state {
                QuoteState::SingleQuoted => escape_single(&word),
                QuoteState::DoubleQuoted => escape_double(&word),
                QuoteState::Unquoted
                | QuoteState::AfterEscape
                | QuoteState::InsideCommandSubstitution(_)
                | QuoteState::InsideParameterExpansion => single_quote(&word),
            };
            for _ in 0..enclosing.backticks {
                raw = escape_backtick(&raw);
            }
            Fragment::literal(raw, word)
        })
        .collect())
}

/// Replace every hole in a lexed template with its rendered tokens.
///
/// Raw holes are lexed on their own and spliced in, so `Value::raw("|")`
/// becomes a real pipe operator. Every other value becomes literal word text.
pub fn render_tokens(
    lexemes: &[Lexeme],
    template: &Template,
    options: &RenderOptions,
) -> Result<Vec<Token>, Error> {
    let mut out = Vec::with_capacity(lexemes.len());
    for lexeme in lexemes {
        let Token::Hole(index) = lexeme.token else {
            out.push(lexeme.token.clone());
            continue;
        };
        let value = template
            .hole(index)
            .ok_or(RenderError::MissingValue(index))?;

        if let Value::Raw(text) = value {
            if lexeme.state != QuoteState::Unquoted {
                debug!("raw hole {index} in {} context", lexeme.state);
                return Err(RenderError::RawInQuotedContext {
                    state: lexeme.state,
                }
                .into());
            }
            out.extend(lex_str(text)?.into_iter().map(|l| l.token));
            continue;
        }

        let words = render_words(value, lexeme.state, lexeme.enclosing, options)
            .inspect_err(|err| {
                debug!("hole {index} ({}) failed to render: {err}", value.kind());
            })?;
        debug!(
            "hole {index} ({}) in {} context -> {} word(s)",
            value.kind(),
            lexeme.state,
            words.len()
        );
        for (i, word) in words.into_iter().enumerate() {
            if i > 0 {
                out.push(Token::Whitespace);
            }
            out.push(Token::Word(word));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn unquoted_wraps_in_single_quotes() {
        assert_eq!(render(&s("hello"), QuoteState::Unquoted).unwrap(), "'hello'");
        assert_eq!(
            render(&s("O'Brien"), QuoteState::Unquoted).unwrap(),
            r"'O'\''Brien'"
        );
        assert_eq!(render(&s(""), QuoteState::Unquoted).unwrap(), "''");
    }

    #[test]
    fn metacharacters_stay_inside_quotes() {
        let rendered = render(&s("a; rm -rf / | $(x) `y` && z\n"), QuoteState::Unquoted).unwrap();
        assert_eq!(
            shlex::split(&rendered),
            Some(vec!["a; rm -rf / | $(x) `y` && z\n".to_string()])
        );
    }

    #[test]
    fn single_quoted_context() {
        assert_eq!(
            render(&s("it's"), QuoteState::SingleQuoted).unwrap(),
            r"it'\''s"
        );
    }

    #[test]
    fn double_quoted_context() {
        assert_eq!(
            render(&s(r#"a"b\c$d`e"#), QuoteState::DoubleQuoted).unwrap(),
            r#"a\"b\\c\$d\`e"#
        );
        assert_eq!(render(&s("it's"), QuoteState::DoubleQuoted).unwrap(), "it's");
    }

    #[test]
    fn substitution_and_escape_contexts_are_quoted() {
        assert_eq!(
            render(&s("a b"), QuoteState::InsideCommandSubstitution(2)).unwrap(),
            "'a b'"
        );
        assert_eq!(render(&s("x"), QuoteState::AfterEscape).unwrap(), "'x'");
    }

    #[test]
    fn backtick_levels_add_backslashes() {
        let state = QuoteState::InsideCommandSubstitution(1);
        let one = Enclosing {
            backticks: 1,
            ..Enclosing::default()
        };
        let two = Enclosing {
            backticks: 2,
            ..Enclosing::default()
        };
        let opts = RenderOptions::default();
        assert_eq!(render_in(&s("a"), state, one, &opts).unwrap(), "'a'");
        assert_eq!(
            render_in(&s(r"\'`$x"), state, one, &opts).unwrap(),
            r"'\\'\\''\`\$x'"
        );
        assert_eq!(render_in(&s(r"\"), state, two, &opts).unwrap(), r"'\\\\'");
        assert_eq!(
            render_in(&s("`"), QuoteState::SingleQuoted, one, &opts).unwrap(),
            r"\`"
        );
    }

    #[test]
    fn unsupported_contexts_are_rejected() {
        let opts = RenderOptions::default();
        let in_parameter = Enclosing {
            parameter: true,
            ..Enclosing::default()
        };
        assert!(matches!(
            render_in(&s("}"), QuoteState::DoubleQuoted, in_parameter, &opts),
            Err(RenderError::UnsupportedContext { .. })
        ));
        assert!(matches!(
            render(&s("x"), QuoteState::InsideParameterExpansion),
            Err(RenderError::UnsupportedContext { .. })
        ));
        let quoted = Enclosing {
            backticks: 1,
            quoted_backticks: true,
            ..Enclosing::default()
        };
        assert!(matches!(
            render_in(&s("x"), QuoteState::InsideCommandSubstitution(1), quoted, &opts),
            Err(RenderError::UnsupportedContext { .. })
        ));
    }

    #[test]
    fn backtick_hole_cannot_close_the_substitution() {
        let value = r"\'`;touch /tmp/x;`";
        let t = crate::template!("echo `printf '%s' " {value} "`");
        let lexemes = crate::parse::lex(&t).unwrap();
        let tokens = render_tokens(&lexemes, &t, &RenderOptions::default()).unwrap();
        let line: String = tokens
            .iter()
            .map(|t| match t {
                Token::Word(f) => f.raw.clone(),
                Token::Whitespace => " ".into(),
                other => format!("{other:?}"),
            })
            .collect();
        assert_eq!(line, r"echo `printf '%s' '\\'\\''\`;touch /tmp/x;\`'`");
        // The value stays inside one word of one substitution.
        assert_eq!(lex_str(&line).unwrap().len(), 3);
    }

    #[test]
    fn list_renders_one_word_per_element() {
        let list = Value::from(vec!["a", "b c", "d"]);
        assert_eq!(
            render(&list, QuoteState::Unquoted).unwrap(),
            "'a' 'b c' 'd'"
        );
        assert_eq!(render(&Value::List(vec![]), QuoteState::Unquoted).unwrap(), "");
    }

    #[test]
    fn list_with_joining_separator() {
        let opts = RenderOptions {
            list_separator: ",".into(),
        };
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(render_with(&list, QuoteState::Unquoted, &opts).unwrap(), "'a,b'");
    }

    #[test]
    fn list_in_quotes_is_ambiguous() {
        let list = Value::from(vec!["a", "b"]);
        for state in [QuoteState::SingleQuoted, QuoteState::DoubleQuoted] {
            assert_eq!(
                render(&list, state),
                Err(RenderError::AmbiguousMultiWordInQuotedContext { state })
            );
        }
    }

    #[test]
    fn joined_list_is_allowed_in_quotes() {
        let joined = Value::joined(["a", "b"], ", ");
        assert_eq!(render(&joined, QuoteState::DoubleQuoted).unwrap(), "a, b");
    }

    #[test]
    fn raw_only_unquoted() {
        assert_eq!(render(&Value::raw("|"), QuoteState::Unquoted).unwrap(), "|");
        for state in [
            QuoteState::SingleQuoted,
            QuoteState::DoubleQuoted,
            QuoteState::AfterEscape,
            QuoteState::InsideCommandSubstitution(1),
        ] {
            assert_eq!(
                render(&Value::raw("|"), state),
                Err(RenderError::RawInQuotedContext { state })
            );
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let v = s("x'y\"z");
        for state in [
            QuoteState::Unquoted,
            QuoteState::SingleQuoted,
            QuoteState::DoubleQuoted,
        ] {
            assert_eq!(render(&v, state), render(&v, state));
        }
    }

    #[test]
    fn raw_hole_splices_operator_tokens() {
        let t = crate::template!("ls " {Value::raw("|")} " wc");
        let lexemes = crate::parse::lex(&t).unwrap();
        let tokens = render_tokens(&lexemes, &t, &RenderOptions::default()).unwrap();
        assert!(tokens.contains(&Token::Operator(crate::parse::Operator::Pipe)));
        assert!(!tokens.iter().any(|t| matches!(t, Token::Hole(_))));
    }

    #[test]
    fn unbalanced_raw_hole_is_rejected() {
        let t = crate::template!("echo " {Value::raw("'oops")});
        let lexemes = crate::parse::lex(&t).unwrap();
        assert!(matches!(
            render_tokens(&lexemes, &t, &RenderOptions::default()),
            Err(Error::Lex(_))
        ));
    }
}
