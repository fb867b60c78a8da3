use std::collections::BTreeMap;

use log::{debug, trace};

use crate::error::{Error, ParseError};
use crate::template::Template;

use super::render::{RenderOptions, render_tokens};
use super::tokenize::lex;
use super::types::{
    Command, FileMode, Operator, Pipeline, RedirectKind, RedirectOp, RedirectTarget, Token, Word,
};

/// Lex, render and parse a template into a single pipeline.
pub fn compile(template: &Template, options: &RenderOptions) -> Result<Pipeline, Error> {
    let lexemes = lex(template)?;
    trace!("lexed `{template}` into {} tokens", lexemes.len());
    let tokens = render_tokens(&lexemes, template, options)?;
    let pipeline = parse(&tokens)?;
    debug!(
        "parsed {} stage(s), shell={}",
        pipeline.stages.len(),
        pipeline.requires_shell()
    );
    Ok(pipeline)
}

#[derive(Debug)]
enum Item {
    Word(Word),
    Op(Operator),
}

/// Merge adjacent word fragments and drop whitespace.
fn assemble(tokens: &[Token]) -> Result<Vec<Item>, ParseError> {
    let mut items = Vec::new();
    let mut word: Option<Word> = None;
    for token in tokens {
        match token {
            Token::Word(fragment) => word.get_or_insert_with(Word::default).push(fragment),
            Token::Whitespace => items.extend(word.take().map(Item::Word)),
            Token::Operator(op) => {
                items.extend(word.take().map(Item::Word));
                items.push(Item::Op(*op));
            }
            Token::Hole(index) => return Err(ParseError::UnrenderedHole(*index)),
        }
    }
    items.extend(word.take().map(Item::Word));
    Ok(items)
}

/// Reassemble the command line from rendered tokens.
fn command_line(tokens: &[Token]) -> String {
    let mut line = String::new();
    for token in tokens {
        match token {
            Token::Word(fragment) => line.push_str(&fragment.raw),
            Token::Whitespace => {
                if !line.is_empty() && !line.ends_with([' ', '\n']) {
                    line.push(' ');
                }
            }
            Token::Operator(op) => {
                // Keep an fd prefix from gluing onto the previous word.
                if matches!(op, Operator::Redirect(RedirectOp { fd: Some(_), .. }))
                    && !line.is_empty()
                    && !line.ends_with([' ', '\n'])
                {
                    line.push(' ');
                }
                line.push_str(&op.to_string());
            }
            Token::Hole(_) => {}
        }
    }
    line.trim_end().to_string()
}

/// Parse a fully rendered token stream into a pipeline.
///
/// Accepts `command ('|' command)*` optionally followed by `;` or newlines.
pub fn parse(tokens: &[Token]) -> Result<Pipeline, ParseError> {
    let items = assemble(tokens)?;
    let mut stages = Vec::new();
    let mut current = Command::default();
    let mut terminated = false;

    let mut iter = items.into_iter();
    while let Some(item) = iter.next() {
        let op = match item {
            Item::Word(word) => {
                if terminated {
                    return Err(ParseError::MultiplePipelines);
                }
                current.argv.push(word);
                continue;
            }
            Item::Op(op) => op,
        };
        match op {
            Operator::Redirect(redirect) => {
                if terminated {
                    return Err(ParseError::MultiplePipelines);
                }
                let Some(Item::Word(target)) = iter.next() else {
                    return Err(ParseError::MissingRedirectTarget { op });
                };
                apply_redirect(&mut current.redirects, redirect, target)?;
            }
            Operator::Pipe => {
                if terminated {
                    return Err(ParseError::UnexpectedOperator { op });
                }
                close_stage(&mut stages, &mut current, Some(op))?;
            }
            Operator::Semi | Operator::Newline => {
                if terminated || (op == Operator::Newline && stages.is_empty() && current.is_empty())
                {
                    continue;
                }
                close_stage(&mut stages, &mut current, Some(op))?;
                terminated = true;
            }
            Operator::Background => return Err(ParseError::Background),
            Operator::And | Operator::Or | Operator::OpenParen | Operator::CloseParen => {
                return Err(ParseError::UnsupportedOperator { op });
            }
        }
    }
    if !terminated {
        close_stage(&mut stages, &mut current, None)?;
    }

    Ok(Pipeline {
        stages,
        line: command_line(tokens),
    })
}

fn close_stage(
    stages: &mut Vec<Command>,
    current: &mut Command,
    op: Option<Operator>,
) -> Result<(), ParseError> {
    if current.argv.is_empty() {
        let nothing_yet = stages.is_empty() && current.redirects.is_empty();
        return Err(match (nothing_yet, op) {
            (true, Some(op)) => ParseError::UnexpectedOperator { op },
            (true, None) => ParseError::Empty,
            (false, _) => ParseError::EmptyCommand {
                stage: stages.len(),
            },
        });
    }
    stages.push(std::mem::take(current));
    Ok(())
}

/// Record one redirection. Duplications copy whatever the source fd points
/// at right now, matching the shell's left-to-right evaluation.
fn apply_redirect(
    redirects: &mut BTreeMap<u32, RedirectTarget>,
    redirect: RedirectOp,
    target: Word,
) -> Result<(), ParseError> {
    let fd = redirect.fd.unwrap_or_else(|| redirect.kind.default_fd());
    let resolved = match redirect.kind {
        RedirectKind::DupOut | RedirectKind::DupIn => {
            let source = target
                .value
                .parse::<u32>()
                .ok()
                .filter(|_| !target.expands && target.value.bytes().all(|b| b.is_ascii_digit()))
                .ok_or_else(|| ParseError::InvalidDuplication {
                    op: Operator::Redirect(redirect),
                    target: target.value.clone(),
                })?;
            redirects
                .get(&source)
                .cloned()
                .unwrap_or(RedirectTarget::Fd(source))
        }
        RedirectKind::Out => RedirectTarget::File {
            path: target,
            mode: FileMode::Truncate,
        },
        RedirectKind::Append => RedirectTarget::File {
            path: target,
            mode: FileMode::Append,
        },
        RedirectKind::In => RedirectTarget::File {
            path: target,
            mode: FileMode::Read,
        },
    };
    redirects.insert(fd, resolved);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Value;

    fn compile_str(text: &str) -> Result<Pipeline, Error> {
        compile(&Template::from(text), &RenderOptions::default())
    }

    fn parse_err(text: &str) -> ParseError {
        match compile_str(text) {
            Err(Error::Parse(err)) => err,
            other => panic!("expected parse error for {text:?}, got {other:?}"),
        }
    }

    fn file(path: &str, mode: FileMode) -> RedirectTarget {
        RedirectTarget::File {
            path: Word {
                raw: path.into(),
                value: path.into(),
                expands: false,
            },
            mode,
        }
    }

    #[test]
    fn simple_command() {
        let p = compile_str("ls -la /tmp").unwrap();
        assert_eq!(p.stages().len(), 1);
        assert_eq!(p.stages()[0].args(), vec!["ls", "-la", "/tmp"]);
        assert_eq!(p.command_line(), "ls -la /tmp");
        assert!(!p.requires_shell());
    }

    #[test]
    fn pipeline_stages() {
        let p = compile_str("cat file | grep pat | wc -l").unwrap();
        let progs: Vec<_> = p.stages().iter().filter_map(Command::program).collect();
        assert_eq!(progs, vec!["cat", "grep", "wc"]);
    }

    #[test]
    fn hole_becomes_single_argument() {
        let name = "x; rm -rf ~";
        let t = crate::template!("echo " {name});
        let p = compile(&t, &RenderOptions::default()).unwrap();
        assert_eq!(p.stages()[0].args(), vec!["echo", name]);
        assert_eq!(
            shlex::split(p.command_line()),
            Some(vec!["echo".to_string(), name.to_string()])
        );
    }

    #[test]
    fn hole_glued_to_literal_text() {
        let t = crate::template!("touch pre-" {"a b"} ".txt");
        let p = compile(&t, &RenderOptions::default()).unwrap();
        assert_eq!(p.stages()[0].args(), vec!["touch", "pre-a b.txt"]);
    }

    #[test]
    fn list_hole_expands_to_words() {
        let t = crate::template!("printf '%s\\n' " {vec!["a", "b c", "d"]});
        let p = compile(&t, &RenderOptions::default()).unwrap();
        assert_eq!(p.stages()[0].args(), vec!["printf", "%s\\n", "a", "b c", "d"]);
    }

    #[test]
    fn raw_hole_adds_a_stage() {
        let t = crate::template!("ls " {Value::raw("|")} " wc -l");
        let p = compile(&t, &RenderOptions::default()).unwrap();
        assert_eq!(p.stages().len(), 2);
        assert_eq!(p.command_line(), "ls | wc -l");
    }

    #[test]
    fn quoted_hole_keeps_surrounding_quotes() {
        let t = crate::template!("echo \"hello " {"$USER"} "\"");
        let p = compile(&t, &RenderOptions::default()).unwrap();
        assert_eq!(p.stages()[0].args(), vec!["echo", "hello $USER"]);
        assert_eq!(p.command_line(), r#"echo "hello \$USER""#);
        assert!(!p.requires_shell());
    }

    #[test]
    fn redirections() {
        let p = compile_str("sort < in.txt > out.txt 2>> err.log").unwrap();
        let stage = &p.stages()[0];
        assert_eq!(stage.args(), vec!["sort"]);
        assert_eq!(stage.redirect(0), Some(&file("in.txt", FileMode::Read)));
        assert_eq!(stage.redirect(1), Some(&file("out.txt", FileMode::Truncate)));
        assert_eq!(stage.redirect(2), Some(&file("err.log", FileMode::Append)));
        assert!(p.has_output_redirection());
        assert!(!p.requires_shell());
    }

    #[test]
    fn duplication_follows_left_to_right_order() {
        let p = compile_str("cmd > out 2>&1").unwrap();
        assert_eq!(p.stages()[0].redirect(2), Some(&file("out", FileMode::Truncate)));

        let p = compile_str("cmd 2>&1 > out").unwrap();
        assert_eq!(p.stages()[0].redirect(2), Some(&RedirectTarget::Fd(1)));
        assert_eq!(p.stages()[0].redirect(1), Some(&file("out", FileMode::Truncate)));
        assert!(p.requires_shell());
    }

    #[test]
    fn invalid_duplication() {
        assert!(matches!(
            parse_err("cmd 2>&x"),
            ParseError::InvalidDuplication { target, .. } if target == "x"
        ));
    }

    #[test]
    fn fd_prefix_stays_separate_in_command_line() {
        let t = crate::template!("echo hi" {Value::raw("2>/dev/null")});
        let p = compile(&t, &RenderOptions::default()).unwrap();
        assert_eq!(p.command_line(), "echo hi 2>/dev/null");
        assert_eq!(p.stages()[0].args(), vec!["echo", "hi"]);
    }

    #[test]
    fn leading_pipe() {
        assert_eq!(
            parse_err("| wc"),
            ParseError::UnexpectedOperator {
                op: Operator::Pipe
            }
        );
    }

    #[test]
    fn empty_stage_between_pipes() {
        assert_eq!(parse_err("ls | | wc"), ParseError::EmptyCommand { stage: 1 });
        assert_eq!(parse_err("ls |"), ParseError::EmptyCommand { stage: 1 });
    }

    #[test]
    fn missing_redirect_target() {
        assert!(matches!(
            parse_err("ls >"),
            ParseError::MissingRedirectTarget { .. }
        ));
        assert!(matches!(
            parse_err("ls > | wc"),
            ParseError::MissingRedirectTarget { .. }
        ));
    }

    #[test]
    fn empty_template() {
        assert_eq!(parse_err(""), ParseError::Empty);
        assert_eq!(parse_err("  # just a comment\n"), ParseError::Empty);
    }

    #[test]
    fn trailing_terminators_are_allowed() {
        assert_eq!(compile_str("ls;").unwrap().stages().len(), 1);
        assert_eq!(compile_str("\nls\n\n").unwrap().stages().len(), 1);
    }

    #[test]
    fn sequences_are_rejected() {
        assert_eq!(parse_err("ls; pwd"), ParseError::MultiplePipelines);
        assert_eq!(parse_err("ls\npwd"), ParseError::MultiplePipelines);
    }

    #[test]
    fn background_is_rejected() {
        assert_eq!(parse_err("sleep 1 &"), ParseError::Background);
    }

    #[test]
    fn logical_operators_are_rejected() {
        assert_eq!(
            parse_err("true && false"),
            ParseError::UnsupportedOperator { op: Operator::And }
        );
        assert_eq!(
            parse_err("true || false"),
            ParseError::UnsupportedOperator { op: Operator::Or }
        );
    }

    #[test]
    fn expansion_requires_shell() {
        assert!(compile_str("echo $HOME").unwrap().requires_shell());
        assert!(compile_str("ls *.rs").unwrap().requires_shell());
        assert!(!compile_str("echo '$HOME'").unwrap().requires_shell());
    }

    #[test]
    fn assignments_and_builtins_require_shell() {
        assert!(compile_str("FOO=bar printenv FOO").unwrap().requires_shell());
        assert!(compile_str("exit 3").unwrap().requires_shell());
        assert!(compile_str("cd /tmp | cat").unwrap().requires_shell());
        assert!(!compile_str("printenv FOO=bar").unwrap().requires_shell());

        let t = crate::template!({"FOO=bar"} " x");
        let p = compile(&t, &RenderOptions::default()).unwrap();
        assert_eq!(p.stages()[0].program(), Some("FOO=bar"));
        assert!(!p.requires_shell());
    }

    #[test]
    fn hole_in_parameter_expansion_is_rejected() {
        let t = crate::template!("echo \"${X:-" {"}"} "}\"");
        assert!(matches!(
            compile(&t, &RenderOptions::default()),
            Err(Error::Render(crate::error::RenderError::UnsupportedContext { .. }))
        ));
    }

    #[test]
    fn unrendered_hole_is_an_error() {
        assert_eq!(
            parse(&[Token::Hole(0)]).unwrap_err(),
            ParseError::UnrenderedHole(0)
        );
    }
}
