use crate::error::LexError;
use crate::template::{Segment, Template};

use super::render::escape_backtick;
use super::types::{
    Enclosing, Fragment, Lexeme, Operator, QuoteState, RedirectKind, RedirectOp, Token,
};

/// One unit of lexer input: a character of static text or a hole marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item {
    Char(char),
    Hole(usize),
}

/// An open quoting construct. `opened` is the input position of its opener.
///
/// Backticks have no frame: their body is cut out and lexed on its own.
#[derive(Debug, Clone, Copy)]
enum Frame {
    Single { opened: usize },
    Double { opened: usize },
    Subst { opened: usize, parens: u32 },
    Param { opened: usize },
}

impl Frame {
    fn opened(self) -> usize {
        match self {
            Frame::Single { opened }
            | Frame::Double { opened }
            | Frame::Subst { opened, .. }
            | Frame::Param { opened } => opened,
        }
    }
}

fn flatten(template: &Template) -> Vec<Item> {
    let mut items = Vec::new();
    let mut hole = 0;
    for segment in template.segments() {
        match segment {
            Segment::Literal(text) => items.extend(text.chars().map(Item::Char)),
            Segment::Hole(_) => {
                items.push(Item::Hole(hole));
                hole += 1;
            }
        }
    }
    items
}

/// Tokenize a template, recording the quote state at every token.
///
/// Hole values are never inspected here: each hole becomes a
/// [`Token::Hole`] tagged with the context it sits in. Error offsets count
/// characters of static text, with each hole counting as one.
pub fn lex(template: &Template) -> Result<Vec<Lexeme>, LexError> {
    Lexer::new(flatten(template)).run()
}

/// Tokenize plain shell text with no holes.
pub fn lex_str(text: &str) -> Result<Vec<Lexeme>, LexError> {
    Lexer::new(text.chars().map(Item::Char).collect()).run()
}

struct Lexer {
    items: Vec<Item>,
    pos: usize,
    frames: Vec<Frame>,
    /// Substitution depth of the surrounding text when lexing a backtick body.
    depth: u32,
    backticks: u32,
    quoted_backticks: bool,
    escape: bool,
    comment: bool,
    frag: Fragment,
    frag_state: QuoteState,
    out: Vec<Lexeme>,
}

impl Lexer {
    fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            pos: 0,
            frames: Vec::new(),
            depth: 0,
            backticks: 0,
            quoted_backticks: false,
            escape: false,
            comment: false,
            frag: Fragment::default(),
            frag_state: QuoteState::Unquoted,
            out: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Lexeme>, LexError> {
        while let Some(item) = self.items.get(self.pos).copied() {
            match item {
                Item::Char(c) => self.char(c)?,
                Item::Hole(index) => self.hole(index),
            }
            self.pos += 1;
        }

        // Report the innermost construct still open.
        if let Some(frame) = self.frames.last().copied() {
            return Err(LexError::Unterminated {
                state: self.frame_state(&self.frames),
                offset: frame.opened(),
            });
        }
        if self.escape {
            return Err(LexError::TrailingEscape);
        }
        self.flush();
        Ok(self.out)
    }

    fn peek(&self) -> Option<Item> {
        self.items.get(self.pos + 1).copied()
    }

    fn subst_depth(&self, frames: &[Frame]) -> u32 {
        self.depth
            + frames
                .iter()
                .filter(|f| matches!(f, Frame::Subst { .. }))
                .count() as u32
    }

    /// Quote state with `frames` open.
    fn frame_state(&self, frames: &[Frame]) -> QuoteState {
        match frames.last() {
            None if self.depth == 0 => QuoteState::Unquoted,
            None | Some(Frame::Subst { .. }) => {
                QuoteState::InsideCommandSubstitution(self.subst_depth(frames))
            }
            Some(Frame::Single { .. }) => QuoteState::SingleQuoted,
            Some(Frame::Double { .. }) => QuoteState::DoubleQuoted,
            Some(Frame::Param { .. }) => QuoteState::InsideParameterExpansion,
        }
    }

    fn state(&self) -> QuoteState {
        if self.escape {
            QuoteState::AfterEscape
        } else {
            self.frame_state(&self.frames)
        }
    }

    /// Frames of the current command, innermost first. A `$(` starts a new
    /// command, so nothing outside it counts.
    fn command_frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames
            .iter()
            .rev()
            .take_while(|f| !matches!(f, Frame::Subst { .. }))
    }

    fn enclosing(&self) -> Enclosing {
        Enclosing {
            backticks: self.backticks,
            quoted_backticks: self.quoted_backticks,
            parameter: self
                .command_frames()
                .any(|f| matches!(f, Frame::Param { .. })),
        }
    }

    fn at_word_start(&self) -> bool {
        self.frag.raw.is_empty()
            && !matches!(
                self.out.last(),
                Some(Lexeme {
                    token: Token::Word(_) | Token::Hole(_),
                    ..
                })
            )
    }

    fn emit(&mut self, token: Token, state: QuoteState) {
        self.out.push(Lexeme {
            token,
            state,
            enclosing: Enclosing::default(),
        });
    }

    fn flush(&mut self) {
        if self.frag.raw.is_empty() {
            return;
        }
        let frag = std::mem::take(&mut self.frag);
        let state = self.frag_state;
        self.emit(Token::Word(frag), state);
    }

    fn push(&mut self, raw: &str, text: &str) {
        if self.frag.raw.is_empty() {
            self.frag_state = self.state();
        }
        self.frag.raw.push_str(raw);
        self.frag.text.push_str(text);
    }

    fn push_char(&mut self, c: char) {
        let mut buf = [0; 4];
        let s: &str = c.encode_utf8(&mut buf);
        self.push(s, s);
    }

    /// Push only shell syntax that disappears after quote removal.
    fn push_syntax(&mut self, c: char) {
        let mut buf = [0; 4];
        self.push(c.encode_utf8(&mut buf), "");
    }

    fn operator(&mut self, op: Operator) {
        self.flush();
        self.emit(Token::Operator(op), QuoteState::Unquoted);
    }

    fn hole(&mut self, index: usize) {
        if self.comment {
            return;
        }
        let state = if self.escape {
            // The backslash escapes nothing once the hole is quoted.
            self.frag.raw.pop();
            self.escape = false;
            match self.frames.last() {
                Some(Frame::Double { .. }) => QuoteState::DoubleQuoted,
                _ => QuoteState::AfterEscape,
            }
        } else {
            self.state()
        };
        self.flush();
        self.out.push(Lexeme {
            token: Token::Hole(index),
            state,
            enclosing: self.enclosing(),
        });
    }

    fn char(&mut self, c: char) -> Result<(), LexError> {
        if self.comment {
            if c != '\n' {
                return Ok(());
            }
            self.comment = false;
        }
        if self.escape {
            self.escaped(c);
            return Ok(());
        }
        if c == '`' && !matches!(self.frames.last(), Some(Frame::Single { .. })) {
            return self.backtick();
        }
        match self.frames.last().copied() {
            None => self.unquoted(c),
            Some(Frame::Single { .. }) => {
                if c == '\'' {
                    self.frames.pop();
                    self.push_syntax(c);
                } else {
                    self.push_char(c);
                }
            }
            Some(Frame::Double { .. }) => match c {
                '"' => {
                    self.frames.pop();
                    self.push_syntax(c);
                }
                '\\' => self.backslash(),
                '$' => self.dollar(),
                _ => self.push_char(c),
            },
            Some(Frame::Subst { .. }) => self.substitution(c),
            Some(Frame::Param { .. }) => self.parameter(c),
        }
        Ok(())
    }

    fn escaped(&mut self, c: char) {
        self.escape = false;
        let in_double = matches!(self.frames.last(), Some(Frame::Double { .. }));
        let mut buf = [0; 4];
        let raw: &str = c.encode_utf8(&mut buf);
        if c == '\n' {
            // line continuation
            self.push(raw, "");
        } else if in_double && !matches!(c, '$' | '`' | '"' | '\\') {
            self.push(raw, &format!("\\{c}"));
        } else {
            self.push(raw, raw);
        }
    }

    fn backslash(&mut self) {
        self.push_syntax('\\');
        self.escape = true;
    }

    /// The shell reads a backtick substitution in two passes: it finds the
    /// closing backtick while removing the backslash in front of `\`, `` ` ``
    /// and `$`, then parses the remainder as a command. The body is lexed the
    /// same way and spliced back with that escape level restored.
    fn backtick(&mut self) -> Result<(), LexError> {
        let opened = self.pos;
        let depth = self.subst_depth(&self.frames) + 1;
        let mut body = Vec::new();
        let mut origin = Vec::new();
        let mut i = opened + 1;
        loop {
            match self.items.get(i).copied() {
                None => {
                    return Err(LexError::Unterminated {
                        state: QuoteState::InsideCommandSubstitution(depth),
                        offset: opened,
                    });
                }
                Some(Item::Char('`')) => break,
                Some(Item::Char('\\')) => {
                    if let Some(Item::Char(c @ ('`' | '\\' | '$'))) =
                        self.items.get(i + 1).copied()
                    {
                        body.push(Item::Char(c));
                        origin.push(i + 1);
                        i += 2;
                        continue;
                    }
                    body.push(Item::Char('\\'));
                    origin.push(i);
                }
                Some(item) => {
                    body.push(item);
                    origin.push(i);
                }
            }
            i += 1;
        }

        let mut inner = Lexer::new(body);
        inner.depth = depth;
        inner.backticks = self.backticks + 1;
        inner.quoted_backticks = self.quoted_backticks
            || self
                .command_frames()
                .any(|f| matches!(f, Frame::Double { .. }));
        let lexemes = inner.run().map_err(|err| match err {
            LexError::Unterminated { state, offset } => LexError::Unterminated {
                state,
                offset: origin.get(offset).copied().unwrap_or(opened),
            },
            other => other,
        })?;

        self.push("`", "");
        self.frag.expands = true;
        for Lexeme {
            token,
            state,
            enclosing,
        } in lexemes
        {
            match token {
                Token::Word(fragment) => self.push(&escape_backtick(&fragment.raw), ""),
                Token::Whitespace => self.push(" ", ""),
                Token::Operator(op) => self.push(&escape_backtick(&op.to_string()), ""),
                Token::Hole(index) => {
                    self.flush();
                    self.out.push(Lexeme {
                        token: Token::Hole(index),
                        state,
                        enclosing,
                    });
                }
            }
        }
        self.push("`", "");
        self.pos = i;
        Ok(())
    }

    fn dollar(&mut self) {
        match self.peek() {
            Some(Item::Char('{')) => {
                self.push("${", "${");
                self.frag.expands = true;
                self.frames.push(Frame::Param { opened: self.pos });
                self.pos += 1;
            }
            Some(Item::Char('(')) => {
                self.push("$(", "$(");
                self.frag.expands = true;
                self.frames.push(Frame::Subst {
                    opened: self.pos,
                    parens: 0,
                });
                self.pos += 1;
            }
            Some(Item::Hole(_)) => {
                // Keep `$` literal so it cannot combine with the hole.
                self.push("\\$", "$");
            }
            Some(Item::Char(next))
                if next.is_ascii_alphanumeric()
                    || matches!(next, '_' | '@' | '*' | '#' | '?' | '$' | '!' | '-' | '\'' | '"') =>
            {
                self.push_char('$');
                self.frag.expands = true;
            }
            _ => self.push_char('$'),
        }
    }

    /// Inside `${...}`: single quotes only quote when the expansion itself is
    /// not double-quoted.
    fn parameter(&mut self, c: char) {
        match c {
            '}' => {
                self.frames.pop();
                self.push_char(c);
            }
            '"' => {
                self.push_char(c);
                self.frames.push(Frame::Double { opened: self.pos });
            }
            '\'' if !self
                .command_frames()
                .any(|f| matches!(f, Frame::Double { .. })) =>
            {
                self.push_char(c);
                self.frames.push(Frame::Single { opened: self.pos });
            }
            '\\' => self.backslash(),
            '$' => self.dollar(),
            _ => self.push_char(c),
        }
    }

    fn substitution(&mut self, c: char) {
        match (c, self.frames.last().copied()) {
            (')', Some(Frame::Subst { parens: 0, .. })) => {
                self.frames.pop();
                self.push_char(c);
            }
            ('(' | ')', Some(Frame::Subst { .. })) => {
                if let Some(Frame::Subst { parens, .. }) = self.frames.last_mut() {
                    if c == '(' {
                        *parens += 1;
                    } else {
                        *parens -= 1;
                    }
                }
                self.push_char(c);
            }
            ('\'', _) => {
                self.push_char(c);
                self.frames.push(Frame::Single { opened: self.pos });
            }
            ('"', _) => {
                self.push_char(c);
                self.frames.push(Frame::Double { opened: self.pos });
            }
            ('\\', _) => self.backslash(),
            ('$', _) => self.dollar(),
            _ => self.push_char(c),
        }
    }

    fn unquoted(&mut self, c: char) {
        match c {
            ' ' | '\t' | '\r' => {
                self.flush();
                if !matches!(
                    self.out.last(),
                    Some(Lexeme {
                        token: Token::Whitespace,
                        ..
                    })
                ) {
                    self.emit(Token::Whitespace, QuoteState::Unquoted);
                }
            }
            '\n' => self.operator(Operator::Newline),
            '#' if self.at_word_start() => self.comment = true,
            '\'' => {
                self.push_syntax(c);
                self.frames.push(Frame::Single { opened: self.pos });
            }
            '"' => {
                self.push_syntax(c);
                self.frames.push(Frame::Double { opened: self.pos });
            }
            '\\' => self.backslash(),
            '$' => self.dollar(),
            '|' => {
                if self.peek() == Some(Item::Char('|')) {
                    self.pos += 1;
                    self.operator(Operator::Or);
                } else {
                    self.operator(Operator::Pipe);
                }
            }
            '&' => {
                if self.peek() == Some(Item::Char('&')) {
                    self.pos += 1;
                    self.operator(Operator::And);
                } else {
                    self.operator(Operator::Background);
                }
            }
            ';' => self.operator(Operator::Semi),
            '(' => self.operator(Operator::OpenParen),
            ')' => self.operator(Operator::CloseParen),
            '>' | '<' => self.redirect(c),
            '*' | '?' | '[' | '{' => {
                self.push_char(c);
                self.frag.expands = true;
            }
            '~' if self.at_word_start() => {
                self.push_char(c);
                self.frag.expands = true;
            }
            _ => self.push_char(c),
        }
    }

    fn redirect(&mut self, c: char) {
        // `2>`: an all-digit word directly before the operator is its fd.
        let fd = if !self.frag.expands
            && !self.frag.raw.is_empty()
            && self.frag.raw.bytes().all(|b| b.is_ascii_digit())
            && !matches!(
                self.out.last(),
                Some(Lexeme {
                    token: Token::Word(_) | Token::Hole(_),
                    ..
                })
            ) {
            self.frag.raw.parse::<u32>().ok()
        } else {
            None
        };
        if fd.is_some() {
            self.frag = Fragment::default();
        }

        let kind = match (c, self.peek()) {
            ('>', Some(Item::Char('>'))) => {
                self.pos += 1;
                RedirectKind::Append
            }
            ('>', Some(Item::Char('&'))) => {
                self.pos += 1;
                RedirectKind::DupOut
            }
            ('>', Some(Item::Char('|'))) => {
                self.pos += 1;
                RedirectKind::Out
            }
            ('>', _) => RedirectKind::Out,
            (_, Some(Item::Char('&'))) => {
                self.pos += 1;
                RedirectKind::DupIn
            }
            _ => RedirectKind::In,
        };
        self.operator(Operator::Redirect(RedirectOp { fd, kind }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template;

    fn hole_states(t: &Template) -> Vec<QuoteState> {
        lex(t)
            .unwrap()
            .into_iter()
            .filter(|l| matches!(l.token, Token::Hole(_)))
            .map(|l| l.state)
            .collect()
    }

    fn words(text: &str) -> Vec<String> {
        lex_str(text)
            .unwrap()
            .into_iter()
            .filter_map(|l| match l.token {
                Token::Word(f) => Some(f.text),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn quote_state_at_each_hole() {
        let t = template!(
            "echo " {"a"} " '" {"b"} "' \"" {"c"} "\" $(cat " {"d"} ") \\" {"e"}
        );
        assert_eq!(
            hole_states(&t),
            vec![
                QuoteState::Unquoted,
                QuoteState::SingleQuoted,
                QuoteState::DoubleQuoted,
                QuoteState::InsideCommandSubstitution(1),
                QuoteState::AfterEscape,
            ]
        );
    }

    #[test]
    fn nested_substitution_depth() {
        let t = template!("echo $(a $(b `c " {"x"} "`))");
        assert_eq!(
            hole_states(&t),
            vec![QuoteState::InsideCommandSubstitution(3)]
        );
    }

    fn hole_lexemes(t: &Template) -> Vec<Lexeme> {
        lex(t)
            .unwrap()
            .into_iter()
            .filter(|l| matches!(l.token, Token::Hole(_)))
            .collect()
    }

    #[test]
    fn backtick_hole_records_level() {
        let holes = hole_lexemes(&template!("echo `printf '%s' " {"x"} "`"));
        assert_eq!(holes[0].state, QuoteState::InsideCommandSubstitution(1));
        assert_eq!(holes[0].enclosing.backticks, 1);

        let holes = hole_lexemes(&template!("echo `printf '%s' '" {"x"} "'`"));
        assert_eq!(holes[0].state, QuoteState::SingleQuoted);
        assert_eq!(holes[0].enclosing.backticks, 1);
    }

    #[test]
    fn escaped_backticks_nest() {
        let holes = hole_lexemes(&template!("echo `a \\`b " {"x"} "\\``"));
        assert_eq!(holes[0].state, QuoteState::InsideCommandSubstitution(2));
        assert_eq!(holes[0].enclosing.backticks, 2);
        assert!(!holes[0].enclosing.quoted_backticks);
    }

    #[test]
    fn backtick_body_is_spliced_verbatim() {
        let raw: Vec<String> = lex_str("echo `echo \\`date\\`` x")
            .unwrap()
            .into_iter()
            .filter_map(|l| match l.token {
                Token::Word(f) => Some(f.raw),
                _ => None,
            })
            .collect();
        assert_eq!(raw, vec!["echo", "`echo \\`date\\``", "x"]);
    }

    #[test]
    fn backtick_ends_inside_single_quotes() {
        // The closing backtick is found before quotes are parsed.
        assert_eq!(
            lex_str("echo `echo '`'"),
            Err(LexError::Unterminated {
                state: QuoteState::SingleQuoted,
                offset: 11,
            })
        );
    }

    #[test]
    fn backticks_in_double_quotes_are_flagged() {
        let holes = hole_lexemes(&template!("echo \"`printf " {"x"} "`\""));
        assert!(holes[0].enclosing.quoted_backticks);

        let holes = hole_lexemes(&template!("echo \"$(echo `printf " {"x"} "`)\""));
        assert!(!holes[0].enclosing.quoted_backticks);
    }

    #[test]
    fn parameter_expansion_is_tracked() {
        let holes = hole_lexemes(&template!("echo ${X:-" {"x"} "}"));
        assert_eq!(holes[0].state, QuoteState::InsideParameterExpansion);
        assert!(holes[0].enclosing.parameter);

        let holes = hole_lexemes(&template!("echo \"${X:-\"" {"x"} "\"}\""));
        assert_eq!(holes[0].state, QuoteState::DoubleQuoted);
        assert!(holes[0].enclosing.parameter);

        let holes = hole_lexemes(&template!("echo ${X:-y} " {"x"}));
        assert_eq!(holes[0].state, QuoteState::Unquoted);
        assert!(!holes[0].enclosing.parameter);
    }

    #[test]
    fn brace_closes_parameter_expansion() {
        assert_eq!(words("echo ${X:-a b} c"), vec!["echo", "${X:-a b}", "c"]);
    }

    #[test]
    fn unterminated_backtick_and_parameter() {
        assert_eq!(
            lex_str("echo `ls"),
            Err(LexError::Unterminated {
                state: QuoteState::InsideCommandSubstitution(1),
                offset: 5,
            })
        );
        assert_eq!(
            lex_str("echo ${X"),
            Err(LexError::Unterminated {
                state: QuoteState::InsideParameterExpansion,
                offset: 5,
            })
        );
    }

    #[test]
    fn double_quotes_inside_substitution() {
        let t = template!("echo \"$(cat \"" {"f"} "\")\"");
        assert_eq!(hole_states(&t), vec![QuoteState::DoubleQuoted]);
    }

    #[test]
    fn backslash_before_quoted_hole_is_consumed() {
        let t = template!("echo \"\\" {"x"} "\"");
        let lexemes = lex(&t).unwrap();
        assert_eq!(hole_states(&t), vec![QuoteState::DoubleQuoted]);
        let raw: String = lexemes
            .iter()
            .filter_map(|l| match &l.token {
                Token::Word(f) => Some(f.raw.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(raw, "echo\"\"");
    }

    #[test]
    fn unterminated_double_quote() {
        assert_eq!(
            lex_str("echo \"abc"),
            Err(LexError::Unterminated {
                state: QuoteState::DoubleQuoted,
                offset: 5,
            })
        );
    }

    #[test]
    fn unterminated_reports_innermost() {
        assert_eq!(
            lex_str("echo $(ls 'x"),
            Err(LexError::Unterminated {
                state: QuoteState::SingleQuoted,
                offset: 10,
            })
        );
    }

    #[test]
    fn unterminated_substitution() {
        assert_eq!(
            lex_str("echo $(ls"),
            Err(LexError::Unterminated {
                state: QuoteState::InsideCommandSubstitution(1),
                offset: 5,
            })
        );
    }

    #[test]
    fn trailing_escape() {
        assert_eq!(lex_str("echo \\"), Err(LexError::TrailingEscape));
    }

    #[test]
    fn quote_removal() {
        assert_eq!(
            words(r#"echo 'a b' "c\"d" e\ f "\x""#),
            vec!["echo", "a b", "c\"d", "e f", "\\x"]
        );
    }

    #[test]
    fn line_continuation() {
        assert_eq!(words("echo a\\\nb"), vec!["echo", "ab"]);
    }

    #[test]
    fn operators() {
        let ops: Vec<Operator> = lex_str("a|b || c&&d & e; f 2>&1 >>log <in")
            .unwrap()
            .into_iter()
            .filter_map(|l| match l.token {
                Token::Operator(op) => Some(op),
                _ => None,
            })
            .collect();
        assert_eq!(
            ops,
            vec![
                Operator::Pipe,
                Operator::Or,
                Operator::And,
                Operator::Background,
                Operator::Semi,
                Operator::Redirect(RedirectOp {
                    fd: Some(2),
                    kind: RedirectKind::DupOut,
                }),
                Operator::Redirect(RedirectOp {
                    fd: None,
                    kind: RedirectKind::Append,
                }),
                Operator::Redirect(RedirectOp {
                    fd: None,
                    kind: RedirectKind::In,
                }),
            ]
        );
    }

    #[test]
    fn digits_inside_word_are_not_fd() {
        let lexemes = lex_str("echo a2>f").unwrap();
        assert!(lexemes.iter().any(|l| matches!(
            l.token,
            Token::Operator(Operator::Redirect(RedirectOp { fd: None, .. }))
        )));
        assert_eq!(words("echo a2>f"), vec!["echo", "a2", "f"]);
    }

    #[test]
    fn quoted_operators_are_text() {
        assert_eq!(words("echo 'a|b' \"c;d\""), vec!["echo", "a|b", "c;d"]);
    }

    #[test]
    fn comment_drops_holes() {
        let t = template!("echo hi # " {"x"} "\nls");
        assert!(hole_states(&t).is_empty());
        assert_eq!(
            lex(&t).unwrap().last().map(|l| l.token.clone()),
            Some(Token::Word(Fragment::literal("ls", "ls")))
        );
    }

    #[test]
    fn hash_inside_word_is_text() {
        assert_eq!(words("echo a#b"), vec!["echo", "a#b"]);
    }

    #[test]
    fn dollar_before_hole_is_literal() {
        let t = template!("echo $" {"HOME"});
        let lexemes = lex(&t).unwrap();
        let frag = lexemes
            .iter()
            .find_map(|l| match &l.token {
                Token::Word(f) if f.text == "$" => Some(f.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(frag.raw, "\\$");
        assert!(!frag.expands);
    }

    #[test]
    fn expansion_is_flagged() {
        let expands = |text: &str| {
            lex_str(text).unwrap().into_iter().any(|l| match l.token {
                Token::Word(f) => f.expands,
                _ => false,
            })
        };
        assert!(expands("echo $HOME"));
        assert!(expands("echo ${X:-y}"));
        assert!(expands("ls *.rs"));
        assert!(expands("cd ~"));
        assert!(expands("echo `date`"));
        assert!(!expands("echo '$HOME'"));
        assert!(!expands("echo a~b"));
        assert!(!expands("echo $"));
    }
}
