//! Lexical analysis for husk shell.

use thiserror::Error;

/// A part of a word: literal text or a substitution to expand at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// Literal text that requires no further processing.
    Literal(String),
    /// Command substitution `$(...)`. Contains the text inside the parentheses.
    CmdSubst(String),
    /// Parameter substitution `$NAME`, `${NAME}` or `$?`. Contains the name.
    ParamSubst(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(Vec<WordPart>),
    /// `NAME=` at the start of an unquoted word. The value is the next `Word`.
    Assign(String),
    /// The pipe operator, `|`.
    Pipe,
    Semicolon,
    Newline,
}

/// Errors raised while splitting input. Every one of them means the input
/// stopped in the middle of a construct.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexingError {
    #[error("unterminated quote")]
    UnfinishedQuote,
    #[error("unterminated command substitution")]
    UnfinishedCmdSubst,
    #[error("unterminated parameter substitution")]
    UnfinishedParamSubst,
    #[error("trailing backslash")]
    DanglingEscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current_word: Vec<WordPart>,
    buffer: String,
    word_started: bool,
    word_quoted: bool,
    assign_emitted: bool,
}

impl LexingFSM {
    fn new(text: &str) -> Self {
        LexingFSM {
            input: text.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            current_word: Vec::new(),
            buffer: String::new(),
            word_started: false,
            word_quoted: false,
            assign_emitted: false,
        }
    }

    fn make_tokens(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch, &mut out)?,
                LexingState::ReadingWord => self.handle_word(ch, &mut out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
            }
        }

        if matches!(
            self.state,
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote
        ) {
            return Err(LexingError::UnfinishedQuote);
        }

        self.finish_word(&mut out);
        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_start(&mut self, ch: char, out: &mut Vec<Token>) -> Result<(), LexingError> {
        match ch {
            ' ' | '\t' | '\r' => {}
            '|' => out.push(Token::Pipe),
            ';' => out.push(Token::Semicolon),
            '\n' => out.push(Token::Newline),
            '#' => {
                while self.peek_char().is_some_and(|c| c != '\n') {
                    self.read_char();
                }
            }
            '\\' if self.peek_char() == Some('\n') => {
                self.read_char();
            }
            c => {
                self.state = LexingState::ReadingWord;
                self.word_started = true;
                self.handle_word(c, out)?;
            }
        }
        Ok(())
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) -> Result<(), LexingError> {
        match ch {
            ' ' | '\t' | '\r' => {
                self.finish_word(out);
                self.state = LexingState::Start;
            }
            '|' | ';' | '\n' => {
                self.finish_word(out);
                out.push(match ch {
                    '|' => Token::Pipe,
                    ';' => Token::Semicolon,
                    _ => Token::Newline,
                });
                self.state = LexingState::Start;
            }
            '\'' => {
                self.word_quoted = true;
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.word_quoted = true;
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\\' => match self.read_char() {
                Some('\n') => {}
                Some(c) => {
                    self.word_quoted = true;
                    self.buffer.push(c);
                }
                None => return Err(LexingError::DanglingEscape),
            },
            '$' => self.read_dollar()?,
            '=' if self.can_assign() => {
                out.push(Token::Assign(std::mem::take(&mut self.buffer)));
                self.assign_emitted = true;
            }
            c => self.buffer.push(c),
        }
        Ok(())
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => match self.peek_char() {
                Some('\n') => {
                    self.read_char();
                }
                Some(c @ ('"' | '\\' | '$')) => {
                    self.read_char();
                    self.buffer.push(c);
                }
                _ => self.buffer.push('\\'),
            },
            '$' => self.read_dollar()?,
            c => self.buffer.push(c),
        }
        Ok(())
    }

    /// Called right after a `$`.
    fn read_dollar(&mut self) -> Result<(), LexingError> {
        match self.peek_char() {
            Some('(') => {
                self.read_char();
                self.flush_literal();
                let code = self.collect_nested('(', ')', LexingError::UnfinishedCmdSubst)?;
                self.current_word.push(WordPart::CmdSubst(code));
            }
            Some('{') => {
                self.read_char();
                self.flush_literal();
                let name = self.collect_nested('{', '}', LexingError::UnfinishedParamSubst)?;
                self.current_word
                    .push(WordPart::ParamSubst(name.trim().to_string()));
            }
            Some('?') => {
                self.read_char();
                self.flush_literal();
                self.current_word.push(WordPart::ParamSubst("?".to_string()));
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.flush_literal();
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        self.read_char();
                    } else {
                        break;
                    }
                }
                self.current_word.push(WordPart::ParamSubst(name));
            }
            _ => self.buffer.push('$'),
        }
        Ok(())
    }

    /// Collect characters up to the `close` matching an already consumed `open`.
    fn collect_nested(
        &mut self,
        open: char,
        close: char,
        unfinished: LexingError,
    ) -> Result<String, LexingError> {
        let mut depth = 1;
        let mut s = String::new();
        while let Some(ch) = self.read_char() {
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(s);
                }
            }
            s.push(ch);
        }
        Err(unfinished)
    }

    fn can_assign(&self) -> bool {
        !self.assign_emitted
            && !self.word_quoted
            && self.current_word.is_empty()
            && is_identifier(&self.buffer)
    }

    fn flush_literal(&mut self) {
        if !self.buffer.is_empty() {
            self.current_word
                .push(WordPart::Literal(std::mem::take(&mut self.buffer)));
        }
    }

    fn finish_word(&mut self, out: &mut Vec<Token>) {
        self.flush_literal();
        if self.word_started {
            out.push(Token::Word(std::mem::take(&mut self.current_word)));
        }
        self.word_started = false;
        self.word_quoted = false;
        self.assign_emitted = false;
    }
}

/// Whether `s` can name a variable.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Split `text` into tokens.
pub fn split_into_tokens(text: &str) -> Result<Vec<Token>, LexingError> {
    LexingFSM::new(text).make_tokens()
}
