use crate::shell::lexer::{Token, WordPart};
use thiserror::Error;

/// A shell word; its parts are concatenated after expansion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Word(pub Vec<WordPart>);

impl Word {
    pub fn literal(s: &str) -> Self {
        Word(vec![WordPart::Literal(s.to_string())])
    }
}

/// AST node for husk shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
    /// Commands connected by `|`, in execution order.
    Pipeline(Vec<AstNode>),

    /// A simple command.
    Command {
        /// Command name and arguments.
        argv: Vec<Word>,
        /// Leading `NAME=value` assignments. Without `argv` they set globals,
        /// otherwise they only apply to the command's process environment.
        assignments: Vec<AstNode>,
    },

    /// `name=value`; `value` is `None` for `name=` at the end of a command.
    Assignment { name: String, value: Option<Word> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParsingError {
    #[error("unexpected token {0:?}")]
    UnexpectedToken(Token),
    /// Input ended where a command was still required, e.g. after `|`.
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("empty command")]
    EmptyCommand,
}

struct AstBuilder {
    tokens: Vec<Token>,
    pos: usize,
}

impl AstBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        AstBuilder { tokens, pos: 0 }
    }

    /// program: (newline* pipeline (';' | newline | end))*
    fn build_program(mut self) -> Result<Vec<AstNode>, ParsingError> {
        let mut statements = Vec::new();
        loop {
            while let Some(Token::Newline) = self.peek() {
                self.consume();
            }
            if self.peek().is_none() {
                break;
            }
            statements.push(self.parse_pipeline()?);
            match self.peek() {
                None | Some(Token::Newline) => {}
                Some(Token::Semicolon) => {
                    self.consume();
                }
                Some(token) => return Err(ParsingError::UnexpectedToken(token.clone())),
            }
        }
        Ok(statements)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// pipeline: command ('|' newline* command)*
    fn parse_pipeline(&mut self) -> Result<AstNode, ParsingError> {
        let mut commands = vec![self.parse_command()?];

        while let Some(Token::Pipe) = self.peek() {
            self.consume();
            while let Some(Token::Newline) = self.peek() {
                self.consume();
            }
            commands.push(self.parse_command()?);
        }

        if commands.len() == 1 {
            Ok(commands.remove(0))
        } else {
            Ok(AstNode::Pipeline(commands))
        }
    }

    /// command: assignment* word*
    fn parse_command(&mut self) -> Result<AstNode, ParsingError> {
        let mut assignments = Vec::new();
        let mut argv = Vec::new();

        while let Some(token) = self.peek() {
            match token {
                Token::Assign(_) if argv.is_empty() => {
                    assignments.push(self.parse_assignment()?);
                }
                Token::Assign(_) => argv.push(self.parse_assignment_argument()),
                Token::Word(_) => argv.push(self.parse_word()?),
                _ => break,
            }
        }

        if assignments.is_empty() && argv.is_empty() {
            return match self.peek() {
                None => Err(ParsingError::UnexpectedEnd),
                Some(Token::Pipe | Token::Semicolon) => Err(ParsingError::EmptyCommand),
                Some(token) => Err(ParsingError::UnexpectedToken(token.clone())),
            };
        }

        Ok(AstNode::Command { argv, assignments })
    }

    fn parse_assignment(&mut self) -> Result<AstNode, ParsingError> {
        let name = match self.consume() {
            Some(Token::Assign(name)) => name,
            Some(token) => return Err(ParsingError::UnexpectedToken(token)),
            None => return Err(ParsingError::UnexpectedEnd),
        };
        let value = match self.peek() {
            Some(Token::Word(_)) => Some(self.parse_word()?),
            _ => None,
        };
        Ok(AstNode::Assignment { name, value })
    }

    /// `NAME=value` after the command name is an ordinary argument.
    fn parse_assignment_argument(&mut self) -> Word {
        let mut parts = Vec::new();
        if let Some(Token::Assign(name)) = self.consume() {
            parts.push(WordPart::Literal(format!("{name}=")));
        }
        if let Some(Token::Word(_)) = self.peek() {
            if let Some(Token::Word(value)) = self.consume() {
                parts.extend(value);
            }
        }
        Word(parts)
    }

    fn parse_word(&mut self) -> Result<Word, ParsingError> {
        match self.consume() {
            Some(Token::Word(parts)) => Ok(Word(parts)),
            Some(token) => Err(ParsingError::UnexpectedToken(token)),
            None => Err(ParsingError::UnexpectedEnd),
        }
    }
}

/// Build the statement list of a program from its tokens.
pub fn construct_ast(tokens: Vec<Token>) -> Result<Vec<AstNode>, ParsingError> {
    AstBuilder::from(tokens).build_program()
}
