use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::tokenizer::{Token, TokenKind, TokenList};

/// Deepest tree the parser builds. Groups, `if` bodies and each folded binary
/// operator count as one level, which keeps every recursive walk of the tree
/// well inside the default thread stack.
pub const MAX_NESTING_DEPTH: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Program,
    BinaryOp,
    StringConcat,
    Print,
    Input,
    If,
    Var,
    Assignment,
    Identifier,
    Number,
    String,
    Type,
    EmptyStatement,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Program => "program",
            NodeKind::BinaryOp => "binary operation",
            NodeKind::StringConcat => "string concatenation",
            NodeKind::Print => "print",
            NodeKind::Input => "input",
            NodeKind::If => "if",
            NodeKind::Var => "variable declaration",
            NodeKind::Assignment => "assignment",
            NodeKind::Identifier => "identifier",
            NodeKind::Number => "number",
            NodeKind::String => "string",
            NodeKind::Type => "type",
            NodeKind::EmptyStatement => "empty statement",
        };
        f.write_str(name)
    }
}

/// A syntax tree node.
///
/// `value` carries the operator, identifier name or literal text depending on
/// `kind` and is empty for structural nodes. Children are owned and their
/// arity is fixed by the kind:
///
/// | kind                       | children                          |
/// |----------------------------|-----------------------------------|
/// | `Program`                  | any number of statements          |
/// | `BinaryOp`, `StringConcat` | left, right                       |
/// | `Print`                    | expression                        |
/// | `Input`                    | optional prompt expression        |
/// | `If`                       | condition, then, optional else    |
/// | `Var`                      | identifier, type, value           |
/// | `Assignment`               | identifier, value                 |
/// | leaves                     | none                              |
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub value: String,
    pub children: Vec<Node>,
    pub line: usize,
}

impl Node {
    pub fn leaf(kind: NodeKind, value: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            children: vec![],
            line,
        }
    }

    pub fn branch(
        kind: NodeKind,
        value: impl Into<String>,
        children: Vec<Node>,
        line: usize,
    ) -> Self {
        Self {
            kind,
            value: value.into(),
            children,
            line,
        }
    }

    fn is_concat_operand(&self) -> bool {
        matches!(self.kind, NodeKind::String | NodeKind::Identifier)
    }

    /// Number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Node::size).sum::<usize>()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("line {line}: expected {expected}, found {found}")]
pub struct ParseError {
    pub line: usize,
    pub expected: String,
    pub found: String,
}

fn describe(token: &Token) -> String {
    if token.is_eof() {
        "end of file".to_string()
    } else {
        format!("{} '{}'", token.kind, token.text)
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let line = tokens.last().map(|token| token.line).unwrap_or_default();
            tokens.push(Token::new(TokenKind::EndOfFile, "", line));
        }
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.position]
    }

    /// Returns the current token and moves past it. Never moves past the
    /// trailing end-of-file token.
    fn advance(&mut self) -> Token {
        let token = self.tokens[self.position].clone();
        if !token.is_eof() {
            self.position += 1;
        }
        token
    }

    fn error(&self, token: &Token, expected: impl Into<String>) -> ParseError {
        ParseError {
            line: token.line,
            expected: expected.into(),
            found: describe(token),
        }
    }

    /// Enters one nesting level; `at` is the token that opened it.
    fn nest(&mut self, at: &Token) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.error(at, "shallower nesting"));
        }
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind, text: &str) -> Result<Token, ParseError> {
        if self.peek().is(kind, text) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), format!("'{text}'")))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<Token, ParseError> {
        if self.peek().kind == TokenKind::Identifier {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), what))
        }
    }

    fn parse_program(&mut self) -> Result<Node, ParseError> {
        let line = self.peek().line;
        let mut statements = vec![];
        while !self.peek().is_eof() {
            statements.push(self.parse_statement()?);
        }
        Ok(Node::branch(NodeKind::Program, "", statements, line))
    }

    fn parse_statement(&mut self) -> Result<Node, ParseError> {
        trace!(token = ?self.peek(), "Parsing statement");

        let token = self.peek().clone();
        match (token.kind, token.text.as_str()) {
            (TokenKind::Keyword, "print") => self.parse_print(),
            (TokenKind::Keyword, "input") => self.parse_input(),
            (TokenKind::Keyword, "if") => self.parse_if(),
            (TokenKind::Keyword, "var") => self.parse_var(),
            (TokenKind::Identifier, _) => self.parse_assignment(),
            (TokenKind::Punctuation, ";") => {
                let token = self.advance();
                Ok(Node::leaf(NodeKind::EmptyStatement, "", token.line))
            }
            _ => self.parse_expression(),
        }
    }

    fn parse_print(&mut self) -> Result<Node, ParseError> {
        let keyword = self.advance();
        self.expect(TokenKind::Punctuation, "(")?;
        let argument = self.parse_expression()?;
        self.expect(TokenKind::Punctuation, ")")?;
        Ok(Node::branch(NodeKind::Print, "", vec![argument], keyword.line))
    }

    fn parse_input(&mut self) -> Result<Node, ParseError> {
        let keyword = self.advance();
        self.expect(TokenKind::Punctuation, "(")?;
        let mut children = vec![];
        if !self.peek().is(TokenKind::Punctuation, ")") {
            children.push(self.parse_expression()?);
        }
        self.expect(TokenKind::Punctuation, ")")?;
        Ok(Node::branch(NodeKind::Input, "", children, keyword.line))
    }

    fn parse_block_statement(&mut self) -> Result<Node, ParseError> {
        let open = self.expect(TokenKind::Punctuation, "{")?;
        self.nest(&open)?;
        let statement = self.parse_statement()?;
        self.depth -= 1;
        self.expect(TokenKind::Punctuation, "}")?;
        Ok(statement)
    }

    fn parse_if(&mut self) -> Result<Node, ParseError> {
        let keyword = self.advance();
        self.expect(TokenKind::Punctuation, "(")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Punctuation, ")")?;

        let mut children = vec![condition, self.parse_block_statement()?];
        if self.peek().is(TokenKind::Keyword, "else") {
            self.advance();
            children.push(self.parse_block_statement()?);
        }
        Ok(Node::branch(NodeKind::If, "", children, keyword.line))
    }

    fn parse_var(&mut self) -> Result<Node, ParseError> {
        let keyword = self.advance();
        let name = self.expect_identifier("variable name")?;
        self.expect(TokenKind::Punctuation, ":")?;
        let ty = self.expect_identifier("type name")?;
        self.expect(TokenKind::Operator, "=")?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::Punctuation, ";")?;

        Ok(Node::branch(
            NodeKind::Var,
            "",
            vec![
                Node::leaf(NodeKind::Identifier, name.text, name.line),
                Node::leaf(NodeKind::Type, ty.text, ty.line),
                value,
            ],
            keyword.line,
        ))
    }

    fn parse_assignment(&mut self) -> Result<Node, ParseError> {
        let name = self.advance();
        self.expect(TokenKind::Operator, "=")?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::Punctuation, ";")?;

        Ok(Node::branch(
            NodeKind::Assignment,
            "",
            vec![Node::leaf(NodeKind::Identifier, name.text, name.line), value],
            name.line,
        ))
    }

    /// `term (("+" | "-" | "=") term)*`
    ///
    /// A `+` whose immediate operands are both strings or identifiers becomes
    /// a `StringConcat`; a `+` with a string or identifier on the left and
    /// anything else on the right is rejected. Everything else is a
    /// `BinaryOp`.
    fn parse_expression(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_term()?;
        let mut folds = 0;
        while self.peek().kind == TokenKind::Operator
            && matches!(self.peek().text.as_str(), "+" | "-" | "=")
        {
            let operator = self.advance();
            self.nest(&operator)?;
            folds += 1;
            let right_start = self.peek().clone();
            let right = self.parse_term()?;

            let kind = if operator.text == "+" && left.is_concat_operand() {
                if !right.is_concat_operand() {
                    return Err(ParseError {
                        line: right_start.line,
                        expected: "string or identifier operand for '+'".to_string(),
                        found: describe(&right_start),
                    });
                }
                NodeKind::StringConcat
            } else {
                NodeKind::BinaryOp
            };
            left = Node::branch(kind, operator.text, vec![left, right], operator.line);
        }
        self.depth -= folds;
        Ok(left)
    }

    /// `factor (("*" | "/") factor)*`
    fn parse_term(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_factor()?;
        let mut folds = 0;
        while self.peek().kind == TokenKind::Operator
            && matches!(self.peek().text.as_str(), "*" | "/")
        {
            let operator = self.advance();
            self.nest(&operator)?;
            folds += 1;
            let right = self.parse_factor()?;
            left = Node::branch(
                NodeKind::BinaryOp,
                operator.text,
                vec![left, right],
                operator.line,
            );
        }
        self.depth -= folds;
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Node, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number => Ok(Node::leaf(NodeKind::Number, token.text, token.line)),
            TokenKind::Identifier => Ok(Node::leaf(NodeKind::Identifier, token.text, token.line)),
            TokenKind::String => Ok(Node::leaf(NodeKind::String, token.text, token.line)),
            TokenKind::Punctuation if token.text == "(" => {
                self.nest(&token)?;
                let expr = self.parse_expression()?;
                self.depth -= 1;
                if self.peek().is(TokenKind::Punctuation, ")") {
                    self.advance();
                    Ok(expr)
                } else {
                    Err(ParseError {
                        line: token.line,
                        expected: "')' to close '('".to_string(),
                        found: describe(self.peek()),
                    })
                }
            }
            _ => Err(self.error(&token, "expression")),
        }
    }
}

#[tracing::instrument(level = "trace", skip(tokens))]
pub fn parse(tokens: TokenList) -> Result<Node, ParseError> {
    let mut parser = Parser::new(tokens.tokens);
    let program = parser.parse_program()?;
    trace!(
        statements = program.children.len(),
        nodes = program.size(),
        "Parsed program"
    );
    Ok(program)
}
