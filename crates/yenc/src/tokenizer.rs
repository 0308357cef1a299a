//! An eager, line-oriented tokenizer for Yen source files.
//!
//! The whole source is consumed before anything is handed to the parser, and
//! scanning never crosses a line boundary: every token lives on exactly one
//! line, and the list always ends with a single [`TokenKind::EndOfFile`].

use std::fmt;

use serde::Serialize;
use tracing::trace;

/// Characters that start an operator token.
const OPERATOR_CHARS: &str = "+-*/=!<>";
/// Characters that start a punctuation token.
const PUNCTUATION_CHARS: &str = ";(){}:";
const KEYWORDS: [&str; 5] = ["var", "print", "input", "if", "else"];

#[derive(Debug, Serialize)]
pub struct TokenList {
    pub tokens: Vec<Token>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Number,
    Identifier,
    Operator,
    Keyword,
    Punctuation,
    String,
    EndOfFile,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Number => "number",
            TokenKind::Identifier => "identifier",
            TokenKind::Operator => "operator",
            TokenKind::Keyword => "keyword",
            TokenKind::Punctuation => "punctuation",
            TokenKind::String => "string",
            TokenKind::EndOfFile => "end of file",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw lexeme. Numbers are never converted, strings lose their quotes.
    pub text: String,
    /// 1-based source line.
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }

    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::EndOfFile
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character '{character}' on line {line}")]
    UnexpectedCharacter {
        line: usize,
        /// 0-based, counted in characters.
        column: usize,
        character: char,
    },
    #[error("unterminated string on line {line}")]
    UnterminatedString { line: usize },
}

/// Scan position inside a single line.
struct LineCursor {
    chars: Vec<char>,
    position: usize,
    line: usize,
}

impl LineCursor {
    fn new(text: &str, line: usize) -> Self {
        Self {
            chars: text.chars().collect(),
            position: 0,
            line,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += 1;
        Some(c)
    }

    fn take_while(&mut self, mut accept: impl FnMut(char) -> bool) -> String {
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if !accept(c) {
                break;
            }
            lexeme.push(c);
            self.position += 1;
        }
        lexeme
    }

    fn token(&self, kind: TokenKind, text: String) -> Token {
        Token::new(kind, text, self.line)
    }

    fn read_number(&mut self) -> Token {
        // "1.2.3" is passed through as-is; nothing downstream interprets it.
        let text = self.take_while(|c| c.is_ascii_digit() || c == '.');
        self.token(TokenKind::Number, text)
    }

    fn read_word(&mut self) -> Token {
        let text = self.take_while(|c| c.is_ascii_alphanumeric());
        let kind = if KEYWORDS.contains(&text.as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        self.token(kind, text)
    }

    fn read_operator(&mut self, first: char) -> Token {
        let mut text = String::from(first);
        self.position += 1;
        if "=!<>".contains(first) && self.peek() == Some('=') {
            text.push('=');
            self.position += 1;
        }
        self.token(TokenKind::Operator, text)
    }

    fn read_punctuation(&mut self, first: char) -> Token {
        let mut text = String::from(first);
        self.position += 1;
        if first == ':' && self.peek() == Some(':') {
            text.push(':');
            self.position += 1;
        }
        self.token(TokenKind::Punctuation, text)
    }

    fn read_string(&mut self, delimiter: char) -> Result<Token, LexError> {
        self.position += 1;
        let text = self.take_while(|c| c != delimiter);
        match self.advance() {
            Some(_) => Ok(self.token(TokenKind::String, text)),
            None => Err(LexError::UnterminatedString { line: self.line }),
        }
    }
}

#[tracing::instrument(level = "trace", skip_all)]
pub fn tokenize<S: AsRef<str>>(lines: &[S]) -> Result<TokenList, LexError> {
    let mut tokens = TokenList { tokens: vec![] };

    for (index, text) in lines.iter().enumerate() {
        let mut cursor = LineCursor::new(text.as_ref(), index + 1);
        while let Some(c) = cursor.peek() {
            // C `isspace`: ASCII whitespace plus vertical tab.
            if c.is_ascii_whitespace() || c == '\x0b' {
                cursor.position += 1;
            } else if c.is_ascii_digit() {
                tokens.tokens.push(cursor.read_number());
            } else if c.is_ascii_alphabetic() {
                tokens.tokens.push(cursor.read_word());
            } else if OPERATOR_CHARS.contains(c) {
                tokens.tokens.push(cursor.read_operator(c));
            } else if PUNCTUATION_CHARS.contains(c) {
                tokens.tokens.push(cursor.read_punctuation(c));
            } else if c == '"' || c == '\'' {
                tokens.tokens.push(cursor.read_string(c)?);
            } else {
                return Err(LexError::UnexpectedCharacter {
                    line: cursor.line,
                    column: cursor.position,
                    character: c,
                });
            }
        }
    }

    tokens
        .tokens
        .push(Token::new(TokenKind::EndOfFile, "", lines.len()));
    trace!(token_count = tokens.tokens.len(), "Tokenized source");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(lines: &[&str]) -> String {
        let tokens = tokenize(lines).expect("tokenize source");
        tokens
            .tokens
            .iter()
            .map(|token| format!("{} {:?} @{}", token.kind, token.text, token.line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn tokenizes_declaration_and_print() {
        insta::assert_snapshot!(dump(&["var x: string = \"hi\";", "print(x);"]), @r#"
        keyword "var" @1
        identifier "x" @1
        punctuation ":" @1
        identifier "string" @1
        operator "=" @1
        string "hi" @1
        punctuation ";" @1
        keyword "print" @2
        punctuation "(" @2
        identifier "x" @2
        punctuation ")" @2
        punctuation ";" @2
        end of file "" @2
        "#);
    }

    #[test]
    fn empty_source_still_ends_with_eof() {
        let tokens = tokenize::<&str>(&[]).unwrap();
        assert_eq!(tokens.tokens, vec![Token::new(TokenKind::EndOfFile, "", 0)]);

        let tokens = tokenize(&["", "   "]).unwrap();
        assert_eq!(tokens.tokens, vec![Token::new(TokenKind::EndOfFile, "", 2)]);
    }

    #[test]
    fn exactly_one_eof_at_the_end() {
        let tokens = tokenize(&["if (a) { print(b) }", "", "x = 1;"]).unwrap();
        let eof_count = tokens.tokens.iter().filter(|t| t.is_eof()).count();
        assert_eq!(eof_count, 1);
        assert!(tokens.tokens.last().unwrap().is_eof());
        assert_eq!(tokens.tokens.last().unwrap().line, 3);
    }

    #[test]
    fn compound_operators_are_single_tokens() {
        let tokens = tokenize(&["a == b != c <= d >= e = f ! g < h"]).unwrap();
        let operators = tokens
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(operators, vec!["==", "!=", "<=", ">=", "=", "!", "<"]);
    }

    #[test]
    fn only_equals_joins_operators() {
        let tokens = tokenize(&["+= =+ *="]).unwrap();
        let texts = tokens
            .tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["+", "=", "=", "+", "*", "=", ""]);
    }

    #[test]
    fn double_colon_is_one_punctuation_token() {
        let tokens = tokenize(&["a::b : c"]).unwrap();
        let punctuation = tokens
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Punctuation)
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(punctuation, vec!["::", ":"]);
    }

    #[test]
    fn numbers_keep_raw_text() {
        let tokens = tokenize(&["12 3.5 1.2.3"]).unwrap();
        let numbers = tokens
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Number)
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(numbers, vec!["12", "3.5", "1.2.3"]);
    }

    #[test]
    fn keywords_are_exact_matches() {
        insta::assert_snapshot!(dump(&["if else elsewhere var1 input print"]), @r#"
        keyword "if" @1
        keyword "else" @1
        identifier "elsewhere" @1
        identifier "var1" @1
        keyword "input" @1
        keyword "print" @1
        end of file "" @1
        "#);
    }

    #[test]
    fn both_quote_styles_make_strings() {
        let tokens = tokenize(&[r#"'it"s' "it's""#]).unwrap();
        assert_eq!(tokens.tokens[0], Token::new(TokenKind::String, "it\"s", 1));
        assert_eq!(tokens.tokens[1], Token::new(TokenKind::String, "it's", 1));
    }

    #[test]
    fn unterminated_string_fails_on_its_line() {
        let err = tokenize(&["print(\"ok\")", "print(\"oops)", "\")"]).unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { line: 2 }));
    }

    #[test]
    fn unexpected_character_reports_line_and_column() {
        let err = tokenize(&["var a: n = 1;", "  a = $;"]).unwrap_err();
        match err {
            LexError::UnexpectedCharacter {
                line,
                column,
                character,
            } => {
                assert_eq!((line, column, character), (2, 6, '$'));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn vertical_tab_is_whitespace() {
        let tokens = tokenize(&["\x0bprint(1)\x0b", "\t\x0c;"]).unwrap();
        let texts = tokens
            .tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["print", "(", "1", ")", ";", ""]);
    }

    #[test]
    fn underscores_are_not_identifier_characters() {
        let err = tokenize(&["my_var"]).unwrap_err();
        assert!(matches!(
            err,
            LexError::UnexpectedCharacter { character: '_', .. }
        ));
    }
}
