use std::collections::HashMap;
use std::fmt;
use std::io::IsTerminal;
use std::ops::Range;

use ariadne::{sources, Config, Label, Report, ReportKind};

use crate::interpreter::RuntimeError;
use crate::parser::ParseError;
use crate::reader::{ReadError, SourceFile};
use crate::tokenizer::LexError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticStage {
    Read,
    Tokenize,
    Parse,
    Runtime,
    Emit,
}

impl fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticStage::Read => "read",
            DiagnosticStage::Tokenize => "tokenize",
            DiagnosticStage::Parse => "parse",
            DiagnosticStage::Runtime => "runtime",
            DiagnosticStage::Emit => "emit",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLabel {
    pub file_id: String,
    /// Character offsets into the labelled source.
    pub span: Range<usize>,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub code: String,
    pub stage: DiagnosticStage,
    pub message: String,
    pub labels: Vec<SourceLabel>,
    pub notes: Vec<String>,
    pub help: Option<String>,
    pub sources: HashMap<String, String>,
}

impl Diagnostic {
    pub fn new(code: impl Into<String>, stage: DiagnosticStage, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            stage,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            help: None,
            sources: HashMap::new(),
        }
    }

    pub fn with_source(mut self, file_id: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(file_id.into(), source.into());
        self
    }

    pub fn with_label(
        mut self,
        file_id: impl Into<String>,
        span: Range<usize>,
        message: impl Into<String>,
    ) -> Self {
        self.labels.push(SourceLabel {
            file_id: file_id.into(),
            span,
            message: message.into(),
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn render_plain(&self) -> String {
        self.render_with_color(false)
    }

    pub fn render_terminal_auto(&self) -> String {
        self.render_with_color(std::io::stderr().is_terminal())
    }

    fn render_with_color(&self, use_color: bool) -> String {
        let (primary_file_id, primary_span) = if let Some(label) = self.labels.first() {
            (label.file_id.clone(), sanitize_span(&label.span))
        } else if let Some(file_id) = self.sources.keys().next() {
            (file_id.clone(), 0..1)
        } else {
            ("<unknown>".to_string(), 0..1)
        };

        let mut report = Report::build(
            ReportKind::Error,
            (primary_file_id.clone(), primary_span.clone()),
        )
        .with_code(self.code.clone())
        .with_message(format!("error[{}]: {}", self.stage, self.message))
        .with_config(Config::default().with_color(use_color));

        for label in &self.labels {
            report = report.with_label(
                Label::new((label.file_id.clone(), sanitize_span(&label.span)))
                    .with_message(label.message.clone()),
            );
        }
        for note in &self.notes {
            report = report.with_note(note.clone());
        }
        if let Some(help) = &self.help {
            report = report.with_help(help.clone());
        }

        let mut source_entries = self
            .sources
            .iter()
            .map(|(id, src)| (id.clone(), src.clone()))
            .collect::<Vec<_>>();
        if !source_entries.iter().any(|(id, _)| id == &primary_file_id) {
            source_entries.push((primary_file_id, String::new()));
        }

        let mut output = Vec::new();
        match report.finish().write(sources(source_entries), &mut output) {
            Ok(()) => String::from_utf8_lossy(&output).trim_end().to_string(),
            Err(_) => self.fallback_render(),
        }
    }

    fn fallback_render(&self) -> String {
        let mut out = format!("error[{}:{}]: {}", self.stage, self.code, self.message);
        for note in &self.notes {
            out.push_str("\nnote: ");
            out.push_str(note);
        }
        if let Some(help) = &self.help {
            out.push_str("\nhelp: ");
            out.push_str(help);
        }
        out
    }
}

pub fn file_id(source: &SourceFile) -> String {
    source.path().display().to_string()
}

/// Attaches `source` and, when `line` falls inside it, a label covering that
/// whole line.
fn with_line_label(
    diagnostic: Diagnostic,
    source: &SourceFile,
    line: usize,
    message: impl Into<String>,
) -> Diagnostic {
    let id = file_id(source);
    let diagnostic = diagnostic
        .with_source(id.clone(), source.text())
        .with_note(format!("at line {line}"));
    match line_span(source, line) {
        Some(span) => diagnostic.with_label(id, span, message),
        None => diagnostic,
    }
}

pub fn from_read_error(error: &ReadError) -> Diagnostic {
    Diagnostic::new("YEN-READ-001", DiagnosticStage::Read, "cannot read source file")
        .with_note(error.to_string())
}

pub fn from_lex_error(source: &SourceFile, error: &LexError) -> Diagnostic {
    match error {
        LexError::UnexpectedCharacter {
            line,
            column,
            character,
        } => {
            let id = file_id(source);
            let diagnostic = Diagnostic::new(
                "YEN-TOKENIZE-001",
                DiagnosticStage::Tokenize,
                "tokenization failed",
            )
            .with_source(id.clone(), source.text())
            .with_note(format!("at line {line}"));
            match line_span(source, *line) {
                Some(span) => {
                    let start = span.start + column;
                    diagnostic.with_label(id, start..start + 1, format!("unexpected '{character}'"))
                }
                None => diagnostic,
            }
        }
        LexError::UnterminatedString { line } => with_line_label(
            Diagnostic::new(
                "YEN-TOKENIZE-002",
                DiagnosticStage::Tokenize,
                "tokenization failed",
            )
            .with_help("strings must be closed on the line they start"),
            source,
            *line,
            "unterminated string",
        ),
    }
}

pub fn from_parse_error(source: &SourceFile, error: &ParseError) -> Diagnostic {
    with_line_label(
        Diagnostic::new("YEN-PARSE-001", DiagnosticStage::Parse, "parse failed"),
        source,
        error.line,
        format!("expected {}, found {}", error.expected, error.found),
    )
}

pub fn from_runtime_error(source: &SourceFile, error: &RuntimeError) -> Diagnostic {
    let code = match error {
        RuntimeError::UnsupportedNode { .. } => "YEN-RUNTIME-001",
        RuntimeError::UndefinedVariable { .. } => "YEN-RUNTIME-002",
        RuntimeError::MalformedNode { .. } => "YEN-RUNTIME-003",
        RuntimeError::Io(_) => "YEN-RUNTIME-004",
    };
    let diagnostic = Diagnostic::new(code, DiagnosticStage::Runtime, "execution failed");
    match error.line() {
        Some(line) => with_line_label(diagnostic, source, line, error.to_string()),
        None => diagnostic.with_note(error.to_string()),
    }
}

/// Character range of the 1-based `line` inside [`SourceFile::text`].
pub fn line_span(source: &SourceFile, line: usize) -> Option<Range<usize>> {
    let index = line.checked_sub(1)?;
    let text = source.lines().get(index)?;
    let start = source.lines()[..index]
        .iter()
        .map(|previous| previous.chars().count() + 1)
        .sum::<usize>();
    Some(start..start + text.chars().count())
}

pub fn sanitize_span(span: &Range<usize>) -> Range<usize> {
    if span.end <= span.start {
        span.start..span.start.saturating_add(1)
    } else {
        span.clone()
    }
}
