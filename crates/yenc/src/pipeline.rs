use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::diagnostics::{self, Diagnostic, DiagnosticStage};
use crate::interpreter::{Interpreter, RuntimeError};
use crate::parser::{self, Node, ParseError};
use crate::reader::SourceFile;
use crate::tokenizer::{self, LexError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("cannot write {}: {source}", path.display())]
    Emit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn to_diagnostic(&self, source: &SourceFile) -> Diagnostic {
        match self {
            PipelineError::Lex(err) => diagnostics::from_lex_error(source, err),
            PipelineError::Parse(err) => diagnostics::from_parse_error(source, err),
            PipelineError::Runtime(err) => diagnostics::from_runtime_error(source, err),
            PipelineError::Emit { .. } => Diagnostic::new(
                "YEN-EMIT-001",
                DiagnosticStage::Emit,
                "cannot write build artifacts",
            )
            .with_note(self.to_string()),
        }
    }
}

fn emit_json(dir: &Path, file_name: &str, value: &impl Serialize) -> Result<(), PipelineError> {
    let path = dir.join(file_name);
    let written = std::fs::create_dir_all(dir)
        .and_then(|()| serde_json::to_string_pretty(value).map_err(std::io::Error::from))
        .and_then(|json| std::fs::write(&path, json));
    match written {
        Ok(()) => {
            debug!(path = %path.display(), "Wrote artifact");
            Ok(())
        }
        Err(source) => Err(PipelineError::Emit { path, source }),
    }
}

/// Tokenizes and parses `source`. With `emit_dir`, the token list and the
/// tree are also written there as `tokens.json` and `ast.json`.
pub fn front_end(source: &SourceFile, emit_dir: Option<&Path>) -> Result<Node, PipelineError> {
    let tokens = tokenizer::tokenize(source.lines())?;
    trace!(token_count = tokens.tokens.len(), "Tokenized source file");
    if let Some(dir) = emit_dir {
        emit_json(dir, "tokens.json", &tokens)?;
    }

    let ast = parser::parse(tokens)?;
    debug!(statements = ast.children.len(), "Parsed source file");
    if let Some(dir) = emit_dir {
        emit_json(dir, "ast.json", &ast)?;
    }
    Ok(ast)
}

/// Runs `source` to completion against the given streams.
pub fn run<R: BufRead, W: Write>(
    source: &SourceFile,
    emit_dir: Option<&Path>,
    input: R,
    output: W,
) -> Result<(), PipelineError> {
    let ast = front_end(source, emit_dir)?;
    let mut interpreter = Interpreter::new(input, output);
    interpreter.compile(&ast)?;
    info!(path = %source.path().display(), "Program executed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn run_text(text: &str, stdin: &str) -> (Result<(), PipelineError>, String) {
        let source = SourceFile::from_text("test.yen", text);
        let mut output = Vec::new();
        let result = run(&source, None, Cursor::new(stdin.as_bytes()), &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn runs_a_whole_program() {
        let (result, output) = run_text(
            r#"
var greeting: string = 'hello';
var name: string = "world";
input("who? ")
if (name) { print(greeting + name) } else { print("nobody") }
;
"#,
            "ignored\n",
        );
        result.unwrap();
        assert_eq!(output, "who? helloworld\n");
    }

    #[test]
    fn each_stage_reports_its_own_error() {
        let (result, _) = run_text("print(@)", "");
        assert!(matches!(result, Err(PipelineError::Lex(_))));

        let (result, _) = run_text("print(1", "");
        assert!(matches!(result, Err(PipelineError::Parse(_))));

        let (result, _) = run_text("print(y);", "");
        match result {
            Err(PipelineError::Runtime(err)) => assert!(err.to_string().contains('y')),
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn parse_errors_prevent_any_execution() {
        let (result, output) = run_text("print(\"a\")\nprint(\"b\"", "");
        assert!(result.is_err());
        assert_eq!(output, "");
    }

    #[test]
    fn emit_writes_tokens_and_ast() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceFile::from_text("test.yen", "print(\"hi\")");
        let ast = front_end(&source, Some(dir.path())).unwrap();

        let tokens: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("tokens.json")).unwrap())
                .unwrap();
        assert_eq!(tokens["tokens"][0]["kind"], "Keyword");
        assert_eq!(tokens["tokens"][4]["kind"], "EndOfFile");

        let emitted: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("ast.json")).unwrap())
                .unwrap();
        assert_eq!(emitted, serde_json::to_value(&ast).unwrap());
        assert_eq!(
            emitted["children"][0]["children"][0],
            serde_json::json!({
                "kind": "String",
                "value": "hi",
                "children": [],
                "line": 1
            })
        );
    }

    #[test]
    fn runtime_diagnostic_points_at_the_line() {
        let source = SourceFile::from_text("test.yen", "print(\"ok\")\nprint(missing)");
        let err = run(&source, None, Cursor::new(Vec::new()), Vec::new()).unwrap_err();
        let diagnostic = err.to_diagnostic(&source);
        assert_eq!(diagnostic.code, "YEN-RUNTIME-002");
        assert_eq!(diagnostic.stage, DiagnosticStage::Runtime);
        assert!(diagnostic.notes.contains(&"at line 2".to_string()));
    }
}
