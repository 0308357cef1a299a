//! Tree-walking execution of a parsed program.
//!
//! Every value is a string. `+`, and any other binary operator, concatenates
//! its operands; numbers are never interpreted.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use tracing::{debug, trace};

use crate::parser::{Node, NodeKind};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("line {line}: unsupported {kind} node")]
    UnsupportedNode { kind: NodeKind, line: usize },
    #[error("line {line}: undefined variable {name}")]
    UndefinedVariable { name: String, line: usize },
    #[error("line {line}: malformed {kind} node, expected child #{expected_child}")]
    MalformedNode {
        kind: NodeKind,
        line: usize,
        expected_child: usize,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn line(&self) -> Option<usize> {
        match self {
            RuntimeError::UnsupportedNode { line, .. }
            | RuntimeError::UndefinedVariable { line, .. }
            | RuntimeError::MalformedNode { line, .. } => Some(*line),
            RuntimeError::Io(_) => None,
        }
    }
}

/// The single, global name to value mapping of one program run.
#[derive(Clone, Debug, Default)]
pub struct VariableTable {
    values: HashMap<String, String>,
}

impl VariableTable {
    /// Binds `name`, replacing any earlier value.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// `"0"` and `""` are false, everything else is true.
pub fn is_truthy(value: &str) -> bool {
    !(value.is_empty() || value == "0")
}

fn child(node: &Node, index: usize) -> Result<&Node, RuntimeError> {
    node.children
        .get(index)
        .ok_or(RuntimeError::MalformedNode {
            kind: node.kind,
            line: node.line,
            expected_child: index,
        })
}

pub struct Interpreter<R, W> {
    variables: VariableTable,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Interpreter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            variables: VariableTable::default(),
            input,
            output,
        }
    }

    #[cfg(test)]
    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs every statement of `ast` in order, stopping at the first error.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn compile(&mut self, ast: &Node) -> Result<(), RuntimeError> {
        if ast.kind != NodeKind::Program {
            return Err(RuntimeError::UnsupportedNode {
                kind: ast.kind,
                line: ast.line,
            });
        }
        for statement in &ast.children {
            self.execute(statement)?;
        }
        self.output.flush()?;
        debug!(variables = self.variables.len(), "Program finished");
        Ok(())
    }

    fn execute(&mut self, node: &Node) -> Result<(), RuntimeError> {
        trace!(kind = ?node.kind, line = node.line, "Executing statement");

        match node.kind {
            NodeKind::BinaryOp | NodeKind::StringConcat => {
                self.evaluate(node)?;
                Ok(())
            }
            NodeKind::Print => {
                let value = self.evaluate(child(node, 0)?)?;
                writeln!(self.output, "{value}")?;
                Ok(())
            }
            NodeKind::Input => self.execute_input(node),
            NodeKind::If => {
                let condition = self.evaluate(child(node, 0)?)?;
                if is_truthy(&condition) {
                    self.execute(child(node, 1)?)
                } else if let Some(else_branch) = node.children.get(2) {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            NodeKind::Var => self.bind(child(node, 0)?, child(node, 2)?),
            NodeKind::Assignment => self.bind(child(node, 0)?, child(node, 1)?),
            NodeKind::EmptyStatement => Ok(()),
            NodeKind::Program
            | NodeKind::Identifier
            | NodeKind::Number
            | NodeKind::String
            | NodeKind::Type => Err(RuntimeError::UnsupportedNode {
                kind: node.kind,
                line: node.line,
            }),
        }
    }

    fn execute_input(&mut self, node: &Node) -> Result<(), RuntimeError> {
        if let Some(prompt) = node.children.first() {
            let prompt = self.evaluate(prompt)?;
            write!(self.output, "{prompt}")?;
        }
        self.output.flush()?;

        // The line is read and dropped; input() has no target variable.
        let mut line = String::new();
        let read = self.input.read_line(&mut line)?;
        trace!(bytes = read, "Discarded input line");
        Ok(())
    }

    fn bind(&mut self, name: &Node, value: &Node) -> Result<(), RuntimeError> {
        let value = self.evaluate(value)?;
        debug!(name = %name.value, %value, "Binding variable");
        self.variables.define(name.value.clone(), value);
        Ok(())
    }

    fn evaluate(&self, node: &Node) -> Result<String, RuntimeError> {
        match node.kind {
            NodeKind::Number | NodeKind::String => Ok(node.value.clone()),
            NodeKind::Identifier => self
                .variables
                .get(&node.value)
                .map(str::to_string)
                .ok_or_else(|| RuntimeError::UndefinedVariable {
                    name: node.value.clone(),
                    line: node.line,
                }),
            // The operator is never consulted: "-", "*", "/" and "=" concatenate too.
            NodeKind::BinaryOp | NodeKind::StringConcat => {
                let left = self.evaluate(child(node, 0)?)?;
                let right = self.evaluate(child(node, 1)?)?;
                Ok(left + &right)
            }
            _ => Err(RuntimeError::UnsupportedNode {
                kind: node.kind,
                line: node.line,
            }),
        }
    }
}
