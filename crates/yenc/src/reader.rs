use std::path::{Path, PathBuf};

use tracing::trace;

#[derive(Debug, thiserror::Error)]
#[error("cannot read {}: {source}", path.display())]
pub struct ReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// A source file split into lines, without line terminators.
#[derive(Clone, Debug)]
pub struct SourceFile {
    path: PathBuf,
    lines: Vec<String>,
}

impl SourceFile {
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// The lines joined back together with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

pub fn read_source(path: &Path) -> Result<SourceFile, ReadError> {
    let text = std::fs::read_to_string(path).map_err(|source| ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let source = SourceFile::from_text(path, &text);
    trace!(path = %path.display(), lines = source.line_count(), "Read source file");
    Ok(source)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn splits_lines_and_drops_terminators() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "print(\"a\")\r\n\nprint(\"b\")\n").unwrap();

        let source = read_source(file.path()).unwrap();
        assert_eq!(source.lines(), ["print(\"a\")", "", "print(\"b\")"]);
        assert_eq!(source.line_count(), 3);
        assert_eq!(source.path(), file.path());
    }

    #[test]
    fn empty_file_has_no_lines() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = read_source(file.path()).unwrap();
        assert_eq!(source.line_count(), 0);
        assert_eq!(source.text(), "");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yen");
        let err = read_source(&path).unwrap_err();
        assert_eq!(err.path, path);
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
        assert!(err.to_string().contains("missing.yen"));
    }

    #[test]
    fn text_rejoins_lines() {
        let source = SourceFile::from_text("inline.yen", "a\nb\n");
        assert_eq!(source.text(), "a\nb");
    }
}
