use std::fmt::Display;
use std::sync::Arc;

/// A named piece of Bolton source text.
///
/// Every diagnostic keeps a handle to the file it was raised against, so that it can be
/// rendered long after the scanner and the parser are gone.
#[derive(Debug, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    text: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            text: text.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A location in a source file. Lines and columns are zero-based, columns count characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn advance(&mut self, c: char) {
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
    }

    /// The position one column to the right, on the same line.
    pub fn next_column(self) -> Self {
        Self {
            column: self.column + 1,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A span going from the start of `self` to the end of `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
        }
    }
}

/// Render the source lines covered by `span`, each followed by a row of carets under the
/// offending characters.
pub fn underline(text: &str, span: Span) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    // A span that stops right after a line break does not really touch the following line.
    let last_line = if span.end.line > span.start.line && span.end.column == 0 {
        span.end.line - 1
    } else {
        span.end.line
    };

    let mut rendered = Vec::new();
    for number in span.start.line..=last_line {
        let line = lines
            .get(number)
            .copied()
            .unwrap_or_default()
            .trim_end_matches('\r');
        let from = if number == span.start.line {
            span.start.column
        } else {
            0
        };
        let to = if number == span.end.line {
            span.end.column
        } else {
            line.chars().count().max(from + 1)
        };
        let carets = to.saturating_sub(from).max(1);
        rendered.push(format!("{line}\n{}{}", " ".repeat(from), "^".repeat(carets)));
    }
    rendered.join("\n")
}

/// The common layout of lexical and syntax diagnostics.
pub fn report(headline: &impl Display, span: &Span, file: &SourceFile) -> String {
    format!(
        "{headline}\nFile {}, line {}\n\n{}",
        file.name(),
        span.start.line + 1,
        underline(file.text(), *span)
    )
}
