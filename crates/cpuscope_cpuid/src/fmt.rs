use core::fmt::{Formatter, Write};

enum IndentationFormat<'a> {
    Spaced(usize),
    Str(&'a str),
}

/// `core::fmt::Write` adapter that indents every line written through it.
pub struct Indenter<'a, 'b> {
    inner: &'a mut Formatter<'b>,
    format: IndentationFormat<'a>,
    needs_indent: bool,
}

impl<'a, 'b> Indenter<'a, 'b> {
    pub fn new(f: &'a mut Formatter<'b>) -> Self {
        Self::with_spaced(f, 4)
    }

    pub fn with_spaced(f: &'a mut Formatter<'b>, spaces: usize) -> Self {
        Self {
            inner: f,
            format: IndentationFormat::Spaced(spaces),
            needs_indent: true,
        }
    }

    pub fn with_str(f: &'a mut Formatter<'b>, s: &'a str) -> Self {
        Self {
            inner: f,
            format: IndentationFormat::Str(s),
            needs_indent: true,
        }
    }

    pub fn set_spaces(&mut self, spaces: usize) {
        self.format = IndentationFormat::Spaced(spaces)
    }

    fn write_indent(&mut self) -> core::fmt::Result {
        match self.format {
            IndentationFormat::Spaced(size) => write!(self.inner, "{: >size$}", ""),
            IndentationFormat::Str(s) => self.inner.write_str(s),
        }
    }
}

impl Write for Indenter<'_, '_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for (idx, line) in s.split('\n').enumerate() {
            if idx > 0 {
                self.inner.write_char('\n')?;
                self.needs_indent = true;
            }
            if line.is_empty() {
                continue;
            }

            if self.needs_indent {
                self.write_indent()?;
                // Values formatted into the middle of a line don't get indented again
                self.needs_indent = false;
            }

            self.inner.write_str(line)?;
        }
        Ok(())
    }
}
