//! Indented line writer
//!
//! Four spaces per level. Blocks are opened with `block`, which writes the
//! header line and runs the body one level deeper, so a header can never be
//! left without an indented body as long as the body writes something.

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub(crate) struct CodeWriter {
    buf: String,
    level: usize,
}

impl CodeWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.level {
            self.buf.push_str(INDENT);
        }
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    pub(crate) fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Append pre-indented text verbatim at the current level
    pub(crate) fn raw(&mut self, text: &str) {
        for line in text.lines() {
            if line.is_empty() {
                self.blank();
            } else {
                self.line(line);
            }
        }
    }

    /// `header` must end with `:`
    pub(crate) fn block<T>(&mut self, header: impl AsRef<str>, body: impl FnOnce(&mut Self) -> T) -> T {
        self.line(header);
        self.level += 1;
        let out = body(self);
        self.level -= 1;
        out
    }

    pub(crate) fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_blocks_indent_by_four() {
        let mut w = CodeWriter::new();
        w.block("def f():", |w| {
            w.block("if x:", |w| w.line("return 1"));
            w.line("return 0");
        });
        assert_eq!(w.finish(), "def f():\n    if x:\n        return 1\n    return 0\n");
    }

    #[test]
    fn raw_keeps_relative_indent() {
        let mut w = CodeWriter::new();
        w.block("class A:", |w| w.raw("def m(self):\n    pass\n\nx = 1"));
        assert_eq!(
            w.finish(),
            "class A:\n    def m(self):\n        pass\n\n    x = 1\n"
        );
    }
}
