/// Output buffer for generated C. The backend writes with minimal layout;
/// the external formatter normalizes whitespace afterwards.
pub struct CEmitter {
    output: String,
}

impl CEmitter {
    pub fn new() -> Self {
        Self {
            output: String::new(),
        }
    }

    /// Append raw text.
    pub fn emit(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Append text followed by a newline.
    pub fn emit_line(&mut self, line: &str) {
        self.output.push_str(line);
        self.output.push('\n');
    }

    /// Consume and return the generated output.
    pub fn finish(self) -> String {
        self.output
    }
}

impl Default for CEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_raw_and_lines() {
        let mut e = CEmitter::new();
        e.emit("int x");
        e.emit_line(" = 5;");
        e.emit_line("return x;");
        assert_eq!(e.finish(), "int x = 5;\nreturn x;\n");
    }
}
