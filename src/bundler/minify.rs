//! Output minification

use std::path::Path;

use crate::error::{BuildError, BuildResult};
use crate::utils::{scan_literals, LiteralKind};

/// Shrinks packaged JavaScript
pub trait Minifier: Send + Sync {
    fn name(&self) -> &str;

    fn minify(&self, code: &str, path: &Path) -> BuildResult<String>;
}

/// Removes comments and collapses whitespace. Line breaks survive so that
/// automatic semicolon insertion keeps working. Strings, templates and
/// regular expression literals are copied verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceMinifier;

impl Minifier for WhitespaceMinifier {
    fn name(&self) -> &str {
        "whitespace"
    }

    fn minify(&self, code: &str, path: &Path) -> BuildResult<String> {
        let literals = scan_literals(code);
        if literals.iter().any(|l| !l.terminated) {
            return Err(BuildError::diagnostic(
                "minify",
                path,
                "unterminated string or comment",
            ));
        }

        let mut squeezer = Squeezer::default();
        let mut cursor = 0;
        for literal in &literals {
            squeezer.code(&code[cursor..literal.start]);
            let text = &code[literal.start..literal.end];
            match literal.kind {
                LiteralKind::LineComment => {}
                LiteralKind::BlockComment => {
                    squeezer.pending_space = true;
                    squeezer.pending_newline |= text.contains('\n');
                }
                _ => squeezer.verbatim(text),
            }
            cursor = literal.end;
        }
        squeezer.code(&code[cursor..]);

        let mut result = squeezer.out;
        result.push('\n');
        Ok(result)
    }
}

#[derive(Default)]
struct Squeezer {
    out: String,
    pending_space: bool,
    pending_newline: bool,
}

impl Squeezer {
    fn code(&mut self, segment: &str) {
        for c in segment.chars() {
            if c == '\n' {
                self.pending_newline = true;
            } else if c.is_whitespace() {
                self.pending_space = true;
            } else {
                self.separate(c);
                self.out.push(c);
            }
        }
    }

    fn verbatim(&mut self, text: &str) {
        if let Some(first) = text.chars().next() {
            self.separate(first);
            self.out.push_str(text);
        }
    }

    fn separate(&mut self, next: char) {
        if !self.out.is_empty() {
            if self.pending_newline {
                self.out.push('\n');
            } else if self.pending_space && needs_space(self.out.chars().next_back(), next) {
                self.out.push(' ');
            }
        }
        self.pending_space = false;
        self.pending_newline = false;
    }
}

/// A space is kept between two word characters and inside `+ +`, `- -` and `/ /`
fn needs_space(prev: Option<char>, next: char) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    match prev {
        Some(p) => (is_word(p) && is_word(next)) || (p == next && matches!(p, '+' | '-' | '/')),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_strips_comments_and_spaces() {
        let code = "// header\nvar a = 1; /* inline */ var b = \"x  // y\";\n\n\n  function f ( x ) {\n    return x + 1;\n  }\n";
        let out = WhitespaceMinifier.minify(code, Path::new("a.js")).unwrap();
        assert_eq!(out, "var a=1;var b=\"x  // y\";\nfunction f(x){\nreturn x+1;\n}\n");
    }

    #[test]
    fn test_minify_keeps_escaped_quotes() {
        let code = "var s = \"a\\\"  b\";  var t = 'c';";
        let out = WhitespaceMinifier.minify(code, Path::new("a.js")).unwrap();
        assert_eq!(out, "var s=\"a\\\"  b\";var t='c';\n");
    }

    #[test]
    fn test_minify_keeps_regex_literals() {
        let code = "var re = /[\"']/g;\nvar half = total / 2;\nvar ok = re.test(s) && /\\/  \\//.test(p);\n";
        let out = WhitespaceMinifier.minify(code, Path::new("a.js")).unwrap();
        assert_eq!(out, "var re=/[\"']/g;\nvar half=total/2;\nvar ok=re.test(s)&&/\\/  \\//.test(p);\n");
    }

    #[test]
    fn test_unterminated_string_is_diagnostic() {
        let err = WhitespaceMinifier.minify("var s = \"abc", Path::new("a.js")).unwrap_err();
        assert!(matches!(err, BuildError::Diagnostic { stage: "minify", .. }));
    }
}
