//! Literal and comment spans in JavaScript source
//!
//! Pattern-based passes (import scanning, lowering, minification) must not
//! look inside strings, templates, regular expressions or comments. This is a
//! single forward scan that finds those spans; everything between them is code.

use std::borrow::Cow;

use regex::{Captures, Regex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    LineComment,
    BlockComment,
    String,
    Template,
    Regex,
}

/// Byte range of one literal or comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub start: usize,
    pub end: usize,
    /// False when the source ends (or a quoted string hits a newline) first
    pub terminated: bool,
}

impl Literal {
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, LiteralKind::LineComment | LiteralKind::BlockComment)
    }
}

/// Words after which `/` starts a regular expression rather than a division
const REGEX_PREFIX_KEYWORDS: [&str; 14] = [
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do", "else",
    "yield", "await",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev {
    Operand,
    Operator,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// Every literal and comment in `source`, in source order
pub fn scan_literals(source: &str) -> Vec<Literal> {
    let bytes = source.as_bytes();
    let mut literals = Vec::new();
    let mut prev = Prev::Operator;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        let start = i;

        let (kind, end, terminated) = match b {
            b'/' if next == Some(b'/') => {
                let end = find_byte(bytes, i + 2, b'\n').unwrap_or(bytes.len());
                (LiteralKind::LineComment, end, true)
            }
            b'/' if next == Some(b'*') => match find_seq(bytes, i + 2, b"*/") {
                Some(pos) => (LiteralKind::BlockComment, pos + 2, true),
                None => (LiteralKind::BlockComment, bytes.len(), false),
            },
            b'"' | b'\'' => {
                let (end, terminated) = scan_quoted(bytes, i);
                prev = Prev::Operand;
                (LiteralKind::String, end, terminated)
            }
            b'`' => {
                let (end, terminated) = scan_template(bytes, i);
                prev = Prev::Operand;
                (LiteralKind::Template, end, terminated)
            }
            b'/' if prev == Prev::Operator => match scan_regex(bytes, i) {
                Some(end) => {
                    prev = Prev::Operand;
                    (LiteralKind::Regex, end, true)
                }
                None => {
                    i += 1;
                    continue;
                }
            },
            _ if is_word_byte(b) => {
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                let word = &source[start..i];
                prev = if REGEX_PREFIX_KEYWORDS.contains(&word) {
                    Prev::Operator
                } else {
                    Prev::Operand
                };
                continue;
            }
            _ => {
                if b == b')' || b == b']' {
                    prev = Prev::Operand;
                } else if !b.is_ascii_whitespace() {
                    prev = Prev::Operator;
                }
                i += 1;
                continue;
            }
        };

        literals.push(Literal {
            kind,
            start,
            end,
            terminated,
        });
        i = end;
    }

    literals
}

/// The literal enclosing `offset`, if any. `literals` must be in source order.
pub fn literal_at(literals: &[Literal], offset: usize) -> Option<&Literal> {
    let index = literals.partition_point(|l| l.end <= offset);
    literals.get(index).filter(|l| l.contains(offset))
}

/// Like [`Regex::replace_all`], but matches that start inside a literal or
/// comment are left alone
pub fn replace_in_code<'t, F>(re: &Regex, text: &'t str, mut replace: F) -> Cow<'t, str>
where
    F: FnMut(&Captures<'_>) -> String,
{
    let literals = scan_literals(text);
    let mut out = String::new();
    let mut replaced = false;
    let mut last = 0;
    let mut at = 0;

    while at <= text.len() {
        let Some(cap) = re.captures_at(text, at) else { break };
        let Some(whole) = cap.get(0) else { break };

        if let Some(literal) = literal_at(&literals, whole.start()) {
            at = literal.end.max(whole.start() + 1);
            continue;
        }

        out.push_str(&text[last..whole.start()]);
        out.push_str(&replace(&cap));
        replaced = true;
        last = whole.end();
        at = whole.end().max(whole.start() + 1);
    }

    if !replaced {
        return Cow::Borrowed(text);
    }
    out.push_str(&text[last..]);
    Cow::Owned(out)
}

/// Captures of every match of `re` that starts in code
pub fn captures_in_code<'t>(re: &Regex, text: &'t str) -> Vec<Captures<'t>> {
    let literals = scan_literals(text);
    re.captures_iter(text)
        .filter(|cap| {
            cap.get(0)
                .map_or(false, |whole| literal_at(&literals, whole.start()).is_none())
        })
        .collect()
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes[from.min(bytes.len())..]
        .iter()
        .position(|&b| b == needle)
        .map(|pos| from + pos)
}

fn find_seq(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes[from.min(bytes.len())..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| from + pos)
}

fn scan_quoted(bytes: &[u8], start: usize) -> (usize, bool) {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return (i, false),
            b if b == quote => return (i + 1, true),
            _ => i += 1,
        }
    }
    (bytes.len(), false)
}

fn scan_template(bytes: &[u8], start: usize) -> (usize, bool) {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return (i + 1, true),
            b'$' if bytes.get(i + 1) == Some(&b'{') => match scan_substitution(bytes, i + 2) {
                Some(end) => i = end,
                None => return (bytes.len(), false),
            },
            _ => i += 1,
        }
    }
    (bytes.len(), false)
}

/// Index just past the `}` closing a `${` substitution
fn scan_substitution(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                let (end, terminated) = scan_quoted(bytes, i);
                if !terminated {
                    return None;
                }
                i = end;
            }
            b'`' => {
                let (end, terminated) = scan_template(bytes, i);
                if !terminated {
                    return None;
                }
                i = end;
            }
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

/// End of a regular expression literal with its flags; `None` when the line
/// ends first, in which case the `/` is a division
fn scan_regex(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    let mut in_class = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => return None,
            b'\\' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    return None;
                }
                i += 2;
                continue;
            }
            b'[' => in_class = true,
            b']' => in_class = false,
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return Some(i);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spans(source: &str) -> Vec<(LiteralKind, &str)> {
        scan_literals(source)
            .into_iter()
            .map(|l| (l.kind, &source[l.start..l.end]))
            .collect()
    }

    #[test]
    fn test_scan_strings_and_comments() {
        let source = "// lead\nconst a = \"it's\"; /* b */ const c = 'x\\'y';\n";
        assert_eq!(
            spans(source),
            vec![
                (LiteralKind::LineComment, "// lead"),
                (LiteralKind::String, "\"it's\""),
                (LiteralKind::BlockComment, "/* b */"),
                (LiteralKind::String, "'x\\'y'"),
            ]
        );
    }

    #[test]
    fn test_template_substitutions_are_one_literal() {
        let source = "const t = `a ${ f(\"}\") + `inner ${x}` } b`;";
        assert_eq!(
            spans(source),
            vec![(LiteralKind::Template, "`a ${ f(\"}\") + `inner ${x}` } b`")]
        );
    }

    #[test]
    fn test_regex_versus_division() {
        let source = "var re = /[\"'/]/g;\nvar half = total / 2 / count;\nif (ok) return /a\\/b/.test(s);\n";
        assert_eq!(
            spans(source),
            vec![
                (LiteralKind::Regex, "/[\"'/]/g"),
                (LiteralKind::Regex, "/a\\/b/"),
            ]
        );
    }

    #[test]
    fn test_unterminated_spans() {
        let literals = scan_literals("const s = \"abc\nconst t = 1;");
        assert_eq!(literals.len(), 1);
        assert!(!literals[0].terminated);

        let literals = scan_literals("a(); /* never closed");
        assert_eq!(literals[0].kind, LiteralKind::BlockComment);
        assert!(!literals[0].terminated);
    }

    #[test]
    fn test_replace_in_code_skips_literals() {
        let re = Regex::new(r"\bfoo\b").unwrap();
        let out = replace_in_code(&re, "foo(\"foo\"); // foo\nfoo;", |_| "bar".to_string());
        assert_eq!(out, "bar(\"foo\"); // foo\nbar;");

        let untouched = replace_in_code(&re, "'foo'", |_| "bar".to_string());
        assert!(matches!(untouched, Cow::Borrowed("'foo'")));
    }
}
