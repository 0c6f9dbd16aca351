//! CSS module class renaming

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::short_hash;

static HASH_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[hash(?::base64)?(?::(?P<len>\d+))?\]").unwrap()
});

const DEFAULT_HASH_LEN: usize = 5;

/// Generates scoped class names from a `[local]` / `[hash:base64:N]` pattern
#[derive(Debug, Clone)]
pub struct ScopedNamer {
    pattern: String,
}

impl ScopedNamer {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// The generated name for `local` in a block whose text is `block_text`
    pub fn name(&self, local: &str, block_text: &str) -> String {
        let with_local = self.pattern.replace("[local]", local);
        HASH_TOKEN
            .replace_all(&with_local, |cap: &regex::Captures| {
                let len = cap
                    .name("len")
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(DEFAULT_HASH_LEN);
                short_hash(block_text.as_bytes(), len)
            })
            .into_owned()
    }

    /// Rename every local class selector; returns the rewritten text and the
    /// original-to-generated mapping
    pub fn scope(&self, css: &str) -> (String, BTreeMap<String, String>) {
        let mut map = BTreeMap::new();
        let mut out = String::with_capacity(css.len());
        let mut pending = String::new();
        let chars: Vec<char> = css.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '/' && chars.get(i + 1) == Some(&'*') {
                let end = find_comment_end(&chars, i);
                pending.extend(&chars[i..end]);
                i = end;
                continue;
            }
            if c == '"' || c == '\'' {
                let end = find_quote_end(&chars, i);
                pending.extend(&chars[i..end]);
                i = end;
                continue;
            }
            match c {
                '{' => {
                    if pending.trim_start().starts_with('@') {
                        out.push_str(&pending);
                    } else {
                        out.push_str(&self.rewrite_selector(&pending, css, &mut map));
                    }
                    out.push(c);
                    pending.clear();
                }
                '}' | ';' => {
                    out.push_str(&pending);
                    out.push(c);
                    pending.clear();
                }
                _ => pending.push(c),
            }
            i += 1;
        }

        out.push_str(&pending);
        (out, map)
    }

    fn rewrite_selector(&self, selector: &str, block_text: &str, map: &mut BTreeMap<String, String>) -> String {
        let chars: Vec<char> = selector.chars().collect();
        let mut out = String::with_capacity(selector.len());
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if c == '"' || c == '\'' {
                let end = find_quote_end(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
                continue;
            }

            if c == ':' && starts_with(&chars, i, ":global(") {
                // Keep the inner selector as written, drop the wrapper
                let inner_start = i + ":global(".len();
                let mut depth = 1;
                let mut j = inner_start;
                while j < chars.len() {
                    match chars[j] {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
                out.extend(&chars[inner_start..j.min(chars.len())]);
                i = (j + 1).min(chars.len());
                continue;
            }

            if c == '.' && is_class_start(&chars, i + 1) {
                let mut j = i + 1;
                while j < chars.len() && is_name_char(chars[j]) {
                    j += 1;
                }
                let local: String = chars[i + 1..j].iter().collect();
                let generated = map
                    .entry(local.clone())
                    .or_insert_with(|| self.name(&local, block_text))
                    .clone();
                out.push('.');
                out.push_str(&generated);
                i = j;
                continue;
            }

            out.push(c);
            i += 1;
        }

        out
    }
}

fn starts_with(chars: &[char], at: usize, needle: &str) -> bool {
    needle
        .chars()
        .enumerate()
        .all(|(offset, n)| chars.get(at + offset) == Some(&n))
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn is_class_start(chars: &[char], at: usize) -> bool {
    match chars.get(at) {
        Some(c) if c.is_alphabetic() || *c == '_' => true,
        Some('-') => matches!(chars.get(at + 1), Some(c) if c.is_alphabetic() || *c == '_' || *c == '-'),
        _ => false,
    }
}

fn find_comment_end(chars: &[char], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
        i += 1;
    }
    (i + 2).min(chars.len())
}

fn find_quote_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == quote {
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PATTERN: &str = "[local]___[hash:base64:5]";

    #[test]
    fn test_generated_name_shape() {
        let namer = ScopedNamer::new(PATTERN);
        let name = namer.name("btn", ".btn { color: red; }");
        assert!(name.starts_with("btn___"));
        assert_eq!(name.len(), "btn___".len() + 5);
        assert_eq!(name, namer.name("btn", ".btn { color: red; }"));
        assert_ne!(name, namer.name("btn", ".btn { color: blue; }"));
    }

    #[test]
    fn test_scope_rewrites_selectors_only() {
        let namer = ScopedNamer::new(PATTERN);
        let css = ".btn { content: \".not-a-class\"; }\n.btn:hover .icon, :global(.app) .btn { width: .5em; }\n@media (min-width: 10px) { .icon { color: red; } }";
        let (out, map) = namer.scope(css);

        let btn = map["btn"].clone();
        let icon = map["icon"].clone();
        assert_eq!(map.len(), 2);
        assert_eq!(
            out,
            format!(
                ".{btn} {{ content: \".not-a-class\"; }}\n.{btn}:hover .{icon}, .app .{btn} {{ width: .5em; }}\n@media (min-width: 10px) {{ .{icon} {{ color: red; }} }}"
            )
        );
    }
}
