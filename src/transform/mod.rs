//! Code transformation
//!
//! The transpile stage. TypeScript goes through a [`Transpiler`]; the built-in
//! one strips type syntax and leaves everything else untouched. Compile-time
//! defines are substituted afterwards.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::bundler::ModuleType;
use crate::error::{BuildError, BuildResult};

/// Source-to-source compiler for typed script
pub trait Transpiler: Send + Sync {
    fn name(&self) -> &str;

    /// Compile `source` to plain JavaScript, reporting failures as diagnostics
    fn transpile(&self, source: &str, path: &Path) -> BuildResult<String>;
}

/// Code transformer for script modules
pub struct Transformer {
    transpiler: Arc<dyn Transpiler>,
    defines: BTreeMap<String, String>,
}

impl Transformer {
    pub fn new(transpiler: Arc<dyn Transpiler>, defines: BTreeMap<String, String>) -> Self {
        Self { transpiler, defines }
    }

    /// Transform source code based on module type
    pub fn transform(&self, source: &str, path: &Path, module_type: &ModuleType) -> BuildResult<String> {
        let code = match module_type {
            ModuleType::TypeScript | ModuleType::Tsx => {
                debug!("Transpiling {} with {}", path.display(), self.transpiler.name());
                self.transpiler.transpile(source, path)?
            }
            ModuleType::Json => return transform_json(source, path),
            _ => source.to_string(),
        };

        Ok(self.apply_defines(&code))
    }

    /// Replace every define key outside of assignment targets
    pub fn apply_defines(&self, code: &str) -> String {
        let mut result = code.to_string();
        for (key, value) in &self.defines {
            result = replace_define(&result, key, value);
        }
        result
    }
}

fn replace_define(code: &str, key: &str, value: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut last = 0;

    for (start, _) in code.match_indices(key) {
        if start < last {
            continue;
        }
        let end = start + key.len();
        let before_ok = code[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_ident_char(c) && c != '.');
        let after_ok = code[end..].chars().next().map_or(true, |c| !is_ident_char(c));
        let rest = code[end..].trim_start();
        let is_assignment = rest.starts_with('=') && !rest.starts_with("==") && !rest.starts_with("=>");

        if before_ok && after_ok && !is_assignment {
            out.push_str(&code[last..start]);
            out.push_str(value);
            last = end;
        }
    }

    out.push_str(&code[last..]);
    out
}

/// Validate JSON and expose it as the default export
fn transform_json(source: &str, path: &Path) -> BuildResult<String> {
    serde_json::from_str::<serde_json::Value>(source)
        .map_err(|e| BuildError::diagnostic("json", path, e.to_string()))?;

    Ok(format!("export default {};\n", source.trim()))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Built-in transpiler: removes type-only syntax from TypeScript
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeStripper;

impl Transpiler for TypeStripper {
    fn name(&self) -> &str {
        "type-stripper"
    }

    fn transpile(&self, source: &str, path: &Path) -> BuildResult<String> {
        Stripper::new(source)
            .run()
            .map_err(|message| BuildError::diagnostic("transpile", path, message))
    }
}

/// Class member modifiers with no runtime meaning
const MEMBER_MODIFIERS: [&str; 6] = ["public", "private", "protected", "readonly", "abstract", "override"];

struct Frame {
    open: char,
    ternaries: usize,
    class_body: bool,
}

/// `const`/`let`/`var` statement being scanned
struct Declaration {
    depth: usize,
    /// Between a binding and its `=`, where a colon starts a type
    in_binding: bool,
}

struct Stripper {
    chars: Vec<char>,
    out: String,
    frames: Vec<Frame>,
    declaration: Option<Declaration>,
    class_pending: bool,
}

impl Stripper {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            out: String::with_capacity(source.len()),
            frames: vec![Frame {
                open: '\0',
                ternaries: 0,
                class_body: false,
            }],
            declaration: None,
            class_pending: false,
        }
    }

    fn at(&self, i: usize) -> char {
        self.chars.get(i).copied().unwrap_or('\0')
    }

    fn run(mut self) -> Result<String, String> {
        let mut i = 0;

        while i < self.chars.len() {
            let c = self.chars[i];
            let next = self.at(i + 1);

            // Comments and literals are copied verbatim
            if c == '/' && (next == '/' || next == '*') {
                let end = skip_comment(&self.chars, i);
                self.copy(i, end);
                i = end;
                continue;
            }
            if c == '"' || c == '\'' || c == '`' {
                let end = skip_string(&self.chars, i);
                self.copy(i, end);
                i = end;
                continue;
            }

            if is_ident_start(c) && !self.prev_is_ident() {
                let word = read_word(&self.chars, i);
                if self.at_statement_start() && self.is_type_declaration(&word, i) {
                    let block = word == "interface"
                        || read_word(&self.chars, skip_ws(&self.chars, i + word.chars().count())) == "interface";
                    i = skip_declaration(&self.chars, i, block);
                    continue;
                }
                let after = i + word.chars().count();
                let next_word = read_word(&self.chars, skip_ws(&self.chars, after));
                if self.at_statement_start() && self.is_unsupported(&word, &next_word, after) {
                    let construct = if word == "const" { "const enum" } else { word.as_str() };
                    return Err(format!("`{}` declarations are not supported", construct));
                }
                if MEMBER_MODIFIERS.contains(&word.as_str()) && !next_word.is_empty() {
                    if self.in_constructor_parameters() {
                        return Err(format!("parameter property `{} {}` is not supported", word, next_word));
                    }
                    let abstract_class = word == "abstract" && next_word == "class";
                    if abstract_class || (self.in_class_body() && self.at_member_start()) {
                        i = skip_ws(&self.chars, after);
                        continue;
                    }
                }
                if !self.out.ends_with('.') {
                    match word.as_str() {
                        "const" | "let" | "var" => {
                            self.declaration = Some(Declaration {
                                depth: self.frames.len(),
                                in_binding: true,
                            });
                        }
                        "class" if !matches!(self.at(skip_ws(&self.chars, after)), ':' | ',') => {
                            self.class_pending = true;
                        }
                        _ => {}
                    }
                }
                if word == "as" && self.prev_is_operand() && self.at(i + 2).is_whitespace() && !self.in_module_clause() {
                    // Drop the cast, keep whatever follows the type
                    while self.out.ends_with(' ') {
                        self.out.pop();
                    }
                    i = skip_type(&self.chars, i + 2, false);
                    continue;
                }
                self.out.push_str(&word);
                i += word.chars().count();
                continue;
            }

            match c {
                '(' | '[' | '{' => {
                    let class_body = c == '{' && self.class_pending && !self.in_frame('(');
                    if class_body {
                        self.class_pending = false;
                    }
                    self.frames.push(Frame {
                        open: c,
                        ternaries: 0,
                        class_body,
                    });
                    self.out.push(c);
                }
                ')' | ']' | '}' => {
                    if self.frames.len() <= 1 {
                        return Err(format!("unbalanced '{}'", c));
                    }
                    self.frames.pop();
                    if self.declaration.as_ref().map_or(false, |d| d.depth > self.frames.len()) {
                        self.declaration = None;
                    }
                    self.out.push(c);
                }
                '=' => {
                    let assignment = !matches!(next, '=' | '>')
                        && !matches!(self.out.chars().next_back(), Some('=' | '!' | '<' | '>'));
                    let depth = self.frames.len();
                    if let Some(declaration) = self.declaration.as_mut() {
                        if assignment && declaration.depth == depth {
                            declaration.in_binding = false;
                        }
                    }
                    self.out.push(c);
                }
                ',' | ';' => {
                    let depth = self.frames.len();
                    if self.declaration.as_ref().map_or(false, |d| d.depth == depth) {
                        if c == ';' {
                            self.declaration = None;
                        } else if let Some(declaration) = self.declaration.as_mut() {
                            declaration.in_binding = true;
                        }
                    }
                    self.out.push(c);
                }
                '<' if self.prev_is_ident() => {
                    // Generic arguments on a call or declaration: f<T>(...)
                    match generic_end(&self.chars, i) {
                        Some(end) => i = end - 1,
                        None => self.out.push(c),
                    }
                }
                '?' if !matches!(next, '.' | '?' | ':' | '=') && !self.out.ends_with('?') => {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.ternaries += 1;
                    }
                    self.out.push(c);
                }
                '!' if self.prev_is_operand()
                    && (matches!(next, '.' | ')' | ';' | ',' | '[') || (next == ':' && self.in_class_body())) =>
                {
                    // Non-null assertion
                }
                ':' => {
                    let optional = self.out.ends_with('?') && (self.in_frame('(') || self.in_class_body());
                    let in_ternary = self.frames.last().map_or(false, |f| f.ternaries > 0);

                    if in_ternary && !optional {
                        if let Some(frame) = self.frames.last_mut() {
                            frame.ternaries -= 1;
                        }
                        self.out.push(c);
                    } else if optional || self.is_annotation() {
                        if optional {
                            self.out.pop();
                        }
                        let return_type = self.last_significant() == Some(')');
                        i = skip_type(&self.chars, i + 1, return_type);
                        continue;
                    } else {
                        self.out.push(c);
                    }
                }
                _ => self.out.push(c),
            }

            i += 1;
        }

        if self.frames.len() > 1 {
            return Err(format!(
                "unclosed '{}'",
                self.frames.last().map_or('?', |f| f.open)
            ));
        }

        Ok(self.out)
    }

    fn copy(&mut self, from: usize, to: usize) {
        self.out.extend(&self.chars[from..to.min(self.chars.len())]);
    }

    fn prev_is_ident(&self) -> bool {
        self.out.chars().next_back().map_or(false, is_ident_char)
    }

    fn prev_is_operand(&self) -> bool {
        matches!(self.last_significant(), Some(c) if is_ident_char(c) || c == ')' || c == ']')
    }

    fn last_significant(&self) -> Option<char> {
        self.out.trim_end().chars().next_back()
    }

    fn current_line(&self) -> &str {
        match self.out.rfind('\n') {
            Some(pos) => &self.out[pos + 1..],
            None => &self.out,
        }
    }

    fn at_statement_start(&self) -> bool {
        let line = self.current_line().trim();
        line.is_empty() || line == "export"
    }

    fn in_module_clause(&self) -> bool {
        let line = self.current_line().trim_start();
        line.starts_with("import") || line.starts_with("export")
    }

    fn is_type_declaration(&self, word: &str, i: usize) -> bool {
        let after = i + word.chars().count();
        let next_word = read_word(&self.chars, skip_ws(&self.chars, after));
        match word {
            "interface" | "declare" => !next_word.is_empty(),
            "type" => {
                let after_name = skip_ws(&self.chars, skip_ws(&self.chars, after) + next_word.chars().count());
                !next_word.is_empty() && matches!(self.at(after_name), '=' | '<')
            }
            "import" => next_word == "type",
            "export" => {
                if next_word == "interface" || next_word == "declare" {
                    return true;
                }
                if next_word == "type" {
                    let pos = skip_ws(&self.chars, after);
                    return self.is_type_declaration("type", pos)
                        || self.at(skip_ws(&self.chars, pos + 4)) == '{';
                }
                false
            }
            _ => false,
        }
    }

    /// Runtime-bearing TypeScript constructs with no plain JavaScript form
    fn is_unsupported(&self, word: &str, next_word: &str, after: usize) -> bool {
        let opens_body = |name: &str| {
            let pos = skip_ws(&self.chars, skip_ws(&self.chars, after) + name.chars().count());
            matches!(self.at(pos), '{' | '.')
        };
        match word {
            "enum" | "namespace" | "module" => !next_word.is_empty() && opens_body(next_word),
            "const" => next_word == "enum",
            _ => false,
        }
    }

    fn in_frame(&self, open: char) -> bool {
        self.frames.last().map_or(false, |f| f.open == open)
    }

    fn in_class_body(&self) -> bool {
        self.frames.last().map_or(false, |f| f.class_body)
    }

    fn in_constructor_parameters(&self) -> bool {
        let n = self.frames.len();
        n >= 2 && self.frames[n - 1].open == '(' && self.frames[n - 2].class_body
    }

    fn at_member_start(&self) -> bool {
        matches!(self.last_significant(), None | Some('{' | ';' | '}'))
    }

    /// A colon starts a type annotation in parameter lists, after a
    /// declared binding or class field, or after a parameter list (return type)
    fn is_annotation(&self) -> bool {
        let frame = self.frames.last().map_or('\0', |f| f.open);
        if frame == '(' || self.in_class_body() {
            return true;
        }
        let depth = self.frames.len();
        if self.declaration.as_ref().map_or(false, |d| d.in_binding && d.depth == depth) {
            return true;
        }
        if self.last_significant() == Some(')') && frame != '[' {
            return true;
        }
        let line = self.current_line().trim_end();
        let mut words = line.rsplit(|c: char| c.is_whitespace()).filter(|w| !w.is_empty());
        let name = words.next().unwrap_or("");
        let keyword = words.next().unwrap_or("");
        matches!(keyword, "const" | "let" | "var") && name.chars().all(is_ident_char)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn read_word(chars: &[char], start: usize) -> String {
    chars[start.min(chars.len())..]
        .iter()
        .take_while(|c| is_ident_char(**c))
        .collect()
}

fn skip_ws(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn skip_comment(chars: &[char], start: usize) -> usize {
    let mut i = start + 2;
    if chars.get(start + 1) == Some(&'/') {
        while i < chars.len() && chars[i] != '\n' {
            i += 1;
        }
        return i;
    }
    while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
        i += 1;
    }
    (i + 2).min(chars.len())
}

/// Index just past the string or template literal starting at `start`
fn skip_string(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    let mut depth = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            i += 2;
            continue;
        }
        if quote == '`' {
            if c == '$' && chars.get(i + 1) == Some(&'{') {
                depth += 1;
                i += 2;
                continue;
            }
            if depth > 0 {
                if c == '}' {
                    depth -= 1;
                } else if c == '"' || c == '\'' || c == '`' {
                    i = skip_string(chars, i);
                    continue;
                }
                i += 1;
                continue;
            }
        }
        if c == quote {
            return i + 1;
        }
        if c == '\n' && quote != '`' {
            return i;
        }
        i += 1;
    }

    chars.len()
}

/// Index of the first character after a type expression
fn skip_type(chars: &[char], start: usize, return_type: bool) -> usize {
    let mut i = skip_ws(chars, start);
    let mut depth = 0i32;
    let mut consumed = false;
    let mut last = '\0';

    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' || c == '`' {
            i = skip_string(chars, i);
            consumed = true;
            last = c;
            continue;
        }
        match c {
            '<' | '(' | '[' | '{' => {
                if c == '{' && depth == 0 && consumed && !matches!(last, '|' | '&' | ':' | ',') {
                    break;
                }
                depth += 1;
            }
            '>' if depth > 0 && chars.get(i.wrapping_sub(1)) != Some(&'=') => depth -= 1,
            ')' | ']' | '}' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            '=' if depth == 0 => {
                let arrow = chars.get(i + 1) == Some(&'>');
                if !(arrow && last == ')' && !return_type) {
                    break;
                }
                i += 2;
                last = '>';
                continue;
            }
            ',' | ';' if depth == 0 => break,
            '\n' if depth == 0 && consumed && !matches!(last, '|' | '&' | ':' | ',') => break,
            _ => {}
        }
        if !c.is_whitespace() {
            consumed = true;
            last = c;
        }
        i += 1;
    }

    // Whitespace after the type belongs to the surrounding code
    while i > start && chars[i - 1].is_whitespace() {
        i -= 1;
    }

    i
}

/// Skip a type-only statement (`interface`, `type X =`, `import type`, `declare`).
/// Interface bodies end at their closing brace.
fn skip_declaration(chars: &[char], start: usize, block: bool) -> usize {
    let mut i = start;
    let mut depth = 0i32;
    let mut last = '\0';

    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' || c == '`' {
            i = skip_string(chars, i);
            last = c;
            continue;
        }
        match c {
            '{' | '(' | '[' | '<' => depth += 1,
            '>' if depth > 0 && chars.get(i.wrapping_sub(1)) == Some(&'=') => {}
            '}' | ')' | ']' | '>' if depth > 0 => {
                depth -= 1;
                if block && depth == 0 && c == '}' {
                    let mut end = i + 1;
                    if chars.get(end) == Some(&';') {
                        end += 1;
                    }
                    return end;
                }
            }
            ';' if depth == 0 => return i + 1,
            '\n' if depth == 0 && !matches!(last, '=' | '|' | '&' | ',' | '\0') => return i,
            _ => {}
        }
        if !c.is_whitespace() {
            last = c;
        }
        i += 1;
    }

    i
}

/// End of `<...>` when it is a generic argument list followed by `(`
fn generic_end(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0;
    let mut i = start;

    while i < chars.len() && i < start + 200 {
        match chars[i] {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth == 0 {
                    let after = skip_ws(chars, i + 1);
                    return (chars.get(after) == Some(&'(')).then_some(i + 1);
                }
            }
            ';' | '\n' | ')' | '{' => return None,
            '&' | '|' if chars.get(i + 1) == Some(&chars[i]) => return None,
            _ => {}
        }
        i += 1;
    }

    None
}
