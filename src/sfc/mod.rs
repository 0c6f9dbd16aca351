//! Single-file component compilation
//!
//! Components are `.vue` files with `<template>`, `<script>` and `<style>`
//! blocks. Compilation is behind [`SfcCompiler`]; [`BlockCompiler`] is the
//! built-in implementation. It keeps the script's default export as the
//! component object and hands the template to the runtime compiler through
//! the `template` option.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{BuildError, BuildResult};
use crate::utils::js_string;

/// Local binding holding the compiled component object
pub const COMPONENT_BINDING: &str = "__sfc__";

/// Last line of every compiled component
pub const EXPORT_FOOTER: &str = "export default __sfc__;\n";

/// Binding name used for `<style module>` without a value
pub const DEFAULT_MODULE_BINDING: &str = "$style";

static TEMPLATE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<template(?P<attrs>[^>]*)>(?P<body>.*)</template>").unwrap()
});

static SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<script(?P<attrs>[^>]*)>(?P<body>.*?)</script>").unwrap()
});

static STYLE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<style(?P<attrs>[^>]*)>(?P<body>.*?)</style>").unwrap()
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<name>[\w:@-]+)(?:\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^\s"'>]+)))?"#).unwrap()
});

static EXPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?P<indent>[ \t]*)export\s+default\s+").unwrap()
});

/// A `<style>` block as written in the component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSource {
    /// Binding name when the block is a CSS module
    pub module: Option<String>,
    pub text: String,
}

/// Output of compiling one component
#[derive(Debug, Clone)]
pub struct CompiledSfc {
    /// Script module ending with [`EXPORT_FOOTER`]
    pub code: String,
    pub styles: Vec<StyleSource>,
}

/// Compiles a single-file component into a script module and style blocks
pub trait SfcCompiler: Send + Sync {
    fn name(&self) -> &str;

    fn compile(&self, source: &str, path: &Path) -> BuildResult<CompiledSfc>;
}

/// Built-in block splitter
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockCompiler;

impl SfcCompiler for BlockCompiler {
    fn name(&self) -> &str {
        "block-compiler"
    }

    fn compile(&self, source: &str, path: &Path) -> BuildResult<CompiledSfc> {
        let mut code = String::new();
        let mut has_script = false;

        for cap in SCRIPT_BLOCK.captures_iter(source) {
            let attrs = parse_attributes(&cap["attrs"]);
            if attrs.iter().any(|(name, _)| name == "setup") {
                return Err(BuildError::diagnostic(
                    "sfc",
                    path,
                    "<script setup> needs an external SFC compiler",
                ));
            }
            if has_script {
                return Err(BuildError::diagnostic("sfc", path, "only one <script> block is allowed"));
            }
            has_script = true;

            let body = cap["body"].trim_matches('\n');
            if EXPORT_DEFAULT.is_match(body) {
                let replacement = format!("${{indent}}const {} = ", COMPONENT_BINDING);
                code.push_str(&EXPORT_DEFAULT.replacen(body, 1, replacement.as_str()));
                code.push('\n');
            } else {
                code.push_str(body);
                code.push_str(&format!("\nconst {} = {{}};\n", COMPONENT_BINDING));
            }
        }

        if !has_script {
            code.push_str(&format!("const {} = {{}};\n", COMPONENT_BINDING));
        }

        if let Some(cap) = TEMPLATE_BLOCK.captures(source) {
            let template = cap["body"].trim();
            if !template.is_empty() {
                code.push_str(&format!(
                    "{}.template = {};\n",
                    COMPONENT_BINDING,
                    js_string(template)
                ));
            }
        }

        let mut styles = Vec::new();
        for cap in STYLE_BLOCK.captures_iter(source) {
            let attrs = parse_attributes(&cap["attrs"]);
            if let Some((_, Some(lang))) = attrs.iter().find(|(name, _)| name == "lang") {
                if lang != "css" {
                    return Err(BuildError::diagnostic(
                        "sfc",
                        path,
                        format!("style language '{}' needs an external pre-processor", lang),
                    ));
                }
            }
            let module = attrs.iter().find(|(name, _)| name == "module").map(|(_, value)| {
                value
                    .clone()
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_MODULE_BINDING.to_string())
            });
            styles.push(StyleSource {
                module,
                text: cap["body"].to_string(),
            });
        }

        code.push_str(EXPORT_FOOTER);

        Ok(CompiledSfc { code, styles })
    }
}

/// Language of the `<script>` block, if declared
pub fn script_lang(source: &str) -> Option<String> {
    let cap = SCRIPT_BLOCK.captures(source)?;
    parse_attributes(&cap["attrs"])
        .into_iter()
        .find(|(name, _)| name == "lang")
        .and_then(|(_, value)| value)
}

/// Rewrite the body of the `<script>` block, leaving the rest of the file intact
pub fn map_script<F>(source: &str, rewrite: F) -> BuildResult<String>
where
    F: FnOnce(&str) -> BuildResult<String>,
{
    let Some(body) = SCRIPT_BLOCK.captures(source).and_then(|cap| cap.name("body")) else {
        return Ok(source.to_string());
    };

    let rewritten = rewrite(body.as_str())?;
    let mut out = String::with_capacity(source.len());
    out.push_str(&source[..body.start()]);
    out.push_str(&rewritten);
    out.push_str(&source[body.end()..]);
    Ok(out)
}

fn parse_attributes(attrs: &str) -> Vec<(String, Option<String>)> {
    ATTRIBUTE
        .captures_iter(attrs)
        .map(|cap| {
            let value = cap
                .name("dq")
                .or_else(|| cap.name("sq"))
                .or_else(|| cap.name("bare"))
                .map(|m| m.as_str().to_string());
            (cap["name"].to_string(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUTTON: &str = r#"<template>
  <button :class="$style.btn" @click="$emit('click')"><slot /></button>
</template>

<script>
import { defineComponent } from "vue";

export default defineComponent({
  name: "VButton",
});
</script>

<style module>
.btn { color: red; }
</style>

<style>
.global-btn { display: flex; }
</style>
"#;

    #[test]
    fn test_compile_component() {
        let compiled = BlockCompiler.compile(BUTTON, Path::new("Button.vue")).unwrap();

        assert!(compiled.code.contains("const __sfc__ = defineComponent({"));
        assert!(compiled.code.contains("__sfc__.template = \"<button"));
        assert!(compiled.code.ends_with(EXPORT_FOOTER));
        assert_eq!(compiled.styles.len(), 2);
        assert_eq!(compiled.styles[0].module.as_deref(), Some("$style"));
        assert_eq!(compiled.styles[1].module, None);
        assert!(compiled.styles[1].text.contains(".global-btn"));
    }

    #[test]
    fn test_named_module_binding() {
        let source = "<template><div/></template>\n<style module=\"classes\">.a{}</style>";
        let compiled = BlockCompiler.compile(source, Path::new("A.vue")).unwrap();
        assert!(compiled.code.starts_with("const __sfc__ = {};"));
        assert_eq!(compiled.styles[0].module.as_deref(), Some("classes"));
    }

    #[test]
    fn test_script_setup_is_diagnostic() {
        let source = "<script setup>\nconst a = 1;\n</script>";
        let err = BlockCompiler.compile(source, Path::new("A.vue")).unwrap_err();
        assert!(matches!(err, BuildError::Diagnostic { stage: "sfc", .. }));
    }

    #[test]
    fn test_map_script() {
        let source = "<template><p/></template>\n<script lang=\"ts\">\nconst a: number = 1;\n</script>\n";
        assert_eq!(script_lang(source).as_deref(), Some("ts"));

        let mapped = map_script(source, |body| Ok(body.replace(": number", ""))).unwrap();
        assert_eq!(
            mapped,
            "<template><p/></template>\n<script lang=\"ts\">\nconst a = 1;\n</script>\n"
        );
    }
}
