//! Lowering of ES module syntax into registry functions
//!
//! A lowered module runs inside `function (module, exports, __require)`.
//! Imports become `__require` calls on registry keys, exports become
//! getters installed through `__export`, and `export *` goes through
//! `__reexport`. Specifiers must already be mapped to keys by the caller.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{BuildError, BuildResult};
use crate::utils::{js_string, replace_in_code};

static IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^(?P<indent>[ \t]*)import\s+(?P<clause>[\w$*{}\s,]+?)\s*\bfrom\s*["'](?P<spec>[^"'\n]+)["'][ \t]*;?"#)
        .unwrap()
});

static IMPORT_BARE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^(?P<indent>[ \t]*)import\s*["'](?P<spec>[^"'\n]+)["'][ \t]*;?"#).unwrap()
});

static EXPORT_STAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^(?P<indent>[ \t]*)export\s*\*\s*(?:as\s+(?P<ns>[\w$]+)\s+)?from\s*["'](?P<spec>[^"'\n]+)["'][ \t]*;?"#)
        .unwrap()
});

static EXPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^(?P<indent>[ \t]*)export\s*\{(?P<names>[^}]*)\}\s*from\s*["'](?P<spec>[^"'\n]+)["'][ \t]*;?"#)
        .unwrap()
});

static EXPORT_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?P<indent>[ \t]*)export\s*\{(?P<names>[^}]*)\}[ \t]*;?").unwrap()
});

static EXPORT_DEFAULT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?P<indent>[ \t]*)export\s+default\s+(?P<decl>(?:async\s+)?function\s*\*?\s*(?P<fname>[\w$]+)|class\s+(?P<cname>[\w$]+))")
        .unwrap()
});

static EXPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?P<indent>[ \t]*)export\s+default\s+").unwrap()
});

static EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?P<indent>[ \t]*)export\s+(?P<decl>(?:async\s+)?function\s*\*?\s*(?P<fname>[\w$]+)|class\s+(?P<cname>[\w$]+)|(?:const|let|var)\s+(?P<vname>[\w$]+))")
        .unwrap()
});

static DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s*\(\s*["'](?P<spec>[^"'\n]+)["']\s*\)"#).unwrap()
});

static REQUIRE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\brequire\s*\(\s*["'](?P<spec>[^"'\n]+)["']\s*\)"#).unwrap()
});

/// A module body after lowering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lowered {
    pub code: String,
    /// Statically known export names, `default` excluded
    pub exports: Vec<String>,
    /// Keys flattened into this module's exports with `export *`
    pub star_exports: Vec<String>,
}

struct Lowering<'a> {
    keys: &'a BTreeMap<String, String>,
    getters: Vec<(String, String)>,
    star_exports: Vec<String>,
    next_binding: usize,
    missing: Option<String>,
}

impl<'a> Lowering<'a> {
    fn key(&mut self, spec: &str) -> String {
        match self.keys.get(spec) {
            Some(key) => js_string(key),
            None => {
                self.missing.get_or_insert_with(|| spec.to_string());
                js_string(spec)
            }
        }
    }

    fn binding(&mut self) -> String {
        let name = format!("__m{}", self.next_binding);
        self.next_binding += 1;
        name
    }

    fn export(&mut self, name: &str, expr: String) {
        self.getters.retain(|(existing, _)| existing != name);
        self.getters.push((name.to_string(), expr));
    }

    fn import_from(&mut self, cap: &Captures) -> String {
        let indent = &cap["indent"];
        let key = self.key(&cap["spec"]);
        let binding = self.binding();
        let mut out = format!("{}var {} = __require({});", indent, binding, key);

        let clause = cap["clause"].trim();
        let (default_name, rest) = match clause.find(['{', '*']) {
            Some(0) => (None, clause),
            Some(at) => (Some(clause[..at].trim().trim_end_matches(',').trim()), &clause[at..]),
            None => (Some(clause), ""),
        };

        if let Some(name) = default_name.filter(|n| !n.is_empty()) {
            out.push_str(&format!(" var {} = __default({});", name, binding));
        }

        let rest = rest.trim();
        if let Some(ns) = rest.strip_prefix('*') {
            let ns = ns.trim();
            let ns = ns.strip_prefix("as").unwrap_or(ns).trim();
            out.push_str(&format!(" var {} = {};", ns, binding));
        } else if rest.starts_with('{') {
            for (imported, local) in specifiers(rest.trim_matches(|c| c == '{' || c == '}')) {
                out.push_str(&format!(" var {} = {}{};", local, binding, member(&imported)));
            }
        }

        out
    }

    fn export_from(&mut self, cap: &Captures) -> String {
        let key = self.key(&cap["spec"]);
        let binding = self.binding();
        for (local, exported) in specifiers(&cap["names"]) {
            self.export(&exported, format!("{}{}", binding, member(&local)));
        }
        format!("{}var {} = __require({});", &cap["indent"], binding, key)
    }

    fn export_star(&mut self, cap: &Captures) -> String {
        let key = self.key(&cap["spec"]);
        match cap.name("ns") {
            Some(ns) => {
                let binding = self.binding();
                self.export(ns.as_str(), binding.clone());
                format!("{}var {} = __require({});", &cap["indent"], binding, key)
            }
            None => {
                if let Some(raw) = self.keys.get(&cap["spec"]) {
                    self.star_exports.push(raw.clone());
                }
                format!("{}__reexport(exports, __require({}));", &cap["indent"], key)
            }
        }
    }
}

/// Lower `code`; `keys` maps every specifier the module uses to a registry key
pub fn lower(code: &str, keys: &BTreeMap<String, String>) -> BuildResult<Lowered> {
    let mut state = Lowering {
        keys,
        getters: Vec::new(),
        star_exports: Vec::new(),
        next_binding: 0,
        missing: None,
    };

    let code = replace_in_code(&IMPORT_FROM, code, |cap: &Captures| state.import_from(cap));
    let code = replace_in_code(&IMPORT_BARE, &code, |cap: &Captures| {
        format!("{}__require({});", &cap["indent"], state.key(&cap["spec"]))
    });
    let code = replace_in_code(&EXPORT_STAR, &code, |cap: &Captures| state.export_star(cap));
    let code = replace_in_code(&EXPORT_FROM, &code, |cap: &Captures| state.export_from(cap));
    let code = replace_in_code(&EXPORT_LIST, &code, |cap: &Captures| {
        for (local, exported) in specifiers(&cap["names"]) {
            state.export(&exported, local);
        }
        cap["indent"].to_string()
    });
    let code = replace_in_code(&EXPORT_DEFAULT_DECL, &code, |cap: &Captures| {
        let name = cap.name("fname").or_else(|| cap.name("cname")).map_or("", |m| m.as_str());
        state.export("default", name.to_string());
        format!("{}{}", &cap["indent"], &cap["decl"])
    });
    let code = replace_in_code(&EXPORT_DEFAULT, &code, |cap: &Captures| {
        format!("{}exports[\"default\"] = ", &cap["indent"])
    });
    let code = replace_in_code(&EXPORT_DECL, &code, |cap: &Captures| {
        let name = cap
            .name("fname")
            .or_else(|| cap.name("cname"))
            .or_else(|| cap.name("vname"))
            .map_or("", |m| m.as_str());
        state.export(name, name.to_string());
        format!("{}{}", &cap["indent"], &cap["decl"])
    });
    let code = replace_in_code(&DYNAMIC_IMPORT, &code, |cap: &Captures| {
        format!(
            "Promise.resolve().then(function () {{ return __require({}); }})",
            state.key(&cap["spec"])
        )
    });
    let code = replace_in_code(&REQUIRE_CALL, &code, |cap: &Captures| {
        format!("__require({})", state.key(&cap["spec"]))
    });

    if let Some(spec) = state.missing {
        return Err(BuildError::Internal(format!(
            "import '{}' reached packaging without a registry key",
            spec
        )));
    }

    let mut out = String::with_capacity(code.len() + 64);
    if !state.getters.is_empty() {
        let getters: Vec<String> = state
            .getters
            .iter()
            .map(|(name, expr)| format!("{}: function () {{ return {}; }}", js_string(name), expr))
            .collect();
        out.push_str(&format!("__export(exports, {{ {} }});\n", getters.join(", ")));
    }
    out.push_str(&code);

    let exports = state
        .getters
        .iter()
        .map(|(name, _)| name.clone())
        .filter(|name| name != "default")
        .collect();

    Ok(Lowered {
        code: out,
        exports,
        star_exports: state.star_exports,
    })
}

/// `a, b as c` -> `[(a, a), (b, c)]`
fn specifiers(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty() && !item.starts_with("type "))
        .map(|item| match item.split_once(" as ") {
            Some((name, alias)) => (name.trim().to_string(), alias.trim().to_string()),
            None => (item.to_string(), item.to_string()),
        })
        .collect()
}

fn member(name: &str) -> String {
    if name == "default" {
        "[\"default\"]".to_string()
    } else {
        format!(".{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keys(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(spec, key)| (spec.to_string(), key.to_string()))
            .collect()
    }

    #[test]
    fn test_lower_imports() {
        let code = "import Button from \"./Button.vue\";\nimport { ref, computed as c } from 'vue';\nimport * as utils from \"./utils\";\nimport \"./theme.css\";\n";
        let keys = keys(&[
            ("./Button.vue", "src/Button.vue"),
            ("vue", "vue"),
            ("./utils", "src/utils.ts"),
            ("./theme.css", "src/theme.css"),
        ]);
        let lowered = lower(code, &keys).unwrap();

        assert_eq!(
            lowered.code,
            "var __m0 = __require(\"src/Button.vue\"); var Button = __default(__m0);\nvar __m1 = __require(\"vue\"); var ref = __m1.ref; var c = __m1.computed;\nvar __m2 = __require(\"src/utils.ts\"); var utils = __m2;\n__require(\"src/theme.css\");\n"
        );
        assert!(lowered.exports.is_empty());
    }

    #[test]
    fn test_lower_exports() {
        let code = "import Button from \"./Button.vue\";\nconst Plugin = { install() {} };\nexport default Plugin;\nexport { Button };\nexport const version = \"1\";\nexport function helper() {}\n";
        let keys = keys(&[("./Button.vue", "src/Button.vue")]);
        let lowered = lower(code, &keys).unwrap();

        assert_eq!(lowered.exports, vec!["Button", "version", "helper"]);
        assert!(lowered.code.starts_with(
            "__export(exports, { \"Button\": function () { return Button; }, \"version\": function () { return version; }, \"helper\": function () { return helper; } });\n"
        ));
        assert!(lowered.code.contains("exports[\"default\"] = Plugin;"));
        assert!(lowered.code.contains("\nconst version = \"1\";\nfunction helper() {}\n"));
        assert!(!lowered.code.contains("export "));
    }

    #[test]
    fn test_lower_reexports() {
        let code = "export { default as Button, size } from './components/button';\nexport * from \"./shared\";\nexport * as icons from \"./icons\";\nexport default function install(app) {}\n";
        let keys = keys(&[
            ("./components/button", "src/components/button/index.ts"),
            ("./shared", "src/shared.ts"),
            ("./icons", "src/icons.ts"),
        ]);
        let lowered = lower(code, &keys).unwrap();

        assert_eq!(lowered.exports, vec!["icons", "Button", "size"]);
        assert_eq!(lowered.star_exports, vec!["src/shared.ts"]);
        assert!(lowered.code.contains("\"Button\": function () { return __m1[\"default\"]; }"));
        assert!(lowered.code.contains("\"default\": function () { return install; }"));
        assert!(lowered.code.contains("__reexport(exports, __require(\"src/shared.ts\"));"));
        assert!(lowered.code.contains("\nfunction install(app) {}\n"));
    }

    #[test]
    fn test_imports_in_literals_are_not_lowered() {
        let code = "import { h } from 'vue';\nconst help = `\nimport x from 'pkg';\nrequire('lodash')`;\n// import 'y'\nconst tip = \"import('z')\";\n";
        let keys = keys(&[("vue", "vue")]);
        let lowered = lower(code, &keys).unwrap();
        assert_eq!(
            lowered.code,
            "var __m0 = __require(\"vue\"); var h = __m0.h;\nconst help = `\nimport x from 'pkg';\nrequire('lodash')`;\n// import 'y'\nconst tip = \"import('z')\";\n"
        );
    }

    #[test]
    fn test_dynamic_import_and_require() {
        let code = "const lazy = () => import(\"./lazy\");\nconst fs = require('vue');\n";
        let keys = keys(&[("./lazy", "src/lazy.ts"), ("vue", "vue")]);
        let lowered = lower(code, &keys).unwrap();
        assert_eq!(
            lowered.code,
            "const lazy = () => Promise.resolve().then(function () { return __require(\"src/lazy.ts\"); });\nconst fs = __require(\"vue\");\n"
        );
    }

    #[test]
    fn test_missing_key_is_internal_error() {
        let err = lower("import a from \"./a\";", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, BuildError::Internal(_)));
    }
}
