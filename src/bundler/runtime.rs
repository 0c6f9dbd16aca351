//! Module registry runtime embedded in every output file

use super::chunk::Chunk;
use crate::utils::js_string;

const REQUIRE: &str = r#"var __cache = {};
function __require(id) {
  if (Object.prototype.hasOwnProperty.call(__externals, id)) {
    return __externals[id];
  }
  var cached = __cache[id];
  if (cached) {
    return cached.exports;
  }
  var module = { exports: {} };
  Object.defineProperty(module.exports, "__esModule", { value: true });
  __cache[id] = module;
  __modules[id](module, module.exports, __require);
  return module.exports;
}
function __default(m) {
  return m && (m.__esModule || Object.prototype.toString.call(m) === "[object Module]") ? m["default"] : m;
}
function __export(target, getters) {
  for (var name in getters) {
    Object.defineProperty(target, name, { enumerable: true, get: getters[name] });
  }
}
function __reexport(target, source) {
  Object.keys(source).forEach(function (name) {
    if (name !== "default" && !Object.prototype.hasOwnProperty.call(target, name)) {
      Object.defineProperty(target, name, { enumerable: true, get: function () { return source[name]; } });
    }
  });
}
"#;

const INJECT_STYLE: &str = r#"function __injectStyle(css) {
  if (typeof document === "undefined") {
    return;
  }
  var style = document.createElement("style");
  style.setAttribute("type", "text/css");
  style.appendChild(document.createTextNode(css));
  document.head.appendChild(style);
}
"#;

/// Render `function (__externals) { ... }` evaluating the chunk's entry.
/// The caller applies it to the externals table.
pub fn registry(chunk: &Chunk) -> String {
    let mut out = String::from("function (__externals) {\n\"use strict\";\nvar __modules = {\n");

    for (i, module) in chunk.modules.iter().enumerate() {
        out.push_str(&format!(
            "{}: function (module, exports, __require) {{\n{}\n}}{}\n",
            js_string(&module.key),
            module.code.trim_end(),
            if i + 1 < chunk.modules.len() { "," } else { "" }
        ));
    }

    out.push_str("};\n");
    out.push_str(REQUIRE);
    if chunk.injects_style {
        out.push_str(INJECT_STYLE);
    }
    out.push_str(&format!("return __require({});\n}}", js_string(&chunk.entry_key)));
    out
}

/// `{ "vue": __ext_0, ... }` for the chunk's outside imports
pub fn externals_table(chunk: &Chunk) -> String {
    if chunk.outside.is_empty() {
        return "{}".to_string();
    }
    let entries: Vec<String> = chunk
        .outside
        .iter()
        .enumerate()
        .map(|(i, key)| format!("{}: __ext_{}", js_string(key), i))
        .collect();
    format!("{{ {} }}", entries.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::chunk::ChunkModule;
    use crate::entry::EntryId;

    fn chunk(injects_style: bool) -> Chunk {
        Chunk {
            entry: EntryId::Index,
            entry_key: "src/index.ts".to_string(),
            modules: vec![
                ChunkModule {
                    key: "src/a.ts".to_string(),
                    code: "exports[\"default\"] = 1;\n".to_string(),
                },
                ChunkModule {
                    key: "src/index.ts".to_string(),
                    code: "var __m0 = __require(\"src/a.ts\");".to_string(),
                },
            ],
            outside: vec!["vue".to_string()],
            exports: Default::default(),
            css: vec![],
            injects_style,
        }
    }

    #[test]
    fn test_registry_layout() {
        let code = registry(&chunk(false));
        assert!(code.starts_with("function (__externals) {\n\"use strict\";\nvar __modules = {\n\"src/a.ts\": function (module, exports, __require) {\nexports[\"default\"] = 1;\n},\n\"src/index.ts\""));
        assert!(code.ends_with("return __require(\"src/index.ts\");\n}"));
        assert!(!code.contains("__injectStyle"));
        assert!(registry(&chunk(true)).contains("function __injectStyle(css)"));
    }

    #[test]
    fn test_externals_table() {
        assert_eq!(externals_table(&chunk(false)), "{ \"vue\": __ext_0 }");
    }
}
