//! Module-wrapping conventions

use std::path::Path;
use std::sync::Arc;

use super::OutputFormat;
use crate::bundler::{externals_table, registry, Chunk};
use crate::error::{BuildError, BuildResult};
use crate::pipeline::Toolchain;
use crate::utils::{js_string, pascal_case};

/// Copies the entry's exports onto `exports`, used by the global formats
const COPY_EXPORTS: &str = "Object.keys(__entry).forEach(function (name) {\n  exports[name] = __entry[name];\n});\nObject.defineProperty(exports, \"__esModule\", { value: true });\n";

/// The packaging step of a pipeline
pub struct Packager {
    format: OutputFormat,
    toolchain: Arc<Toolchain>,
}

impl Packager {
    pub fn new(format: OutputFormat, toolchain: Arc<Toolchain>) -> Self {
        Self { format, toolchain }
    }

    /// Wrap `chunk`; `output` names the file in diagnostics
    pub fn package(&self, chunk: &Chunk, output: &Path) -> BuildResult<String> {
        let body = registry(chunk);
        let table = externals_table(chunk);

        let code = match self.format {
            OutputFormat::EsmSplit | OutputFormat::EsmMerged => esm(chunk, &body, &table),
            OutputFormat::CjsSplit => cjs(chunk, &body, &table),
            OutputFormat::UmdPerComponent => {
                let globals = self.globals(chunk)?;
                umd(chunk, &body, &table, &pascal_case(chunk.entry.as_str()), &globals)
            }
            OutputFormat::IifeGlobal => {
                let globals = self.globals(chunk)?;
                iife(chunk, &body, &table, self.toolchain.library_global(), &globals)
            }
        };

        if self.format.is_minified() {
            self.toolchain.minifier().minify(&code, output)
        } else {
            Ok(code)
        }
    }

    /// Global variable of every outside key, in table order
    fn globals(&self, chunk: &Chunk) -> BuildResult<Vec<String>> {
        chunk
            .outside
            .iter()
            .map(|key| {
                self.toolchain
                    .global_for(key)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        BuildError::Internal(format!(
                            "'{}' has no global variable for {}",
                            key, self.format
                        ))
                    })
            })
            .collect()
    }
}

fn esm(chunk: &Chunk, body: &str, table: &str) -> String {
    let mut out = String::new();
    for (i, key) in chunk.outside.iter().enumerate() {
        out.push_str(&format!("import * as __ext_{} from {};\n", i, js_string(key)));
    }
    out.push_str(&format!("var __entry = ({})({});\n", body, table));
    out.push_str("export default __entry[\"default\"];\n");
    for name in &chunk.exports.names {
        out.push_str(&format!("export const {} = __entry.{};\n", name, name));
    }
    for key in &chunk.exports.star_outside {
        out.push_str(&format!("export * from {};\n", js_string(key)));
    }
    out
}

fn cjs(chunk: &Chunk, body: &str, table: &str) -> String {
    let mut out = String::from("\"use strict\";\n");
    for (i, key) in chunk.outside.iter().enumerate() {
        out.push_str(&format!("var __ext_{} = require({});\n", i, js_string(key)));
    }
    out.push_str(&format!("var __entry = ({})({});\n", body, table));
    out.push_str("module.exports = __entry;\n");
    out
}

fn umd(chunk: &Chunk, body: &str, table: &str, name: &str, globals: &[String]) -> String {
    let params: String = (0..chunk.outside.len()).map(|i| format!(", __ext_{}", i)).collect();
    let requires: String = chunk
        .outside
        .iter()
        .map(|key| format!(", require({})", js_string(key)))
        .collect();
    let amd: String = chunk
        .outside
        .iter()
        .map(|key| format!(", {}", js_string(key)))
        .collect();
    let global_args: String = globals
        .iter()
        .map(|global| format!(", global[{}]", js_string(global)))
        .collect();

    format!(
        "(function (global, factory) {{\n  typeof exports === \"object\" && typeof module !== \"undefined\" ? factory(exports{requires}) :\n  typeof define === \"function\" && define.amd ? define([\"exports\"{amd}], factory) :\n  (global = typeof globalThis !== \"undefined\" ? globalThis : global || self, factory(global[{name}] = {{}}{global_args}));\n}})(this, function (exports{params}) {{\n\"use strict\";\nvar __entry = ({body})({table});\n{copy}}});\n",
        name = js_string(name),
        copy = COPY_EXPORTS,
    )
}

fn iife(chunk: &Chunk, body: &str, table: &str, global: &str, globals: &[String]) -> String {
    let params: String = (0..chunk.outside.len()).map(|i| format!(", __ext_{}", i)).collect();
    let args: String = globals.iter().map(|g| format!(", {}", g)).collect();
    format!(
        "var {global} = (function (exports{params}) {{\n\"use strict\";\nvar __entry = ({body})({table});\n{copy}return exports;\n}})({{}}{args});\n",
        copy = COPY_EXPORTS,
    )
}
