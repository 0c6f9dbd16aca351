//! Fixture library shared by the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use libkit_lib::{BuildPlan, BuildReport, Config, Orchestrator, OutputFormat, StyleMode};

pub const INDEX: &str = r#"import type { App } from "vue";
import Button from "./components/button";
import Input from "./components/input";

export { Button, Input };

export default {
  install(app: App) {
    app.use(Button);
    app.use(Input);
  },
};
"#;

pub const BUTTON_INDEX: &str = r#"import Button from "./Button.vue";
import { withInstall } from "@/utils/install";

export default withInstall(Button);
"#;

pub const BUTTON_SFC: &str = r#"<template>
  <button class="btn" :class="$style.root"><slot></slot></button>
</template>

<script lang="ts">
export default {
  name: "LkButton",
};
</script>

<style>
@import "@css/theme.css";
.btn {
  color: red;
}
</style>

<style module>
.root {
  padding: 4px;
}
</style>
"#;

pub const INPUT_INDEX: &str = r#"import "./input.css";
import { withInstall } from "@/utils/install";

export default withInstall({
  name: "LkInput",
  template: "<input class=\"lk-input\" />",
});
"#;

pub const INSTALL: &str = r#"import type { App } from "vue";

export function withInstall(component: any) {
  component.install = (app: App) => {
    app.component(component.name, component);
  };
  return component;
}
"#;

/// A library with a `button` and an `input` component
pub fn library() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let files = [
        ("src/index.ts", INDEX),
        ("src/components/button/index.ts", BUTTON_INDEX),
        ("src/components/button/Button.vue", BUTTON_SFC),
        ("src/components/input/index.ts", INPUT_INDEX),
        ("src/components/input/input.css", ".lk-input {\n  border: 1px solid gray;\n}\n"),
        ("src/utils/install.ts", INSTALL),
        ("src/assets/styles/css/theme.css", ":root {\n  --lk-primary: #3a7afe;\n}\n"),
    ];
    for (path, contents) in files {
        write(dir.path(), path, contents);
    }
    dir
}

pub fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

pub async fn build(root: &Path, out: &str, formats: &[OutputFormat], style_mode: StyleMode) -> BuildReport {
    let config = Config::default_config(root);
    let plan = BuildPlan::create(&config, formats.iter().copied().collect(), style_mode).unwrap();
    Orchestrator::new(config, plan, root.join(out)).run().await.unwrap()
}

/// Every file under `dir`, keyed by its relative path
pub fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(dir).unwrap().to_path_buf();
            (relative, fs::read(entry.path()).unwrap())
        })
        .collect()
}
