//! Project initialization command

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use crate::utils::pascal_case;

/// Scaffold a new component library
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Library directory
    #[arg(default_value = ".")]
    pub name: String,

    /// Name of the example component
    #[arg(long, default_value = "button")]
    pub component: String,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub async fn execute(&self) -> Result<()> {
        let project_dir = Path::new(&self.name);

        eprintln!(
            "{} Initializing component library {}...\n",
            "→".blue(),
            self.library_name().cyan()
        );

        if self.name != "." {
            fs::create_dir_all(project_dir).context("Failed to create project directory")?;
        }

        for (relative, contents) in self.files() {
            let path = project_dir.join(&relative);
            if path.exists() && !self.force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&path, contents).with_context(|| format!("Failed to write {}", relative))?;
            eprintln!("  {} Created {}", "✓".green(), relative.cyan());
        }

        eprintln!("\n{} Library initialized successfully!\n", "✓".green().bold());

        eprintln!("  Next steps:");
        if self.name != "." {
            eprintln!("    {} cd {}", "→".dimmed(), self.name.cyan());
        }
        eprintln!("    {} libkit build", "→".dimmed());
        eprintln!();

        Ok(())
    }

    fn library_name(&self) -> String {
        if self.name == "." {
            return "library".to_string();
        }
        Path::new(&self.name)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("library")
            .to_string()
    }

    /// Scaffolded files, relative to the project directory
    fn files(&self) -> Vec<(String, String)> {
        let component = &self.component;
        let pascal = pascal_case(component);

        vec![
            ("libkit.toml".to_string(), self.generate_config()),
            ("src/index.ts".to_string(), self.generate_index()),
            (
                format!("src/components/{}/index.ts", component),
                format!(
                    r#"import {pascal} from "./{pascal}.vue";
import {{ withInstall }} from "@/utils/plugins";

export default withInstall({pascal});
"#
                ),
            ),
            (
                format!("src/components/{}/{}.vue", component, pascal),
                format!(
                    r#"<template>
  <button :class="$style.root" @click="$emit('click')">
    <slot></slot>
  </button>
</template>

<script lang="ts">
export default {{
  name: "{pascal}",
  emits: ["click"],
}};
</script>

<style>
@import "@css/theme.css";
</style>

<style module>
.root {{
  padding: 4px 12px;
  border-radius: 4px;
}}
</style>
"#
                ),
            ),
            (
                "src/utils/plugins.ts".to_string(),
                r#"import type { App } from "vue";

export function withInstall(component: any) {
  component.install = (app: App) => {
    app.component(component.name, component);
  };
  return component;
}
"#
                .to_string(),
            ),
            (
                "src/assets/styles/css/theme.css".to_string(),
                r#":root {
  --primary-color: #3a7afe;
}

button {
  user-select: none;
}
"#
                .to_string(),
            ),
        ]
    }

    fn generate_config(&self) -> String {
        format!(
            r#"# libkit configuration

[library]
name = "{name}"

[source]
base_dir = "src"
components_dir = "components"
index_source = "index.ts"
alias = "@"

[styles]
alias = "@css"
root = "src/assets/styles/css"
extract = false

[output]
dir = "dist"

[externals]
vue = "Vue"
"#,
            name = self.library_name(),
        )
    }

    fn generate_index(&self) -> String {
        let pascal = pascal_case(&self.component);
        format!(
            r#"import type {{ App }} from "vue";
import {pascal} from "./components/{component}";

export {{ {pascal} }};

export default {{
  install(app: App) {{
    app.use({pascal});
  }},
}};
"#,
            component = self.component,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffold_layout() {
        let cmd = InitCommand {
            name: "my-lib".to_string(),
            component: "date-picker".to_string(),
            force: false,
        };
        let files: Vec<String> = cmd.files().into_iter().map(|(path, _)| path).collect();
        assert_eq!(
            files,
            vec![
                "libkit.toml",
                "src/index.ts",
                "src/components/date-picker/index.ts",
                "src/components/date-picker/DatePicker.vue",
                "src/utils/plugins.ts",
                "src/assets/styles/css/theme.css",
            ]
        );
        assert!(cmd.generate_config().contains("name = \"my-lib\""));
        assert!(cmd.generate_index().contains("import DatePicker from \"./components/date-picker\";"));
    }
}
