//! Public type surface of the library

use crate::discovery::ComponentId;
use crate::utils::{js_identifier, pascal_case};

/// Render `index.d.ts`: the library's install function as the default
/// export, plus one named export per component
pub fn render_declarations(library: &str, components: &[ComponentId]) -> String {
    let library = js_identifier(library);
    let mut out = String::from("import { DefineComponent, Plugin } from \"vue\";\n\n");
    out.push_str(&format!(
        "declare const {}: Exclude<Plugin[\"install\"], undefined>;\n\nexport default {};\n",
        library, library
    ));

    if !components.is_empty() {
        out.push('\n');
    }
    for component in components {
        out.push_str(&format!(
            "export declare const {}: Exclude<Plugin[\"install\"], undefined> | DefineComponent;\n",
            pascal_case(component.as_str())
        ));
    }
    out
}
