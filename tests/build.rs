mod common;

use std::fs;

use pretty_assertions::assert_eq;

use common::{build, library, snapshot, write};
use libkit_lib::{OutputFormat, StyleMode};

#[tokio::test]
async fn test_split_and_browser_bundles() {
    let dir = library();
    let report = build(
        dir.path(),
        "dist",
        &[OutputFormat::EsmSplit, OutputFormat::IifeGlobal],
        StyleMode::Inline,
    )
    .await;
    assert!(report.is_success());

    let dist = dir.path().join("dist");
    for file in ["esm/index.js", "esm/button.js", "esm/input.js", "library-browser.min.js"] {
        assert!(dist.join(file).is_file(), "missing {}", file);
    }
    assert!(!dist.join("bundle.css").exists());
    assert!(dist.join("types/index.d.ts").is_file());
    assert!(dist.join("manifest.json").is_file());

    let index = fs::read_to_string(dist.join("esm/index.js")).unwrap();
    assert!(index.contains("import * as __ext_0 from \"./button.js\";"));
    assert!(index.contains("export const Button = __entry.Button;"));
    assert!(!index.contains("LkButton"));

    let browser = fs::read_to_string(dist.join("library-browser.min.js")).unwrap();
    assert!(browser.starts_with("var library="));
    assert!(browser.contains("LkButton"));
    assert!(browser.contains("LkInput"));
}

#[tokio::test]
async fn test_repeated_builds_are_identical() {
    let dir = library();
    let first = build(dir.path(), "first", &OutputFormat::ALL, StyleMode::Extracted).await;
    let second = build(dir.path(), "second", &OutputFormat::ALL, StyleMode::Extracted).await;
    assert!(first.is_success());
    assert!(second.is_success());

    let first = snapshot(&dir.path().join("first"));
    let second = snapshot(&dir.path().join("second"));
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_extracted_styles_leave_no_injection() {
    let dir = library();
    let report = build(dir.path(), "dist", &OutputFormat::ALL, StyleMode::Extracted).await;
    assert!(report.is_success());

    let dist = dir.path().join("dist");
    for (path, contents) in snapshot(&dist) {
        if path.extension().map_or(false, |ext| ext == "js") {
            let code = String::from_utf8(contents).unwrap();
            assert!(!code.contains("__injectStyle"), "{} injects styles", path.display());
        }
    }

    let css = fs::read_to_string(dist.join("bundle.css")).unwrap();
    assert!(css.contains("--lk-primary"));
    assert!(css.contains(".btn"));
    assert!(css.contains(".lk-input"));
    assert!(css.contains(".root___"));
    assert_eq!(css.matches("--lk-primary").count(), 1);
    assert!(css.find(".btn").unwrap() < css.find(".lk-input").unwrap());
}

#[tokio::test]
async fn test_inline_styles_are_injected() {
    let dir = library();
    fs::create_dir_all(dir.path().join("dist")).unwrap();
    fs::write(dir.path().join("dist/bundle.css"), ".stale {}\n").unwrap();

    let report = build(dir.path(), "dist", &[OutputFormat::UmdPerComponent], StyleMode::Inline).await;
    assert!(report.is_success());

    let dist = dir.path().join("dist");
    assert!(!dist.join("bundle.css").exists());
    let button = fs::read_to_string(dist.join("components/button/index.js")).unwrap();
    assert!(button.contains("__injectStyle("));
    assert!(button.contains("global[\"Button\"]"));
}

#[tokio::test]
async fn test_broken_component_fails_only_its_units() {
    let dir = library();
    write(dir.path(), "src/components/button/index.ts", "export default function ( {\n");

    let report = build(
        dir.path(),
        "dist",
        &[OutputFormat::EsmSplit, OutputFormat::UmdPerComponent],
        StyleMode::Inline,
    )
    .await;
    assert!(!report.is_success());

    let failed: Vec<&str> = report.failures().map(|o| o.label.as_str()).collect();
    assert_eq!(failed, vec!["esm-split", "umd-per-component:button"]);

    let dist = dir.path().join("dist");
    assert!(dist.join("components/input/index.js").is_file());
    assert!(!dist.join("components/button/index.js").exists());
    assert!(!dist.join("esm").exists());

    let manifest = fs::read_to_string(dist.join("manifest.json")).unwrap();
    assert!(manifest.contains("\"components/input/index.js\""));
    assert!(manifest.contains("\"esm-split\""));
}

#[tokio::test]
async fn test_import_text_in_template_is_not_a_dependency() {
    let dir = library();
    let sfc = common::BUTTON_SFC.replace(
        "<slot></slot>",
        "<slot></slot><p>Remember to import 'lodash' first</p>",
    );
    write(dir.path(), "src/components/button/Button.vue", &sfc);

    let report = build(dir.path(), "dist", &[OutputFormat::EsmMerged], StyleMode::Inline).await;
    assert!(report.is_success(), "{:?}", report.failures().map(|o| &o.label).collect::<Vec<_>>());

    let merged = fs::read_to_string(dir.path().join("dist/library.esm.js")).unwrap();
    assert!(merged.contains("Remember to import 'lodash' first"));
    assert!(!merged.contains("__require(\"lodash\")"));
}
