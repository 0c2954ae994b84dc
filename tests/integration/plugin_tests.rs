// tests/integration/plugin_tests.rs
use biovalidate::{
    core::{Image, Media, Modality, ReturnCode, TemplateRole},
    harness::Action,
    plugins::{
        versioning::{API_VERSION, STRUCTS_VERSION},
        Interface, PluginManager, PluginMetadata,
    },
    utils::{
        config::{HarnessConfig, Overrides},
        error::HarnessError,
    },
    Harness,
};

use crate::common::TestContext;

/// Reports versions given at construction and implements nothing else.
struct VersionedOnly {
    api: &'static str,
    structs: &'static str,
}

impl Interface for VersionedOnly {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: "versioned-only".into(),
            version: "0.0.1".into(),
            api_version: self.api.into(),
            structs_version: self.structs.into(),
        }
    }
}

fn config(ctx: &TestContext, input: &std::path::Path) -> HarnessConfig {
    HarnessConfig::load(
        None,
        &Overrides {
            config_dir: Some(ctx.config_dir()),
            output_dir: Some(ctx.output_dir()),
            input: Some(input.to_path_buf()),
            ..Default::default()
        },
    )
    .unwrap()
}

#[test]
fn test_version_mismatch_stops_before_any_work() {
    let ctx = TestContext::new();
    let image = ctx.write_image("q.png", 1);
    let input = ctx.write_input("quality.txt", &[format!("Q1 {}", image.display())]);

    for (api, structs, component) in [("2.0.0", STRUCTS_VERSION, "API"), (API_VERSION, "1.3.0", "Structs")] {
        let plugins = PluginManager::from_instance(Box::new(VersionedOnly { api, structs }));
        let err = Harness::with_plugin(config(&ctx, &input), Action::Quality, plugins)
            .err()
            .expect("mismatched versions were accepted");
        assert!(
            matches!(err, HarnessError::VersionMismatch { component: c, .. } if c == component),
            "{}",
            err
        );
    }
    assert!(input.exists());
    assert_eq!(std::fs::read_dir(ctx.output_dir()).unwrap().count(), 0);
}

#[test]
fn test_matching_versions_are_accepted() {
    let ctx = TestContext::new();
    let input = ctx.write_input("quality.txt", &["Q1 a.png".to_string()]);
    let plugins = PluginManager::from_instance(Box::new(VersionedOnly {
        api: API_VERSION,
        structs: STRUCTS_VERSION,
    }));
    assert!(Harness::with_plugin(config(&ctx, &input), Action::Quality, plugins).is_ok());
}

#[test]
fn test_unimplemented_capabilities_default_to_not_implemented() {
    let plugin = VersionedOnly {
        api: API_VERSION,
        structs: STRUCTS_VERSION,
    };
    let image = Image::new(2, 2, 8, vec![0; 4]).unwrap();

    assert_eq!(plugin.vector_quality(&image).status.code, ReturnCode::NotImplemented);
    assert_eq!(
        plugin
            .create_template(&Media::still(vec![image]), TemplateRole::Search1N, Modality::Face)
            .status
            .code,
        ReturnCode::NotImplemented
    );
}

#[test]
fn test_unknown_implementation_fails_the_cli() {
    let ctx = TestContext::new();
    let image = ctx.write_image("q.png", 1);
    let input = ctx.write_input("quality.txt", &[format!("Q1 {}", image.display())]);

    let output = ctx.run(
        ctx.biovalidate("quality")
            .arg("-i")
            .arg(&input)
            .arg("--implementation")
            .arg("no-such-vendor"),
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(input.exists());
}

#[test]
fn test_missing_library_fails_the_cli() {
    let ctx = TestContext::new();
    let input = ctx.write_input("quality.txt", &["Q1 a.png".to_string()]);

    let output = ctx.run(
        ctx.biovalidate("quality")
            .arg("-i")
            .arg(&input)
            .arg("--library")
            .arg(ctx.path("libmissing.so")),
    );
    assert_eq!(output.status.code(), Some(1));
}
