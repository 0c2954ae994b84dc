// tests/integration/harness_tests.rs
use std::collections::HashSet;
use std::fs;

use crate::common::TestContext;

fn quality_input(ctx: &TestContext, count: u32) -> std::path::PathBuf {
    let lines: Vec<String> = (0..count)
        .map(|i| {
            let image = ctx.write_image(&format!("q{}.png", i), i);
            format!("Q{} {}", i, image.display())
        })
        .collect();
    ctx.write_input("quality.txt", &lines)
}

#[test]
fn test_ten_items_three_workers() {
    let ctx = TestContext::new();
    let input = quality_input(&ctx, 10);

    let output = ctx.run(ctx.biovalidate("quality").arg("-i").arg(&input).arg("-t").arg("3"));
    assert_eq!(output.status.code(), Some(0));
    assert!(!input.exists());

    let sizes: Vec<usize> = (0..3)
        .map(|i| ctx.records(&ctx.output(&format!("quality.log.{}", i))).len())
        .collect();
    assert_eq!(sizes, vec![4, 4, 2]);

    let ids: HashSet<String> = (0..3)
        .flat_map(|i| ctx.records(&ctx.output(&format!("quality.log.{}", i))))
        .map(|line| line.split(' ').next().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 10);
    for i in 0..3 {
        assert!(!ctx.output(&format!("quality.input.{}", i)).exists());
    }

    let report: serde_json::Value =
        serde_json::from_slice(&fs::read(ctx.output("quality.report.json")).unwrap()).unwrap();
    assert_eq!(report["verdict"], "success");
    assert_eq!(report["reconciliation"]["expected"], 10);
    assert_eq!(report["reconciliation"]["observed"], 10);
    assert_eq!(report["reconciliation"]["missing"].as_array().unwrap().len(), 0);
    assert_eq!(report["reconciliation"]["duplicated"].as_array().unwrap().len(), 0);
}

#[test]
fn test_unsupported_action_leaves_no_logs() {
    let ctx = TestContext::new();
    let lines: Vec<String> = (0..4)
        .map(|i| {
            let image = ctx.write_image(&format!("m{}.png", i), i);
            format!("M{} {}", i, image.display())
        })
        .collect();
    let input = ctx.write_input("morph.txt", &lines);

    let output = ctx.run(ctx.biovalidate("detect-morph").arg("-i").arg(&input).arg("-t").arg("2"));
    assert_eq!(output.status.code(), Some(2));

    let leftovers: Vec<_> = fs::read_dir(ctx.output_dir())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("detect-morph"))
        .collect();
    assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
}

#[test]
fn test_compare_with_merged_log() {
    let ctx = TestContext::new();
    let a = ctx.write_image("a.png", 1);
    let b = ctx.write_image("b.png", 2);
    let lines = vec![
        format!("C1 {} {}", a.display(), a.display()),
        format!("C2 {} {}", a.display(), b.display()),
        format!("C3 {} {}", b.display(), a.display()),
    ];
    let input = ctx.write_input("compare.txt", &lines);

    let output = ctx.run(
        ctx.biovalidate("compare")
            .arg("-i")
            .arg(&input)
            .arg("-t")
            .arg("2")
            .arg("-s")
            .arg("cmp")
            .arg("--merge-logs"),
    );
    assert_eq!(output.status.code(), Some(0));

    let merged = fs::read_to_string(ctx.output("cmp.log")).unwrap();
    let mut lines = merged.lines();
    assert_eq!(
        lines.next(),
        Some("id enrollImage verifImage returnCode similarity")
    );
    let records: Vec<&str> = lines.collect();
    assert_eq!(records.len(), 3);
    assert!(records[0].starts_with("C1 ") && records[0].ends_with(" 0 1"));
    assert!(!ctx.output("cmp.log.0").exists());
}

#[test]
fn test_missing_image_fails_the_run() {
    let ctx = TestContext::new();
    let a = ctx.write_image("a.png", 1);
    let lines = vec![
        format!("C1 {} {}", a.display(), a.display()),
        format!("C2 {} {}", a.display(), ctx.path("images/absent.png").display()),
    ];
    let input = ctx.write_input("compare.txt", &lines);

    let output = ctx.run(ctx.biovalidate("compare").arg("-i").arg(&input));
    assert_eq!(output.status.code(), Some(1));
    assert!(!ctx.output("compare.log.0").exists());
}

#[test]
fn test_malformed_input_is_rejected_before_work_starts() {
    let ctx = TestContext::new();
    let input = ctx.write_input("compare.txt", &["C1 only-one.png".to_string()]);

    let output = ctx.run(ctx.biovalidate("compare").arg("-i").arg(&input));
    assert_eq!(output.status.code(), Some(1));
    assert!(input.exists());
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 1"));
}
