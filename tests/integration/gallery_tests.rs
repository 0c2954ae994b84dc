// tests/integration/gallery_tests.rs
use biovalidate::storage::{GalleryPaths, GallerySeal, Manifest};
use std::fs;

use crate::common::TestContext;

const ENROLLED: u32 = 5;

fn gallery_paths(ctx: &TestContext) -> GalleryPaths {
    GalleryPaths::new(
        ctx.output("enroll"),
        ctx.output("enroll.edb"),
        ctx.output("enroll.manifest"),
    )
}

fn enroll(ctx: &TestContext, workers: &str) {
    let lines: Vec<String> = (0..ENROLLED)
        .map(|i| {
            let image = ctx.write_image(&format!("e{}.png", i), i);
            format!("E{} {}", i, image.display())
        })
        .collect();
    let input = ctx.write_input("enroll.txt", &lines);
    let output = ctx.run(ctx.biovalidate("enroll").arg("-i").arg(&input).arg("-t").arg(workers));
    assert_eq!(output.status.code(), Some(0), "enroll failed");
}

fn finalize(ctx: &TestContext) -> Option<i32> {
    ctx.run(&mut ctx.biovalidate("finalize")).status.code()
}

#[test]
fn test_enroll_merges_parts_in_shard_order() {
    let ctx = TestContext::new();
    enroll(&ctx, "2");

    let paths = gallery_paths(&ctx);
    let manifest = Manifest::load(&paths.manifest).unwrap();
    let ids: Vec<&str> = manifest
        .entries()
        .iter()
        .map(|e| e.template_id.as_str())
        .collect();
    assert_eq!(ids, vec!["E0", "E1", "E2", "E3", "E4"]);
    assert_eq!(
        fs::metadata(&paths.blob).unwrap().len(),
        manifest.total_len()
    );
    for shard in 0..2 {
        assert!(!ctx.output(&format!("enroll.edb.{}", shard)).exists());
        assert!(!ctx.output(&format!("enroll.manifest.{}", shard)).exists());
    }
}

#[test]
fn test_finalize_is_single_use() {
    let ctx = TestContext::new();
    enroll(&ctx, "1");
    let paths = gallery_paths(&ctx);

    assert_eq!(finalize(&ctx), Some(0));
    let seal = GallerySeal::load(&paths).unwrap().expect("gallery was not sealed");
    assert_eq!(seal.template_count, ENROLLED as usize);
    let blob = fs::read(&paths.blob).unwrap();

    assert_eq!(finalize(&ctx), Some(1));
    assert_eq!(fs::read(&paths.blob).unwrap(), blob);
    assert_eq!(GallerySeal::load(&paths).unwrap(), Some(seal));

    // Enrolling into a sealed gallery is refused too.
    let image = ctx.write_image("late.png", 42);
    let input = ctx.write_input("late.txt", &[format!("L1 {}", image.display())]);
    let output = ctx.run(ctx.biovalidate("enroll").arg("-i").arg(&input));
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(fs::read(&paths.blob).unwrap(), blob);
}

#[test]
fn test_search_before_finalize_fails() {
    let ctx = TestContext::new();
    enroll(&ctx, "1");

    let probe = ctx.write_image("probe.png", 3);
    let input = ctx.write_input("search.txt", &[format!("S1 {}", probe.display())]);
    let output = ctx.run(ctx.biovalidate("search").arg("-i").arg(&input));
    assert_eq!(output.status.code(), Some(1));
    assert!(input.exists());
}

#[test]
fn test_search_returns_exactly_top_k_best_first() {
    let ctx = TestContext::new();
    enroll(&ctx, "3");
    assert_eq!(finalize(&ctx), Some(0));

    let probes: Vec<String> = [3u32, 0]
        .iter()
        .map(|&seed| {
            let probe = ctx.write_image(&format!("probe{}.png", seed), seed);
            format!("S{} {}", seed, probe.display())
        })
        .collect();
    let input = ctx.write_input("search.txt", &probes);
    let output = ctx.run(
        ctx.biovalidate("search")
            .arg("-i")
            .arg(&input)
            .arg("-t")
            .arg("2")
            .arg("--top-k")
            .arg("8"),
    );
    assert_eq!(output.status.code(), Some(0));

    let mut records = ctx.records(&ctx.output("search.log.0"));
    records.extend(ctx.records(&ctx.output("search.log.1")));
    assert_eq!(records.len(), 2);

    for record in &records {
        let fields: Vec<&str> = record.split(' ').collect();
        assert_eq!(fields.len(), 3 + 2 * 8);
        assert_eq!(fields[2], "0");

        let expected_best = format!("E{}", &fields[0][1..]);
        assert_eq!(fields[3], expected_best);
        assert_eq!(fields[4], "1");

        let candidates: Vec<(&str, &str)> = fields[3..]
            .chunks(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();
        let assigned: Vec<f64> = candidates
            .iter()
            .filter(|(id, _)| *id != "NA")
            .map(|(_, score)| score.parse().unwrap())
            .collect();
        assert_eq!(assigned.len(), ENROLLED as usize);
        assert!(assigned.windows(2).all(|pair| pair[0] >= pair[1]));
        assert!(candidates[ENROLLED as usize..]
            .iter()
            .all(|pair| *pair == ("NA", "NA")));
    }
}
