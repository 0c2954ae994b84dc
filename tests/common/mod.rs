// tests/common/mod.rs
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::{tempdir, TempDir};

pub struct TestContext {
    pub dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let ctx = Self {
            dir: tempdir().expect("Failed to create temp dir"),
        };
        fs::create_dir_all(ctx.config_dir()).unwrap();
        fs::create_dir_all(ctx.output_dir()).unwrap();
        fs::create_dir_all(ctx.path("images")).unwrap();
        ctx
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.path("config")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path("output")
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.output_dir().join(name)
    }

    /// 8x8 grayscale PNG whose 2x2 blocks differ per seed.
    pub fn write_image(&self, name: &str, seed: u32) -> PathBuf {
        let path = self.path("images").join(name);
        let image = image::GrayImage::from_fn(8, 8, |x, y| {
            image::Luma([((seed * 37 + (x / 2) * 11 + (y / 2) * 53) % 256) as u8])
        });
        image.save(&path).expect("Failed to write test image");
        path
    }

    pub fn write_input(&self, name: &str, lines: &[String]) -> PathBuf {
        let path = self.path(name);
        let mut body = lines.join("\n");
        body.push('\n');
        fs::write(&path, body).expect("Failed to write input");
        path
    }

    /// Harness command with configuration and output directories set.
    pub fn biovalidate(&self, action: &str) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_biovalidate"));
        command
            .arg(action)
            .arg("-c")
            .arg(self.config_dir())
            .arg("-o")
            .arg(self.output_dir())
            .env("RUST_LOG", "warn")
            .current_dir(self.dir.path());
        command
    }

    pub fn run(&self, command: &mut Command) -> Output {
        let output = command.output().expect("Failed to run biovalidate");
        if !output.stderr.is_empty() {
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        }
        output
    }

    /// Log lines without the header.
    pub fn records(&self, log: &Path) -> Vec<String> {
        fs::read_to_string(log)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", log.display(), e))
            .lines()
            .skip(1)
            .map(String::from)
            .collect()
    }
}
