#[path = "../common/mod.rs"]
mod common;

mod gallery_tests;
mod harness_tests;
mod plugin_tests;
