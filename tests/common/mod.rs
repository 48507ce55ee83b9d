use std::process::{Command, Output};
use tempfile::TempDir;

/// Path to the built `railyard` binary, preferring debug over release.
pub fn railyard_binary() -> String {
    let debug = concat!(env!("CARGO_MANIFEST_DIR"), "/target/debug/railyard");
    if std::path::Path::new(debug).exists() {
        debug.to_string()
    } else {
        concat!(env!("CARGO_MANIFEST_DIR"), "/target/release/railyard").to_string()
    }
}

/// Helper to run `railyard` CLI commands against an isolated templates/metadata
/// directory pair, so tests never touch a developer's real working tree.
pub struct RailyardTest {
    pub temp_dir: TempDir,
    binary_path: String,
}

impl RailyardTest {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        RailyardTest {
            temp_dir,
            binary_path: railyard_binary(),
        }
    }

    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(&self.binary_path)
            .args(args)
            .env("TEMPLATES_DIR", self.temp_dir.path().join("templates"))
            .env("METADATA_DIR", self.temp_dir.path().join("metadata"))
            .output()
            .expect("failed to execute railyard command")
    }

    pub fn run_success(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if !output.status.success() {
            panic!(
                "command {:?} failed with status {:?}\nstdout: {}\nstderr: {}",
                args,
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        String::from_utf8_lossy(&output.stdout).to_string()
    }
}
