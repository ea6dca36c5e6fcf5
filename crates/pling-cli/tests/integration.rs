//! Integration tests for pling-cli.
//!
//! Tests run the `pling` binary against a settings file that points the
//! patch search path at a temporary directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use pling_config::{Patch, PatchStore, Settings, bank_number};
use tempfile::TempDir;

/// Helper to get the path to the `pling` binary built by cargo.
fn pling_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pling"))
}

/// Temporary local and data directories with a settings file naming them.
struct Sandbox {
    dir: TempDir,
    config: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        let settings = Settings {
            local_dir: Some(dir.path().join("local")),
            data_dir: Some(dir.path().join("data")),
            ..Settings::default()
        };
        settings.save(&config).unwrap();
        Self { dir, config }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        pling_bin()
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .expect("failed to run pling")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ---------------------------------------------------------------------------
// CLI binary tests -- help, version, engines
// ---------------------------------------------------------------------------

#[test]
fn cli_help_lists_subcommands() {
    let output = pling_bin().arg("--help").output().expect("failed to run pling --help");
    assert!(output.status.success());

    let text = stdout(&output);
    for command in ["play", "bench", "render", "ports", "engines", "patch"] {
        assert!(text.contains(command), "help should list '{command}'");
    }
}

#[test]
fn cli_version_works() {
    let output = pling_bin().arg("--version").output().expect("failed to run pling --version");
    assert!(output.status.success());
    assert!(stdout(&output).contains("pling"));
}

#[test]
fn cli_engines_lists_all_engines() {
    let output = pling_bin().arg("engines").output().expect("failed to run pling engines");
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains("Available Engines"));
    for engine in ["Simple", "Karplus-Strong", "Octalope", "None"] {
        assert!(text.contains(engine), "engines listing should contain '{engine}'");
    }
}

// ---------------------------------------------------------------------------
// pling patch
// ---------------------------------------------------------------------------

#[test]
fn cli_patch_init_writes_loadable_patch() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["patch", "init", "Octalope", "1:2", "5", "--name", "Bells"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let path = sandbox.path().join("local").join(PatchStore::relative_path(bank_number(1, 2), 5));
    let patch = Patch::load(&path).unwrap();
    assert_eq!(patch.name, "Bells");
    assert_eq!(patch.engine, "Octalope");
    assert!(!patch.parameters.is_empty());

    // Refuses to overwrite without --force.
    let again = sandbox.run(&["patch", "init", "Simple", "1:2", "5"]);
    assert!(!again.status.success());
    let forced = sandbox.run(&["patch", "init", "Simple", "1:2", "5", "--force"]);
    assert!(forced.status.success());
    assert_eq!(Patch::load(&path).unwrap().engine, "Simple");
}

#[test]
fn cli_patch_init_unknown_engine_fails() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["patch", "init", "Moog", "0", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown engine"));
}

#[test]
fn cli_patch_show_finds_data_patch() {
    let sandbox = Sandbox::new();
    let shipped = sandbox.path().join("data").join(PatchStore::relative_path(0, 3));
    Patch::new("Shipped Pluck", "Karplus-Strong").save(&shipped).unwrap();

    let output = sandbox.run(&["patch", "show", "0", "3"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Shipped Pluck"));

    assert!(!sandbox.run(&["patch", "show", "0", "4"]).status.success());
}

// ---------------------------------------------------------------------------
// pling render
// ---------------------------------------------------------------------------

#[test]
fn cli_render_writes_wav() {
    let sandbox = Sandbox::new();
    let out = sandbox.path().join("pluck.wav");
    let output = sandbox.run(&[
        "render",
        "Karplus-Strong",
        out.to_str().unwrap(),
        "--step",
        "0.1",
        "--hold",
        "0.2",
        "--tail",
        "0.5",
        "--bit-depth",
        "16",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let (samples, spec) = pling_io::read_wav(&out).unwrap();
    assert_eq!(spec.sample_rate, 48000);
    assert_eq!(spec.bits_per_sample, 16);
    // Four steps and the hold, plus at most the tail.
    assert!(samples.len() >= 48000 * 6 / 10);
    assert!(samples.len() <= 48000 * 12 / 10);
    assert!(samples.iter().any(|s| s.abs() > 1e-3));
}

#[test]
fn cli_render_unknown_engine_fails() {
    let sandbox = Sandbox::new();
    let out = sandbox.path().join("nothing.wav");
    let output = sandbox.run(&["render", "Moog", out.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(!out.exists());
}

// ---------------------------------------------------------------------------
// pling bench
// ---------------------------------------------------------------------------

#[test]
fn cli_bench_reports_timing() {
    let sandbox = Sandbox::new();
    let store = PatchStore::new(pling_config::SearchPath::new(
        sandbox.path().join("local"),
        sandbox.path().join("data"),
    ));
    store.save(0, 2, &Patch::new("Bench Pad", "Simple")).unwrap();

    let output = sandbox.run(&["bench", "--program", "2", "--chunks", "50"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let text = stdout(&output);
    assert!(text.contains("Bench Pad"));
    assert!(text.contains("Per chunk"));
    assert!(text.contains("Realtime"));
}
