use clap::Parser;
use copyverify::cli::Cli;
use copyverify::error::ExitCode;
use copyverify::run_app;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            dir: tempdir().unwrap(),
        };
        fs::create_dir_all(ws.src()).unwrap();
        ws
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn src(&self) -> PathBuf {
        self.path("src")
    }

    fn dst(&self) -> PathBuf {
        self.path("dst")
    }

    fn write_src(&self, rel: &str, content: &str) {
        write(&self.src().join(rel), content);
    }

    fn write_dst(&self, rel: &str, content: &str) {
        write(&self.dst().join(rel), content);
    }

    /// Parse and run with isolated config, cache and log locations.
    fn run(&self, args: &[&str]) -> anyhow::Result<ExitCode> {
        let config = self.path("config.toml");
        let mut argv = vec![
            "copyverify".to_string(),
            "-q".to_string(),
            "--config".to_string(),
            config.display().to_string(),
        ];
        argv.extend(args.iter().map(|a| (*a).to_string()));
        run_app(Cli::try_parse_from(argv).unwrap())
    }

    fn dirs(&self) -> Vec<String> {
        vec![
            "--cache-dir".to_string(),
            self.path("cache").display().to_string(),
            "--log-dir".to_string(),
            self.path("logs").display().to_string(),
        ]
    }

    fn verify(&self, extra: &[&str]) -> anyhow::Result<ExitCode> {
        let src = self.src().display().to_string();
        let dst = self.dst().display().to_string();
        let dirs = self.dirs();
        let mut args: Vec<&str> = vec!["verify", &src, &dst];
        args.extend(dirs.iter().map(String::as_str));
        args.extend_from_slice(extra);
        self.run(&args)
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_verify_success_exit_code() {
    let ws = Workspace::new();
    ws.write_src("a.txt", "hello");
    ws.write_dst("a.txt", "hello");

    let report = ws.path("report.txt");
    let code = ws
        .verify(&["--report", report.to_str().unwrap()])
        .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(
        fs::read_to_string(report).unwrap(),
        "Verification succeeded\n"
    );
}

#[test]
fn test_verify_failure_exit_code_and_log() {
    let ws = Workspace::new();
    ws.write_src("a.txt", "hello");
    ws.write_src("sub/b.txt", "world");
    ws.write_dst("a.txt", "hello");

    let code = ws.verify(&[]).unwrap();
    assert_eq!(code, ExitCode::VerificationFailed);

    let logs: Vec<_> = fs::read_dir(ws.path("logs"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(logs.len(), 1);
    let text = fs::read_to_string(&logs[0]).unwrap();
    assert!(text.contains("Missing file: sub/b.txt"));
}

#[test]
fn test_verify_missing_source_is_fatal() {
    let ws = Workspace::new();
    fs::remove_dir(ws.src()).unwrap();

    let err = ws.verify(&[]).unwrap_err();
    assert!(err.to_string().contains("not found"), "{err:#}");
    assert!(!ws.path("logs").exists());
}

#[test]
fn test_project_cache_commands() {
    let ws = Workspace::new();
    ws.write_src("a.txt", "hello");
    ws.write_dst("a.txt", "hello");
    let cache_dir = ws.path("cache");
    let cache_arg = cache_dir.to_str().unwrap();

    assert_eq!(ws.verify(&["--project", "photos"]).unwrap(), ExitCode::Success);

    let cache = copyverify::cache::VerificationCache::open_project(&cache_dir, "photos").unwrap();
    assert!(cache.lookup("a.txt").is_some());

    assert_eq!(
        ws.run(&["cache", "show", "photos", "--cache-dir", cache_arg]).unwrap(),
        ExitCode::Success
    );
    assert_eq!(
        ws.run(&["cache", "forget", "photos", "a.txt", "--cache-dir", cache_arg])
            .unwrap(),
        ExitCode::Success
    );
    let cache = copyverify::cache::VerificationCache::open_project(&cache_dir, "photos").unwrap();
    assert!(cache.is_empty());

    assert_eq!(
        ws.run(&["cache", "clear", "photos", "--cache-dir", cache_arg]).unwrap(),
        ExitCode::Success
    );
    assert!(copyverify::cache::list_stores(&cache_dir).unwrap().is_empty());
    assert_eq!(
        ws.run(&["cache", "list", "--cache-dir", cache_arg]).unwrap(),
        ExitCode::Success
    );
}

#[test]
fn test_run_abort_on_existing_destination() {
    let ws = Workspace::new();
    ws.write_src("a.txt", "hello");
    fs::create_dir_all(ws.dst()).unwrap();

    let src = ws.src().display().to_string();
    let dst = ws.dst().display().to_string();
    let dirs = ws.dirs();
    let mut args: Vec<&str> = vec!["run", &src, &dst, "--on-existing", "abort"];
    args.extend(dirs.iter().map(String::as_str));

    assert_eq!(ws.run(&args).unwrap(), ExitCode::Aborted);
    assert!(!ws.dst().join("a.txt").exists());
}

#[test]
fn test_run_verify_only_on_existing_destination() {
    let ws = Workspace::new();
    ws.write_src("a.txt", "hello");
    ws.write_dst("a.txt", "HELLO");

    let src = ws.src().display().to_string();
    let dst = ws.dst().display().to_string();
    let report = ws.path("report.txt").display().to_string();
    let dirs = ws.dirs();
    let mut args: Vec<&str> = vec![
        "run",
        &src,
        &dst,
        "--on-existing",
        "verify-only",
        "--report",
        &report,
    ];
    args.extend(dirs.iter().map(String::as_str));

    assert_eq!(ws.run(&args).unwrap(), ExitCode::VerificationFailed);
    let text = fs::read_to_string(ws.path("report.txt")).unwrap();
    assert!(text.starts_with("Verification failed\nHash mismatch: "));
}

#[cfg(unix)]
#[test]
fn test_run_copies_with_configured_program() {
    let ws = Workspace::new();
    ws.write_src("a.txt", "hello");
    ws.write_src("nested/b.txt", "world");
    fs::write(
        ws.path("config.toml"),
        r#"
[copy]
program = "sh"
args = ["-c", "cp -R \"$0\"/. \"$1\"", "{source}", "{destination}"]
fatal_threshold = 1
retries = 0
"#,
    )
    .unwrap();

    let src = ws.src().display().to_string();
    let dst = ws.dst().display().to_string();
    let dirs = ws.dirs();
    let mut args: Vec<&str> = vec!["run", &src, &dst, "--project", "P"];
    args.extend(dirs.iter().map(String::as_str));

    assert_eq!(ws.run(&args).unwrap(), ExitCode::Success);
    assert_eq!(fs::read_to_string(ws.dst().join("nested/b.txt")).unwrap(), "world");
}

#[cfg(unix)]
#[test]
fn test_run_copy_failure_is_fatal() {
    let ws = Workspace::new();
    ws.write_src("a.txt", "hello");
    fs::write(
        ws.path("config.toml"),
        "[copy]\nprogram = \"sh\"\nargs = [\"-c\", \"exit 9\"]\nfatal_threshold = 8\nretries = 0\n",
    )
    .unwrap();

    let src = ws.src().display().to_string();
    let dst = ws.dst().display().to_string();
    let report = ws.path("report.txt").display().to_string();
    let dirs = ws.dirs();
    let mut args: Vec<&str> = vec!["run", &src, &dst, "--report", &report];
    args.extend(dirs.iter().map(String::as_str));

    let err = ws.run(&args).unwrap_err();
    assert!(err.to_string().contains("status 9"), "{err:#}");
    assert!(!ws.path("report.txt").exists());
}

#[test]
fn test_config_show() {
    let ws = Workspace::new();
    assert_eq!(ws.run(&["config", "show"]).unwrap(), ExitCode::Success);
}
