use copyverify::cache::VerificationCache;
use copyverify::output::Report;
use copyverify::scanner::{ContentHasher, Hash, HashError, Hasher};
use copyverify::verify::{FileStatus, Verifier, VerificationErrorKind};
use filetime::{set_file_mtime, FileTime};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::{tempdir, TempDir};

/// Delegates to the real hasher and counts calls per path.
#[derive(Default)]
struct CountingHasher {
    inner: Hasher,
    calls: Mutex<HashMap<PathBuf, usize>>,
}

impl CountingHasher {
    fn calls_for(&self, path: &Path) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

impl ContentHasher for CountingHasher {
    fn digest(&self, path: &Path) -> Result<Hash, HashError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_insert(0) += 1;
        self.inner.full_hash(path)
    }
}

struct Trees {
    _dir: TempDir,
    src: PathBuf,
    dst: PathBuf,
    cache_dir: PathBuf,
}

fn trees() -> Trees {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    let cache_dir = dir.path().join("cache");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    Trees {
        _dir: dir,
        src,
        dst,
        cache_dir,
    }
}

fn pin_mtime(path: &Path, secs: i64) {
    set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
}

#[test]
fn scenario_a_identical_trees_without_project() {
    let t = trees();
    for (name, content) in [("a.txt", "hello"), ("b.txt", "world")] {
        fs::write(t.src.join(name), content).unwrap();
        fs::write(t.dst.join(name), content).unwrap();
    }

    let hasher = CountingHasher::default();
    let mut cache = VerificationCache::disabled();
    let outcome = Verifier::new(&hasher, &mut cache).run(&t.src, &t.dst).unwrap();

    assert!(outcome.errors.is_empty());
    assert_eq!(Report::new(&outcome.errors).body(), "Verification succeeded");
    assert!(cache.is_empty());
    assert!(!t.cache_dir.exists());

    // Without a project nothing is remembered: a rerun hashes everything again
    let outcome = Verifier::new(&hasher, &mut cache).run(&t.src, &t.dst).unwrap();
    assert_eq!(outcome.stats.verified, 2);
    assert_eq!(hasher.total(), 8);
}

#[test]
fn scenario_b_missing_destination_with_project() {
    let t = trees();
    fs::write(t.src.join("a.txt"), "hello").unwrap();
    fs::write(t.dst.join("a.txt"), "hello").unwrap();
    fs::write(t.src.join("b.txt"), "world").unwrap();

    let hasher = Hasher::new();
    let mut cache = VerificationCache::open_project(&t.cache_dir, "P").unwrap();
    let outcome = Verifier::new(&hasher, &mut cache).run(&t.src, &t.dst).unwrap();

    assert_eq!(cache.len(), 1);
    let record = cache.lookup("a.txt").unwrap();
    assert_eq!(record.fingerprint.size, 5);
    assert_eq!(record.digest, *blake3::hash(b"hello").as_bytes());
    assert!(cache.lookup("b.txt").is_none());

    assert_eq!(
        Report::new(&outcome.errors).body(),
        "Verification failed\nMissing file: b.txt"
    );
}

#[test]
fn scenario_c_rerun_skips_verified_and_retries_failed() {
    let t = trees();
    fs::write(t.src.join("a.txt"), "hello").unwrap();
    fs::write(t.dst.join("a.txt"), "hello").unwrap();
    fs::write(t.src.join("b.txt"), "world").unwrap();

    let hasher = CountingHasher::default();
    let mut cache = VerificationCache::open_project(&t.cache_dir, "P").unwrap();
    Verifier::new(&hasher, &mut cache).run(&t.src, &t.dst).unwrap();
    drop(cache);
    let first_pass = hasher.calls_for(&t.src.join("a.txt"));
    assert_eq!(first_pass, 1);

    // Fresh process: reload from disk
    let mut cache = VerificationCache::open_project(&t.cache_dir, "P").unwrap();
    let outcome = Verifier::new(&hasher, &mut cache).run(&t.src, &t.dst).unwrap();

    assert_eq!(hasher.calls_for(&t.src.join("a.txt")), first_pass);
    assert_eq!(hasher.calls_for(&t.dst.join("a.txt")), 1);
    assert_eq!(outcome.stats.skipped, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].message, "Missing file: b.txt");
}

#[test]
fn scenario_d_same_fingerprint_content_change_is_not_detected() {
    let t = trees();
    let src_file = t.src.join("a.txt");
    let dst_file = t.dst.join("a.txt");
    fs::write(&src_file, "12345").unwrap();
    fs::write(&dst_file, "12345").unwrap();
    pin_mtime(&src_file, 1_700_000_000);

    let hasher = CountingHasher::default();
    let mut cache = VerificationCache::open_project(&t.cache_dir, "P").unwrap();
    Verifier::new(&hasher, &mut cache).run(&t.src, &t.dst).unwrap();

    // Same size, mtime restored, different bytes on both sides
    fs::write(&src_file, "abcde").unwrap();
    fs::write(&dst_file, "zzzzz").unwrap();
    pin_mtime(&src_file, 1_700_000_000);

    let outcome = Verifier::new(&hasher, &mut cache).run(&t.src, &t.dst).unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.stats.skipped, 1);
    assert_eq!(hasher.calls_for(&src_file), 1);
}

#[test]
fn test_idempotent_rerun_hashes_nothing() {
    let t = trees();
    fs::create_dir_all(t.src.join("nested/deeper")).unwrap();
    fs::create_dir_all(t.dst.join("nested/deeper")).unwrap();
    for rel in ["one.bin", "nested/two.bin", "nested/deeper/three.bin"] {
        fs::write(t.src.join(rel), rel).unwrap();
        fs::write(t.dst.join(rel), rel).unwrap();
    }

    let mut cache = VerificationCache::open_project(&t.cache_dir, "P").unwrap();
    let outcome = Verifier::new(&Hasher::new(), &mut cache)
        .run(&t.src, &t.dst)
        .unwrap();
    assert_eq!(outcome.stats.verified, 3);

    let hasher = CountingHasher::default();
    let outcome = Verifier::new(&hasher, &mut cache).run(&t.src, &t.dst).unwrap();
    assert_eq!(outcome.stats.skipped, 3);
    assert_eq!(hasher.total(), 0);
    assert!(cache.lookup("nested/deeper/three.bin").is_some());
}

#[test]
fn test_previously_cached_file_that_now_fails_loses_record() {
    let t = trees();
    let src_file = t.src.join("a.txt");
    fs::write(&src_file, "good").unwrap();
    fs::write(t.dst.join("a.txt"), "good").unwrap();
    pin_mtime(&src_file, 1_600_000_000);

    let mut cache = VerificationCache::open_project(&t.cache_dir, "P").unwrap();
    Verifier::new(&Hasher::new(), &mut cache)
        .run(&t.src, &t.dst)
        .unwrap();
    assert!(cache.lookup("a.txt").is_some());

    // Touch the source so the cache is not trusted, corrupt the copy
    pin_mtime(&src_file, 1_600_000_100);
    fs::write(t.dst.join("a.txt"), "evil").unwrap();

    let outcome = Verifier::new(&Hasher::new(), &mut cache)
        .run(&t.src, &t.dst)
        .unwrap();
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].kind, VerificationErrorKind::HashMismatch);
    assert!(cache.lookup("a.txt").is_none());

    let reloaded = VerificationCache::open_project(&t.cache_dir, "P").unwrap();
    assert!(reloaded.is_empty());
}

#[test]
fn test_check_file_reports_status() {
    let t = trees();
    fs::write(t.src.join("a.txt"), "x").unwrap();
    fs::write(t.dst.join("a.txt"), "x").unwrap();

    let walker = copyverify::scanner::Walker::new(&t.src);
    let entry = walker.walk().next().unwrap().unwrap();

    let mut cache = VerificationCache::open_project(&t.cache_dir, "P").unwrap();
    let hasher = Hasher::new();
    let mut verifier = Verifier::new(&hasher, &mut cache);

    assert_eq!(verifier.check_file(&entry, &t.dst), FileStatus::Verified);
    assert_eq!(verifier.check_file(&entry, &t.dst), FileStatus::Skipped);
}

#[test]
fn test_errors_keep_enumeration_order() {
    let t = trees();
    fs::create_dir_all(t.src.join("m")).unwrap();
    for rel in ["z.txt", "a.txt", "m/b.txt"] {
        fs::write(t.src.join(rel), rel).unwrap();
    }

    let mut cache = VerificationCache::disabled();
    let outcome = Verifier::new(&Hasher::new(), &mut cache)
        .run(&t.src, &t.dst)
        .unwrap();

    let paths: Vec<_> = outcome
        .errors
        .iter()
        .map(|e| e.relative_path.as_str())
        .collect();
    assert_eq!(paths, vec!["a.txt", "m/b.txt", "z.txt"]);
}
