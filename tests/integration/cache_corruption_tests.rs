use copyverify::cache::{CacheStore, VerificationCache, VerificationRecord};
use copyverify::scanner::{FileFingerprint, Hasher};
use copyverify::verify::Verifier;
use chrono::{TimeZone, Utc};
use std::fs;
use tempfile::{tempdir, NamedTempFile};

const GOOD_HASH: &str = "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262";

#[test]
fn test_garbage_file_loads_as_empty_cache() {
    let temp_file = NamedTempFile::new().unwrap();
    fs::write(temp_file.path(), b"not a csv cache at all\n\x00\x01").unwrap();

    let cache = VerificationCache::load(CacheStore::new(temp_file.path())).unwrap();
    assert!(cache.is_empty());
}

#[test]
fn test_bad_rows_are_skipped() {
    let temp_file = NamedTempFile::new().unwrap();
    let content = format!(
        "RelativePath,Size,LastWriteTime,Hash\n\
         good.txt,5,2024-01-02T03:04:05,{GOOD_HASH}\n\
         bad-size.txt,five,2024-01-02T03:04:05,{GOOD_HASH}\n\
         bad-time.txt,5,yesterday,{GOOD_HASH}\n\
         bad-hash.txt,5,2024-01-02T03:04:05,nothex\n\
         short-row.txt,5\n"
    );
    fs::write(temp_file.path(), content).unwrap();

    let cache = VerificationCache::load(CacheStore::new(temp_file.path())).unwrap();

    assert_eq!(cache.len(), 1);
    let record = cache.lookup("good.txt").unwrap();
    assert_eq!(record.fingerprint.size, 5);
    assert_eq!(
        record.fingerprint.modified_at,
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    );
}

#[test]
fn test_corrupt_store_is_rewritten_on_next_success() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    fs::write(src.join("a.txt"), "a").unwrap();
    fs::write(dst.join("a.txt"), "a").unwrap();

    let cache_dir = dir.path().join("cache");
    let store = CacheStore::for_project(&cache_dir, "P").unwrap();
    fs::create_dir_all(&cache_dir).unwrap();
    fs::write(store.path(), "Wrong,Header\n1,2\n").unwrap();

    let mut cache = VerificationCache::open_project(&cache_dir, "P").unwrap();
    assert!(cache.is_empty());
    Verifier::new(&Hasher::new(), &mut cache)
        .run(&src, &dst)
        .unwrap();

    let text = fs::read_to_string(store.path()).unwrap();
    assert!(text.starts_with("RelativePath,Size,LastWriteTime,Hash\n"));
    assert!(text.contains("a.txt,1,"));
}

#[test]
fn test_no_temp_file_left_after_persist() {
    let dir = tempdir().unwrap();
    let mut cache = VerificationCache::open_project(dir.path(), "P").unwrap();
    let record = VerificationRecord::new(
        "x",
        FileFingerprint::from_datetime(1, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        [0u8; 32],
    );
    cache.upsert(record).unwrap();

    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(".csv"));
}

#[cfg(unix)]
#[test]
fn test_unwritable_store_does_not_fail_verification() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    fs::write(src.join("a.txt"), "a").unwrap();
    fs::write(dst.join("a.txt"), "a").unwrap();

    let cache_dir = dir.path().join("cache");
    fs::create_dir_all(&cache_dir).unwrap();
    let mut cache = VerificationCache::open_project(&cache_dir, "P").unwrap();
    fs::set_permissions(&cache_dir, fs::Permissions::from_mode(0o500)).unwrap();

    // Root ignores directory permissions; nothing to check then
    let probe = cache_dir.join("probe");
    if fs::write(&probe, b"").is_ok() {
        let _ = fs::remove_file(&probe);
        fs::set_permissions(&cache_dir, fs::Permissions::from_mode(0o700)).unwrap();
        return;
    }

    let outcome = Verifier::new(&Hasher::new(), &mut cache)
        .run(&src, &dst)
        .unwrap();
    fs::set_permissions(&cache_dir, fs::Permissions::from_mode(0o700)).unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.stats.verified, 1);
}
