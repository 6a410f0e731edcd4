//! End-to-end behavior of the result cache against a real directory.

use ai_vision_tools::cache::{
    self, derive_key, unix_now, CacheBackend, CacheConfig, CacheEntry, CacheManager, CacheParams,
    ContentHasher, FileStore, ENTRY_TTL,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct Env {
    dir: tempfile::TempDir,
    cache_dir: PathBuf,
    cache: CacheManager,
}

fn env() -> Env {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("ai_image_analysis_cache");
    let cache = CacheManager::from_config(&CacheConfig::new().with_cache_dir(&cache_dir));
    Env {
        dir,
        cache_dir,
        cache,
    }
}

fn image(env: &Env, name: &str, bytes: &[u8]) -> PathBuf {
    let p = env.dir.path().join(name);
    std::fs::write(&p, bytes).unwrap();
    p
}

fn prompt(p: &str) -> CacheParams {
    CacheParams::new().with("prompt", p)
}

#[test]
fn describe_scenario() {
    let env = env();
    let a = image(&env, "a.png", b"B1");

    env.cache.put(&a, "describe", &prompt("x"), "hello");
    assert_eq!(
        env.cache.get(&a, "describe", &prompt("x")).as_deref(),
        Some("hello")
    );

    std::fs::write(&a, b"B2").unwrap();
    assert_eq!(env.cache.get(&a, "describe", &prompt("x")), None);
    assert_eq!(env.cache.stats().unwrap().file_count, 0);
}

#[test]
fn keys_survive_a_restart() {
    let env = env();
    let a = image(&env, "a.png", b"B1");
    env.cache.put(&a, "describe", &prompt("x"), "hello");

    let reopened =
        CacheManager::from_config(&CacheConfig::new().with_cache_dir(&env.cache_dir));
    assert_eq!(
        reopened.get(&a, "describe", &prompt("x")).as_deref(),
        Some("hello")
    );
}

#[test]
fn parameter_order_is_irrelevant() {
    let env = env();
    let a = image(&env, "a.png", b"B1");
    let forward: CacheParams = vec![("analysis_type", "text"), ("prompt", "read it")]
        .into_iter()
        .collect();
    let backward: CacheParams = vec![("prompt", "read it"), ("analysis_type", "text")]
        .into_iter()
        .collect();

    env.cache.put(&a, "analyze", &forward, "SIGN: EXIT");
    assert_eq!(
        env.cache.get(&a, "analyze", &backward).as_deref(),
        Some("SIGN: EXIT")
    );
}

#[test]
fn files_are_isolated() {
    let env = env();
    let f1 = image(&env, "one.png", b"first");
    let f2 = image(&env, "two.png", b"second");

    env.cache.put(&f2, "describe", &prompt("p"), "B");
    env.cache.put(&f1, "describe", &prompt("p"), "A");

    assert_eq!(env.cache.get(&f1, "describe", &prompt("p")).as_deref(), Some("A"));
    assert_eq!(env.cache.get(&f2, "describe", &prompt("p")).as_deref(), Some("B"));
}

#[test]
fn identical_bytes_at_different_paths_are_separate_entries() {
    let env = env();
    let f1 = image(&env, "one.png", b"same");
    let f2 = image(&env, "two.png", b"same");
    env.cache.put(&f1, "describe", &prompt("p"), "A");
    assert_eq!(env.cache.get(&f2, "describe", &prompt("p")), None);
}

#[test]
fn expired_entries_are_never_served() {
    let env = env();
    let a = image(&env, "a.png", b"B1");
    let key = derive_key(&a, "describe", &prompt("x"));
    let store = FileStore::open(&env.cache_dir);
    store
        .write(
            &key,
            &CacheEntry {
                source_identity: a.display().to_string(),
                content_hash: ContentHasher::hash_file(&a).unwrap(),
                operation: "describe".into(),
                parameters: prompt("x"),
                payload: "old news".into(),
                created_at: unix_now() - ENTRY_TTL.as_secs_f64() - 1.0,
                size_at_write: 2,
                mtime_at_write: 0.0,
            },
        )
        .unwrap();

    assert_eq!(env.cache.get(&a, "describe", &prompt("x")), None);
    assert_eq!(env.cache.stats().unwrap().file_count, 0);
}

#[test]
fn clear_removes_everything() {
    let env = env();
    let a = image(&env, "a.png", b"B1");
    let b = image(&env, "b.png", b"B2");
    env.cache.put(&a, "describe", &prompt("x"), "1");
    env.cache.put(&b, "analyze", &prompt("y"), "2");

    assert_eq!(env.cache.clear(), 2);
    assert_eq!(env.cache.get(&a, "describe", &prompt("x")), None);
    assert_eq!(env.cache.get(&b, "analyze", &prompt("y")), None);
    assert_eq!(env.cache.stats().unwrap().file_count, 0);
}

#[test]
fn unwritable_directory_never_raises() {
    let dir = tempfile::tempdir().unwrap();
    let blocked = dir.path().join("cache");
    std::fs::write(&blocked, "a file where the directory should be").unwrap();
    let cache = CacheManager::from_config(&CacheConfig::new().with_cache_dir(&blocked));
    let a = dir.path().join("a.png");
    std::fs::write(&a, b"B1").unwrap();

    cache.put(&a, "describe", &prompt("x"), "fresh result");
    assert_eq!(cache.get(&a, "describe", &prompt("x")), None);
    assert_eq!(cache.clear(), 0);
    assert!(cache.stats().is_err());
    assert!(cache.counters().errors >= 1);
}

#[test]
fn relative_paths_key_like_their_absolute_form() {
    let env = env();
    let cwd = std::env::current_dir().unwrap();
    assert_eq!(
        env.cache
            .key_for(Path::new("a.png"), "describe", &prompt("x"))
            .unwrap(),
        env.cache
            .key_for(&cwd.join("a.png"), "describe", &prompt("x"))
            .unwrap()
    );
}

#[test]
fn concurrent_writers_and_readers_on_one_key() {
    let env = env();
    let a = image(&env, "a.png", b"B1");
    let cache = Arc::new(env.cache);
    let payloads = ["alpha", "beta", "gamma", "delta"];

    std::thread::scope(|s| {
        for p in payloads {
            let cache = cache.clone();
            let a = a.clone();
            s.spawn(move || {
                for _ in 0..25 {
                    cache.put(&a, "describe", &prompt("x"), p);
                }
            });
        }
        for _ in 0..4 {
            let cache = cache.clone();
            let a = a.clone();
            s.spawn(move || {
                for _ in 0..25 {
                    if let Some(v) = cache.get(&a, "describe", &prompt("x")) {
                        assert!(payloads.contains(&v.as_str()), "torn read: {v}");
                    }
                }
            });
        }
    });

    let last = cache.get(&a, "describe", &prompt("x")).unwrap();
    assert!(payloads.contains(&last.as_str()));
    assert_eq!(cache.stats().unwrap().file_count, 1);
    assert_eq!(cache.counters().errors, 0);
}

#[test]
fn global_cache_is_a_singleton() {
    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(cache::global))
        .collect();
    let first = cache::global();
    for h in handles {
        assert!(Arc::ptr_eq(&first, &h.join().unwrap()));
    }
}

#[test]
fn record_file_is_named_by_operation() {
    let env = env();
    let a = image(&env, "a.png", b"B1");
    env.cache.put(&a, "describe", &prompt("x"), "hello");
    let names: Vec<String> = std::fs::read_dir(&env.cache_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names.len(), 1);
    let name = &names[0];
    assert!(name.starts_with("describe_"));
    assert!(name.ends_with(".json"));
    assert_eq!(name.len(), "describe_".len() + 32 + ".json".len());
}

#[test]
fn dot_prefixed_spelling_hits_the_same_record() {
    let env = env();
    image(&env, "a.png", b"B1");
    let base = Some(env.dir.path());

    let plain = ai_vision_tools::paths::validate_image_path("a.png", base).unwrap();
    let dotted = ai_vision_tools::paths::validate_image_path("./a.png", base).unwrap();
    assert_eq!(plain, dotted);

    env.cache.put(&plain, "describe", &prompt("x"), "hello");
    assert_eq!(
        env.cache
            .get(&env.dir.path().join("./a.png"), "describe", &prompt("x"))
            .as_deref(),
        Some("hello")
    );
}
