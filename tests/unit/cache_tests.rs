/*!
 * Tests for the persistent translation cache
 */

use std::fs;
use std::sync::Arc;

use dualsub::translation::TranslationCache;

use crate::common;

#[test]
fn test_cache_new_shouldBeEmpty() {
    let cache = TranslationCache::new("never_written.json");
    assert!(cache.is_empty());
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.get("Hello"), None);
}

#[test]
fn test_open_withMissingFile_shouldStartEmpty() {
    let temp_dir = common::create_temp_dir().unwrap();
    let cache = TranslationCache::open(temp_dir.path().join("missing.json"));
    assert!(cache.is_empty());
}

#[test]
fn test_open_withExistingFile_shouldLoadEntries() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        &temp_dir.path().to_path_buf(),
        "cache.json",
        r#"{"Yeah.": "Sí.", "Good morning": "Buenos días"}"#,
    )
    .unwrap();

    let cache = TranslationCache::open(&path);

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("Yeah."), Some("Sí.".to_string()));
}

#[test]
fn test_open_withErrorMarkersOnDisk_shouldDropThem() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        &temp_dir.path().to_path_buf(),
        "cache.json",
        r#"{"Hello": "[ERROR API]", "Bye": "Adiós", "  ": "blank"}"#,
    )
    .unwrap();

    let cache = TranslationCache::open(&path);

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("Hello"), None);
}

#[test]
fn test_open_withNonObjectJson_shouldStartEmpty() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(&temp_dir.path().to_path_buf(), "cache.json", "[1, 2, 3]").unwrap();

    let cache = TranslationCache::open(&path);

    assert!(cache.is_empty());
}

#[test]
fn test_flush_to_disk_shouldWriteSortedJsonObject() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("nested").join("cache.json");
    let cache = TranslationCache::new(&path);
    cache.put("b line", "línea b");
    cache.put("a line", "línea a");

    let written = cache.flush_to_disk().unwrap();

    assert_eq!(written, 2);
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.find("a line").unwrap() < content.find("b line").unwrap());
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed["a line"], "línea a");
}

#[test]
fn test_put_withSameKeyTwice_shouldKeepLatest() {
    let cache = TranslationCache::new("unused.json");
    cache.put("Hello", "Hola");
    cache.put(" Hello ", "Buenas");

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("Hello"), Some("Buenas".to_string()));
}

#[test]
fn test_cache_withConcurrentWriters_shouldKeepEveryEntry() {
    let cache = Arc::new(TranslationCache::new("unused.json"));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..50 {
                    cache.put(&format!("line {} {}", worker, i), &format!("línea {} {}", worker, i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 400);
}
