use std::path::Path;

use elfsim_core::cache::{CacheError, DisasmCache};
use elfsim_core::disasm::parse_dump;
use elfsim_core::model::BinaryImage;

const DUMP: &str = "\
Disassembly of section .text:\n\
00001000 <main>:\n\
    1000:\t93 08 00 00\tli\ts1,0\n\
    1004:\t73 00 10 00\tebreak\n";

fn sample_image() -> BinaryImage {
    parse_dump(DUMP).expect("parse")
}

#[test]
fn store_then_load_round_trips_the_image() {
    let cache = DisasmCache::open_in_memory().expect("open");
    let image = sample_image();
    let path = Path::new("/proj/build/firmware.elf");

    cache.store(path, Some("abc123"), &image).expect("store");
    let cached = cache.load(path).expect("load").expect("entry present");

    assert_eq!(cached.hash.as_deref(), Some("abc123"));
    assert_eq!(cached.image, image);
    assert_eq!(cached.image.instruction_count(), 2);
    // Timestamps are RFC 3339 and therefore start with the year.
    assert!(cached.cached_at.starts_with("20"));
}

#[test]
fn load_misses_for_unknown_path() {
    let cache = DisasmCache::open_in_memory().expect("open");
    assert!(cache.load(Path::new("/nowhere.elf")).expect("load").is_none());
}

#[test]
fn store_replaces_an_existing_entry() {
    let cache = DisasmCache::open_in_memory().expect("open");
    let path = Path::new("/proj/firmware.elf");
    let image = sample_image();

    cache.store(path, Some("old-hash"), &image).expect("store");
    cache.store(path, Some("new-hash"), &image).expect("restore");

    let cached = cache.load(path).expect("load").expect("entry present");
    assert_eq!(cached.hash.as_deref(), Some("new-hash"));
}

#[test]
fn invalidate_removes_only_the_named_entry() {
    let cache = DisasmCache::open_in_memory().expect("open");
    let image = sample_image();
    let keep = Path::new("/proj/keep.elf");
    let drop = Path::new("/proj/drop.elf");
    cache.store(keep, None, &image).expect("store keep");
    cache.store(drop, None, &image).expect("store drop");

    assert!(cache.invalidate(drop).expect("invalidate"));
    assert!(!cache.invalidate(drop).expect("second invalidate is a no-op"));
    assert!(cache.load(drop).expect("load").is_none());
    assert!(cache.load(keep).expect("load").is_some());
}

#[test]
fn clear_empties_the_cache() {
    let cache = DisasmCache::open_in_memory().expect("open");
    let image = sample_image();
    cache.store(Path::new("/a.elf"), None, &image).expect("store");
    cache.store(Path::new("/b.elf"), None, &image).expect("store");

    assert_eq!(cache.clear().expect("clear"), 2);
    assert!(cache.load(Path::new("/a.elf")).expect("load").is_none());
}

#[test]
fn cache_survives_reopen_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("disasm-cache.sqlite");
    let image = sample_image();
    let path = Path::new("/proj/firmware.elf");

    {
        let cache = DisasmCache::open(&db_path).expect("open");
        cache.store(path, Some("h"), &image).expect("store");
    }

    let cache = DisasmCache::open(&db_path).expect("reopen");
    let cached = cache.load(path).expect("load").expect("entry present");
    assert_eq!(cached.image, image);
}

#[test]
fn future_schema_versions_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("disasm-cache.sqlite");
    {
        let conn = rusqlite::Connection::open(&db_path).expect("raw open");
        conn.execute_batch("PRAGMA user_version = 99;").expect("set version");
    }

    match DisasmCache::open(&db_path) {
        Err(CacheError::UnsupportedSchemaVersion { found, .. }) => assert_eq!(found, 99),
        other => panic!("expected UnsupportedSchemaVersion, got {other:?}"),
    }
}
