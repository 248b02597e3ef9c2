//! The on-disk cell store: durability across reopen, idempotent puts, and crash-safe
//! truncation of a partial trailing record.

use std::{
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use converge_rs::{
    cell::{encode, Cell},
    store::{CellStore, DiskStore},
};

fn temp_store_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    std::env::temp_dir().join(format!(
        "converge-{}-{}-{}",
        name,
        std::process::id(),
        nanos
    ))
}

#[test]
fn put_get_has_and_reopen() {
    let path = temp_store_path("reopen");
    let cells: Vec<Vec<u8>> = (0..200i64).map(|i| encode(&Cell::Long(i))).collect();

    let mut hashes = Vec::new();
    {
        let store = DiskStore::open(&path).unwrap();
        for bytes in &cells {
            hashes.push(store.put(bytes).unwrap());
        }
        for (bytes, hash) in cells.iter().zip(&hashes) {
            assert!(store.has(hash).unwrap());
            assert_eq!(Some(bytes.clone()), store.get(hash).unwrap());
        }
        // Idempotent: putting the same bytes again returns the same hash.
        assert_eq!(hashes[0], store.put(&cells[0]).unwrap());
    }

    // Reopen: the index is rebuilt from the file.
    let store = DiskStore::open(&path).unwrap();
    for (bytes, hash) in cells.iter().zip(&hashes) {
        assert_eq!(Some(bytes.clone()), store.get(hash).unwrap());
    }
    assert!(!store.has(&Cell::Nil.hash()).unwrap());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn truncates_partial_trailing_record() {
    let path = temp_store_path("truncate");
    let complete = encode(&Cell::String(String::from("durable")));
    let hash = {
        let store = DiskStore::open(&path).unwrap();
        store.put(&complete).unwrap()
    };

    // Simulate a crash mid-append: a record header with most of its bytes missing.
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xAA; 20]).unwrap();
    }
    let dirty_len = std::fs::metadata(&path).unwrap().len();

    let store = DiskStore::open(&path).unwrap();
    // The complete record survives; the partial one is gone.
    assert_eq!(Some(complete.clone()), store.get(&hash).unwrap());
    let clean_len = std::fs::metadata(&path).unwrap().len();
    assert!(clean_len < dirty_len);

    // The truncated store accepts new writes as usual.
    let more = encode(&Cell::Long(42));
    let more_hash = store.put(&more).unwrap();
    assert_eq!(Some(more), store.get(&more_hash).unwrap());
    assert_eq!(Some(complete), store.get(&hash).unwrap());

    let _ = std::fs::remove_file(&path);
}
