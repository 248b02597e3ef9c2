//! Laws of the persistent collections: map/vector algebra, trie canonicity at the
//! leaf threshold, set operations, and blob-map key ordering.

use converge_rs::{
    cell::{encode, tag, Cell, Ref},
    collections::{u64_key, BlobMap, CellMap, CellSet, Vector, LEAF_MAX},
};

#[test]
fn map_laws() {
    let mut map = CellMap::empty();
    for i in 0..100i64 {
        let key = Cell::Long(i);
        let value = Cell::Long(i * 7);
        let before = map.count();
        let contained = map.contains_key(&key).unwrap();
        map = map.assoc(key.clone(), value.clone()).unwrap();

        // get(assoc(m, k, v), k) == v
        assert_eq!(Some(value), map.get(&key).unwrap().map(|v| v.as_ref().clone()));
        // count(assoc(m, k, v)) == count(m) + (containsKey(m, k) ? 0 : 1)
        assert_eq!(before + if contained { 0 } else { 1 }, map.count());
    }

    // Overwriting does not change the count.
    let overwritten = map.assoc(Cell::Long(5), Cell::Long(999)).unwrap();
    assert_eq!(map.count(), overwritten.count());
    assert_eq!(
        Some(Cell::Long(999)),
        overwritten.get(&Cell::Long(5)).unwrap().map(|v| v.as_ref().clone())
    );

    // dissoc(assoc(m, k, v)) == dissoc(m, k), for both present and absent keys
    let with_new = map.assoc(Cell::Long(1000), Cell::Nil).unwrap();
    assert_eq!(
        map.dissoc(&Cell::Long(1000)).unwrap(),
        with_new.dissoc(&Cell::Long(1000)).unwrap()
    );
    assert_eq!(map, with_new.dissoc(&Cell::Long(1000)).unwrap());

    // Remove everything again.
    for i in 0..100i64 {
        map = map.dissoc(&Cell::Long(i)).unwrap();
    }
    assert!(map.is_empty());
    assert_eq!(CellMap::empty(), map);
}

/// Any map with count <= LEAF_MAX is a leaf; any tree node has count > LEAF_MAX. The
/// node kind is observable through the encoding's tag byte.
#[test]
fn trie_canonicity_at_leaf_threshold() {
    let mut map = CellMap::empty();
    for i in 0..LEAF_MAX as i64 {
        map = map.assoc(Cell::Long(i), Cell::Nil).unwrap();
    }
    assert_eq!(tag::MAP_LEAF, encode(&Cell::Map(map.clone()))[0]);

    let grown = map.assoc(Cell::Long(LEAF_MAX as i64), Cell::Nil).unwrap();
    assert_eq!(tag::MAP_TREE, encode(&Cell::Map(grown.clone()))[0]);

    // Shrinking back across the threshold collapses to a leaf again.
    let collapsed = grown.dissoc(&Cell::Long(0)).unwrap();
    assert_eq!(LEAF_MAX as u64, collapsed.count());
    assert_eq!(tag::MAP_LEAF, encode(&Cell::Map(collapsed))[0]);
}

#[test]
fn vector_laws() {
    // Exercise sizes across chunk and tree boundaries.
    let mut vector = Vector::empty();
    for i in 0..300u64 {
        let appended = vector.append(Cell::Long(i as i64)).unwrap();
        // get(append(v, e), count(v)) == e
        assert_eq!(
            Cell::Long(i as i64),
            appended.get(vector.count()).unwrap().as_ref().clone()
        );
        // pop(append(v, e)) == v
        let (popped, last) = appended.pop().unwrap().unwrap();
        assert_eq!(vector, popped);
        assert_eq!(last, Ref::of(Cell::Long(i as i64)));
        vector = appended;
    }
    assert_eq!(300, vector.count());
    for i in 0..300u64 {
        assert_eq!(Cell::Long(i as i64), vector.get(i).unwrap().as_ref().clone());
    }

    let slice = vector.slice(10, 40).unwrap();
    assert_eq!(40, slice.count());
    for i in 0..40u64 {
        assert_eq!(Cell::Long((i + 10) as i64), slice.get(i).unwrap().as_ref().clone());
    }

    // assoc replaces a single element.
    let updated = vector.assoc(123, Cell::Nil).unwrap();
    assert_eq!(Cell::Nil, updated.get(123).unwrap().as_ref().clone());
    assert_eq!(Cell::Long(122), updated.get(122).unwrap().as_ref().clone());
    assert_eq!(300, updated.count());
}

#[test]
fn vector_common_prefix() {
    let base = Vector::from_cells((0..100).map(Cell::Long)).unwrap();
    let same = Vector::from_cells((0..100).map(Cell::Long)).unwrap();
    assert_eq!(100, base.common_prefix_length(&same).unwrap());

    let shorter = Vector::from_cells((0..60).map(Cell::Long)).unwrap();
    assert_eq!(60, base.common_prefix_length(&shorter).unwrap());
    assert_eq!(60, shorter.common_prefix_length(&base).unwrap());

    let mut diverged = shorter.clone();
    diverged = diverged.append(Cell::Long(-1)).unwrap();
    for i in 61..90 {
        diverged = diverged.append(Cell::Long(i)).unwrap();
    }
    assert_eq!(60, base.common_prefix_length(&diverged).unwrap());

    let early_divergence = {
        let mut v = Vector::from_cells((0..5).map(Cell::Long)).unwrap();
        v = v.append(Cell::Nil).unwrap();
        for i in 6..100 {
            v = v.append(Cell::Long(i)).unwrap();
        }
        v
    };
    assert_eq!(5, base.common_prefix_length(&early_divergence).unwrap());
    assert_eq!(0, base.common_prefix_length(&Vector::empty()).unwrap());
}

#[test]
fn set_operations() {
    let left = CellSet::from_cells((0..30).map(Cell::Long)).unwrap();
    let right = CellSet::from_cells((20..50).map(Cell::Long)).unwrap();

    let union = left.union(&right).unwrap();
    assert_eq!(50, union.count());
    for i in 0..50i64 {
        assert!(union.contains(&Cell::Long(i)).unwrap());
    }

    let intersection = left.intersection(&right).unwrap();
    assert_eq!(10, intersection.count());
    for i in 20..30i64 {
        assert!(intersection.contains(&Cell::Long(i)).unwrap());
    }

    let only_left = left.diff_left(&right).unwrap();
    assert_eq!(20, only_left.count());
    for i in 0..20i64 {
        assert!(only_left.contains(&Cell::Long(i)).unwrap());
    }
    assert!(!only_left.contains(&Cell::Long(25)).unwrap());

    let only_right = left.diff_right(&right).unwrap();
    assert_eq!(20, only_right.count());
    for i in 30..50i64 {
        assert!(only_right.contains(&Cell::Long(i)).unwrap());
    }

    // Identity cases.
    assert_eq!(left, left.union(&left).unwrap());
    assert_eq!(left, left.intersection(&left).unwrap());
    assert!(left.diff_left(&left).unwrap().is_empty());
    assert_eq!(left, left.union(&CellSet::empty()).unwrap());
    assert!(left.intersection(&CellSet::empty()).unwrap().is_empty());

    // include / exclude round trip across the leaf threshold.
    let mut set = CellSet::empty();
    for i in 0..20i64 {
        set = set.include(Cell::Long(i)).unwrap();
    }
    for i in 0..20i64 {
        set = set.exclude(&Cell::Long(i)).unwrap();
    }
    assert_eq!(CellSet::empty(), set);
}

#[test]
fn blob_map_orders_by_key() {
    let mut map = BlobMap::empty();
    // Insert in scrambled order; iteration must come back numerically sorted.
    for k in [9u64, 3, 250, 7, 16, 1, 100, 42, 77, 5, 0, 63] {
        map = map.assoc(u64_key(k), Ref::of(Cell::Long(k as i64))).unwrap();
    }
    assert_eq!(12, map.count());

    let keys: Vec<u64> = map
        .entries()
        .unwrap()
        .iter()
        .map(|e| u64::from_be_bytes(e.key().try_into().unwrap()))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, keys);

    assert_eq!(0, u64::from_be_bytes(map.first_entry().unwrap().unwrap().key().try_into().unwrap()));
    assert!(map.contains_key(&u64_key(42)).unwrap());
    assert!(!map.contains_key(&u64_key(43)).unwrap());

    let map = map.dissoc(&u64_key(0)).unwrap();
    assert_eq!(11, map.count());
    assert_eq!(1, u64::from_be_bytes(map.first_entry().unwrap().unwrap().key().try_into().unwrap()));

    // Keys of a different length are rejected.
    assert!(map.assoc(vec![1, 2, 3], Ref::of(Cell::Nil)).is_err());
}
