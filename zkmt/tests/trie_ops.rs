mod common;

use common::{new_trie, open_trie};

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use zkmt::{Error, InMemoryStorage, LeafOpening, StorageError, Trace};

#[test]
fn empty_trie_has_a_deterministic_root() {
    let a = new_trie();
    let b = new_trie();
    assert_eq!(a.sub_root(), b.sub_root());
    assert!(a.is_empty());
    assert_eq!(a.next_free_node(), 0);
}

#[test]
fn zero_read_on_empty_trie_is_bracketed_by_sentinels() {
    let trie = new_trie();
    let result = trie.read(b"absent").unwrap();
    assert!(result.value.is_none());

    let trace = match result.trace {
        Trace::ReadZero(trace) => trace,
        other => panic!("expected a zero-read trace, got {other:?}"),
    };
    assert_eq!(trace.next_free_node, 0);
    assert_eq!(trace.sub_root, trie.sub_root());
    assert_eq!(trace.left_leaf, LeafOpening::head());
    assert_eq!(trace.right_leaf, LeafOpening::tail());
}

#[test]
fn insert_then_read_round_trips() {
    let mut trie = new_trie();
    let trace = trie.insert(b"account", b"balance").unwrap();
    assert_eq!(trace.new_next_free_node, 1);
    assert_eq!(trace.new_sub_root, trie.sub_root());

    let result = trie.read(b"account").unwrap();
    assert_eq!(result.value.as_deref(), Some(&b"balance"[..]));
    match result.trace {
        Trace::Read(read) => {
            assert_eq!(read.value, b"balance");
            assert_eq!(read.leaf.prev_leaf, zkmt::HEAD_INDEX);
            assert_eq!(read.leaf.next_leaf, zkmt::TAIL_INDEX);
        }
        other => panic!("expected a read trace, got {other:?}"),
    }
}

#[test]
fn leaf_indices_allocate_monotonically() {
    let mut trie = new_trie();
    assert_eq!(trie.insert(b"a", b"1").unwrap().new_next_free_node, 1);
    assert_eq!(trie.insert(b"b", b"2").unwrap().new_next_free_node, 2);
    assert_eq!(trie.next_free_node(), 2);
}

#[test]
fn second_insert_brackets_the_first_leaf_and_a_sentinel() {
    let mut trie = new_trie();
    trie.insert(b"a", b"1").unwrap();
    let trace = trie.insert(b"b", b"2").unwrap();

    let first = common::hashed(b"a");
    let target = common::hashed(b"b");
    assert!(trace.prior_left_leaf.hashed_key < target);
    assert!(target < trace.prior_right_leaf.hashed_key);

    // with one live leaf, the bracket is that leaf on one side and a sentinel on the other.
    // the sentinel's links already point at the first leaf, so compare hashed keys.
    if first < target {
        assert_eq!(trace.prior_left_leaf.hashed_key, first);
        assert_eq!(
            trace.prior_right_leaf.hashed_key,
            LeafOpening::tail().hashed_key
        );
        assert_eq!(trace.prior_right_leaf.prev_leaf, 0);
    } else {
        assert_eq!(
            trace.prior_left_leaf.hashed_key,
            LeafOpening::head().hashed_key
        );
        assert_eq!(trace.prior_left_leaf.next_leaf, 0);
        assert_eq!(trace.prior_right_leaf.hashed_key, first);
    }
}

#[test]
fn duplicate_insert_is_rejected_without_state_change() {
    let mut trie = new_trie();
    trie.insert(b"a", b"1").unwrap();
    let root = trie.sub_root();

    assert!(matches!(
        trie.insert(b"a", b"other"),
        Err(Error::KeyAlreadyExists)
    ));
    assert_eq!(trie.sub_root(), root);
    assert_eq!(trie.next_free_node(), 1);
    assert_eq!(trie.read(b"a").unwrap().value.as_deref(), Some(&b"1"[..]));
}

#[test]
fn update_replaces_value_in_place() {
    let mut trie = new_trie();
    trie.insert(b"a", b"old").unwrap();
    let root_before = trie.sub_root();

    let trace = trie.update(b"a", b"new").unwrap();
    assert_eq!(trace.old_sub_root, root_before);
    assert_eq!(trace.new_sub_root, trie.sub_root());
    assert_eq!(trace.old_value, b"old");
    assert_eq!(trace.new_value, b"new");
    // updates never consume an index.
    assert_eq!(trace.new_next_free_node, 1);

    assert_eq!(trie.read(b"a").unwrap().value.as_deref(), Some(&b"new"[..]));
}

#[test]
fn update_of_absent_key_fails() {
    let mut trie = new_trie();
    assert!(matches!(trie.update(b"a", b"v"), Err(Error::KeyNotFound)));
}

#[test]
fn remove_splices_neighbors_and_keeps_the_counter() {
    let mut trie = new_trie();
    trie.insert(b"a", b"1").unwrap();
    trie.insert(b"b", b"2").unwrap();

    let trace = trie.remove(b"a").unwrap();
    assert_eq!(trace.new_next_free_node, 2);
    assert_eq!(trie.next_free_node(), 2);

    let result = trie.read(b"a").unwrap();
    assert!(result.value.is_none());
    assert!(matches!(result.trace, Trace::ReadZero(_)));

    // the freed slot is never reassigned.
    assert_eq!(trie.insert(b"c", b"3").unwrap().new_next_free_node, 3);
}

#[test]
fn remove_of_absent_key_fails() {
    let mut trie = new_trie();
    trie.insert(b"a", b"1").unwrap();
    assert!(matches!(trie.remove(b"b"), Err(Error::KeyNotFound)));
}

#[test]
fn roots_chain_across_mutations() {
    let mut trie = new_trie();
    let genesis = trie.sub_root();

    let insert = trie.insert(b"a", b"1").unwrap();
    assert_eq!(insert.old_sub_root, genesis);

    let update = trie.update(b"a", b"2").unwrap();
    assert_eq!(update.old_sub_root, insert.new_sub_root);

    let deletion = trie.remove(b"a").unwrap();
    assert_eq!(deletion.old_sub_root, update.new_sub_root);
    assert_eq!(deletion.new_sub_root, trie.sub_root());

    // deletion restores the leaf structure but not the root: the cleared slot and the
    // advanced counter distinguish the states, while the content is once again empty.
    assert!(trie.read(b"a").unwrap().value.is_none());
}

#[test]
fn content_equal_tries_have_equal_roots() {
    let mut a = new_trie();
    let mut b = new_trie();
    // same insertion order, same roots.
    for (key, value) in [(b"x", b"1"), (b"y", b"2")] {
        a.insert(key.as_slice(), value.as_slice()).unwrap();
        b.insert(key.as_slice(), value.as_slice()).unwrap();
    }
    assert_eq!(a.sub_root(), b.sub_root());

    b.update(b"y", b"3").unwrap();
    assert_ne!(a.sub_root(), b.sub_root());
}

#[test]
fn reopening_resumes_from_persisted_state() {
    let storage = InMemoryStorage::new();
    let (root, counter) = {
        let mut trie = open_trie(&storage);
        trie.insert(b"a", b"1").unwrap();
        trie.insert(b"b", b"2").unwrap();
        trie.remove(b"a").unwrap();
        (trie.sub_root(), trie.next_free_node())
    };

    let trie = open_trie(&storage);
    assert_eq!(trie.sub_root(), root);
    assert_eq!(trie.next_free_node(), counter);
    assert_eq!(trie.read(b"b").unwrap().value.as_deref(), Some(&b"2"[..]));
    assert!(trie.read(b"a").unwrap().value.is_none());
}

#[test]
fn failed_commit_leaves_the_last_good_state() {
    let storage = InMemoryStorage::new();
    let mut trie = open_trie(&storage);
    trie.insert(b"a", b"1").unwrap();
    let root = trie.sub_root();

    storage.fail_commits(true);
    assert!(matches!(
        trie.insert(b"b", b"2"),
        Err(Error::Storage(StorageError::CommitFailed(_)))
    ));
    assert_eq!(trie.sub_root(), root);
    assert_eq!(trie.next_free_node(), 1);

    storage.fail_commits(false);
    assert_eq!(trie.read(b"a").unwrap().value.as_deref(), Some(&b"1"[..]));
    assert_eq!(trie.insert(b"b", b"2").unwrap().new_next_free_node, 2);
}

#[test]
fn randomized_inserts_match_a_model() {
    let mut rng = rand_pcg::Pcg64::seed_from_u64(91);
    let mut trie = new_trie();
    let mut model = BTreeMap::new();

    for _ in 0..64 {
        let key: [u8; 16] = rng.gen();
        let value: [u8; 24] = rng.gen();
        trie.insert(&key, &value).unwrap();
        model.insert(key, value);
    }
    assert_eq!(trie.next_free_node(), 64);

    for (key, value) in &model {
        assert_eq!(trie.read(key).unwrap().value.as_deref(), Some(&value[..]));
    }

    // drop every other key; the removed keys become zero-reads, the rest stay intact.
    let keys: Vec<_> = model.keys().copied().collect();
    for key in keys.iter().step_by(2) {
        trie.remove(key).unwrap();
        model.remove(key);
    }
    assert_eq!(trie.next_free_node(), 64);
    for key in &keys {
        let expected = model.get(key).map(|v| v.to_vec());
        assert_eq!(trie.read(key).unwrap().value, expected);
    }
}
