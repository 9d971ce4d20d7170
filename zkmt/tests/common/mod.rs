#![allow(dead_code)]

use zkmt::{Blake3Hasher, IndexedTrie, InMemoryStorage, TrieStorage};

pub type TestTrie<S> = IndexedTrie<S, Blake3Hasher>;

pub fn new_trie() -> TestTrie<InMemoryStorage> {
    IndexedTrie::open(InMemoryStorage::new()).unwrap()
}

pub fn open_trie<S: TrieStorage>(storage: S) -> TestTrie<S> {
    IndexedTrie::open(storage).unwrap()
}

pub fn hashed(key: &[u8]) -> [u8; 32] {
    use zkmt::ValueHasher;
    Blake3Hasher::hash_value(key)
}
