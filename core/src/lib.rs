//! Core schema and operations of the ZKMT indexed sparse merkle trie.
//!
//! This crate defines the trie's node and leaf model, canonical codecs, inclusion and
//! non-membership proofs, and the proof traces consumed by an external proving circuit,
//! all in a storage-agnostic manner.
//!
//! The core types and verification routines of this crate do not require the
//! standard library, but do require Rust's alloc crate.

#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

pub mod hasher;
pub mod leaf;
pub mod proof;
pub mod trace;
pub mod trie;
