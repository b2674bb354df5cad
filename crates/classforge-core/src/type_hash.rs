//! Deterministic hash-based identity for classes and methods.
//!
//! [`TypeHash`] is a 64-bit hash computed from a qualified class name, or from
//! owner + method name + parameter descriptors. The same input always produces
//! the same hash, so the registry (compile time) and the host natives table
//! (run time) agree on method identity without sharing state.
//!
//! # Examples
//!
//! ```
//! use classforge_core::TypeHash;
//!
//! let owner = TypeHash::from_name("lang.StringBuilder");
//! let a = TypeHash::from_method(owner, "append", &["Llang.String;"]);
//! let b = TypeHash::from_method(owner, "append", &["I"]);
//! assert_ne!(a, b);
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Separator constant for path components.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for class hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for method hashes.
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for constructor hashes.
    pub const CONSTRUCTOR: u64 = 0x9a7f3d5e2b8c4601;

    /// Parameter position mixing constants.
    pub const PARAM_MARKERS: [u64; 16] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
        0x7c3e9f2a5b8d1403,
        0x5d8c7b4a3e9f2106,
        0x3f1e9d8c7b5a4203,
        0x1a2b3c4d5e6f7089,
        0x9f8e7d6c5b4a3210,
        0x2468ace013579bdf,
        0xfdb97531eca86420,
        0x123456789abcdef0,
    ];
}

/// A deterministic 64-bit hash identifying a class, method or constructor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a class hash from a qualified class name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a method hash from owner class, method name and parameter descriptors.
    ///
    /// Parameter order matters.
    #[inline]
    pub fn from_method(owner: TypeHash, name: &str, param_descriptors: &[&str]) -> Self {
        let seed = hash_constants::METHOD ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        Self::mix_params(seed, param_descriptors)
    }

    /// Create a constructor hash from owner class and parameter descriptors.
    #[inline]
    pub fn from_constructor(owner: TypeHash, param_descriptors: &[&str]) -> Self {
        Self::mix_params(hash_constants::CONSTRUCTOR ^ owner.0, param_descriptors)
    }

    fn mix_params(seed: u64, param_descriptors: &[&str]) -> Self {
        let mut hash = seed;
        for (i, param) in param_descriptors.iter().enumerate() {
            let marker = hash_constants::PARAM_MARKERS
                .get(i)
                .copied()
                .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
            // wrapping_mul keeps parameter order significant
            hash = hash
                .wrapping_mul(hash_constants::SEP)
                .wrapping_add(marker ^ xxh64(param.as_bytes(), 0));
        }
        TypeHash(hash)
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
