//! Eviction policy implementations (replacers).
//!
//! - [`LruKReplacer`] - backward k-distance with earliest-access tie-break

mod lru_k;

pub use lru_k::LruKReplacer;
