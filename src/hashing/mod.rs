//! Hashing used by the string intern table and the generic `Table` (§4.6).

mod fnv1a;

pub use fnv1a::fnv1a;
