//! Data-size normalization
//!
//! Multipass reports memory and disk as strings like `"5.0GiB"` while users
//! write `"5GiB"` or `"5120 MiB"`. This module turns both into byte counts so
//! they can be compared for equality instead of by spelling.
//!
//! # Example Usage
//!
//! ```
//! use multipass_provider::size::{equal_sizes, strip_zero_decimal, to_canonical_bytes};
//!
//! assert_eq!(to_canonical_bytes("1GiB").unwrap(), 1024 * 1024 * 1024);
//! assert!(equal_sizes("1024MiB", "1GiB").unwrap());
//! assert_eq!(strip_zero_decimal("5.0 GiB"), "5GiB");
//! ```

pub mod parse;

pub use parse::{equal_sizes, strip_zero_decimal, to_canonical_bytes, SizeError, Unit};
