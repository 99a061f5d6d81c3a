#![warn(missing_debug_implementations)]
#![deny(non_ascii_idents)]
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
#![deny(unit_bindings)]
#![warn(unused_qualifications)]

pub mod collections;
pub mod domains;
pub mod search;

#[cfg(test)]
mod test_utils;
