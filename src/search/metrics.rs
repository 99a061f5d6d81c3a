//! The key/value trailer and row sink. Output keeps the datafile shape of
//! the classic search-benchmark tooling: `#pair` lines for scalar facts,
//! `#altcols`/`#altrow` lines for streamed rows such as the `incumbent`
//! stream of the anytime algorithms.

use std::fmt::Display;
use std::io;

pub fn pair(out: &mut dyn io::Write, key: &str, value: &dyn Display) -> io::Result<()> {
    writeln!(out, "#pair\t\"{key}\"\t\"{value}\"")
}

pub fn row_header(out: &mut dyn io::Write, name: &str, columns: &[&str]) -> io::Result<()> {
    write!(out, "#altcols\t\"{name}\"")?;
    for column in columns {
        write!(out, "\t\"{column}\"")?;
    }
    writeln!(out)
}

pub fn row(out: &mut dyn io::Write, name: &str, values: &[Value]) -> io::Result<()> {
    write!(out, "#altrow\t\"{name}\"")?;
    for value in values {
        write!(out, "\t{value}")?;
    }
    writeln!(out)
}

/// A single cell of an `#altrow`.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    Count(u64),
    Real(f64),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Count(n) => write!(f, "{n}"),
            Value::Real(x) => write!(f, "{x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_and_row_format() {
        let mut out = Vec::new();
        pair(&mut out, "solution cost", &3).unwrap();
        row_header(&mut out, "incumbent", &["num", "cost"]).unwrap();
        row(&mut out, "incumbent", &[Value::Count(1), Value::Real(2.5)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "#pair\t\"solution cost\"\t\"3\"\n\
             #altcols\t\"incumbent\"\t\"num\"\t\"cost\"\n\
             #altrow\t\"incumbent\"\t1\t2.5\n"
        );
    }
}
