//! Field splitting: partitioning a byte stream into fields using `IFS`
//! characters as delimiters.

use itertools::Itertools;

/// Splits `text` on any run of characters in `ifs`, discarding leading and
/// trailing delimiters. Consecutive delimiters collapse to a single
/// boundary rather than producing empty fields between them, matching
/// POSIX's default whitespace-splitting behavior.
pub fn split_fields<'a>(text: &'a str, ifs: &str) -> Vec<&'a str> {
    if ifs.is_empty() {
        return if text.is_empty() { Vec::new() } else { vec![text] };
    }
    text.split(|c| ifs.contains(c))
        .filter(|field| !field.is_empty())
        .collect()
}

/// Joins fields with a single space, as `Expr` evaluation does once a
/// backtick substitution's output has been field-split.
pub fn join_fields(fields: &[&str]) -> String {
    fields.iter().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn split_default_ifs() {
        assert_eq!(split_fields("a  b\tc\nd", " \t\n"), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn split_strips_leading_trailing() {
        assert_eq!(split_fields("  a b  ", " "), vec!["a", "b"]);
    }

    #[test]
    fn split_custom_ifs() {
        assert_eq!(split_fields("a:b::c", ":"), vec!["a", "b", "c"]);
    }

    #[test]
    fn split_empty_ifs_is_single_field() {
        assert_eq!(split_fields("a b", ""), vec!["a b"]);
        assert_eq!(split_fields("", ""), Vec::<&str>::new());
    }

    #[test]
    fn join_with_single_space() {
        assert_eq!(join_fields(&["a", "b", "c"]), "a b c");
    }
}
