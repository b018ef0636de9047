//! Property path parsing: `Child.GrandChild.Prop` and `ListProp[3]`.

use crate::error::{CoreObjectsError, CoreResult};

/// Split off the first dotted segment: `"A.B.C"` → `("A", Some("B.C"))`.
pub(crate) fn split_first(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// Parse an optional trailing `[index]`.
pub(crate) fn parse_indexed(segment: &str) -> CoreResult<(&str, Option<usize>)> {
    let Some(open) = segment.find('[') else {
        return Ok((segment, None));
    };
    let malformed = || CoreObjectsError::InvalidParameter(format!("malformed index in '{}'", segment));
    let inner = segment[open + 1..].strip_suffix(']').ok_or_else(malformed)?;
    let index = inner.trim().parse::<usize>().map_err(|_| malformed())?;
    let name = &segment[..open];
    if name.is_empty() {
        return Err(malformed());
    }
    Ok((name, Some(index)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_first() {
        assert_eq!(split_first("A.B.C"), ("A", Some("B.C")));
        assert_eq!(split_first("A"), ("A", None));
    }

    #[test]
    fn test_parse_indexed() {
        assert_eq!(parse_indexed("Items[3]").unwrap(), ("Items", Some(3)));
        assert_eq!(parse_indexed("Items").unwrap(), ("Items", None));
        assert!(parse_indexed("Items[x]").is_err());
        assert!(parse_indexed("Items[1").is_err());
        assert!(parse_indexed("[1]").is_err());
        assert!(parse_indexed("Items[-1]").is_err());
    }
}
