/// Fixed token prices per unlockable content type.
///
/// Unknown content types are rejected up front so a malformed request can never
/// charge an arbitrary amount.

pub const HINT_COST: i64 = 10;
pub const SOLUTION_COST: i64 = 30;
pub const CASE_PACK_COST: i64 = 50;

pub fn content_cost(content_type: &str) -> Option<i64> {
    match content_type {
        "hint" => Some(HINT_COST),
        "solution" => Some(SOLUTION_COST),
        "case_pack" => Some(CASE_PACK_COST),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_content_types_are_priced() {
        assert_eq!(content_cost("hint"), Some(HINT_COST));
        assert_eq!(content_cost("solution"), Some(SOLUTION_COST));
        assert_eq!(content_cost("case_pack"), Some(CASE_PACK_COST));
    }

    #[test]
    fn test_unknown_content_type_is_rejected() {
        assert_eq!(content_cost("riddle"), None);
        assert_eq!(content_cost(""), None);
    }
}
