//! Wildcard matching shared by action/resource matching and `StringLike`
//!
//! `*` matches any run of characters (including none) and `?` matches exactly
//! one character. Matching is case-sensitive and anchored: the pattern has to
//! account for the whole input.

/// Match `value` against a wildcard `pattern`.
///
/// # Examples
///
/// ```
/// use monkeys_authz::match_wildcard;
///
/// assert!(match_wildcard("iam:*", "iam:GetUser"));
/// assert!(!match_wildcard("iam:*", "auth:Login"));
/// assert!(match_wildcard("arn:monkeys:iam::user/???", "arn:monkeys:iam::user/123"));
/// assert!(!match_wildcard("arn:monkeys:iam::user/??", "arn:monkeys:iam::user/123"));
/// ```
pub fn match_wildcard(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    if !pattern.contains(|c| c == '*' || c == '?') {
        return pattern == value;
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();

    let mut p = 0;
    let mut v = 0;
    // Position of the last `*` seen and the input position it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while v < value.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == value[v]) {
            p += 1;
            v += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, v));
            p += 1;
        } else if let Some((star, consumed)) = backtrack {
            // Let the last star absorb one more character and retry
            backtrack = Some((star, consumed + 1));
            p = star + 1;
            v = consumed + 1;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Match `value` against any of `patterns`
pub fn match_any(patterns: &[String], value: &str) -> bool {
    patterns.iter().any(|pattern| match_wildcard(pattern, value))
}
