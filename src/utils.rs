use std::path::Path;

use glob::Pattern;

/// Formats `n` with `,` between groups of three digits.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// True when the entry's name or its root-relative path matches one of `patterns`.
pub fn is_ignored(rel: &Path, patterns: &[Pattern]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let name = rel.file_name().and_then(|s| s.to_str()).unwrap_or("");
    let s_rel = rel.to_string_lossy().replace('\\', "/");
    patterns
        .iter()
        .any(|pat| pat.matches(&s_rel) || pat.matches(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_digits() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(group_thousands(u64::MAX), "18,446,744,073,709,551,615");
    }

    #[test]
    fn ignore_matches_name_or_relative_path() {
        let pats = vec![Pattern::new("*.log").unwrap(), Pattern::new("build/tmp").unwrap()];
        assert!(is_ignored(Path::new("a/b/run.log"), &pats));
        assert!(is_ignored(Path::new("build/tmp"), &pats));
        assert!(!is_ignored(Path::new("build/out"), &pats));
        assert!(!is_ignored(Path::new("x.txt"), &[]));
    }
}
