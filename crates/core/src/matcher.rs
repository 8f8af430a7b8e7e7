//! Search-within-dropdown matching for project, fuzzer, and job option lists.
//!
//! An empty key matches everything; otherwise a candidate matches when it contains
//! the key as a case-insensitive substring.

/// Build a predicate for the text typed into a dropdown's search box.
pub fn build_matcher(key: &str) -> impl Fn(&str) -> bool + Clone {
    let needle = key.to_lowercase();
    move |candidate: &str| needle.is_empty() || contains_ignore_case(candidate, &needle)
}

/// Filter `options` down to those matching `key`, preserving order.
pub fn filter_options<'a, S: AsRef<str>>(options: &'a [S], key: &str) -> Vec<&'a str> {
    let matches = build_matcher(key);
    options.iter().map(AsRef::as_ref).filter(|o| matches(o)).collect()
}

fn contains_ignore_case(text: &str, needle_lower: &str) -> bool {
    if text.is_ascii() && needle_lower.is_ascii() {
        return find_substring_ascii(text.as_bytes(), needle_lower.as_bytes()).is_some();
    }
    text.to_lowercase().contains(needle_lower)
}

// Allocation-free path for the common ASCII case (option names are job/fuzzer identifiers).
fn find_substring_ascii(text: &[u8], pattern: &[u8]) -> Option<usize> {
    if pattern.is_empty() {
        return Some(0);
    }
    if pattern.len() > text.len() {
        return None;
    }
    'outer: for i in 0..=text.len() - pattern.len() {
        for (j, &pb) in pattern.iter().enumerate() {
            if !text[i + j].eq_ignore_ascii_case(&pb) {
                continue 'outer;
            }
        }
        return Some(i);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_matches_everything() {
        let m = build_matcher("");
        assert!(m("anything"));
        assert!(m(""));
    }

    #[test]
    fn case_insensitive_substring() {
        let m = build_matcher("abc");
        assert!(m("ABCDEF"));
        assert!(m("xxabcxx"));
        assert!(!m("xyz"));
        assert!(!m("ab"));

        let upper = build_matcher("ASAN");
        assert!(upper("libfuzzer_chrome_asan"));
    }

    #[test]
    fn non_ascii_candidates() {
        let m = build_matcher("straße");
        assert!(!m("STRASSE_job"));
        assert!(m("Die Straße"));
        let m = build_matcher("É");
        assert!(m("café_fuzzer"));
    }

    #[test]
    fn filter_options_preserves_order() {
        let jobs = vec![
            "libfuzzer_chrome_asan".to_string(),
            "afl_chrome_asan".to_string(),
            "libfuzzer_pdfium_msan".to_string(),
        ];
        assert_eq!(
            filter_options(&jobs, "Chrome"),
            vec!["libfuzzer_chrome_asan", "afl_chrome_asan"]
        );
        assert_eq!(filter_options(&jobs, "").len(), 3);
        assert!(filter_options(&jobs, "ubsan").is_empty());
    }
}
