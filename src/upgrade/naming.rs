//! Display names for family phases

/// Share of uppercase letters at which a name is treated as an acronym
const ACRONYM_RATIO: f32 = 0.6;

/// Human-readable phase name for a family.
///
/// A trailing "family" (separate word or suffix) is dropped. Acronym words keep their casing;
/// other words get an uppercase first letter per dot segment. Single-token results get
/// a " Packages" suffix.
pub fn format_family_name(raw: &str) -> String {
    let words: Vec<&str> = strip_family_suffix(raw).split_whitespace().collect();
    if words.is_empty() {
        return "Unnamed Packages".to_string();
    }

    let name = words
        .iter()
        .map(|word| {
            if is_acronym(word) {
                word.to_string()
            } else {
                word.split('.').map(upper_first).collect::<Vec<_>>().join(".")
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if name.contains(char::is_whitespace) {
        name
    } else {
        format!("{} Packages", name)
    }
}

/// Drop trailing case-insensitive "family" suffixes, with the separator
/// before them, as long as something remains.
fn strip_family_suffix(raw: &str) -> &str {
    const SUFFIX: &str = "family";
    let mut name = raw.trim_end();
    while name.len() > SUFFIX.len() {
        let cut = name.len() - SUFFIX.len();
        let Some(tail) = name.get(cut..) else {
            break;
        };
        if !tail.eq_ignore_ascii_case(SUFFIX) {
            break;
        }
        let rest = name[..cut].trim_end_matches(|c: char| c == '.' || c == '-' || c.is_whitespace());
        if rest.is_empty() {
            break;
        }
        name = rest;
    }
    name
}

fn is_acronym(s: &str) -> bool {
    let letters = s.chars().filter(|c| c.is_alphabetic()).count();
    if letters == 0 {
        return false;
    }
    let upper = s.chars().filter(|c| c.is_uppercase()).count();
    upper as f32 / letters as f32 >= ACRONYM_RATIO
}

fn upper_first(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_family_name() {
        assert_eq!(format_family_name("serilog"), "Serilog Packages");
        assert_eq!(format_family_name("Serilog family"), "Serilog Packages");
        assert_eq!(format_family_name("AWS"), "AWS Packages");
        assert_eq!(format_family_name("AWS SDK Family"), "AWS SDK");
        assert_eq!(
            format_family_name("microsoft.extensions"),
            "Microsoft.Extensions Packages"
        );
        assert_eq!(format_family_name("Serilog Ecosystem"), "Serilog Ecosystem");
        assert_eq!(format_family_name("entity framework"), "Entity Framework");
        assert_eq!(format_family_name("xUnit"), "XUnit Packages");
        assert_eq!(format_family_name("iOS"), "iOS Packages");
    }

    #[test]
    fn test_family_suffix_without_separator() {
        assert_eq!(format_family_name("SerilogFamily"), "Serilog Packages");
        assert_eq!(format_family_name("Serilog.Family"), "Serilog Packages");
        assert_eq!(format_family_name("Polly-family"), "Polly Packages");
        assert_eq!(format_family_name("AWS SDK family"), "AWS SDK");
        assert_eq!(format_family_name("Family"), "Family Packages");
    }

    #[test]
    fn test_lone_family_word_is_kept() {
        assert_eq!(format_family_name("family"), "Family Packages");
        assert_eq!(format_family_name("family family"), "Family Packages");
    }

    #[test]
    fn test_blank_name() {
        assert_eq!(format_family_name("   "), "Unnamed Packages");
    }

    proptest! {
        #[test]
        fn prop_format_is_idempotent(raw in "[A-Za-z][A-Za-z. ]{0,30}") {
            let once = format_family_name(&raw);
            prop_assert_eq!(format_family_name(&once), once.clone());
            prop_assert!(once.contains(' '));
        }
    }
}
