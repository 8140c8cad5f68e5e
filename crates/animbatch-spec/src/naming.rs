//! Group-name sanitizing and track naming.

/// Suffix appended to a track name when the clip loops.
pub const LOOP_SUFFIX: &str = "-loop";

/// Fallback used when a group name sanitizes to nothing.
const EMPTY_GROUP_NAME: &str = "unnamed";

/// Maps a group name onto `[A-Za-z0-9_-]` so it can be used as a file stem.
///
/// Every other character (separators, dots, spaces, non-ASCII) becomes `_`, so the
/// result can never traverse out of the export directory.
pub fn sanitize_group_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        EMPTY_GROUP_NAME.to_string()
    } else {
        sanitized
    }
}

/// Returns true if the name is non-empty and uses only `[A-Za-z0-9_-]`.
pub fn is_safe_group_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Builds the track name for a clip, appending [`LOOP_SUFFIX`] when it loops.
pub fn track_name(base_name: &str, looping: bool) -> String {
    if looping {
        format!("{}{}", base_name, LOOP_SUFFIX)
    } else {
        base_name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_traversal() {
        let name = sanitize_group_name("../../evil");
        assert_eq!(name, "______evil");
        assert!(is_safe_group_name(&name));
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_sanitize_keeps_safe_names() {
        assert_eq!(sanitize_group_name("synty_locomotion-masc"), "synty_locomotion-masc");
        assert_eq!(sanitize_group_name("Sword Attack"), "Sword_Attack");
        assert_eq!(sanitize_group_name("C:\\temp"), "C__temp");
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize_group_name(""), "unnamed");
        assert_eq!(sanitize_group_name("   "), "unnamed");
    }

    #[test]
    fn test_track_name() {
        assert_eq!(track_name("A_Walk_F", true), "A_Walk_F-loop");
        assert_eq!(track_name("A_Jump", false), "A_Jump");
    }
}
