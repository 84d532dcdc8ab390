//! Virtual path helpers

use std::path::Path;

/// Marker for project-relative paths.
pub const PROJECT_SENTINEL: &str = "//";

/// Forward slashes regardless of host OS.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> String {
    path.as_ref().to_string_lossy().replace('\\', "/")
}

/// Whether `path` is project-relative (`//...`).
#[must_use]
pub fn is_virtual(path: &str) -> bool {
    path.replace('\\', "/").starts_with(PROJECT_SENTINEL)
}

/// The path below the project root, without leading slashes.
///
/// Accepts `//a/b`, `/a/b` (the in-file form) and `a/b`.
#[must_use]
pub fn project_relative(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// In-file form of a scene path: `//x` becomes `/x`.
#[must_use]
pub fn to_file_form(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    match normalized.strip_prefix(PROJECT_SENTINEL) {
        Some(rest) => format!("/{rest}"),
        None => normalized,
    }
}

/// Scene form of an in-file path: `/x` becomes `//x`.
#[must_use]
pub fn to_scene_form(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    if normalized.starts_with(PROJECT_SENTINEL) {
        normalized
    } else if normalized.starts_with('/') {
        format!("/{normalized}")
    } else {
        normalized
    }
}

/// Split `name.ext` into the infix search pattern pieces (`name.`, `.ext`).
pub(crate) fn infix_parts(file_name: &str) -> Option<(&str, &str)> {
    let dot = file_name.rfind('.')?;
    Some((&file_name[..=dot], &file_name[dot..]))
}

/// Whether `candidate` is `stem.<token>.ext` for a dot-free, non-empty token.
pub(crate) fn is_infixed_variant(candidate: &str, file_name: &str) -> bool {
    let Some((head, ext)) = infix_parts(file_name) else {
        return false;
    };
    candidate
        .strip_prefix(head)
        .and_then(|rest| rest.strip_suffix(ext))
        .is_some_and(|token| !token.is_empty() && !token.contains('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forms() {
        assert!(is_virtual("//material/a.tobj"));
        assert!(is_virtual("\\\\material\\a.tobj"));
        assert!(!is_virtual("/material/a.tobj"));
        assert_eq!(to_file_form("//material/a.tobj"), "/material/a.tobj");
        assert_eq!(to_scene_form("/material/a.tobj"), "//material/a.tobj");
        assert_eq!(to_scene_form("a.tobj"), "a.tobj");
        assert_eq!(project_relative("//def/world/sign.sii"), "def/world/sign.sii");
    }

    #[test]
    fn test_infix_match() {
        assert!(is_infixed_variant("sign.dlc_north.sii", "sign.sii"));
        assert!(!is_infixed_variant("sign.sii", "sign.sii"));
        assert!(!is_infixed_variant("sign.a.b.sii", "sign.sii"));
        assert!(!is_infixed_variant("signs.x.sii", "sign.sii"));
    }
}
