//! Part naming rules

use crate::error::{Error, Result};

/// Part every new object starts with.
pub const DEFAULT_PART: &str = "defaultpart";

/// What to do with objects still tagged with a part being removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartRemoval {
    /// Refuse while any object uses the part.
    #[default]
    Reject,
    /// Move users to the first remaining part.
    RetagToDefault,
}

/// # Errors
/// [`Error::Inconsistent`] for empty or whitespace-only names.
pub fn check_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::inconsistent(kind, format!("{kind} names must not be empty")));
    }
    Ok(())
}

/// `name`, or `name_NN` with the smallest two-digit counter that is free.
///
/// A trailing `_NN` on `name` is treated as a counter, so `cab_01` becomes
/// `cab_02` when taken.
pub fn unique_name<'a, I>(name: &str, taken: I) -> String
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let is_taken = |candidate: &str| taken.clone().into_iter().any(|t| t == candidate);
    if !is_taken(name) {
        return name.to_string();
    }
    let (stem, start) = split_counter(name);
    (start + 1..)
        .map(|n| format!("{stem}_{n:02}"))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| format!("{stem}_xx"))
}

fn split_counter(name: &str) -> (&str, u32) {
    if let Some((stem, digits)) = name.rsplit_once('_') {
        if digits.len() == 2 && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = digits.parse() {
                return (stem, n);
            }
        }
    }
    (name, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name() {
        let taken = ["cab", "cab_01", "chassis"];
        assert_eq!(unique_name("wheel", taken), "wheel");
        assert_eq!(unique_name("cab", taken), "cab_02");
        assert_eq!(unique_name("cab_01", taken), "cab_02");
        assert_eq!(unique_name("chassis", taken), "chassis_01");
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(check_name("part", " ").is_err());
        assert!(check_name("part", "cab").is_ok());
    }
}
