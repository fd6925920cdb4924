//! Mirror ranking for catalog entries

use serde::{Deserialize, Serialize};

/// One download location of a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMirror {
    pub name: String,
    pub url: String,
}

impl CatalogMirror {
    pub fn new<N: Into<String>, U: Into<String>>(name: N, url: U) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Pick the mirror to download from
///
/// The first preference that matches a mirror name wins; otherwise the
/// endpoint priority list is matched against names and URLs; otherwise the
/// first mirror seen.
pub fn select_preferred_mirror<'a>(
    mirrors: &'a [CatalogMirror],
    preference: &[String],
    endpoint_priority: &[String],
) -> Option<&'a CatalogMirror> {
    for preferred in preference {
        if let Some(mirror) = mirrors.iter().find(|m| contains_ignore_case(&m.name, preferred)) {
            return Some(mirror);
        }
    }

    for endpoint in endpoint_priority {
        if let Some(mirror) = mirrors
            .iter()
            .find(|m| contains_ignore_case(&m.name, endpoint) || contains_ignore_case(&m.url, endpoint))
        {
            return Some(mirror);
        }
    }

    mirrors.first()
}

/// Preferred mirror first, the rest in catalog order
pub fn rank_mirrors(
    mirrors: &[CatalogMirror],
    preference: &[String],
    endpoint_priority: &[String],
) -> Vec<CatalogMirror> {
    let Some(preferred) = select_preferred_mirror(mirrors, preference, endpoint_priority) else {
        return Vec::new();
    };

    let mut ranked = Vec::with_capacity(mirrors.len());
    ranked.push(preferred.clone());
    ranked.extend(mirrors.iter().filter(|m| *m != preferred).cloned());
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirrors() -> Vec<CatalogMirror> {
        vec![CatalogMirror::new("A", "u1"), CatalogMirror::new("B", "u2")]
    }

    #[test]
    fn test_preference_selects_named_mirror() {
        let mirrors = mirrors();
        let selected = select_preferred_mirror(&mirrors, &["B".to_string()], &[]).unwrap();
        assert_eq!(selected.url, "u2");
    }

    #[test]
    fn test_preference_is_case_insensitive_substring() {
        let mirrors = vec![
            CatalogMirror::new("gentool.net", "https://gentool.net/a.dat"),
            CatalogMirror::new("Legi.CC", "https://legi.cc/a.dat"),
        ];
        let selected = select_preferred_mirror(&mirrors, &["legi".to_string()], &[]).unwrap();
        assert_eq!(selected.name, "Legi.CC");
    }

    #[test]
    fn test_endpoint_priority_then_first() {
        let mirrors = mirrors();
        let selected = select_preferred_mirror(&mirrors, &["C".to_string()], &["u2".to_string()]).unwrap();
        assert_eq!(selected.name, "B");

        let selected = select_preferred_mirror(&mirrors, &[], &[]).unwrap();
        assert_eq!(selected.name, "A");
        assert!(select_preferred_mirror(&[], &[], &[]).is_none());
    }

    #[test]
    fn test_rank_mirrors_puts_preferred_first() {
        let ranked = rank_mirrors(&mirrors(), &["b".to_string()], &[]);
        let urls: Vec<_> = ranked.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(urls, vec!["u2", "u1"]);
    }
}
