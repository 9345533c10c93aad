//! Selection of the local files that take part in synchronization

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Which local files are synchronized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum FileFilter {
    /// Every file is synchronized
    IncludeAll,
    /// Files with a hidden component anywhere in their path are left alone
    #[default]
    ExcludeHidden,
}

impl FileFilter {
    /// Whether the relative path takes part in synchronization
    pub fn accepts<P: AsRef<Path>>(self, path: P) -> bool {
        match self {
            Self::IncludeAll => true,
            Self::ExcludeHidden => !is_hidden(path.as_ref()),
        }
    }
}

/// True when any component of the path starts with a dot
pub fn is_hidden(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("notes.txt", false)]
    #[case(".notes.txt", true)]
    #[case("journal/2024/monday.txt", false)]
    #[case("journal/.drafts/monday.txt", true)]
    #[case(".git/config", true)]
    #[case("a/b/.c", true)]
    #[case("dotted.name/file", false)]
    fn test_hidden_detection(#[case] path: &str, #[case] hidden: bool) {
        assert_eq!(is_hidden(Path::new(path)), hidden);
        assert_eq!(FileFilter::ExcludeHidden.accepts(path), !hidden);
        assert!(FileFilter::IncludeAll.accepts(path));
    }

    #[test]
    fn test_default_excludes_hidden() {
        assert_eq!(FileFilter::default(), FileFilter::ExcludeHidden);
    }
}
