//! Unit tests for path helpers.

use super::*;

#[cfg(test)]
mod normalize_tests {
    use super::*;

    #[test]
    fn collapses_dots_and_duplicate_separators() {
        assert_eq!(normalize("/ws//notes/./sub/../x.md"), "/ws/notes/x.md");
    }

    #[test]
    fn drops_trailing_separator() {
        assert_eq!(normalize("/ws/notes/"), "/ws/notes");
    }

    #[test]
    fn parent_of_root_stays_root() {
        assert_eq!(normalize("/../a"), "/a");
    }

    #[test]
    fn relative_paths_keep_leading_parents() {
        assert_eq!(normalize("../a/./b"), "../a/b");
        assert_eq!(normalize("a/.."), ".");
    }
}

#[cfg(test)]
mod resolve_tests {
    use super::*;

    #[test]
    fn joins_base_and_relative() {
        assert_eq!(resolve("/ws", "notes/sub/x.md"), "/ws/notes/sub/x.md");
    }

    #[test]
    fn absolute_relative_wins() {
        assert_eq!(resolve("/ws", "/other/x.md"), "/other/x.md");
    }

    #[test]
    fn empty_relative_is_base() {
        assert_eq!(resolve("/ws/", ""), "/ws");
    }
}

#[cfg(test)]
mod relative_tests {
    use super::*;

    #[test]
    fn descendant() {
        assert_eq!(
            relative("/ws", "/ws/archive/notes/sub/x.md"),
            "archive/notes/sub/x.md"
        );
    }

    #[test]
    fn sibling_tree() {
        assert_eq!(relative("/ws/a", "/ws/b/c.md"), "../b/c.md");
    }

    #[test]
    fn same_path_is_empty() {
        assert_eq!(relative("/ws/", "/ws"), "");
    }
}

#[cfg(test)]
mod segment_tests {
    use super::*;

    #[test]
    fn basename_of_file_and_folder() {
        assert_eq!(basename("/ws/notes/x.md"), "x.md");
        assert_eq!(basename("/ws/notes/"), "notes");
        assert_eq!(basename("x.md"), "x.md");
    }

    #[test]
    fn join_with_suffix() {
        assert_eq!(join("/ws/archive", "/sub/x.md"), "/ws/archive/sub/x.md");
        assert_eq!(join("/ws/archive", ""), "/ws/archive");
    }

    #[test]
    fn within_requires_segment_boundary() {
        assert!(is_within("/ws/notes", "/ws/notes"));
        assert!(is_within("/ws/notes/a/b.md", "/ws/notes"));
        assert!(!is_within("/ws/notes-old/b.md", "/ws/notes"));
        assert!(!is_within("/ws/note", "/ws/notes"));
    }
}
