//! Forward-slash path arithmetic.
//!
//! Usage records store paths as `/`-separated strings regardless of the host
//! OS, so these helpers work on strings rather than `std::path`.

pub const SEPARATOR: char = '/';

/// Collapse `.`/`..` segments, duplicate and trailing separators.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with(SEPARATOR);
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Resolve `relative` against `base`. An absolute `relative` wins.
pub fn resolve(base: &str, relative: &str) -> String {
    if relative.starts_with(SEPARATOR) {
        normalize(relative)
    } else if relative.is_empty() {
        normalize(base)
    } else {
        normalize(&format!("{base}/{relative}"))
    }
}

/// Append `suffix` (which may be empty or start with a separator) to `prefix`.
pub fn join(prefix: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        normalize(prefix)
    } else {
        normalize(&format!("{prefix}/{suffix}"))
    }
}

/// Path of `to` as seen from `from`. Both are normalized first.
pub fn relative(from: &str, to: &str) -> String {
    let from = normalize(from);
    let to = normalize(to);
    if from == to {
        return String::new();
    }

    let from_parts: Vec<&str> = from.split(SEPARATOR).filter(|s| !s.is_empty()).collect();
    let to_parts: Vec<&str> = to.split(SEPARATOR).filter(|s| !s.is_empty()).collect();
    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = std::iter::repeat_n("..", from_parts.len() - common).collect();
    parts.extend(&to_parts[common..]);
    parts.join("/")
}

/// Last segment of `path`.
pub fn basename(path: &str) -> String {
    path.trim_end_matches(SEPARATOR)
        .rsplit(SEPARATOR)
        .next()
        .unwrap_or_default()
        .to_string()
}

/// True when `path` is `prefix` itself or lies strictly inside it.
pub fn is_within(path: &str, prefix: &str) -> bool {
    path == prefix || path.starts_with(&descendant_prefix(prefix))
}

/// `prefix` followed by exactly one separator, for descendant matching.
pub(crate) fn descendant_prefix(prefix: &str) -> String {
    format!("{}{SEPARATOR}", prefix.trim_end_matches(SEPARATOR))
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
