//! Include/exclude rules of an index.
//!
//! Every comparison is done on uppercased values so that rules behave the
//! same on case-insensitive and case-sensitive filesystems.

use std::path::Path;

pub fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_uppercase()
}

fn normalize_fragment(raw: &str) -> String {
    raw.trim().replace('\\', "/").to_uppercase()
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").to_uppercase()
}

/// Extension of `path` without the dot, uppercased; empty when absent.
pub fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_uppercase())
        .unwrap_or_default()
}

/// Whether a file path passes the extension rules.
pub fn extension_allowed(
    path: &str,
    include_extensions: &[String],
    exclude_extensions: &[String],
) -> bool {
    let ext = extension_of(path);

    let mut has_valid_include = false;
    let mut included = false;
    for include in include_extensions {
        let normalized = normalize_extension(include);
        if normalized.is_empty() {
            continue;
        }
        has_valid_include = true;
        if normalized == ext {
            included = true;
            break;
        }
    }
    if has_valid_include && !included {
        return false;
    }

    !exclude_extensions
        .iter()
        .map(|e| normalize_extension(e))
        .any(|e| !e.is_empty() && e == ext)
}

/// Whether a path (file or directory) contains an excluded fragment.
pub fn path_excluded(path: &str, exclude_paths: &[String]) -> bool {
    let path = normalize_path(path);
    exclude_paths
        .iter()
        .map(|fragment| normalize_fragment(fragment))
        .any(|fragment| !fragment.is_empty() && path.contains(&fragment))
}

pub fn path_allowed(
    path: &str,
    include_extensions: &[String],
    exclude_extensions: &[String],
    exclude_paths: &[String],
) -> bool {
    !path_excluded(path, exclude_paths)
        && extension_allowed(path, include_extensions, exclude_extensions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn include_extensions_restrict_case_insensitively() {
        let include = strings(&[".rs", "TOML"]);
        assert!(extension_allowed("src/lib.RS", &include, &[]));
        assert!(extension_allowed("Cargo.toml", &include, &[]));
        assert!(!extension_allowed("README.md", &include, &[]));
        assert!(!extension_allowed("Makefile", &include, &[]));
    }

    #[test]
    fn exclude_extensions_win() {
        let include = strings(&["rs"]);
        let exclude = strings(&["RS"]);
        assert!(!extension_allowed("src/lib.rs", &include, &exclude));
        assert!(extension_allowed("notes.txt", &[], &strings(&["dll"])));
        assert!(!extension_allowed("app.DLL", &[], &strings(&["dll"])));
    }

    #[test]
    fn excluded_fragments_match_anywhere() {
        let exclude = strings(&["/target/", "\\node_modules\\"]);
        assert!(path_excluded("/repo/TARGET/debug/x.rs", &exclude));
        assert!(path_excluded("C:\\repo\\Node_Modules\\a.js", &exclude));
        assert!(!path_excluded("/repo/src/target.rs", &exclude));
    }

    #[test]
    fn blank_rules_are_inactive() {
        let blanks = strings(&["", "  ", "."]);
        assert!(path_allowed("any/file.bin", &blanks, &strings(&[""]), &strings(&[""])));
    }
}
