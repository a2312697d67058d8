//! File path guards: protected files and plan compliance.

use crate::workflow::{normalize_path, ImplementationPlan};

use super::Decision;

/// Directories whose contents are never edited.
const PROTECTED_DIRS: &[&str] = &[".git", "node_modules"];

/// File names that are never edited.
const PROTECTED_NAMES: &[&str] =
    &["secrets.json", "credentials.json", "package-lock.json", "yarn.lock", "id_rsa", "id_ed25519"];

const PROTECTED_EXTENSIONS: &[&str] = &["pem", "key"];

/// Substrings that exempt a file from plan compliance (config, docs, tests,
/// workflow files).
const PLAN_EXEMPT: &[&str] = &[
    ".json",
    ".md",
    ".yml",
    ".yaml",
    ".toml",
    "test_",
    "_test.",
    ".test.",
    "__tests__",
    "tests/",
    ".workflow/",
    "node_modules/",
    ".git/",
];

/// Block edits to protected files and paths that escape the project.
pub fn check_protected_path(path: &str) -> Decision {
    let normalized = normalize_path(path);
    let components: Vec<&str> = normalized.split('/').collect();

    if components.contains(&"..") {
        return Decision::Block(format!("BLOCKED: Path traversal detected in {normalized}"));
    }

    let name = components.last().copied().unwrap_or_default();
    let in_protected_dir = components
        .iter()
        .take(components.len().saturating_sub(1))
        .any(|c| PROTECTED_DIRS.contains(c));
    let extension = name.rsplit_once('.').map(|(_, ext)| ext);

    let protected = name.starts_with(".env")
        || PROTECTED_NAMES.contains(&name)
        || extension.is_some_and(|ext| PROTECTED_EXTENSIONS.contains(&ext))
        || in_protected_dir;

    if protected {
        Decision::Block(format!("PROTECTED: Cannot modify {normalized}"))
    } else {
        Decision::Allow
    }
}

/// Ask before writing a file the plan does not mention.
pub fn check_plan_compliance(path: &str, plan: &ImplementationPlan) -> Decision {
    let normalized = normalize_path(path);

    let planned = plan.planned_paths().iter().any(|p| {
        let p = normalize_path(p);
        normalized == p || normalized.ends_with(&format!("/{p}"))
    });
    if planned || PLAN_EXEMPT.iter().any(|pattern| normalized.contains(pattern)) {
        return Decision::Allow;
    }

    let name = normalized.rsplit('/').next().unwrap_or(&normalized);
    Decision::Ask(format!("File not in implementation plan: {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_files() {
        for path in [
            ".env",
            "config/.env.production",
            "/home/dev/app/secrets.json",
            ".git/config",
            "web/node_modules/react/index.js",
            "yarn.lock",
            "~/.ssh/id_rsa",
            "certs/server.pem",
            "tls/private.key",
        ] {
            assert!(check_protected_path(path).is_block(), "{path} should be protected");
        }
    }

    #[test]
    fn test_ordinary_files_allowed() {
        for path in ["src/main.rs", "docs/environment.md", "src/keys.rs", "gitignore.txt"] {
            assert!(check_protected_path(path).is_allow(), "{path} should be allowed");
        }
    }

    #[test]
    fn test_traversal_blocked_after_normalization() {
        assert!(check_protected_path("../outside.rs").is_block());
        assert!(check_protected_path("src/../../outside.rs").is_block());
        assert!(check_protected_path("src/../lib.rs").is_allow());
    }

    #[test]
    fn test_plan_compliance() {
        let plan: ImplementationPlan = serde_json::from_str(
            r#"{"file_structure": {"files": ["src/app.rs", {"path": "src/db/mod.rs"}]}}"#,
        )
        .unwrap();

        assert!(check_plan_compliance("src/app.rs", &plan).is_allow());
        assert!(check_plan_compliance("/work/proj/src/db/mod.rs", &plan).is_allow());
        assert!(check_plan_compliance("README.md", &plan).is_allow());
        assert!(check_plan_compliance("src/app_test.rs", &plan).is_allow());
        assert!(check_plan_compliance("tests/cli.rs", &plan).is_allow());
        assert_eq!(
            check_plan_compliance("src/extra.rs", &plan),
            Decision::Ask("File not in implementation plan: extra.rs".to_string())
        );
    }
}
