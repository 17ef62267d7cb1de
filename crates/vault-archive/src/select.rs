use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use vault_core::rules::{Rule, RuleAction};

/// The server holds this file open for the lifetime of the process; reading
/// it fails, so it is never part of a snapshot no matter what the rules say.
pub const LIVE_LOCK_FILE: &str = "session.lock";

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("invalid file rule pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Resolves the ordered rule list against `root` into a deduplicated file
/// list.
///
/// Rules are applied strictly in order: includes append paths not already
/// present (first-seen order survives), excludes remove matching paths, so a
/// later exclude always beats an earlier include. Glob expansion walks the
/// tree in lexicographic order, which makes the result reproducible for an
/// unchanged tree. Unreadable directory entries are skipped, not fatal; the
/// tree is live while we read it.
pub fn select_files(root: &Path, rules: &[Rule]) -> Result<Vec<PathBuf>, SelectError> {
    let mut selected: Vec<PathBuf> = Vec::new();

    for rule in rules {
        // A pattern that names an existing file directly needs no expansion.
        let literal = root.join(&rule.pattern);
        if literal.is_file() {
            apply(&mut selected, rule.action, literal);
            continue;
        }

        let matcher = compile(&rule.pattern)?;
        for path in matching_files(root, &matcher) {
            apply(&mut selected, rule.action, path);
        }
    }

    selected.retain(|path| {
        path.file_name()
            .map(|name| name != LIVE_LOCK_FILE)
            .unwrap_or(true)
    });

    Ok(selected)
}

fn apply(selected: &mut Vec<PathBuf>, action: RuleAction, path: PathBuf) {
    match action {
        RuleAction::Include => {
            if !selected.contains(&path) {
                selected.push(path);
            }
        }
        RuleAction::Exclude => {
            selected.retain(|present| present != &path);
        }
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher, SelectError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|source| SelectError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn matching_files(root: &Path, matcher: &GlobMatcher) -> Vec<PathBuf> {
    let mut matches = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("skipping unreadable entry during selection: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
        if matcher.is_match(&relative) {
            matches.push(path);
        }
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};
    use vault_core::rules::parse_rules;

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("vault-select-{prefix}-{nanos}"))
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        std::fs::write(path, contents).expect("write file");
    }

    fn relative(root: &Path, paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| {
                p.strip_prefix(root)
                    .expect("under root")
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    fn sample_tree(prefix: &str) -> PathBuf {
        let root = unique_temp_dir(prefix);
        write(&root, "server/world/level.dat", "level");
        write(&root, "server/world/region/r.0.0.mca", "region");
        write(&root, "server/logs/latest.log", "log");
        write(&root, "server/session.lock", "lock");
        write(&root, "notes.txt", "notes");
        root
    }

    #[test]
    fn later_exclude_beats_earlier_include() {
        let root = sample_tree("exclude-wins");
        let rules = parse_rules(&["server/**/*", "!server/logs/**"]);

        let files = select_files(&root, &rules).expect("select");
        let rel = relative(&root, &files);

        assert!(rel.contains(&"server/world/level.dat".to_string()));
        assert!(rel.contains(&"server/world/region/r.0.0.mca".to_string()));
        assert!(!rel.iter().any(|p| p.starts_with("server/logs/")));
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn swapping_rule_order_changes_the_outcome() {
        let root = sample_tree("order-matters");
        let swapped = parse_rules(&["!server/logs/**", "server/**/*"]);

        let files = select_files(&root, &swapped).expect("select");
        let rel = relative(&root, &files);

        // The exclude ran before anything was selected, so it removed nothing.
        assert!(rel.contains(&"server/logs/latest.log".to_string()));
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn selection_is_deterministic_over_an_unchanged_tree() {
        let root = sample_tree("deterministic");
        let rules = parse_rules(&["server/**/*"]);

        let first = select_files(&root, &rules).expect("first pass");
        let second = select_files(&root, &rules).expect("second pass");

        assert_eq!(first, second);
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn duplicate_includes_keep_first_seen_order() {
        let root = sample_tree("dedup");
        let rules = parse_rules(&["server/world/**", "server/**/*"]);

        let files = select_files(&root, &rules).expect("select");
        let rel = relative(&root, &files);

        let world_hits = rel
            .iter()
            .filter(|p| *p == "server/world/level.dat")
            .count();
        assert_eq!(world_hits, 1);
        // The world files were matched by the first rule, so they stay ahead
        // of paths only the second rule matched.
        let world_pos = rel
            .iter()
            .position(|p| p == "server/world/level.dat")
            .expect("world file present");
        let logs_pos = rel
            .iter()
            .position(|p| p == "server/logs/latest.log")
            .expect("log file present");
        assert!(world_pos < logs_pos);
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn literal_file_rules_skip_glob_expansion() {
        let root = sample_tree("literal");
        let rules = parse_rules(&["notes.txt"]);

        let files = select_files(&root, &rules).expect("select");

        assert_eq!(files, vec![root.join("notes.txt")]);
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn live_lock_file_is_always_dropped() {
        let root = sample_tree("session-lock");
        let rules = parse_rules(&["server/**/*"]);

        let files = select_files(&root, &rules).expect("select");
        let rel = relative(&root, &files);

        assert!(!rel.iter().any(|p| p.ends_with("session.lock")));
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let root = sample_tree("bad-pattern");
        let rules = parse_rules(&["server/{unclosed"]);

        let err = select_files(&root, &rules).expect_err("pattern must fail");
        assert!(matches!(err, SelectError::Pattern { .. }));
        let _ = std::fs::remove_dir_all(root);
    }
}
