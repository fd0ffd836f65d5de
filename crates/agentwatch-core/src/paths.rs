//! Project-directory name codec.
//!
//! Claude Code stores each project's session logs under a directory whose
//! name is the project path with every `/` replaced by `-`, e.g.
//! `/Users/vm/project` -> `-Users-vm-project`.

/// Encode a filesystem path to the on-disk project directory name.
pub fn encode_project_dir(path: &str) -> String {
    path.replace('/', "-")
}

/// Decode a project directory name back into a filesystem path.
///
/// A leading `-` is restored to `/`, then every remaining `-` becomes `/`.
/// The encoding is lossy for paths containing literal hyphens; the decoded
/// value is a fallback only, overridden by any `cwd` field found in the
/// session records themselves.
pub fn decode_project_dir(encoded: &str) -> String {
    let restored = match encoded.strip_prefix('-') {
        Some(rest) => format!("/{rest}"),
        None => encoded.to_owned(),
    };
    restored.replace('-', "/")
}

/// Final path segment of a working directory, shown as the project name.
pub fn project_name(dir: &str) -> String {
    dir.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(dir)
        .to_owned()
}
