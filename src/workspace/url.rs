//! Repository URL normalisation

/// Clone URL for a project
///
/// Remote URLs are trimmed of trailing `/` and gain a `.git` suffix; local
/// paths are only trimmed. Without a URL the slug maps to GitHub.
pub fn normalize_repo_url(repo_url: Option<&str>, slug: Option<&str>) -> Option<String> {
    if let Some(url) = repo_url.map(str::trim).filter(|url| !url.is_empty()) {
        let cleaned = url.trim_end_matches('/');
        if is_remote(cleaned) && !cleaned.ends_with(".git") {
            return Some(format!("{}.git", cleaned));
        }
        return Some(cleaned.to_string());
    }
    slug.map(str::trim)
        .map(|slug| slug.trim_matches('/'))
        .filter(|slug| !slug.is_empty())
        .map(|slug| fork_url("https://github.com", slug))
}

/// `<base>/<slug>.git`
pub fn fork_url(base: &str, slug: &str) -> String {
    format!(
        "{}/{}.git",
        base.trim_end_matches('/'),
        slug.trim_matches('/')
    )
}

fn is_remote(url: &str) -> bool {
    if url.contains("://") {
        return !url.starts_with("file://");
    }
    // scp-like `git@host:owner/name`
    match (url.find('@'), url.find(':')) {
        (Some(at), Some(colon)) => at < colon && !url.starts_with('/'),
        _ => false,
    }
}
