//! Remote URL checks and mirror placement

use std::path::{Path, PathBuf};

use libprogress_core::EventId;
use url::Url;

use crate::GitError;

/// Parse and check a project's remote URL.
///
/// Accepts network schemes with a host, and `file` URLs for local
/// repositories. The URL must name a repository path.
pub fn validate_remote_url(raw: &str) -> Result<Url, GitError> {
    let invalid = |reason: String| GitError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" | "ssh" | "git" => {
            if host_of(&url).is_none() {
                return Err(invalid("missing host".to_string()));
            }
        }
        "file" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }

    if url.path().trim_matches('/').is_empty() {
        return Err(invalid("missing repository path".to_string()));
    }

    Ok(url)
}

/// Directory holding the mirror of `url` for one event:
/// `<repos_dir>/<event-id>/<host>/<path...>`
///
/// Hostless URLs land under `local`. Dot segments are dropped so the
/// result always stays inside the event's directory.
pub fn mirror_path(repos_dir: &Path, event_id: &EventId, url: &Url) -> PathBuf {
    let mut path = repos_dir
        .join(event_id.to_string())
        .join(host_of(url).unwrap_or("local"));

    let segments = url.path_segments().into_iter().flatten();
    for segment in segments.filter(|s| !matches!(*s, "" | "." | "..")) {
        path.push(segment);
    }
    path
}

fn host_of(url: &Url) -> Option<&str> {
    url.host_str().filter(|h| !h.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_accepts_common_remotes() {
        for raw in [
            "https://github.com/org/project.git",
            "http://git.example.com/team/repo",
            "ssh://git@example.com/org/repo.git",
            "file:///srv/git/repo",
        ] {
            assert!(validate_remote_url(raw).is_ok(), "{} should be accepted", raw);
        }
    }

    #[test]
    fn test_rejects_bad_remotes() {
        for raw in ["", "not a url", "ftp://example.com/repo", "https://github.com/", "mailto:dev@example.com"] {
            let err = validate_remote_url(raw).unwrap_err();
            assert!(matches!(err, GitError::InvalidUrl { .. }), "{} should be rejected", raw);
        }
    }

    #[test]
    fn test_mirror_path_layout() {
        let event = Uuid::nil();
        let url = Url::parse("https://github.com/org/project.git").unwrap();
        let path = mirror_path(Path::new("/data/repos"), &event, &url);
        assert_eq!(
            path,
            PathBuf::from("/data/repos")
                .join(event.to_string())
                .join("github.com/org/project.git")
        );
    }

    #[test]
    fn test_mirror_path_stays_inside_event_dir() {
        let event = Uuid::nil();
        let url = Url::parse("file:///srv/../etc/repo").unwrap();
        let path = mirror_path(Path::new("/data/repos"), &event, &url);
        assert!(path.starts_with(Path::new("/data/repos").join(event.to_string()).join("local")));
    }
}
