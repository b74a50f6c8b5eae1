//! Component identifiers
//!
//! Every job is addressed by an absolute, slash-separated, lower-cased path
//! such as `/app/image`. References written in configuration are either
//! absolute (`/infra/vpc`) or bare sibling names (`image`), which resolve
//! against the parent of the component that mentions them.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Lower-case `raw` and replace spaces with dashes
pub fn normalize(raw: &str) -> String {
    raw.replace(' ', "-").to_lowercase()
}

/// Build an absolute identifier from path segments
///
/// Empty segments are ignored. An absolute segment discards everything
/// before it; later segments are still appended to it.
pub fn join<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parts = Vec::new();
    for segment in segments {
        let segment = segment.as_ref();
        if segment.is_empty() {
            continue;
        }
        if segment.starts_with('/') {
            parts.clear();
        }
        parts.extend(
            segment
                .split('/')
                .filter(|piece| !piece.is_empty())
                .map(normalize),
        );
    }

    if parts.is_empty() {
        return String::new();
    }
    format!("/{}", parts.join("/"))
}

/// Resolve `reference` as seen from the component `caller`
///
/// An empty reference resolves to an empty string, an absolute one to
/// itself, and a bare name to a sibling of `caller`.
pub fn resolve_sibling(caller: &str, reference: &str) -> String {
    if reference.is_empty() {
        return String::new();
    }
    if reference.starts_with('/') {
        return normalize(reference);
    }
    join([parent(caller), reference])
}

/// Everything before the last `/`, or `""` for top-level ids
fn parent(id: &str) -> &str {
    match id.rfind('/') {
        Some(pos) => &id[..pos],
        None => "",
    }
}

/// Canonical identifier of a job
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Identifier of the synthetic job exposing the current commit
    pub const GIT: &'static str = "/git";

    /// Create an id from a bare or absolute name
    pub fn new(raw: &str) -> Self {
        JobId(join([raw]))
    }

    /// The id of the synthetic git job
    pub fn git() -> Self {
        JobId(Self::GIT.to_string())
    }

    /// Id of the child `name` below this one
    pub fn child(&self, name: &str) -> Self {
        JobId(join([self.0.as_str(), name]))
    }

    /// Resolve a reference made from this job
    pub fn resolve(&self, reference: &str) -> Self {
        JobId(resolve_sibling(&self.0, reference))
    }

    /// String form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the synthetic git job
    pub fn is_git(&self) -> bool {
        self.0 == Self::GIT
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join(["foo"]), "/foo");
        assert_eq!(join(["foo", "bar"]), "/foo/bar");
        assert_eq!(join(["foo", "/bar/baz"]), "/bar/baz");
        assert_eq!(join(["", "foo"]), "/foo");
        assert_eq!(join(["/app", "Web Server"]), "/app/web-server");
        assert_eq!(join(["/a/b", "c", "/x", "y"]), "/x/y");
        assert_eq!(join(["/"]), "");
        assert_eq!(join::<[&str; 0], &str>([]), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        for raw in ["Foo Bar", "/App/Image", "already-normal", "", "  "] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
        assert_eq!(normalize("My Component"), "my-component");
    }

    #[test]
    fn test_resolve_sibling() {
        assert_eq!(resolve_sibling("/a/b/c", "/x/y"), "/x/y");
        assert_eq!(resolve_sibling("/a/b/c", "d"), "/a/b/d");
        assert_eq!(resolve_sibling("/image", "git"), "/git");
        assert_eq!(resolve_sibling("/image", "/Git"), "/git");
        assert_eq!(resolve_sibling("/a/b", ""), "");
        assert_eq!(resolve_sibling("/app/api", "Web Server"), "/app/web-server");
    }

    #[test]
    fn test_job_id() {
        let app = JobId::new("App");
        assert_eq!(app.as_str(), "/app");
        assert_eq!(app.child("Web").as_str(), "/app/web");
        assert_eq!(app.child("web").resolve("db").as_str(), "/app/db");
        assert_eq!(JobId::new("git"), JobId::git());
        assert!(JobId::new("/git").is_git());
        assert_eq!(app.to_string(), "/app");
        assert_eq!(app.child("web").child("assets").as_str(), "/app/web/assets");
        assert_eq!(JobId::new("/infra/vpc").as_str(), "/infra/vpc");
    }
}
