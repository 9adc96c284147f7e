//! Browser-side live reload agent.
//!
//! The agent is served from a reserved virtual file name and referenced by a
//! `<script>` tag appended to every HTML response.

use axum::body::Bytes;

use crate::resolver::{CacheEntry, compute_version};

/// Reserved file name of the agent script. Matched in any directory.
pub(crate) const AGENT_FILE_NAME: &str = "__s4d__.js";

/// Content type the agent is served with.
pub(crate) const AGENT_CONTENT_TYPE: &str = "application/javascript";

/// Tag appended verbatim to HTML documents.
pub(crate) const SCRIPT_TAG: &str = r#"<script type="module" src="/__s4d__.js"></script>"#;

/// Agent source code.
const AGENT_SOURCE: &str = include_str!("agent.js");

/// Build the synthetic cache entry for the agent script.
pub(crate) fn agent_entry() -> CacheEntry {
    CacheEntry {
        contents: Bytes::from_static(AGENT_SOURCE.as_bytes()),
        content_type: AGENT_CONTENT_TYPE.to_owned(),
        version: compute_version(AGENT_SOURCE.as_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_tag_references_agent_file() {
        assert!(SCRIPT_TAG.contains(AGENT_FILE_NAME));
    }

    #[test]
    fn test_agent_entry_is_stable() {
        let first = agent_entry();
        let second = agent_entry();

        assert_eq!(first.version, second.version);
        assert_eq!(first.content_type, "application/javascript");
    }

    #[test]
    fn test_agent_source_guards_automation() {
        assert!(AGENT_SOURCE.contains("navigator.webdriver"));
        assert!(AGENT_SOURCE.contains("location.reload()"));
    }
}
