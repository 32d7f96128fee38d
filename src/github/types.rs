//! Commit payloads returned by `GET /repos/{slug}/commits/{sha}`

use serde::Deserialize;

pub const DEFAULT_AUTHOR_NAME: &str = "Unknown";
pub const DEFAULT_AUTHOR_EMAIL: &str = "unknown@example.com";

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetails {
    pub sha: String,
    #[serde(default)]
    pub parents: Vec<ParentRef>,
    pub commit: CommitPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParentRef {
    pub sha: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<Signature>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Signature {
    pub name: Option<String>,
    pub email: Option<String>,
    /// ISO-8601 timestamp as sent by the API
    pub date: Option<String>,
}

impl CommitDetails {
    pub fn parent_shas(&self) -> Vec<String> {
        self.parents.iter().map(|parent| parent.sha.clone()).collect()
    }

    pub fn author_name(&self) -> &str {
        self.signature_field(|sig| sig.name.as_deref())
            .unwrap_or(DEFAULT_AUTHOR_NAME)
    }

    pub fn author_email(&self) -> &str {
        self.signature_field(|sig| sig.email.as_deref())
            .unwrap_or(DEFAULT_AUTHOR_EMAIL)
    }

    pub fn author_date(&self) -> Option<&str> {
        self.signature_field(|sig| sig.date.as_deref())
    }

    fn signature_field<'a>(&'a self, pick: impl Fn(&'a Signature) -> Option<&'a str>) -> Option<&'a str> {
        self.commit
            .author
            .as_ref()
            .and_then(pick)
            .filter(|value| !value.trim().is_empty())
    }
}
