//! Query translation.
//!
//! # Responsibilities
//! - Map inbound query parameters onto exactly one upstream path
//! - Reject missing or malformed parameters before any upstream call
//!
//! # Advisories precedence
//! ```text
//! cve only        → /advisories?cve_id={cve}
//! cve + repo      → /advisories?cve_id={cve}&affects={repo}
//! repo only       → /advisories?affects={repo}
//! neither         → /advisories
//! ```
//!
//! # Design Decisions
//! - Empty values count as absent
//! - Path values must be a single segment (no '/', '?', '#')
//! - Query values may not contain characters that would split the query

use serde::Deserialize;
use thiserror::Error;

/// Parameter problems found while translating.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("missing required query parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("invalid value for query parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: &'static str },
}

/// `GET /advisories`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvisoriesQuery {
    /// CVE identifier, e.g. `CVE-2024-0001`.
    pub cve: Option<String>,
    /// Repository as `owner/name`.
    pub repo: Option<String>,
}

/// `GET /advisory_details`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvisoryDetailsQuery {
    pub ghsa_id: Option<String>,
}

/// `GET /commit`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitQuery {
    pub owner: Option<String>,
    pub repo: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

/// `GET /release`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseQuery {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub tag: Option<String>,
}

/// `GET /pull`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullQuery {
    pub owner: Option<String>,
    pub repo: Option<String>,
    #[serde(rename = "pullNumber")]
    pub pull_number: Option<String>,
}

pub fn advisories_path(query: &AdvisoriesQuery) -> Result<String, TranslateError> {
    let mut path = String::from("/advisories");
    let cve = optional_query_value("cve", query.cve.as_deref())?;
    let repo = optional_query_value("repo", query.repo.as_deref())?;

    if let Some(cve) = cve {
        path.push_str("?cve_id=");
        path.push_str(cve);
    }
    if let Some(repo) = repo {
        path.push_str(if cve.is_some() { "&affects=" } else { "?affects=" });
        path.push_str(repo);
    }
    Ok(path)
}

pub fn advisory_details_path(query: &AdvisoryDetailsQuery) -> Result<String, TranslateError> {
    let ghsa_id = segment("ghsa_id", query.ghsa_id.as_deref())?;
    Ok(format!("/advisories/{}", ghsa_id))
}

pub fn commit_path(query: &CommitQuery) -> Result<String, TranslateError> {
    let owner = segment("owner", query.owner.as_deref())?;
    let repo = segment("repo", query.repo.as_deref())?;
    let reference = segment("ref", query.reference.as_deref())?;
    Ok(format!("/repos/{}/{}/commits/{}", owner, repo, reference))
}

pub fn release_path(query: &ReleaseQuery) -> Result<String, TranslateError> {
    let owner = segment("owner", query.owner.as_deref())?;
    let repo = segment("repo", query.repo.as_deref())?;
    let tag = segment("tag", query.tag.as_deref())?;
    Ok(format!("/repos/{}/{}/releases/tags/{}", owner, repo, tag))
}

pub fn pull_path(query: &PullQuery) -> Result<String, TranslateError> {
    let owner = segment("owner", query.owner.as_deref())?;
    let repo = segment("repo", query.repo.as_deref())?;
    let raw = required("pullNumber", query.pull_number.as_deref())?;
    let number: u64 = raw
        .trim()
        .parse()
        .ok()
        .filter(|n| *n > 0)
        .ok_or(TranslateError::InvalidParameter {
            name: "pullNumber",
            reason: "must be a positive integer",
        })?;
    Ok(format!("/repos/{}/{}/pulls/{}", owner, repo, number))
}

fn required<'a>(name: &'static str, value: Option<&'a str>) -> Result<&'a str, TranslateError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(TranslateError::MissingParameter(name))
}

fn segment<'a>(name: &'static str, value: Option<&'a str>) -> Result<&'a str, TranslateError> {
    let value = required(name, value)?;
    if value == "." || value == ".." {
        return Err(TranslateError::InvalidParameter {
            name,
            reason: "must not be a relative path segment",
        });
    }
    if value
        .chars()
        .any(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
    {
        return Err(TranslateError::InvalidParameter {
            name,
            reason: "must be a single path segment",
        });
    }
    Ok(value)
}

fn optional_query_value<'a>(
    name: &'static str,
    value: Option<&'a str>,
) -> Result<Option<&'a str>, TranslateError> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value
        .chars()
        .any(|c| matches!(c, '&' | '#' | '=' | '?' | '%') || c.is_whitespace() || c.is_control())
    {
        return Err(TranslateError::InvalidParameter {
            name,
            reason: "contains characters not allowed in a query value",
        });
    }
    Ok(Some(value))
}
