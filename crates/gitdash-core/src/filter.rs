use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{CommitFact, EngineError};

pub const ALL_REPOSITORIES: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryFilter {
    #[default]
    All,
    Named(String),
}

impl RepositoryFilter {
    /// Blank input and `all` (any case) select every repository.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL_REPOSITORIES) {
            Self::All
        } else {
            Self::Named(trimmed.to_owned())
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Named(name) => Some(name.as_str()),
        }
    }
}

/// Narrowing applied to the commit fact set. Date bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FactFilter {
    #[serde(default)]
    pub repository: RepositoryFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl FactFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(mut self, repository: &str) -> Self {
        self.repository = RepositoryFilter::parse(repository);
        self
    }

    pub fn with_date_from(mut self, date: NaiveDate) -> Self {
        self.date_from = Some(date);
        self
    }

    pub fn with_date_to(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    pub fn with_author(mut self, author: &str) -> Self {
        self.author = Some(author.trim().to_owned()).filter(|value| !value.is_empty());
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to)
            && from > to
        {
            return Err(EngineError::InvalidFilter { from, to });
        }
        Ok(())
    }

    /// True when nothing narrows the full fact set, i.e. the materialized
    /// aggregate may answer the request.
    pub fn is_default_window(&self) -> bool {
        self.repository == RepositoryFilter::All
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.author.is_none()
    }

    pub fn matches(&self, fact: &CommitFact) -> bool {
        if let Some(repository) = self.repository.name()
            && fact.repository != repository
        {
            return false;
        }
        if self.date_from.is_some_and(|from| fact.commit_date < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| fact.commit_date > to) {
            return false;
        }
        if let Some(author) = self.author.as_deref()
            && fact.author != author
        {
            return false;
        }
        true
    }
}
