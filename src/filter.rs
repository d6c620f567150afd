// src/filter.rs
//! Reward filter: the operator's allow-list of interesting reward names.
//!
//! The active list lives behind an `RwLock<Arc<FilterSet>>`. A reload builds
//! the new set off-lock and swaps the `Arc` in one write, so readers see the
//! old list or the new list, never a mix.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ConfigError;

/// One immutable generation of the reward list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    entries: Vec<String>,
    lookup: HashSet<String>,
}

impl FilterSet {
    pub fn new(entries: Vec<String>) -> Self {
        let lookup = entries.iter().cloned().collect();
        Self { entries, lookup }
    }

    /// Blank lines and `#` comments are dropped; lines are trimmed.
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self::new(entries)
    }

    /// Exact, case-sensitive match of any reward.
    pub fn matches<S: AsRef<str>>(&self, rewards: &[S]) -> bool {
        rewards.iter().any(|r| self.lookup.contains(r.as_ref()))
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared, reloadable handle. Clones point at the same filter.
#[derive(Debug, Clone)]
pub struct RewardFilter {
    path: PathBuf,
    inner: Arc<RwLock<Arc<FilterSet>>>,
}

impl RewardFilter {
    /// Initial load. Fails if the reward file can't be read, which is a
    /// startup precondition for the bot.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let set = read_filter(&path)?;
        Ok(Self {
            path,
            inner: Arc::new(RwLock::new(Arc::new(set))),
        })
    }

    /// In-memory filter, mostly for tests and tools.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = FilterSet::new(entries.into_iter().map(Into::into).collect());
        Self {
            path: PathBuf::new(),
            inner: Arc::new(RwLock::new(Arc::new(set))),
        }
    }

    /// Read `source` and make it the active filter. On error the previous
    /// filter stays active.
    pub fn load(&self, source: &Path) -> Result<Arc<FilterSet>, ConfigError> {
        let next = Arc::new(read_filter(source)?);
        self.replace(next.clone());
        Ok(next)
    }

    /// Re-read the file this filter was opened from.
    pub fn reload(&self) -> Result<Arc<FilterSet>, ConfigError> {
        let next = self.load(&self.path)?;
        tracing::info!(
            path = %self.path.display(),
            rewards = next.len(),
            "reward filter reloaded"
        );
        Ok(next)
    }

    pub fn replace(&self, next: Arc<FilterSet>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    /// Point-in-time snapshot of the active filter.
    pub fn current(&self) -> Arc<FilterSet> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn matches<S: AsRef<str>>(&self, rewards: &[S]) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .matches(rewards)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_filter(path: &Path) -> Result<FilterSet, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(FilterSet::parse(&content))
}
