//! core::graph
//!
//! Branch forest derived from naming conventions.
//!
//! # Architecture
//!
//! The forest is rebuilt from a branch listing at the start of every cascade:
//! - Nodes are candidate branches (already filtered by feature prefix)
//! - A branch named `X__Y` is a child of `X` when `X` is also a candidate
//! - Every other candidate is a root, parented at the cascade source
//!
//! # Invariants
//!
//! - Listing order is preserved for roots and for each node's children
//! - A parent name is always a strict prefix of its child's name, so the
//!   forest cannot contain cycles
//! - The forest is never persisted

use super::types::BranchName;
use std::collections::{HashMap, HashSet};

/// A branch name with the head commit observed when the listing was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHead {
    pub name: BranchName,
    pub sha: String,
}

impl BranchHead {
    pub fn new(name: BranchName, sha: impl Into<String>) -> Self {
        Self {
            name,
            sha: sha.into(),
        }
    }
}

/// Parent/child relationships between candidate branches.
#[derive(Debug, Default)]
pub struct BranchForest {
    roots: Vec<BranchName>,
    children: HashMap<BranchName, Vec<BranchName>>,
    parents: HashMap<BranchName, BranchName>,
    heads: HashMap<BranchName, String>,
}

impl BranchForest {
    /// Build a forest from candidates in listing order.
    ///
    /// # Example
    ///
    /// ```
    /// use metaship::core::graph::{BranchForest, BranchHead};
    /// use metaship::core::types::BranchName;
    ///
    /// let head = |n: &str| BranchHead::new(BranchName::new(n).unwrap(), "abc");
    /// let forest = BranchForest::build(vec![
    ///     head("feature/a"),
    ///     head("feature/a__child"),
    ///     head("feature/b"),
    /// ]);
    ///
    /// let roots: Vec<&str> = forest.roots().iter().map(|b| b.as_str()).collect();
    /// assert_eq!(roots, vec!["feature/a", "feature/b"]);
    /// assert_eq!(forest.children(&BranchName::new("feature/a").unwrap()).len(), 1);
    /// ```
    pub fn build(candidates: impl IntoIterator<Item = BranchHead>) -> Self {
        let candidates: Vec<BranchHead> = candidates.into_iter().collect();
        let names: HashSet<&str> = candidates.iter().map(|c| c.name.as_str()).collect();

        let mut forest = Self::default();
        for candidate in &candidates {
            if forest.heads.contains_key(&candidate.name) {
                continue;
            }
            forest
                .heads
                .insert(candidate.name.clone(), candidate.sha.clone());

            let parent = candidate
                .name
                .split_child()
                .map(|(parent, _)| parent)
                .filter(|parent| names.contains(parent))
                .and_then(|parent| BranchName::new(parent).ok());

            match parent {
                Some(parent) => {
                    forest
                        .children
                        .entry(parent.clone())
                        .or_default()
                        .push(candidate.name.clone());
                    forest.parents.insert(candidate.name.clone(), parent);
                }
                None => forest.roots.push(candidate.name.clone()),
            }
        }
        forest
    }

    /// A forest where every candidate is a root, ignoring child suffixes.
    pub fn flat(candidates: impl IntoIterator<Item = BranchHead>) -> Self {
        let mut forest = Self::default();
        for candidate in candidates {
            if forest.heads.contains_key(&candidate.name) {
                continue;
            }
            forest.roots.push(candidate.name.clone());
            forest.heads.insert(candidate.name, candidate.sha);
        }
        forest
    }

    /// Top-level branches in listing order.
    pub fn roots(&self) -> &[BranchName] {
        &self.roots
    }

    /// Direct children of a branch in listing order.
    pub fn children(&self, branch: &BranchName) -> &[BranchName] {
        self.children.get(branch).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_children(&self, branch: &BranchName) -> bool {
        !self.children(branch).is_empty()
    }

    pub fn parent(&self, branch: &BranchName) -> Option<&BranchName> {
        self.parents.get(branch)
    }

    /// Head commit recorded for a branch in the listing snapshot.
    pub fn head(&self, branch: &BranchName) -> Option<&str> {
        self.heads.get(branch).map(String::as_str)
    }

    /// Number of branches in the forest.
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// All descendants of a branch, depth-first, in listing order.
    pub fn descendants(&self, branch: &BranchName) -> Vec<BranchName> {
        let mut result = Vec::new();
        let mut stack: Vec<&BranchName> = self.children(branch).iter().rev().collect();
        while let Some(current) = stack.pop() {
            result.push(current.clone());
            stack.extend(self.children(current).iter().rev());
        }
        result
    }
}
