//! Exam composition graph
//!
//! Links point from a panel (parent) to a component exam (child). Only active
//! links participate in aggregation and cycle detection.

use crate::ids::ExamId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionLink {
    pub parent_id: ExamId,
    pub child_id: ExamId,
    pub order: i32,
    pub active: bool,
}

/// Why a proposed link must be rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRejection {
    SelfReference,
    Cycle,
}

impl LinkRejection {
    pub fn describe(&self) -> &'static str {
        match self {
            LinkRejection::SelfReference => "an exam cannot be its own component",
            LinkRejection::Cycle => "the component already contains the parent",
        }
    }
}

/// Check whether `parent -> child` can be added to the active graph.
///
/// The link is rejected when `child` can already reach `parent` through
/// active links, since adding it would close a cycle.
pub fn check_new_link(
    links: &[CompositionLink],
    parent: ExamId,
    child: ExamId,
) -> Result<(), LinkRejection> {
    if parent == child {
        return Err(LinkRejection::SelfReference);
    }
    if reaches(links, child, parent) {
        return Err(LinkRejection::Cycle);
    }
    Ok(())
}

/// Whether `target` is reachable from `start` following active links
pub fn reaches(links: &[CompositionLink], start: ExamId, target: ExamId) -> bool {
    let mut adjacency: HashMap<ExamId, Vec<ExamId>> = HashMap::new();
    for link in links.iter().filter(|l| l.active) {
        adjacency.entry(link.parent_id).or_default().push(link.child_id);
    }

    let mut visited = HashSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(children) = adjacency.get(&node) {
            stack.extend(children.iter().copied());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(parent: i64, child: i64, active: bool) -> CompositionLink {
        CompositionLink {
            parent_id: ExamId(parent),
            child_id: ExamId(child),
            order: 0,
            active,
        }
    }

    #[test]
    fn test_self_reference_rejected() {
        assert_eq!(
            check_new_link(&[], ExamId(1), ExamId(1)),
            Err(LinkRejection::SelfReference)
        );
    }

    #[test]
    fn test_direct_cycle_rejected() {
        let links = vec![link(1, 2, true)];
        assert_eq!(
            check_new_link(&links, ExamId(2), ExamId(1)),
            Err(LinkRejection::Cycle)
        );
    }

    #[test]
    fn test_transitive_cycle_rejected() {
        let links = vec![link(1, 2, true), link(2, 3, true), link(3, 4, true)];
        assert_eq!(
            check_new_link(&links, ExamId(4), ExamId(1)),
            Err(LinkRejection::Cycle)
        );
    }

    #[test]
    fn test_inactive_links_do_not_count() {
        let links = vec![link(1, 2, false)];
        assert!(check_new_link(&links, ExamId(2), ExamId(1)).is_ok());
    }

    #[test]
    fn test_diamond_is_allowed() {
        let links = vec![link(1, 2, true), link(1, 3, true), link(2, 4, true)];
        assert!(check_new_link(&links, ExamId(3), ExamId(4)).is_ok());
    }
}
