//! Hierarchy resolution over a whole batch of pages.
//!
//! Pages reference their parent by `level`. The resolver works on an arena of
//! indices into the batch, drops every parent edge that cannot hold (duplicate
//! target, missing target, cycle), records why on the affected page, and then
//! recomputes `children` from the surviving edges. The result is always a
//! forest.

use std::collections::HashMap;

use crate::page::PageConfig;

/// Counts of repairs made by one [`HierarchyResolver::resolve`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub duplicates: usize,
    pub orphans: usize,
    pub cycles: usize,
}

impl ResolveReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0 && self.orphans == 0 && self.cycles == 0
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    OnPath,
    Done,
}

/// Repairs parent references and computes children for a batch of pages.
pub struct HierarchyResolver;

impl HierarchyResolver {
    /// Resolve the hierarchy of `pages` in place.
    ///
    /// Postcondition: every non-empty `parent` names the `level` of another
    /// page in the batch and following parents never loops. Order of `pages`
    /// is preserved, and `children` lists follow it.
    pub fn resolve(pages: &mut [PageConfig]) -> ResolveReport {
        let mut report = ResolveReport::default();

        // First occurrence of a level is the addressable one. Later ones are
        // detached so a level never ends up among its own children.
        let mut by_level: HashMap<String, usize> = HashMap::with_capacity(pages.len());
        for (idx, page) in pages.iter_mut().enumerate() {
            if page.level.is_empty() {
                continue;
            }
            if let Some(&first) = by_level.get(&page.level) {
                page.validation_errors.push(format!(
                    "duplicate level: {:?} is already used by page #{}",
                    page.level,
                    first + 1
                ));
                page.parent.clear();
                report.duplicates += 1;
            } else {
                by_level.insert(page.level.clone(), idx);
            }
        }

        let mut parents: Vec<Option<usize>> = Vec::with_capacity(pages.len());
        for page in pages.iter_mut() {
            if page.parent.is_empty() {
                parents.push(None);
                continue;
            }
            match by_level.get(&page.parent) {
                Some(&idx) => parents.push(Some(idx)),
                None => {
                    page.validation_errors.push(format!(
                        "orphan parent: no page has level {:?}",
                        page.parent
                    ));
                    page.parent.clear();
                    report.orphans += 1;
                    parents.push(None);
                }
            }
        }

        for idx in break_cycles(&mut parents) {
            let page = &mut pages[idx];
            page.validation_errors.push(format!(
                "cyclic dependency: parent {:?} leads back to {:?}",
                page.parent, page.level
            ));
            page.parent.clear();
            report.cycles += 1;
        }

        let mut children: Vec<Vec<String>> = vec![Vec::new(); pages.len()];
        for (idx, parent) in parents.iter().enumerate() {
            if let Some(parent) = *parent {
                children[parent].push(pages[idx].level.clone());
            }
        }
        for (page, kids) in pages.iter_mut().zip(children) {
            page.children = kids;
        }

        if !report.is_clean() {
            tracing::debug!(
                duplicates = report.duplicates,
                orphans = report.orphans,
                cycles = report.cycles,
                "repaired page hierarchy"
            );
        }
        report
    }
}

/// Depth-first search along child edges, dropping the parent edge of every
/// node that is reached while already on the active path.
///
/// Returns the nodes whose parent was dropped, in detection order.
fn break_cycles(parents: &mut [Option<usize>]) -> Vec<usize> {
    let len = parents.len();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); len];
    for (idx, parent) in parents.iter().enumerate() {
        if let Some(parent) = *parent {
            adjacency[parent].push(idx);
        }
    }

    let mut state = vec![Visit::Unvisited; len];
    let mut broken = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..len {
        if state[start] != Visit::Unvisited {
            continue;
        }
        state[start] = Visit::OnPath;
        stack.push((start, 0));

        while let Some(&(node, next)) = stack.last() {
            let Some(&child) = adjacency[node].get(next) else {
                state[node] = Visit::Done;
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            match state[child] {
                Visit::Unvisited => {
                    state[child] = Visit::OnPath;
                    stack.push((child, 0));
                }
                Visit::OnPath => {
                    parents[child] = None;
                    broken.push(child);
                }
                Visit::Done => {}
            }
        }
    }
    broken
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{Importance, PageMetadata};
    use orrery_config::EntityType;
    use pretty_assertions::assert_eq;

    fn page(level: &str, parent: &str) -> PageConfig {
        PageConfig {
            name: level.to_owned(),
            title: level.to_owned(),
            level: level.to_owned(),
            entity_type: EntityType::Moon,
            description: String::new(),
            color: "#fff".to_owned(),
            orbit_radius: 1.0,
            orbit_angle: 0.0,
            importance: Importance::Low,
            icon: String::new(),
            size_modifier: 1.0,
            unlocked: "true".to_owned(),
            parent: parent.to_owned(),
            children: vec![],
            metadata: PageMetadata::default(),
            validation_errors: vec![],
        }
    }

    fn errors_starting(pages: &[PageConfig], prefix: &str) -> usize {
        pages
            .iter()
            .flat_map(|p| &p.validation_errors)
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// Panics unless every parent exists and no parent chain loops.
    fn assert_forest(pages: &[PageConfig]) {
        let by_level: HashMap<&str, usize> = pages
            .iter()
            .enumerate()
            .rev()
            .map(|(i, p)| (p.level.as_str(), i))
            .collect();
        for (i, page) in pages.iter().enumerate() {
            let mut current = i;
            let mut steps = 0;
            while !pages[current].parent.is_empty() {
                current = *by_level
                    .get(pages[current].parent.as_str())
                    .unwrap_or_else(|| panic!("dangling parent on {}", page.level));
                steps += 1;
                assert!(steps <= pages.len(), "cycle through {}", page.level);
            }
        }
    }

    #[test]
    fn test_chain() {
        let mut pages = vec![page("a", ""), page("b", "a"), page("c", "b")];

        let report = HierarchyResolver::resolve(&mut pages);

        assert!(report.is_clean());
        assert_eq!(pages[0].children, vec!["b"]);
        assert_eq!(pages[1].children, vec!["c"]);
        assert!(pages[2].children.is_empty());
        assert!(pages.iter().all(|p| p.validation_errors.is_empty()));
    }

    #[test]
    fn test_orphan_cleared() {
        let mut pages = vec![page("a", "z")];

        let report = HierarchyResolver::resolve(&mut pages);

        assert_eq!(report.orphans, 1);
        assert_eq!(pages[0].parent, "");
        assert_eq!(pages[0].validation_errors.len(), 1);
        assert!(pages[0].validation_errors[0].starts_with("orphan parent"));
    }

    #[test]
    fn test_two_node_cycle_broken_once() {
        let mut pages = vec![page("x", "y"), page("y", "x")];

        let report = HierarchyResolver::resolve(&mut pages);

        assert_eq!(report.cycles, 1);
        assert_eq!(errors_starting(&pages, "cyclic dependency"), 1);
        assert_eq!(pages[0].parent, "");
        assert_eq!(pages[1].parent, "x");
        assert_eq!(pages[0].children, vec!["y"]);
        assert_forest(&pages);
    }

    #[test]
    fn test_self_loop() {
        let mut pages = vec![page("solo", "solo")];

        HierarchyResolver::resolve(&mut pages);

        assert_eq!(pages[0].parent, "");
        assert!(pages[0].children.is_empty());
        assert_eq!(errors_starting(&pages, "cyclic dependency"), 1);
    }

    #[test]
    fn test_long_cycle_with_tail() {
        // ring r0 -> r1 -> ... -> r4 -> r0, plus t hanging off r2
        let mut pages: Vec<PageConfig> = (0..5)
            .map(|i| page(&format!("r{i}"), &format!("r{}", (i + 4) % 5)))
            .collect();
        pages.push(page("t", "r2"));

        let report = HierarchyResolver::resolve(&mut pages);

        assert_eq!(report.cycles, 1);
        assert_forest(&pages);
        assert_eq!(pages[5].parent, "r2");
        assert!(pages[2].children.contains(&"t".to_owned()));
    }

    #[test]
    fn test_duplicate_level_first_wins() {
        let mut pages = vec![page("a", ""), page("a", ""), page("kid", "a")];

        let report = HierarchyResolver::resolve(&mut pages);

        assert_eq!(report.duplicates, 1);
        assert!(pages[0].validation_errors.is_empty());
        assert!(pages[1].validation_errors[0].starts_with("duplicate level"));
        assert_eq!(pages[0].children, vec!["kid"]);
        assert!(pages[1].children.is_empty());
    }

    #[test]
    fn test_duplicate_level_is_detached() {
        let mut pages = vec![page("x", ""), page("x", "x"), page("y", "x")];

        let report = HierarchyResolver::resolve(&mut pages);

        assert_eq!(report.duplicates, 1);
        assert_eq!(report.cycles, 0);
        assert_eq!(pages[1].parent, "");
        assert_eq!(pages[1].validation_errors.len(), 1);
        assert_eq!(pages[0].children, vec!["y"]);
        assert!(pages[1].children.is_empty());
        assert_forest(&pages);
    }

    #[test]
    fn test_resolving_twice_is_stable() {
        let mut pages = vec![page("x", "y"), page("y", "x"), page("o", "nope")];
        HierarchyResolver::resolve(&mut pages);
        let first = pages.clone();

        let report = HierarchyResolver::resolve(&mut pages);

        assert!(report.is_clean());
        assert_eq!(pages, first);
    }

    #[test]
    fn test_random_graphs_always_yield_forest() {
        // Small LCG so the check is reproducible without extra dependencies.
        let mut seed: u64 = 0x5eed_1234_abcd_0001;
        let mut next = move |bound: usize| {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            usize::try_from(seed >> 33).unwrap() % bound
        };

        for _ in 0..300 {
            let n = 1 + next(24);
            let mut pages: Vec<PageConfig> = (0..n)
                .map(|i| {
                    let parent = match next(5) {
                        0 => String::new(),
                        1 => "missing".to_owned(),
                        _ => format!("p{}", next(n)),
                    };
                    let level = if next(6) == 0 { next(n) } else { i };
                    page(&format!("p{level}"), &parent)
                })
                .collect();

            HierarchyResolver::resolve(&mut pages);

            assert_forest(&pages);
            for page in &pages {
                assert!(!page.children.contains(&page.level), "{} is its own child", page.level);
                for child in &page.children {
                    let child_page = pages.iter().find(|p| &p.level == child).unwrap();
                    assert_eq!(child_page.parent, page.level);
                }
            }
        }
    }
}
