use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::fixers::candidate::{FixCandidate, LineRange, PriorityClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The lower-priority fix waits for the next pass.
    UseHighestPriority,
    /// Equal priorities: each fix gets its own invocation.
    ApplySequential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub candidates: [String; 2],
    pub affected: LineRange,
    pub resolution: Resolution,
}

/// Pairwise overlap check. Per-file issue counts are small, so quadratic is
/// fine here.
pub fn detect_conflicts(candidates: &[FixCandidate]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for (i, a) in candidates.iter().enumerate() {
        for b in &candidates[i + 1..] {
            if !a.conflicts_with(b) {
                continue;
            }
            let resolution = if a.priority == b.priority {
                Resolution::ApplySequential
            } else {
                Resolution::UseHighestPriority
            };
            conflicts.push(Conflict {
                candidates: [a.id.clone(), b.id.clone()],
                affected: a.range.union(&b.range),
                resolution,
            });
        }
    }
    conflicts
}

/// Fixes of one priority class within one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FixGroup {
    pub priority: PriorityClass,
    /// Applied together, one invocation per owning analyzer.
    pub batched: Vec<FixCandidate>,
    /// Applied one invocation at a time, after the batch.
    pub sequential: Vec<FixCandidate>,
}

impl FixGroup {
    pub fn label(&self) -> &'static str {
        self.priority.label()
    }

    pub fn len(&self) -> usize {
        self.batched.len() + self.sequential.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixPass {
    pub groups: Vec<FixGroup>,
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FixPlan {
    pub passes: Vec<FixPass>,
}

impl FixPlan {
    /// Splits candidates into passes. A candidate that overlaps a
    /// higher-priority one moves to the next pass, where it is planned again
    /// against the other deferred candidates. The top-priority candidates of
    /// every pass are never deferred, so the loop terminates.
    pub fn build(candidates: Vec<FixCandidate>) -> Self {
        let mut passes = Vec::new();
        let mut remaining = candidates;

        while !remaining.is_empty() {
            let conflicts = detect_conflicts(&remaining);
            let mut deferred: HashSet<String> = HashSet::new();
            let mut sequential: HashSet<String> = HashSet::new();

            for conflict in &conflicts {
                if conflict.resolution == Resolution::UseHighestPriority {
                    let [a, b] = &conflict.candidates;
                    let priority = |id: &String| {
                        remaining
                            .iter()
                            .find(|c| &c.id == id)
                            .map(|c| c.priority)
                            .unwrap_or(PriorityClass::Other)
                    };
                    let loser = if priority(a).outranks(priority(b)) { b } else { a };
                    deferred.insert(loser.clone());
                }
            }
            for conflict in &conflicts {
                if conflict.resolution == Resolution::ApplySequential {
                    for id in &conflict.candidates {
                        if !deferred.contains(id) {
                            sequential.insert(id.clone());
                        }
                    }
                }
            }

            let (later, now): (Vec<_>, Vec<_>) =
                remaining.into_iter().partition(|c| deferred.contains(&c.id));

            let groups = PriorityClass::ORDER
                .iter()
                .filter_map(|priority| {
                    let (seq, batch): (Vec<_>, Vec<_>) = now
                        .iter()
                        .filter(|c| c.priority == *priority)
                        .cloned()
                        .partition(|c| sequential.contains(&c.id));
                    let group = FixGroup {
                        priority: *priority,
                        batched: batch,
                        sequential: seq,
                    };
                    (!group.is_empty()).then_some(group)
                })
                .collect();

            passes.push(FixPass { groups, conflicts });
            remaining = later;
        }

        FixPlan { passes }
    }

    /// Execution order: class by class, and within a class, pass by pass.
    /// A deferred candidate always belongs to a lower class than the one that
    /// deferred it, so the winner has landed before the loser runs.
    pub fn schedule(&self) -> Vec<(usize, &FixGroup)> {
        let mut order: Vec<(usize, &FixGroup)> = self
            .passes
            .iter()
            .enumerate()
            .flat_map(|(pass, p)| p.groups.iter().map(move |g| (pass, g)))
            .collect();
        order.sort_by_key(|(pass, group)| (group.priority.rank(), *pass));
        order
    }

    #[allow(dead_code)]
    pub fn groups(&self) -> impl Iterator<Item = &FixGroup> + '_ {
        self.schedule().into_iter().map(|(_, group)| group)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.passes.iter().flat_map(|p| p.conflicts.iter())
    }
}
