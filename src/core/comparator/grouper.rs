//! Grouping algorithms over a [`SimilarityOracle`].
//!
//! Two strategies are available:
//! - [`SeedGrouper`] scans items in order; each unassigned item seeds a
//!   group and absorbs every later unassigned item that matches *the seed*.
//!   Members are never compared with each other, so A~B and B~C does not
//!   put C with A unless A~C. This is the default.
//! - [`TransitiveGrouper`] compares every pair and takes connected
//!   components with union-find, so A~B and B~C always gives {A, B, C}.

use super::traits::{SimilarityOracle, SimilarityThreshold};
use crate::error::CompareError;
use crate::events::{CompareEvent, CompareProgress, Event, EventSender};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One group of item indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Member indices in first-seen (ascending insertion) order
    pub members: Vec<usize>,
    /// Weakest accepted link inside the group (None for singletons)
    pub link_similarity: Option<f64>,
}

impl Cluster {
    pub fn singleton(index: usize) -> Self {
        Self {
            members: vec![index],
            link_similarity: None,
        }
    }

    fn absorb(&mut self, index: usize, similarity: f64) {
        self.members.push(index);
        self.record_link(similarity);
    }

    fn record_link(&mut self, similarity: f64) {
        self.link_similarity = Some(match self.link_similarity {
            Some(current) => current.min(similarity),
            None => similarity,
        });
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Clusters plus bookkeeping about how they were found
#[derive(Debug, Clone, Default)]
pub struct GroupingOutcome {
    pub clusters: Vec<Cluster>,
    /// Pairwise comparisons attempted
    pub comparisons: usize,
    /// Comparisons that failed and were treated as non-matches
    pub failures: usize,
}

/// Which grouping algorithm to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStrategy {
    /// Compare each item only against its group's seed
    #[default]
    SeedOnly,
    /// Connected components of the full pairwise match graph
    Transitive,
}

impl GroupingStrategy {
    pub fn group(
        self,
        oracle: &dyn SimilarityOracle,
        threshold: SimilarityThreshold,
        events: &EventSender,
    ) -> GroupingOutcome {
        match self {
            GroupingStrategy::SeedOnly => SeedGrouper.group(oracle, threshold, events),
            GroupingStrategy::Transitive => TransitiveGrouper.group(oracle, threshold, events),
        }
    }
}

impl std::fmt::Display for GroupingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupingStrategy::SeedOnly => write!(f, "seed-only"),
            GroupingStrategy::Transitive => write!(f, "transitive"),
        }
    }
}

fn log_failure(events: &EventSender, left: usize, right: usize, error: &CompareError) {
    warn!(left, right, %error, "comparison failed, treating as non-match");
    events.send(Event::Compare(CompareEvent::Failed {
        left,
        right,
        message: error.to_string(),
    }));
}

/// Seed-based single pass grouping
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedGrouper;

impl SeedGrouper {
    pub fn group(
        &self,
        oracle: &dyn SimilarityOracle,
        threshold: SimilarityThreshold,
        events: &EventSender,
    ) -> GroupingOutcome {
        let n = oracle.len();
        let mut assigned = vec![false; n];
        let mut outcome = GroupingOutcome::default();
        let mut items_grouped = 0;

        for seed in 0..n {
            if assigned[seed] {
                continue;
            }
            assigned[seed] = true;
            let mut cluster = Cluster::singleton(seed);

            if oracle.is_comparable(seed) {
                let candidates: Vec<usize> = ((seed + 1)..n)
                    .filter(|&j| !assigned[j] && oracle.is_comparable(j))
                    .collect();

                // Scores are pure, so they run in parallel; absorbing stays in index order.
                let scored: Vec<(usize, Result<f64, CompareError>)> = candidates
                    .par_iter()
                    .map(|&j| (j, oracle.similarity(seed, j)))
                    .collect();

                for (candidate, result) in scored {
                    outcome.comparisons += 1;
                    match result {
                        Ok(similarity) if threshold.is_match(similarity) => {
                            debug!(seed, candidate, similarity, "grouped");
                            assigned[candidate] = true;
                            cluster.absorb(candidate, similarity);
                        }
                        Ok(similarity) => {
                            debug!(seed, candidate, similarity, "kept separate");
                        }
                        Err(error) => {
                            outcome.failures += 1;
                            log_failure(events, seed, candidate, &error);
                        }
                    }
                }
            }

            items_grouped += cluster.len();
            outcome.clusters.push(cluster);

            events.send(Event::Compare(CompareEvent::Progress(CompareProgress {
                comparisons_completed: outcome.comparisons,
                items_grouped,
                total_items: n,
            })));
        }

        outcome
    }
}

/// Union-find grouping over every comparable pair
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitiveGrouper;

impl TransitiveGrouper {
    pub fn group(
        &self,
        oracle: &dyn SimilarityOracle,
        threshold: SimilarityThreshold,
        events: &EventSender,
    ) -> GroupingOutcome {
        let n = oracle.len();
        let mut outcome = GroupingOutcome::default();

        let comparable: Vec<usize> = (0..n).filter(|&i| oracle.is_comparable(i)).collect();
        let mut parent: Vec<usize> = (0..n).collect();
        // Weakest accepted link, kept on each set's root
        let mut weakest: Vec<Option<f64>> = vec![None; n];

        // One row at a time, so memory stays linear in the batch size.
        for (position, &i) in comparable.iter().enumerate() {
            let row: Vec<(usize, Result<f64, CompareError>)> = comparable[position + 1..]
                .par_iter()
                .map(|&j| (j, oracle.similarity(i, j)))
                .collect();

            for (j, result) in row {
                outcome.comparisons += 1;
                match result {
                    Ok(similarity) if threshold.is_match(similarity) => {
                        debug!(left = i, right = j, similarity, "linked");
                        let (root_i, root_j) = (find(&mut parent, i), find(&mut parent, j));
                        union(&mut parent, root_i, root_j);
                        weakest[root_i.min(root_j)] =
                            [weakest[root_i], weakest[root_j], Some(similarity)]
                                .into_iter()
                                .flatten()
                                .reduce(f64::min);
                    }
                    Ok(similarity) => {
                        debug!(left = i, right = j, similarity, "not linked");
                    }
                    Err(error) => {
                        outcome.failures += 1;
                        log_failure(events, i, j, &error);
                    }
                }
            }
        }

        // Roots are always the smallest member, so clusters come out in
        // first-seen order with ascending members.
        let mut slot_of_root = vec![usize::MAX; n];
        for index in 0..n {
            let root = find(&mut parent, index);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = outcome.clusters.len();
                outcome.clusters.push(Cluster {
                    members: Vec::new(),
                    link_similarity: weakest[root],
                });
            }
            outcome.clusters[slot_of_root[root]].members.push(index);
        }

        events.send(Event::Compare(CompareEvent::Progress(CompareProgress {
            comparisons_completed: outcome.comparisons,
            items_grouped: n,
            total_items: n,
        })));

        outcome
    }
}

/// Find root with path compression
fn find(parent: &mut [usize], x: usize) -> usize {
    let mut root = x;
    while parent[root] != root {
        root = parent[root];
    }
    let mut node = x;
    while parent[node] != root {
        let next = parent[node];
        parent[node] = root;
        node = next;
    }
    root
}

/// Union two sets, keeping the smaller index as root
fn union(parent: &mut [usize], a: usize, b: usize) {
    let root_a = find(parent, a);
    let root_b = find(parent, b);
    if root_a != root_b {
        let (keep, attach) = if root_a < root_b {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        parent[attach] = keep;
    }
}
