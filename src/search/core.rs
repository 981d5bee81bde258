//! The recursive, hierarchy-constrained matcher (spec.md S4.4).
//!
//! Public functions return plain data with no `Result`: query-budget
//! exhaustion and an empty/degenerate parse are silent per the error
//! handling design (spec.md S7) - there is nothing exceptional about
//! them from a caller's point of view.

use hashbrown::HashSet;

use crate::expander::Parse;
use crate::index::{PostingsStore, Trie};
use crate::model::HierarchyTable;

use super::levels::{project_levels, Level};

/// Tunables from spec.md S4.4, kept on an explicit struct (not global
/// state) per S9's configuration guidance.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// 0 = unlimited.
    pub max_queries_per_hierarchy: usize,
    pub max_results: usize,
    pub max_intermediate_offset: usize,
    pub levels_in_title: usize,
    /// `"en"` or `""`.
    pub preferred_result_language: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_queries_per_hierarchy: 0,
            max_results: 20,
            max_intermediate_offset: 20,
            levels_in_title: 3,
            preferred_result_language: String::new(),
        }
    }
}

impl SearchConfig {
    /// spec.md S9 Open Question: `max_results == 0` is "no truncation,
    /// intermediate cap is `max_intermediate_offset` alone".
    fn intermediate_cap(&self) -> Option<usize> {
        if self.max_results == 0 {
            if self.max_intermediate_offset == 0 {
                None
            } else {
                Some(self.max_intermediate_offset)
            }
        } else {
            Some(self.max_intermediate_offset + self.max_results)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: i64,
    pub levels_resolved: usize,
}

struct SearchState<'a> {
    trie: &'a Trie,
    postings: &'a PostingsStore,
    hierarchy: &'a HierarchyTable,
    config: &'a SearchConfig,
    queries_used: usize,
    best_levels_resolved: usize,
    results: Vec<Candidate>,
}

impl<'a> SearchState<'a> {
    fn budget_exhausted(&self) -> bool {
        self.config.max_queries_per_hierarchy != 0 && self.queries_used >= self.config.max_queries_per_hierarchy
    }

    fn record(&mut self, id: i64, levels_resolved: usize) {
        if levels_resolved > self.best_levels_resolved {
            self.best_levels_resolved = levels_resolved;
            self.results.clear();
            self.results.push(Candidate { id, levels_resolved });
            return;
        }
        if levels_resolved == self.best_levels_resolved {
            match self.config.intermediate_cap() {
                Some(cap) if self.results.len() >= cap => {}
                _ => self.results.push(Candidate { id, levels_resolved }),
            }
        }
        // levels_resolved < best_levels_resolved: strictly dominated, drop.
    }

    /// Returns true if this call (directly or via recursion) recorded at
    /// least one candidate.
    fn search(&mut self, l: &[Level], level: usize, range: (i64, i64)) -> bool {
        if level >= l.len() || self.budget_exhausted() {
            return false;
        }
        if self.best_levels_resolved > l.len() {
            return false;
        }

        let mut collected: Vec<(usize, String, i64)> = Vec::new();
        for variant in &l[level] {
            self.queries_used += 1;
            for (key_id, key_str) in self.trie.prefix_matches(variant) {
                let Ok(ids) = self.postings.get(key_id) else { continue };
                for id in ids {
                    // `range.0` is already the inclusive lower bound (the
                    // caller passes `parent_id + 1`), so the immediate
                    // next-indexed place is a valid child (spec.md S3:
                    // `parent.my_index < child.my_index`).
                    if level != 0 && (id < range.0 || id > range.1) {
                        continue;
                    }
                    collected.push((key_str.len(), key_str.to_string(), id));
                }
            }
        }
        collected.sort();

        let mut explored = HashSet::new();
        let mut recorded_any = false;

        for (_, _, id) in collected {
            if let Some(cap) = self.config.intermediate_cap() {
                if self.results.len() >= cap {
                    break;
                }
            }
            if !explored.insert(id) {
                continue;
            }

            if level + 1 == l.len() {
                self.record(id, level + 1);
                recorded_any = true;
                continue;
            }

            let last_subobject = self.hierarchy.last_subobject(id);
            let no_room_to_improve = match last_subobject {
                None => true,
                Some(last) => last <= id,
            };

            if no_room_to_improve {
                if self.best_levels_resolved > level + 1 {
                    continue;
                }
                self.record(id, level + 1);
                recorded_any = true;
                continue;
            }

            let found_deeper = self.search(l, level + 1, (id + 1, last_subobject.unwrap()));
            if found_deeper {
                recorded_any = true;
            } else {
                self.record(id, level + 1);
                recorded_any = true;
            }
        }

        recorded_any
    }
}

/// `search(parses, min_levels) -> results` (spec.md S4.4). `best_levels_resolved`
/// persists across parses, matching the reference pseudocode.
pub fn search(
    trie: &Trie,
    postings: &PostingsStore,
    hierarchy: &HierarchyTable,
    parses: &[Parse],
    min_levels: usize,
    config: &SearchConfig,
) -> Vec<Candidate> {
    let mut state = SearchState {
        trie,
        postings,
        hierarchy,
        config,
        queries_used: 0,
        best_levels_resolved: min_levels,
        results: Vec::new(),
    };

    for parse in parses {
        let levels = project_levels(parse);
        if levels.is_empty() {
            continue;
        }
        state.queries_used = 0;
        state.search(&levels, 0, (0, i64::MAX));
    }

    state.results
}
