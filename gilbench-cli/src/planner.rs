//! Scenario Planner
//!
//! Builds the execution plan by filtering the catalogue.
//!
//! Filtering options:
//! - Regex pattern matching on scenario ID
//! - Tag inclusion/exclusion
//!
//! Ordering: catalogue order is kept, so baselines and related scenarios
//! appear in the same sequence on every run.

use crate::scenario::Scenario;

/// Execution plan for scenarios
pub struct ExecutionPlan {
    /// Ordered list of scenarios to run
    pub scenarios: Vec<Scenario>,
}

impl ExecutionPlan {
    /// Whether any planned scenario needs worker processes
    pub fn uses_processes(&self) -> bool {
        self.scenarios.iter().any(Scenario::uses_processes)
    }
}

/// Build execution plan from the catalogue
pub fn build_plan(
    scenarios: impl IntoIterator<Item = Scenario>,
    filter: Option<&regex::Regex>,
    tag: Option<&str>,
    skip_tag: Option<&str>,
) -> ExecutionPlan {
    let selected = scenarios
        .into_iter()
        .filter(|s| {
            // Apply regex filter on scenario ID
            if let Some(re) = filter {
                if !re.is_match(s.id) {
                    return false;
                }
            }

            // Apply tag inclusion filter
            if let Some(t) = tag {
                if !s.tags.contains(&t) {
                    return false;
                }
            }

            // Apply tag exclusion filter
            if let Some(st) = skip_tag {
                if s.tags.contains(&st) {
                    return false;
                }
            }

            true
        })
        .collect();

    ExecutionPlan {
        scenarios: selected,
    }
}
