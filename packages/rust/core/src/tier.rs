//! Tier policy: everything a tier decides, in one value.

use std::time::Duration;

use dossier_shared::{Phase, Tier};

/// Queries to run in one search phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePlan {
    pub phase: Phase,
    /// Upper bound on queries executed in this phase.
    pub query_budget: usize,
}

const DEEP_SECTIONS: &[&str] = &[
    "Professional Background",
    "Education & Credentials",
    "Career Experience",
    "Achievements & Recognition",
    "Recent Activity",
    "Professional Interests & Focus",
    "Online Presence",
];

const BASIC_SECTIONS: &[&str] = &[
    "Professional Background",
    "Education & Credentials",
    "Career Experience",
    "Recent Activity",
    "Online Presence",
];

/// Resource and quality policy for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct TierPolicy {
    pub tier: Tier,
    pub phases: Vec<PhasePlan>,
    /// Items kept per query.
    pub results_per_query: usize,
    /// Headings the synthesized report must use, in order.
    pub sections: &'static [&'static str],
    pub refinement_max_tokens: u32,
    pub refinement_temperature: f32,
    pub synthesis_max_tokens: u32,
    pub synthesis_temperature: f32,
    /// Wall-clock budget for gathering. Synthesis is not cut short by it.
    pub deadline: Duration,
    pub dedup_by_link: bool,
}

impl TierPolicy {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Basic => Self {
                tier,
                phases: vec![PhasePlan {
                    phase: Phase::Initial,
                    query_budget: 3,
                }],
                results_per_query: 3,
                sections: BASIC_SECTIONS,
                refinement_max_tokens: 300,
                refinement_temperature: 0.7,
                synthesis_max_tokens: 1200,
                synthesis_temperature: 0.3,
                deadline: Duration::from_secs(30),
                dedup_by_link: false,
            },
            Tier::Deep => Self {
                tier,
                phases: vec![
                    PhasePlan {
                        phase: Phase::Initial,
                        query_budget: 4,
                    },
                    PhasePlan {
                        phase: Phase::Refined1,
                        query_budget: 4,
                    },
                    PhasePlan {
                        phase: Phase::Refined2,
                        query_budget: 4,
                    },
                ],
                results_per_query: 3,
                sections: DEEP_SECTIONS,
                refinement_max_tokens: 300,
                refinement_temperature: 0.7,
                synthesis_max_tokens: 2500,
                synthesis_temperature: 0.3,
                deadline: Duration::from_secs(90),
                dedup_by_link: false,
            },
        }
    }

    pub fn with_dedup_by_link(mut self, dedup_by_link: bool) -> Self {
        self.dedup_by_link = dedup_by_link;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_runs_one_phase_of_three_queries() {
        let policy = TierPolicy::for_tier(Tier::Basic);
        assert_eq!(policy.phase_count(), 1);
        assert_eq!(policy.phases[0].query_budget, 3);
        assert_eq!(policy.sections.len(), 5);
        assert_eq!(policy.deadline, Duration::from_secs(30));
    }

    #[test]
    fn deep_runs_three_phases_in_order() {
        let policy = TierPolicy::for_tier(Tier::Deep);
        let phases: Vec<Phase> = policy.phases.iter().map(|p| p.phase).collect();
        assert_eq!(phases, vec![Phase::Initial, Phase::Refined1, Phase::Refined2]);
        assert_eq!(policy.sections.len(), 7);
        assert!(policy.synthesis_max_tokens > TierPolicy::for_tier(Tier::Basic).synthesis_max_tokens);
    }

    #[test]
    fn refinement_runs_hotter_than_synthesis() {
        for tier in [Tier::Basic, Tier::Deep] {
            let policy = TierPolicy::for_tier(tier);
            assert!(policy.refinement_temperature > policy.synthesis_temperature);
            assert!(policy.refinement_max_tokens < policy.synthesis_max_tokens);
        }
    }

    #[test]
    fn basic_sections_are_a_subset_of_deep() {
        for section in BASIC_SECTIONS {
            assert!(DEEP_SECTIONS.contains(section));
        }
    }
}
