use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use relief_core::{Category, RequirementEstimate, RetrievedCandidate};

/// Population assumed when the query mentions no number at all.
pub const DEFAULT_POPULATION: u64 = 10;

static QUALIFIED_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+)\s*(?:people|person|individuals|victims|casualties|injured|survivors)")
        .expect("qualified population pattern is valid")
});

static BARE_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\b").expect("bare number pattern is valid"));

/// How the population figure was obtained.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationSource {
    /// A number directly followed by a people-denoting word.
    Qualified,
    /// The first standalone integer in the text.
    Bare,
    /// Nothing numeric found.
    Default,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Population {
    pub count: u64,
    pub source: PopulationSource,
}

/// Per-person baseline, in thousandths of a unit, for one (category, item) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BaselineRate {
    pub category: Category,
    pub item: &'static str,
    pub per_mille: u64,
}

/// Multiplier (in tenths) applied to the listed categories when any keyword occurs in the query.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ContextRule {
    pub keywords: &'static [&'static str],
    pub categories: &'static [Category],
    pub factor_tenths: u64,
}

impl ContextRule {
    fn applies(&self, lowered_query: &str, category: Category) -> bool {
        self.categories.contains(&category) && self.keywords.iter().any(|k| lowered_query.contains(k))
    }
}

pub const BASELINE_RATES: &[BaselineRate] = &[
    BaselineRate { category: Category::Medical, item: "Medical Kit", per_mille: 200 },
    BaselineRate { category: Category::Medical, item: "First Aid Bandages", per_mille: 3_000 },
    BaselineRate { category: Category::Medical, item: "Antibiotics", per_mille: 1_000 },
    BaselineRate { category: Category::Water, item: "Water Bottles", per_mille: 3_000 },
    BaselineRate { category: Category::Food, item: "Emergency Food Pack", per_mille: 1_000 },
    BaselineRate { category: Category::Shelter, item: "Blankets", per_mille: 1_000 },
    BaselineRate { category: Category::Shelter, item: "Tents", per_mille: 250 },
    BaselineRate { category: Category::Equipment, item: "Flashlights", per_mille: 250 },
    BaselineRate { category: Category::Equipment, item: "Batteries", per_mille: 2_000 },
    BaselineRate { category: Category::Rescue, item: "Rescue Tubes", per_mille: 100 },
];

pub const CONTEXT_RULES: &[ContextRule] = &[
    ContextRule { keywords: &["injur"], categories: &[Category::Medical], factor_tenths: 15 },
    ContextRule { keywords: &["dehydrat"], categories: &[Category::Water], factor_tenths: 15 },
    ContextRule { keywords: &["flood"], categories: &[Category::Shelter, Category::Water], factor_tenths: 13 },
];

/// Heuristic per-item need estimator.
///
/// Pure and deterministic: the arithmetic is done in integers (rates in
/// thousandths, multipliers in tenths) so the final floor is exact.
#[derive(Debug, Clone)]
pub struct RequirementEstimator {
    rates: &'static [BaselineRate],
    rules: &'static [ContextRule],
}

impl Default for RequirementEstimator {
    fn default() -> Self {
        Self {
            rates: BASELINE_RATES,
            rules: CONTEXT_RULES,
        }
    }
}

impl RequirementEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Affected population: qualified count, then first bare integer, then [`DEFAULT_POPULATION`].
    pub fn population(&self, query: &str) -> Population {
        let lowered = query.to_lowercase();

        if let Some(count) = first_count(&QUALIFIED_COUNT, &lowered) {
            return Population { count, source: PopulationSource::Qualified };
        }
        if let Some(count) = first_count(&BARE_COUNT, &lowered) {
            return Population { count, source: PopulationSource::Bare };
        }
        Population {
            count: DEFAULT_POPULATION,
            source: PopulationSource::Default,
        }
    }

    pub fn baseline_rate(&self, category: Category, item: &str) -> Option<&BaselineRate> {
        let item = item.trim();
        self.rates
            .iter()
            .find(|r| r.category == category && r.item.eq_ignore_ascii_case(item))
    }

    /// Estimate needs for every candidate that has a baseline rate; others are skipped.
    pub fn estimate(&self, query: &str, candidates: &[RetrievedCandidate]) -> RequirementEstimate {
        let population = self.population(query);
        self.estimate_for(query, population.count, candidates)
    }

    pub fn estimate_for(&self, query: &str, population: u64, candidates: &[RetrievedCandidate]) -> RequirementEstimate {
        let lowered = query.to_lowercase();
        let mut estimate = RequirementEstimate::new();

        for candidate in candidates {
            let Some(rate) = self.baseline_rate(candidate.category, &candidate.name) else {
                continue;
            };

            let mut numerator = u128::from(population) * u128::from(rate.per_mille);
            let mut denominator: u128 = 1_000;
            for rule in self.rules.iter().filter(|r| r.applies(&lowered, candidate.category)) {
                numerator *= u128::from(rule.factor_tenths);
                denominator *= 10;
            }

            let units = u64::try_from(numerator / denominator).unwrap_or(u64::MAX).max(1);
            estimate.insert(candidate.name.clone(), units);
        }

        estimate
    }
}

fn first_count(pattern: &Regex, text: &str) -> Option<u64> {
    pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .find_map(|m| m.as_str().parse::<u64>().ok())
}
