//! Aggregate Engine: category/technology breakdown over the active rows.
//!
//! Always recomputed from the full active-row set after a mutation, never
//! adjusted incrementally: a batch delete must not leave percentages
//! reflecting a partially-applied state.
//!
//! The wire shape (camelCase, `techPercent`) matches the cached snapshots
//! older clients already hold.

use serde::{Deserialize, Serialize};

use nid_common::{Category, Technology};

/// Per-technology counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechCounts {
    #[serde(rename = "2g", default)]
    pub g2: i64,
    #[serde(rename = "3g", default)]
    pub g3: i64,
    #[serde(default)]
    pub lte: i64,
    #[serde(rename = "5g", default)]
    pub g5: i64,
    #[serde(default)]
    pub other: i64,
}

impl TechCounts {
    pub fn get(&self, tech: Technology) -> i64 {
        match tech {
            Technology::G2 => self.g2,
            Technology::G3 => self.g3,
            Technology::Lte => self.lte,
            Technology::G5 => self.g5,
            Technology::Other => self.other,
        }
    }

    fn bump(&mut self, tech: Technology) {
        match tech {
            Technology::G2 => self.g2 += 1,
            Technology::G3 => self.g3 += 1,
            Technology::Lte => self.lte += 1,
            Technology::G5 => self.g5 += 1,
            Technology::Other => self.other += 1,
        }
    }

    fn add(&mut self, other: &TechCounts) {
        self.g2 += other.g2;
        self.g3 += other.g3;
        self.lte += other.lte;
        self.g5 += other.g5;
        self.other += other.other;
    }
}

/// Per-technology percentages, rounded to one decimal. All zero when the
/// owning total is zero (never NaN).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TechPercents {
    #[serde(rename = "2g", default)]
    pub g2: f64,
    #[serde(rename = "3g", default)]
    pub g3: f64,
    #[serde(default)]
    pub lte: f64,
    #[serde(rename = "5g", default)]
    pub g5: f64,
    #[serde(default)]
    pub other: f64,
}

impl TechPercents {
    fn from_counts(counts: &TechCounts, total: i64) -> Self {
        Self {
            g2: percent(counts.g2, total),
            g3: percent(counts.g3, total),
            lte: percent(counts.lte, total),
            g5: percent(counts.g5, total),
            other: percent(counts.other, total),
        }
    }

    pub fn sum(&self) -> f64 {
        self.g2 + self.g3 + self.lte + self.g5 + self.other
    }
}

fn percent(count: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (count as f64 / total as f64 * 1000.0).round() / 10.0
    }
}

/// One category's slice of the breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub total: i64,
    pub tech: TechCounts,
    #[serde(rename = "techPercent", default)]
    pub tech_percent: TechPercents,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakdownCategories {
    pub transport: CategoryBreakdown,
    pub wireless: CategoryBreakdown,
    pub wireline: CategoryBreakdown,
}

impl BreakdownCategories {
    fn slot(&mut self, category: Category) -> &mut CategoryBreakdown {
        match category {
            Category::Transport => &mut self.transport,
            Category::Wireless => &mut self.wireless,
            Category::Wireline => &mut self.wireline,
        }
    }

    pub fn get(&self, category: Category) -> &CategoryBreakdown {
        match category {
            Category::Transport => &self.transport,
            Category::Wireless => &self.wireless,
            Category::Wireline => &self.wireline,
        }
    }
}

/// Overall totals, re-percentaged from summed counts (never averaged from
/// the per-category percentages).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub total: i64,
    pub tech: TechCounts,
    #[serde(rename = "techPercent", default)]
    pub tech_percent: TechPercents,
}

/// The full derived breakdown. Reproducible at any time by re-scanning the
/// active processed rows; persisted only as a cache snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub categories: BreakdownCategories,
    pub totals: Totals,
}

impl Breakdown {
    /// Single O(n) pass over (category, technology) tags.
    pub fn compute<I>(tags: I) -> Breakdown
    where
        I: IntoIterator<Item = (Category, Technology)>,
    {
        let mut categories = BreakdownCategories::default();
        for (category, technology) in tags {
            let slot = categories.slot(category);
            slot.total += 1;
            slot.tech.bump(technology);
        }

        let mut totals = Totals::default();
        for category in Category::ALL {
            let slot = categories.slot(category);
            slot.tech_percent = TechPercents::from_counts(&slot.tech, slot.total);
            totals.total += slot.total;
            totals.tech.add(&slot.tech);
        }
        totals.tech_percent = TechPercents::from_counts(&totals.tech, totals.total);

        Breakdown { categories, totals }
    }

    /// Legacy per-category totals, the `category_counts` snapshot shape.
    pub fn simple_counts(&self) -> serde_json::Value {
        serde_json::json!({
            "transport": self.categories.transport.total,
            "wireless": self.categories.wireless.total,
            "wireline": self.categories.wireline.total,
        })
    }
}
