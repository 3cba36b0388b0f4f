//! Room type rules: difficulty bands and weighted room-type tables.
//!
//! A run asks two questions per spawned room:
//! 1. Which weighted table applies at the current depth ratio? (`BandResolver`)
//! 2. Which room type does a weighted draw from that table give? (`select_weighted`)
//!
//! Bands are ordered by threshold ascending. The resolver caches the last band
//! it picked and reuses it while the ratio stays at or below that band's
//! threshold, which is valid because BFS depth never decreases during a run.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, GenerationResult};

/// Room type = number of doors a room keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoomType {
    OneDoor,
    TwoDoor,
    ThreeDoor,
    FourDoor,
}

/// Lookup entry tying a room type to its numeric value.
///
/// `ordinal` follows declaration order (`OneDoor` = 0 .. `FourDoor` = 3) and
/// doubles as the demotion count for `TwoDoor` and `ThreeDoor`: that many
/// pending slots become walls when the room spawns. `OneDoor` seals every
/// pending slot and `FourDoor` demotes none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomTypeInfo {
    pub room_type: RoomType,
    pub ordinal: usize,
    pub label: &'static str,
}

/// Explicit ordinal table. Reordering the enum does not change the rule.
pub const ROOM_TYPE_TABLE: [RoomTypeInfo; 4] = [
    RoomTypeInfo {
        room_type: RoomType::OneDoor,
        ordinal: 0,
        label: "one_door",
    },
    RoomTypeInfo {
        room_type: RoomType::TwoDoor,
        ordinal: 1,
        label: "two_door",
    },
    RoomTypeInfo {
        room_type: RoomType::ThreeDoor,
        ordinal: 2,
        label: "three_door",
    },
    RoomTypeInfo {
        room_type: RoomType::FourDoor,
        ordinal: 3,
        label: "four_door",
    },
];

impl RoomType {
    pub fn all() -> &'static [RoomType] {
        &[
            RoomType::OneDoor,
            RoomType::TwoDoor,
            RoomType::ThreeDoor,
            RoomType::FourDoor,
        ]
    }

    pub fn info(self) -> &'static RoomTypeInfo {
        ROOM_TYPE_TABLE
            .iter()
            .find(|info| info.room_type == self)
            .unwrap_or(&ROOM_TYPE_TABLE[0])
    }

    pub fn ordinal(self) -> usize {
        self.info().ordinal
    }

    pub fn label(self) -> &'static str {
        self.info().label
    }

    /// Slots walled off right after a room of this type spawns in open space
    pub fn walls_on_spawn(self) -> usize {
        match self {
            RoomType::OneDoor => crate::constants::SLOTS_PER_ROOM - 1,
            RoomType::FourDoor => 0,
            RoomType::TwoDoor | RoomType::ThreeDoor => self.ordinal(),
        }
    }

    /// Openings a room of this type keeps (connector included)
    pub fn door_count(self) -> usize {
        crate::constants::SLOTS_PER_ROOM - self.walls_on_spawn()
    }

    /// One-door rooms are leaves and are never expanded
    pub fn is_terminal(self) -> bool {
        self == RoomType::OneDoor
    }
}

/// One weighted outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedEntry {
    pub weight: u32,
    pub room_type: RoomType,
}

impl WeightedEntry {
    pub fn new(weight: u32, room_type: RoomType) -> Self {
        Self { weight, room_type }
    }
}

/// Ordered list of weighted outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightedTable {
    pub entries: Vec<WeightedEntry>,
}

impl WeightedTable {
    pub fn new(entries: Vec<(u32, RoomType)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(weight, room_type)| WeightedEntry::new(weight, room_type))
                .collect(),
        }
    }

    /// Table that always yields `room_type`
    pub fn single(room_type: RoomType) -> Self {
        Self::new(vec![(1, room_type)])
    }

    pub fn total_weight(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.weight)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Probability of each room type in this table (0.0 when total is zero)
    pub fn probability_of(&self, room_type: RoomType) -> f32 {
        let total = self.total_weight();
        if total == 0 {
            return 0.0;
        }
        let weight: u64 = self
            .entries
            .iter()
            .filter(|e| e.room_type == room_type)
            .map(|e| u64::from(e.weight))
            .sum();
        weight as f32 / total as f32
    }
}

/// A difficulty band: applies up to (and including) `threshold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentageBand {
    pub threshold: f32,
    pub table: WeightedTable,
}

impl PercentageBand {
    pub fn new(threshold: f32, table: WeightedTable) -> Self {
        Self { threshold, table }
    }
}

/// Complete rule set: ordered bands plus a fallback table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTypeRules {
    pub bands: Vec<PercentageBand>,
    pub default_table: WeightedTable,
}

impl Default for RoomTypeRules {
    fn default() -> Self {
        Self {
            bands: vec![
                PercentageBand::new(
                    0.3,
                    WeightedTable::new(vec![
                        (4, RoomType::FourDoor),
                        (3, RoomType::ThreeDoor),
                        (1, RoomType::TwoDoor),
                    ]),
                ),
                PercentageBand::new(
                    0.7,
                    WeightedTable::new(vec![
                        (2, RoomType::ThreeDoor),
                        (3, RoomType::TwoDoor),
                        (2, RoomType::OneDoor),
                    ]),
                ),
                PercentageBand::new(
                    1.0,
                    WeightedTable::new(vec![(1, RoomType::TwoDoor), (4, RoomType::OneDoor)]),
                ),
            ],
            default_table: WeightedTable::single(RoomType::OneDoor),
        }
    }
}

impl RoomTypeRules {
    /// Rules with no bands: every draw comes from `default_table`
    pub fn uniform(default_table: WeightedTable) -> Self {
        Self {
            bands: Vec::new(),
            default_table,
        }
    }

    /// Authoring-time checks. The generator itself never calls this.
    pub fn validate(&self) -> GenerationResult<()> {
        validate_table("default_table", &self.default_table)?;

        let mut previous: Option<f32> = None;
        for (i, band) in self.bands.iter().enumerate() {
            if !(0.0..=1.0).contains(&band.threshold) {
                return Err(GenerationError::InvalidRule(format!(
                    "band {i} threshold {} outside [0, 1]",
                    band.threshold
                )));
            }
            if let Some(prev) = previous {
                if band.threshold <= prev {
                    return Err(GenerationError::InvalidRule(format!(
                        "band {i} threshold {} not above previous {prev}",
                        band.threshold
                    )));
                }
            }
            validate_table(&format!("band {i}"), &band.table)?;
            previous = Some(band.threshold);
        }
        Ok(())
    }
}

fn validate_table(name: &str, table: &WeightedTable) -> GenerationResult<()> {
    if table.is_empty() {
        return Err(GenerationError::InvalidRule(format!("{name} is empty")));
    }
    if let Some(entry) = table.entries.iter().find(|e| e.weight == 0) {
        return Err(GenerationError::InvalidRule(format!(
            "{name} has zero weight for {:?}",
            entry.room_type
        )));
    }
    Ok(())
}

/// Which table a resolution picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandChoice {
    Band(usize),
    Default,
}

/// Resolves depth ratios to weighted tables, caching the last band.
#[derive(Debug, Clone, Default)]
pub struct BandResolver {
    cached: Option<usize>,
}

impl BandResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached band (start of every run)
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn cached_band(&self) -> Option<usize> {
        self.cached
    }

    /// Pick the band for `ratio`
    pub fn resolve(&mut self, rules: &RoomTypeRules, ratio: f32) -> BandChoice {
        if let Some(index) = self.cached {
            if let Some(band) = rules.bands.get(index) {
                if ratio <= band.threshold {
                    return BandChoice::Band(index);
                }
            }
        }

        let choice = scan_bands(&rules.bands, ratio);
        self.cached = match choice {
            BandChoice::Band(index) => Some(index),
            BandChoice::Default => None,
        };
        choice
    }

    /// Pick the weighted table for `ratio`
    pub fn resolve_table<'r>(&mut self, rules: &'r RoomTypeRules, ratio: f32) -> &'r WeightedTable {
        match self.resolve(rules, ratio) {
            BandChoice::Band(index) => &rules.bands[index].table,
            BandChoice::Default => &rules.default_table,
        }
    }
}

fn scan_bands(bands: &[PercentageBand], ratio: f32) -> BandChoice {
    let last = bands.len().saturating_sub(1);
    for i in 0..bands.len() {
        if i == 0 {
            // At or below the lowest threshold
            if ratio <= bands[0].threshold {
                return BandChoice::Band(0);
            }
        } else if i == last {
            // Above the second-highest threshold
            if ratio >= bands[i].threshold || ratio >= bands[i - 1].threshold {
                return BandChoice::Band(i);
            }
        } else if ratio >= bands[i - 1].threshold && ratio < bands[i].threshold {
            return BandChoice::Band(i);
        }
    }
    BandChoice::Default
}

/// Weighted draw: uniform integer in `[1, total]`, first cumulative weight at
/// or above the draw wins.
pub fn select_weighted<R: Rng + ?Sized>(
    table: &WeightedTable,
    rng: &mut R,
) -> GenerationResult<RoomType> {
    if table.is_empty() {
        return Err(GenerationError::InvalidRule(
            "weighted table is empty".to_string(),
        ));
    }
    let total = table.total_weight();
    if total == 0 {
        return Err(GenerationError::InvalidRule(
            "weighted table total weight is zero".to_string(),
        ));
    }

    let draw = rng.gen_range(1..=total);
    let mut cumulative = 0u64;
    for entry in &table.entries {
        cumulative += u64::from(entry.weight);
        if draw <= cumulative {
            return Ok(entry.room_type);
        }
    }

    // Unreachable with total > 0; the last entry closes the cumulative range.
    Err(GenerationError::InvalidRule(format!(
        "draw {draw} exceeded total weight {total}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn two_band_rules() -> RoomTypeRules {
        RoomTypeRules {
            bands: vec![
                PercentageBand::new(0.3, WeightedTable::single(RoomType::FourDoor)),
                PercentageBand::new(0.7, WeightedTable::single(RoomType::ThreeDoor)),
            ],
            default_table: WeightedTable::single(RoomType::OneDoor),
        }
    }

    #[test]
    fn test_ordinal_table() {
        assert_eq!(RoomType::OneDoor.ordinal(), 0);
        assert_eq!(RoomType::TwoDoor.ordinal(), 1);
        assert_eq!(RoomType::ThreeDoor.ordinal(), 2);
        assert_eq!(RoomType::FourDoor.ordinal(), 3);
        // Demoted types wall off their ordinal, the others are special-cased
        assert_eq!(RoomType::OneDoor.walls_on_spawn(), 3);
        assert_eq!(RoomType::TwoDoor.walls_on_spawn(), 1);
        assert_eq!(RoomType::ThreeDoor.walls_on_spawn(), 2);
        assert_eq!(RoomType::FourDoor.walls_on_spawn(), 0);
        assert_eq!(RoomType::OneDoor.door_count(), 1);
        assert_eq!(RoomType::TwoDoor.door_count(), 3);
        assert_eq!(RoomType::ThreeDoor.door_count(), 2);
        assert_eq!(RoomType::FourDoor.door_count(), 4);
        assert_eq!(RoomType::TwoDoor.label(), "two_door");
        assert!(RoomType::OneDoor.is_terminal());
        assert!(!RoomType::FourDoor.is_terminal());
    }

    #[test]
    fn test_band_boundaries() {
        let rules = two_band_rules();
        let mut resolver = BandResolver::new();
        assert_eq!(resolver.resolve(&rules, 0.0), BandChoice::Band(0));
        assert_eq!(resolver.resolve(&rules, 0.3), BandChoice::Band(0));
        assert_eq!(resolver.resolve(&rules, 0.31), BandChoice::Band(1));
        assert_eq!(resolver.resolve(&rules, 1.0), BandChoice::Band(1));
    }

    #[test]
    fn test_middle_band() {
        let rules = RoomTypeRules {
            bands: vec![
                PercentageBand::new(0.2, WeightedTable::single(RoomType::FourDoor)),
                PercentageBand::new(0.5, WeightedTable::single(RoomType::ThreeDoor)),
                PercentageBand::new(0.8, WeightedTable::single(RoomType::TwoDoor)),
            ],
            default_table: WeightedTable::single(RoomType::OneDoor),
        };
        assert_eq!(BandResolver::new().resolve(&rules, 0.2), BandChoice::Band(0));
        assert_eq!(BandResolver::new().resolve(&rules, 0.3), BandChoice::Band(1));
        // Above the second-highest threshold falls to the last band
        assert_eq!(BandResolver::new().resolve(&rules, 0.5), BandChoice::Band(2));
        assert_eq!(BandResolver::new().resolve(&rules, 0.6), BandChoice::Band(2));
        assert_eq!(BandResolver::new().resolve(&rules, 2.0), BandChoice::Band(2));
    }

    #[test]
    fn test_empty_bands_use_default() {
        let rules = RoomTypeRules::uniform(WeightedTable::single(RoomType::TwoDoor));
        let mut resolver = BandResolver::new();
        assert_eq!(resolver.resolve(&rules, 0.5), BandChoice::Default);
        assert_eq!(
            resolver.resolve_table(&rules, 0.5),
            &WeightedTable::single(RoomType::TwoDoor)
        );
        assert!(resolver.cached_band().is_none());
    }

    #[test]
    fn test_single_band_above_threshold_uses_default() {
        let rules = RoomTypeRules {
            bands: vec![PercentageBand::new(
                0.5,
                WeightedTable::single(RoomType::FourDoor),
            )],
            default_table: WeightedTable::single(RoomType::OneDoor),
        };
        let mut resolver = BandResolver::new();
        assert_eq!(resolver.resolve(&rules, 0.4), BandChoice::Band(0));
        assert_eq!(resolver.resolve(&rules, 0.9), BandChoice::Default);
    }

    #[test]
    fn test_cache_reused_for_lower_ratio() {
        let rules = two_band_rules();
        let mut resolver = BandResolver::new();
        assert_eq!(resolver.resolve(&rules, 0.5), BandChoice::Band(1));
        assert_eq!(resolver.cached_band(), Some(1));
        // Ratios never decrease inside a run; a lower ratio still hits the cache
        assert_eq!(resolver.resolve(&rules, 0.0), BandChoice::Band(1));

        resolver.invalidate();
        assert_eq!(resolver.resolve(&rules, 0.0), BandChoice::Band(0));
    }

    #[test]
    fn test_resolution_idempotent() {
        let rules = two_band_rules();
        let mut resolver = BandResolver::new();
        for _ in 0..10 {
            assert_eq!(resolver.resolve(&rules, 0.31), BandChoice::Band(1));
        }
    }

    #[test]
    fn test_select_weighted_errors() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let empty = WeightedTable::default();
        assert!(matches!(
            select_weighted(&empty, &mut rng),
            Err(GenerationError::InvalidRule(_))
        ));

        let zero = WeightedTable::new(vec![(0, RoomType::TwoDoor)]);
        assert!(matches!(
            select_weighted(&zero, &mut rng),
            Err(GenerationError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_select_weighted_skips_zero_weight_entries() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let table = WeightedTable::new(vec![(0, RoomType::FourDoor), (5, RoomType::TwoDoor)]);
        for _ in 0..200 {
            assert_eq!(select_weighted(&table, &mut rng).unwrap(), RoomType::TwoDoor);
        }
    }

    #[test]
    fn test_select_weighted_proportions() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let table = WeightedTable::new(vec![(1, RoomType::TwoDoor), (3, RoomType::ThreeDoor)]);
        let draws = 20_000;
        let three = (0..draws)
            .filter(|_| select_weighted(&table, &mut rng).unwrap() == RoomType::ThreeDoor)
            .count();
        let ratio = three as f32 / draws as f32;
        assert!((ratio - 0.75).abs() < 0.02, "ThreeDoor ratio was {ratio}");
    }

    #[test]
    fn test_probability_of() {
        let table = WeightedTable::new(vec![(1, RoomType::TwoDoor), (3, RoomType::ThreeDoor)]);
        assert!((table.probability_of(RoomType::ThreeDoor) - 0.75).abs() < f32::EPSILON);
        assert_eq!(table.probability_of(RoomType::OneDoor), 0.0);
        assert_eq!(WeightedTable::default().probability_of(RoomType::OneDoor), 0.0);
    }

    #[test]
    fn test_validate() {
        assert!(RoomTypeRules::default().validate().is_ok());

        let mut unordered = two_band_rules();
        unordered.bands.swap(0, 1);
        assert!(unordered.validate().is_err());

        let mut out_of_range = two_band_rules();
        out_of_range.bands[1].threshold = 1.5;
        assert!(out_of_range.validate().is_err());

        let mut empty_default = two_band_rules();
        empty_default.default_table = WeightedTable::default();
        assert!(empty_default.validate().is_err());

        let mut zero_weight = two_band_rules();
        zero_weight.bands[0].table = WeightedTable::new(vec![(0, RoomType::OneDoor)]);
        assert!(zero_weight.validate().is_err());
    }
}
