//! # Class Weak-Spot Aggregation
//!
//! Merges the loop telemetry of a whole class for one piece of material into
//! a short ranked list of trouble spots.
//!
//! ## Algorithm
//! 1. Group loop events by their exact `(start_bar, end_bar)` key, summing
//!    loop counts and collecting the set of students at each key. A student
//!    who reports the same range twice still counts once.
//! 2. `avg_loop_count = total / affected students`;
//!    `student_ratio = affected students / students with weak-spot telemetry`.
//!    A student whose weak-spot list is present but empty still counts in
//!    the denominator.
//! 3. Classify:
//!    - **high**: ratio ≥ 0.5 and average ≥ 5 loops
//!    - **medium**: ratio ≥ 0.3 or average ≥ 4 loops
//!    - **low**: anything else
//! 4. Rank by difficulty, then affected students, then total loops (all
//!    descending) and keep the top five.
//! 5. The class instrument is the most common one among students with
//!    telemetry; the target tempo is the mean of their reported tempos.
//!
//! Ranges are never merged: `(1,4)` and `(2,4)` are separate spots.

use crate::config::AggregationConfig;
use crate::telemetry::{PracticeRecord, TelemetryStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, warn};

/// Ordered from easiest to hardest, so `max` is the hardest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeakSpotDifficulty {
    Low,
    Medium,
    High,
}

impl WeakSpotDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeakSpotDifficulty::Low => "low",
            WeakSpotDifficulty::Medium => "medium",
            WeakSpotDifficulty::High => "high",
        }
    }
}

impl std::fmt::Display for WeakSpotDifficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedWeakSpot {
    pub start_bar: u32,
    pub end_bar: u32,
    pub total_loop_count: u32,
    pub affected_student_count: usize,
    pub avg_loop_count: f64,
    pub difficulty: WeakSpotDifficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakSpotsAggregation {
    pub material_id: String,
    pub material_title: String,
    /// Size of the class
    pub total_students: usize,
    /// Students who reported at least one weak spot
    pub students_with_metrics: usize,
    pub top_weak_spots: Vec<AggregatedWeakSpot>,
    pub instrument: String,
    pub target_tempo: u32,
}

/// An eight-bar window to practice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSection {
    pub start_bar: u32,
    pub end_bar: u32,
    pub difficulty: WeakSpotDifficulty,
}

#[derive(Default)]
struct SpotTally<'a> {
    total_loop_count: u32,
    students: BTreeSet<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct WeakSpotAggregator {
    config: AggregationConfig,
}

impl WeakSpotAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, student_ratio: f64, avg_loop_count: f64) -> WeakSpotDifficulty {
        let c = &self.config;
        if student_ratio >= c.high_student_ratio && avg_loop_count >= c.high_avg_loops {
            WeakSpotDifficulty::High
        } else if student_ratio >= c.medium_student_ratio || avg_loop_count >= c.medium_avg_loops
        {
            WeakSpotDifficulty::Medium
        } else {
            WeakSpotDifficulty::Low
        }
    }

    /// Aggregate already-fetched records. Records with a weak-spot list,
    /// even an empty one, make up the denominator. Returns `None` when no
    /// record holds a single loop event.
    pub fn aggregate_records(
        &self,
        material_id: &str,
        material_title: &str,
        total_students: usize,
        records: &[PracticeRecord],
    ) -> Option<WeakSpotsAggregation> {
        let reporting: Vec<&PracticeRecord> =
            records.iter().filter(|r| r.weak_spots.is_some()).collect();
        if reporting.iter().all(|r| r.loop_events().is_empty()) {
            return None;
        }

        let mut tallies: BTreeMap<(u32, u32), SpotTally> = BTreeMap::new();
        for record in &reporting {
            for event in record.loop_events() {
                let tally = tallies.entry((event.start_bar, event.end_bar)).or_default();
                tally.total_loop_count =
                    tally.total_loop_count.saturating_add(event.loop_count);
                tally.students.insert(record.student_id.as_str());
            }
        }

        let students_with_metrics = reporting
            .iter()
            .map(|r| r.student_id.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        let mut spots: Vec<AggregatedWeakSpot> = tallies
            .into_iter()
            .map(|((start_bar, end_bar), tally)| {
                let affected = tally.students.len();
                let avg_loop_count = tally.total_loop_count as f64 / affected as f64;
                let student_ratio = affected as f64 / students_with_metrics as f64;
                AggregatedWeakSpot {
                    start_bar,
                    end_bar,
                    total_loop_count: tally.total_loop_count,
                    affected_student_count: affected,
                    avg_loop_count,
                    difficulty: self.classify(student_ratio, avg_loop_count),
                }
            })
            .collect();

        spots.sort_by(|a, b| {
            b.difficulty
                .cmp(&a.difficulty)
                .then(b.affected_student_count.cmp(&a.affected_student_count))
                .then(b.total_loop_count.cmp(&a.total_loop_count))
        });
        spots.truncate(self.config.top_n);

        let aggregation = WeakSpotsAggregation {
            material_id: material_id.to_string(),
            material_title: material_title.to_string(),
            total_students,
            students_with_metrics,
            top_weak_spots: spots,
            instrument: self.dominant_instrument(&reporting),
            target_tempo: self.mean_tempo(&reporting),
        };
        debug!(
            material_id,
            spots = aggregation.top_weak_spots.len(),
            students_with_metrics,
            "aggregated weak spots"
        );
        Some(aggregation)
    }

    /// Most common instrument; ties go to the one reported first
    fn dominant_instrument(&self, records: &[&PracticeRecord]) -> String {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for instrument in records.iter().filter_map(|r| r.instrument.as_deref()) {
            match counts.iter_mut().find(|(name, _)| *name == instrument) {
                Some((_, count)) => *count += 1,
                None => counts.push((instrument, 1)),
            }
        }

        let mut best: Option<(&str, usize)> = None;
        for (name, count) in counts {
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((name, count));
            }
        }
        best.map(|(name, _)| name.to_string())
            .unwrap_or_else(|| self.config.default_instrument.clone())
    }

    fn mean_tempo(&self, records: &[&PracticeRecord]) -> u32 {
        let tempos: Vec<u32> = records
            .iter()
            .filter_map(|r| r.target_tempo)
            .filter(|&tempo| tempo > 0)
            .collect();
        if tempos.is_empty() {
            return self.config.default_tempo;
        }
        let sum: u64 = tempos.iter().map(|&t| t as u64).sum();
        (sum as f64 / tempos.len() as f64).round() as u32
    }

    /// Read a class's telemetry from the store and aggregate it.
    ///
    /// Returns `None` (after logging) for an empty class, unknown material,
    /// a failed store read, or a class without any weak-spot data.
    pub fn aggregate_class<S: TelemetryStore + ?Sized>(
        &self,
        store: &S,
        material_id: &str,
        class_ids: &[String],
    ) -> Option<WeakSpotsAggregation> {
        if class_ids.is_empty() {
            warn!(material_id, "no students provided");
            return None;
        }

        let title = match store.material_title(material_id) {
            Ok(Some(title)) => title,
            Ok(None) => {
                error!(material_id, "material not found");
                return None;
            }
            Err(e) => {
                error!(material_id, error = %e, "could not read material");
                return None;
            }
        };

        let records = match store.practice_records(material_id, class_ids) {
            Ok(records) => records,
            Err(e) => {
                error!(material_id, error = %e, "could not read practice records");
                return None;
            }
        };

        let aggregation = self.aggregate_records(material_id, &title, class_ids.len(), &records);
        match &aggregation {
            Some(a) => info!(
                material_id,
                spots = a.top_weak_spots.len(),
                "class weak spots ready"
            ),
            None => warn!(material_id, "no weak-spot data for class"),
        }
        aggregation
    }
}

/// Map each spot to the eight-bar window holding its centre bar, dropping
/// duplicate windows. The first spot to claim a window sets its difficulty.
pub fn normalize_to_eight_bar_sections(spots: &[AggregatedWeakSpot]) -> Vec<PracticeSection> {
    let mut sections: Vec<PracticeSection> = Vec::new();
    for spot in spots {
        let centre = (spot.start_bar + spot.end_bar) / 2;
        let start_bar = (centre.saturating_sub(1) / 8 * 8 + 1).max(1);
        let end_bar = start_bar + 7;
        if !sections
            .iter()
            .any(|s| s.start_bar == start_bar && s.end_bar == end_bar)
        {
            sections.push(PracticeSection {
                start_bar,
                end_bar,
                difficulty: spot.difficulty,
            });
        }
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::LoopEvent;

    fn spot(start_bar: u32, end_bar: u32, loop_count: u32) -> LoopEvent {
        LoopEvent {
            start_bar,
            end_bar,
            loop_count,
            last_practiced_at: String::new(),
        }
    }

    fn record(student: &str, events: Vec<LoopEvent>) -> PracticeRecord {
        PracticeRecord {
            student_id: student.to_string(),
            instrument: Some("piano".to_string()),
            target_tempo: Some(100),
            weak_spots: Some(events),
        }
    }

    #[test]
    fn test_two_of_four_students() {
        let records = vec![
            record("s1", vec![spot(1, 4, 5)]),
            record("s2", vec![spot(1, 4, 3)]),
            record("s3", vec![spot(9, 12, 1)]),
            record("s4", vec![spot(13, 16, 1)]),
        ];
        let result = WeakSpotAggregator::default()
            .aggregate_records("m1", "Etude", 4, &records)
            .unwrap();

        let first = &result.top_weak_spots[0];
        assert_eq!((first.start_bar, first.end_bar), (1, 4));
        assert_eq!(first.total_loop_count, 8);
        assert_eq!(first.affected_student_count, 2);
        assert_eq!(first.avg_loop_count, 4.0);
        assert_eq!(first.difficulty, WeakSpotDifficulty::Medium);
        assert_eq!(result.students_with_metrics, 4);
    }

    #[test]
    fn test_high_difficulty() {
        let records = vec![
            record("s1", vec![spot(5, 8, 6)]),
            record("s2", vec![spot(5, 8, 6)]),
        ];
        let result = WeakSpotAggregator::default()
            .aggregate_records("m1", "Etude", 2, &records)
            .unwrap();
        assert_eq!(result.top_weak_spots[0].difficulty, WeakSpotDifficulty::High);
    }

    #[test]
    fn test_student_counted_once_per_key() {
        let records = vec![
            record("s1", vec![spot(1, 4, 2), spot(1, 4, 3)]),
            record("s1", vec![spot(1, 4, 1)]),
        ];
        let result = WeakSpotAggregator::default()
            .aggregate_records("m1", "Etude", 1, &records)
            .unwrap();
        let first = &result.top_weak_spots[0];
        assert_eq!(first.total_loop_count, 6);
        assert_eq!(first.affected_student_count, 1);
        assert_eq!(first.avg_loop_count, 6.0);
    }

    #[test]
    fn test_exact_keys_not_merged() {
        let records = vec![record("s1", vec![spot(1, 4, 2), spot(2, 4, 2)])];
        let result = WeakSpotAggregator::default()
            .aggregate_records("m1", "Etude", 1, &records)
            .unwrap();
        assert_eq!(result.top_weak_spots.len(), 2);
    }

    #[test]
    fn test_top_five_ordering() {
        let records: Vec<PracticeRecord> = (0..10)
            .map(|i| {
                let events = (0..=i).map(|bar| spot(bar * 4 + 1, bar * 4 + 4, 1 + bar)).collect();
                record(&format!("s{}", i), events)
            })
            .collect();
        let result = WeakSpotAggregator::default()
            .aggregate_records("m1", "Etude", 10, &records)
            .unwrap();

        let spots = &result.top_weak_spots;
        assert_eq!(spots.len(), 5);
        for pair in spots.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let key_a = (a.difficulty, a.affected_student_count, a.total_loop_count);
            let key_b = (b.difficulty, b.affected_student_count, b.total_loop_count);
            assert!(key_a > key_b);
        }
    }

    #[test]
    fn test_no_weak_spot_data() {
        let records = vec![
            PracticeRecord {
                student_id: "s1".to_string(),
                instrument: None,
                target_tempo: None,
                weak_spots: None,
            },
            record("s2", vec![]),
        ];
        assert!(WeakSpotAggregator::default()
            .aggregate_records("m1", "Etude", 2, &records)
            .is_none());
    }

    #[test]
    fn test_instrument_and_tempo() {
        let mut records = vec![
            record("s1", vec![spot(1, 4, 1)]),
            record("s2", vec![spot(1, 4, 1)]),
            record("s3", vec![spot(1, 4, 1)]),
        ];
        records[0].instrument = Some("violin".to_string());
        records[1].instrument = Some("violin".to_string());
        records[2].target_tempo = Some(121);
        let result = WeakSpotAggregator::default()
            .aggregate_records("m1", "Etude", 3, &records)
            .unwrap();
        assert_eq!(result.instrument, "violin");
        assert_eq!(result.target_tempo, 107);
    }

    #[test]
    fn test_defaults_without_instrument_or_tempo() {
        let records = vec![PracticeRecord {
            student_id: "s1".to_string(),
            instrument: None,
            target_tempo: Some(0),
            weak_spots: Some(vec![spot(1, 4, 1)]),
        }];
        let result = WeakSpotAggregator::default()
            .aggregate_records("m1", "Etude", 1, &records)
            .unwrap();
        assert_eq!(result.instrument, "piano");
        assert_eq!(result.target_tempo, 120);
    }

    #[test]
    fn test_configured_thresholds() {
        let config = AggregationConfig {
            medium_avg_loops: 2.0,
            top_n: 1,
            ..AggregationConfig::default()
        };
        let aggregator = WeakSpotAggregator::new(config);
        assert_eq!(aggregator.classify(0.1, 2.5), WeakSpotDifficulty::Medium);
        assert_eq!(
            WeakSpotAggregator::default().classify(0.1, 2.5),
            WeakSpotDifficulty::Low
        );
    }

    #[test]
    fn test_eight_bar_sections() {
        let make = |start_bar, end_bar, difficulty| AggregatedWeakSpot {
            start_bar,
            end_bar,
            total_loop_count: 1,
            affected_student_count: 1,
            avg_loop_count: 1.0,
            difficulty,
        };
        let sections = normalize_to_eight_bar_sections(&[
            make(3, 6, WeakSpotDifficulty::High),
            make(1, 2, WeakSpotDifficulty::Low),
            make(10, 12, WeakSpotDifficulty::Medium),
            make(16, 18, WeakSpotDifficulty::Low),
        ]);
        assert_eq!(
            sections,
            vec![
                PracticeSection { start_bar: 1, end_bar: 8, difficulty: WeakSpotDifficulty::High },
                PracticeSection { start_bar: 9, end_bar: 16, difficulty: WeakSpotDifficulty::Medium },
                PracticeSection { start_bar: 17, end_bar: 24, difficulty: WeakSpotDifficulty::Low },
            ]
        );
    }

    #[test]
    fn test_empty_lists_count_toward_ratio() {
        let records = vec![
            record("s1", vec![spot(1, 4, 6)]),
            record("s2", vec![]),
            record("s3", vec![]),
            PracticeRecord {
                student_id: "s4".to_string(),
                instrument: Some("violin".to_string()),
                target_tempo: None,
                weak_spots: None,
            },
        ];
        let result = WeakSpotAggregator::default()
            .aggregate_records("m1", "Etude", 4, &records)
            .unwrap();

        assert_eq!(result.students_with_metrics, 3);
        let first = &result.top_weak_spots[0];
        assert_eq!(first.affected_student_count, 1);
        // 1 of 3 students is below the high ratio
        assert_eq!(first.difficulty, WeakSpotDifficulty::Medium);
        // s4 has no telemetry, so its instrument is not counted
        assert_eq!(result.instrument, "piano");
    }

    #[test]
    fn test_instrument_from_students_with_empty_lists() {
        let mut records = vec![
            record("s1", vec![spot(1, 4, 2)]),
            record("s2", vec![]),
            record("s3", vec![]),
        ];
        records[1].instrument = Some("cello".to_string());
        records[2].instrument = Some("cello".to_string());
        let result = WeakSpotAggregator::default()
            .aggregate_records("m1", "Etude", 3, &records)
            .unwrap();
        assert_eq!(result.instrument, "cello");
    }

    #[test]
    fn test_loop_count_saturates() {
        let records = vec![
            record("s1", vec![spot(1, 4, u32::MAX)]),
            record("s2", vec![spot(1, 4, 10)]),
        ];
        let result = WeakSpotAggregator::default()
            .aggregate_records("m1", "Etude", 2, &records)
            .unwrap();
        assert_eq!(result.top_weak_spots[0].total_loop_count, u32::MAX);
    }
}
