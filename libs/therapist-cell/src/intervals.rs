//! Set operations over same-day `TimeRange`s.
//!
//! Every function returns a normalized list: sorted by start, pairwise
//! non-overlapping, with touching ranges merged.

use chrono::Duration;

use crate::models::TimeRange;

pub fn normalize(mut ranges: Vec<TimeRange>) -> Vec<TimeRange> {
    ranges.retain(|r| r.start < r.end);
    ranges.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => {
                if range.end > last.end {
                    last.end = range.end;
                }
            }
            _ => merged.push(range),
        }
    }
    merged
}

pub fn union(base: &[TimeRange], extra: &[TimeRange]) -> Vec<TimeRange> {
    normalize(base.iter().chain(extra.iter()).copied().collect())
}

/// `base` with every part covered by `cut` removed.
pub fn subtract(base: &[TimeRange], cut: &[TimeRange]) -> Vec<TimeRange> {
    let cut = normalize(cut.to_vec());
    let mut result = Vec::new();

    for range in normalize(base.to_vec()) {
        let mut cursor = range.start;
        for hole in cut.iter().filter(|c| c.overlaps(&range)) {
            if hole.start > cursor {
                result.push(TimeRange { start: cursor, end: hole.start });
            }
            if hole.end > cursor {
                cursor = hole.end;
            }
        }
        if cursor < range.end {
            result.push(TimeRange { start: cursor, end: range.end });
        }
    }

    normalize(result)
}

/// True when `wanted` lies entirely inside one of `free`.
pub fn covers(free: &[TimeRange], wanted: &TimeRange) -> bool {
    normalize(free.to_vec()).iter().any(|r| r.contains(wanted))
}

/// Cuts each range into consecutive fixed-length slots; leftovers shorter
/// than a slot are dropped.
pub fn split_into_slots(ranges: &[TimeRange], slot_minutes: i64) -> Vec<TimeRange> {
    if slot_minutes <= 0 {
        return Vec::new();
    }
    let step = Duration::minutes(slot_minutes);
    let mut slots = Vec::new();

    for range in normalize(ranges.to_vec()) {
        let mut start = range.start;
        loop {
            let (end, wrapped) = start.overflowing_add_signed(step);
            if wrapped != 0 || end > range.end || end <= start {
                break;
            }
            slots.push(TimeRange { start, end });
            start = end;
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(a: (u32, u32), b: (u32, u32)) -> TimeRange {
        TimeRange::hm(a, b)
    }

    #[test]
    fn normalize_sorts_and_merges() {
        let out = normalize(vec![r((13, 0), (14, 0)), r((9, 0), (10, 0)), r((9, 30), (11, 0)), r((11, 0), (11, 30))]);
        assert_eq!(out, vec![r((9, 0), (11, 30)), r((13, 0), (14, 0))]);
    }

    #[test]
    fn subtract_punches_holes() {
        let out = subtract(&[r((9, 0), (12, 0))], &[r((10, 0), (10, 30))]);
        assert_eq!(out, vec![r((9, 0), (10, 0)), r((10, 30), (12, 0))]);
    }

    #[test]
    fn subtract_handles_edges_and_total_cover() {
        assert_eq!(subtract(&[r((9, 0), (12, 0))], &[r((8, 0), (9, 30))]), vec![r((9, 30), (12, 0))]);
        assert_eq!(subtract(&[r((9, 0), (12, 0))], &[r((11, 0), (13, 0))]), vec![r((9, 0), (11, 0))]);
        assert!(subtract(&[r((9, 0), (12, 0))], &[r((8, 0), (13, 0))]).is_empty());
        assert_eq!(
            subtract(&[r((9, 0), (12, 0))], &[r((9, 30), (10, 0)), r((9, 45), (10, 30))]),
            vec![r((9, 0), (9, 30)), r((10, 30), (12, 0))]
        );
    }

    #[test]
    fn covers_requires_single_containing_range() {
        let free = vec![r((9, 0), (10, 0)), r((10, 30), (12, 0))];
        assert!(covers(&free, &r((10, 30), (11, 30))));
        assert!(!covers(&free, &r((9, 30), (10, 45))));
    }

    #[test]
    fn slots_drop_short_leftovers() {
        let slots = split_into_slots(&[r((9, 0), (10, 45))], 30);
        assert_eq!(slots, vec![r((9, 0), (9, 30)), r((9, 30), (10, 0)), r((10, 0), (10, 30))]);
        assert!(split_into_slots(&[r((9, 0), (10, 0))], 0).is_empty());
    }

    #[test]
    fn results_are_sorted_and_disjoint() {
        let base = vec![r((8, 0), (12, 0)), r((13, 0), (18, 0))];
        let cut = vec![r((9, 0), (9, 15)), r((11, 50), (13, 10)), r((17, 0), (19, 0))];
        let out = subtract(&base, &cut);
        for pair in out.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }
}
