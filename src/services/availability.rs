//! Slot arithmetic over business hours and busy intervals.
//!
//! A slot is offered when an eligible professional has no overlapping
//! blocking booking and the unassigned bookings in that window do not use up
//! the professionals who are still free. A business without active
//! professionals is a single resource.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::TimeBlock;
use crate::utils::dates::local_to_utc;

/// Spacing between candidate start times.
pub const SLOT_STEP_MINUTES: i64 = 30;
/// Minimum notice for public bookings.
pub const PUBLIC_NOTICE_MINUTES: i64 = 30;
/// Longest range accepted by full-date lookups.
pub const MAX_RANGE_DAYS: i64 = 92;

/// Time already taken by an appointment or a pending public booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyInterval {
    pub professional_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn new(professional_id: Option<Uuid>, start: DateTime<Utc>, duration_minutes: i32) -> Self {
        Self {
            professional_id,
            start,
            end: start + Duration::minutes(duration_minutes.max(1) as i64),
        }
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// Whether `[start, end)` can take one more booking.
pub fn is_interval_free(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    professional: Option<Uuid>,
    professionals: &[Uuid],
    busy: &[BusyInterval],
) -> bool {
    let overlapping: Vec<&BusyInterval> = busy.iter().filter(|b| b.overlaps(start, end)).collect();

    if professionals.is_empty() {
        return overlapping.is_empty();
    }

    let unassigned = overlapping.iter().filter(|b| b.professional_id.is_none()).count();
    let taken: HashSet<Uuid> = overlapping.iter().filter_map(|b| b.professional_id).collect();
    let free = professionals.iter().filter(|p| !taken.contains(p)).count();

    match professional {
        Some(p) => {
            let extra = usize::from(!professionals.contains(&p));
            !taken.contains(&p) && unassigned < free + extra
        }
        None => unassigned < free,
    }
}

/// Start times every [`SLOT_STEP_MINUTES`] inside each block such that the
/// whole service fits before the block closes.
pub fn candidate_starts(
    date: NaiveDate,
    blocks: &[TimeBlock],
    offset: FixedOffset,
    duration_minutes: i64,
) -> Vec<DateTime<Utc>> {
    let duration = Duration::minutes(duration_minutes.max(1));
    let step = Duration::minutes(SLOT_STEP_MINUTES);
    let mut starts = Vec::new();

    for block in blocks {
        let block_start = local_to_utc(date, block.start, offset);
        let block_end = local_to_utc(date, block.end, offset);
        let mut t = block_start;
        while t + duration <= block_end {
            starts.push(t);
            t += step;
        }
    }

    starts.sort();
    starts.dedup();
    starts
}

#[derive(Debug, Clone)]
pub struct SlotSearch<'a> {
    pub date: NaiveDate,
    pub blocks: &'a [TimeBlock],
    pub offset: FixedOffset,
    pub professionals: &'a [Uuid],
    pub busy: &'a [BusyInterval],
    pub professional: Option<Uuid>,
    pub duration_minutes: i64,
    /// Staff requests keep slots that already started so walk-ins can be registered.
    pub is_professional: bool,
    pub now: DateTime<Utc>,
}

/// Open start times for the day, as business-local `NaiveTime`s.
pub fn available_slots(search: &SlotSearch<'_>) -> Vec<NaiveTime> {
    let earliest = search.now + Duration::minutes(PUBLIC_NOTICE_MINUTES);
    let duration = Duration::minutes(search.duration_minutes.max(1));

    candidate_starts(search.date, search.blocks, search.offset, search.duration_minutes)
        .into_iter()
        .filter(|start| search.is_professional || *start >= earliest)
        .filter(|start| {
            is_interval_free(
                *start,
                *start + duration,
                search.professional,
                search.professionals,
                search.busy,
            )
        })
        .map(|start| start.with_timezone(&search.offset).time())
        .collect()
}

/// Professional candidate for automatic assignment.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Candidate {
    pub id: Uuid,
    pub name: String,
    pub appointments_that_day: i64,
}

/// Free professional with the lightest day; ties go to the first name.
/// `None` when unassigned bookings already claim every free professional.
pub fn pick_first_available(
    candidates: &[Candidate],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    busy: &[BusyInterval],
) -> Option<Uuid> {
    let ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
    if !is_interval_free(start, end, None, &ids, busy) {
        return None;
    }

    candidates
        .iter()
        .filter(|c| is_interval_free(start, end, Some(c.id), &ids, busy))
        .min_by(|a, b| {
            a.appointments_that_day
                .cmp(&b.appointments_that_day)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        })
        .map(|c| c.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day().and_time(t(h, m)))
    }

    fn block(start: (u32, u32), end: (u32, u32)) -> TimeBlock {
        TimeBlock { start: t(start.0, start.1), end: t(end.0, end.1) }
    }

    fn search<'a>(
        blocks: &'a [TimeBlock],
        professionals: &'a [Uuid],
        busy: &'a [BusyInterval],
    ) -> SlotSearch<'a> {
        SlotSearch {
            date: day(),
            blocks,
            offset: utc(),
            professionals,
            busy,
            professional: None,
            duration_minutes: 30,
            is_professional: true,
            now: at(0, 0),
        }
    }

    #[test]
    fn candidates_fit_inside_blocks() {
        let blocks = [block((9, 0), (10, 30)), block((14, 0), (15, 0))];
        let starts = candidate_starts(day(), &blocks, utc(), 60);
        assert_eq!(starts, vec![at(9, 0), at(9, 30), at(14, 0)]);
    }

    #[test]
    fn candidates_respect_business_offset() {
        let brt = FixedOffset::west_opt(3 * 3600).unwrap();
        let blocks = [block((9, 0), (10, 0))];
        let starts = candidate_starts(day(), &blocks, brt, 30);
        assert_eq!(starts, vec![at(12, 0), at(12, 30)]);
    }

    #[test]
    fn single_resource_business() {
        let blocks = [block((9, 0), (11, 0))];
        let busy = [BusyInterval::new(None, at(9, 30), 60)];
        let slots = available_slots(&search(&blocks, &[], &busy));
        // Half-open intervals: 10:30 starts exactly when the booking ends.
        assert_eq!(slots, vec![t(9, 0), t(10, 30)]);
    }

    #[test]
    fn professional_specific_availability() {
        let ana = Uuid::new_v4();
        let bia = Uuid::new_v4();
        let pros = [ana, bia];
        let blocks = [block((9, 0), (10, 0))];
        let busy = [BusyInterval::new(Some(ana), at(9, 0), 30)];

        let mut s = search(&blocks, &pros, &busy);
        s.professional = Some(ana);
        assert_eq!(available_slots(&s), vec![t(9, 30)]);

        s.professional = Some(bia);
        assert_eq!(available_slots(&s), vec![t(9, 0), t(9, 30)]);

        s.professional = None;
        assert_eq!(available_slots(&s), vec![t(9, 0), t(9, 30)]);
    }

    #[test]
    fn unassigned_bookings_consume_capacity() {
        let ana = Uuid::new_v4();
        let bia = Uuid::new_v4();
        let pros = [ana, bia];
        let busy = [
            BusyInterval::new(Some(ana), at(9, 0), 30),
            BusyInterval::new(None, at(9, 0), 30),
        ];

        assert!(!is_interval_free(at(9, 0), at(9, 30), None, &pros, &busy));
        assert!(!is_interval_free(at(9, 0), at(9, 30), Some(bia), &pros, &busy));
        assert!(is_interval_free(at(9, 30), at(10, 0), Some(ana), &pros, &busy));
    }

    #[test]
    fn public_requests_need_notice() {
        let blocks = [block((9, 0), (11, 0))];
        let mut s = search(&blocks, &[], &[]);
        s.now = at(9, 10);

        assert_eq!(available_slots(&s).len(), 4);

        s.is_professional = false;
        assert_eq!(available_slots(&s), vec![t(10, 0), t(10, 30)]);
    }

    #[test]
    fn first_available_prefers_lightest_day_then_name() {
        let ana = Candidate { id: Uuid::new_v4(), name: "Ana".into(), appointments_that_day: 3 };
        let bruno = Candidate { id: Uuid::new_v4(), name: "Bruno".into(), appointments_that_day: 1 };
        let caio = Candidate { id: Uuid::new_v4(), name: "caio".into(), appointments_that_day: 1 };
        let candidates = vec![ana.clone(), caio.clone(), bruno.clone()];

        assert_eq!(pick_first_available(&candidates, at(9, 0), at(9, 30), &[]), Some(bruno.id));

        let busy = [BusyInterval::new(Some(bruno.id), at(9, 0), 30)];
        assert_eq!(pick_first_available(&candidates, at(9, 0), at(9, 30), &busy), Some(caio.id));

        let full = [
            BusyInterval::new(None, at(9, 0), 30),
            BusyInterval::new(None, at(9, 0), 30),
            BusyInterval::new(None, at(9, 0), 30),
        ];
        assert_eq!(pick_first_available(&candidates, at(9, 0), at(9, 30), &full), None);
    }
}
