use ulid::Ulid;

use crate::model::*;

/// Filter object for reservation queries.
///
/// The period match is a three-way disjunction so it degrades gracefully
/// when only one bound is supplied:
///
/// - both bounds: start in `[from, to]`, or end in `[from, to]`, or the
///   reservation spans the whole range (`start < from && end > to`);
/// - `from` only: start or end at/after `from`;
/// - `to` only: start or end at/before `to`;
/// - neither: every reservation of the room.
///
/// All comparisons are inclusive, so touching endpoints overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationFilter {
    pub room_id: Ulid,
    pub period: Period,
    pub include_canceled: bool,
    /// Skip this reservation (used when re-validating an update).
    pub exclude: Option<Ulid>,
}

impl ReservationFilter {
    /// Active reservations of `room_id` intersecting `period`.
    pub fn overlapping(room_id: Ulid, period: Period) -> Self {
        Self {
            room_id,
            period,
            include_canceled: false,
            exclude: None,
        }
    }

    pub fn excluding(mut self, id: Ulid) -> Self {
        self.exclude = Some(id);
        self
    }

    pub fn with_canceled(mut self) -> Self {
        self.include_canceled = true;
        self
    }

    pub fn matches(&self, r: &Reservation) -> bool {
        if r.room_id != self.room_id {
            return false;
        }
        if !self.include_canceled && r.is_canceled {
            return false;
        }
        if self.exclude == Some(r.id) {
            return false;
        }
        period_matches(&self.period, r.rented_from, r.rented_to)
    }
}

fn period_matches(period: &Period, start: Ms, end: Ms) -> bool {
    let within = |t: Ms, from: Ms, to: Ms| from <= t && t <= to;
    match (period.from, period.to) {
        (Some(from), Some(to)) => {
            within(start, from, to) || within(end, from, to) || (start < from && end > to)
        }
        (Some(from), None) => start >= from || end >= from,
        (None, Some(to)) => start <= to || end <= to,
        (None, None) => true,
    }
}

/// Deterministic ordering for query results.
pub(crate) fn sort_reservations(reservations: &mut [Reservation]) {
    reservations.sort_by(|a, b| {
        a.rented_from
            .cmp(&b.rented_from)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dates::{DAY_MS, end_of_day};

    // 2024-01-01T00:00:00Z
    const JAN_1: Ms = 1_704_067_200_000;

    fn day(n: i64) -> Ms {
        JAN_1 + (n - 1) * DAY_MS
    }

    fn booked(room_id: Ulid, from_day: i64, to_day: i64) -> Reservation {
        Reservation {
            id: Ulid::new(),
            room_id,
            rented_from: day(from_day),
            rented_to: end_of_day(day(to_day)),
            is_canceled: false,
        }
    }

    fn query(from_day: i64, to_day: i64) -> Period {
        Period::between(day(from_day), end_of_day(day(to_day)))
    }

    #[test]
    fn partial_overlap_start_before() {
        let room = Ulid::new();
        let a = booked(room, 1, 5);
        assert!(ReservationFilter::overlapping(room, query(3, 10)).matches(&a));
    }

    #[test]
    fn partial_overlap_end_after() {
        let room = Ulid::new();
        let a = booked(room, 8, 12);
        assert!(ReservationFilter::overlapping(room, query(3, 10)).matches(&a));
    }

    #[test]
    fn span_over_query() {
        let room = Ulid::new();
        let a = booked(room, 1, 10);
        assert!(ReservationFilter::overlapping(room, query(3, 5)).matches(&a));
    }

    #[test]
    fn contained_in_query() {
        let room = Ulid::new();
        let a = booked(room, 4, 4);
        assert!(ReservationFilter::overlapping(room, query(3, 5)).matches(&a));
    }

    #[test]
    fn adjacent_day_does_not_overlap() {
        let room = Ulid::new();
        let a = booked(room, 1, 5);
        assert!(!ReservationFilter::overlapping(room, query(6, 10)).matches(&a));
    }

    #[test]
    fn touching_endpoint_overlaps() {
        let room = Ulid::new();
        let a = booked(room, 1, 5);
        let period = Period::between(a.rented_to, a.rented_to + DAY_MS);
        assert!(ReservationFilter::overlapping(room, period).matches(&a));
    }

    #[test]
    fn other_room_never_matches() {
        let a = booked(Ulid::new(), 1, 5);
        assert!(!ReservationFilter::overlapping(Ulid::new(), query(1, 5)).matches(&a));
    }

    #[test]
    fn canceled_excluded_unless_requested() {
        let room = Ulid::new();
        let mut a = booked(room, 1, 5);
        a.is_canceled = true;
        let filter = ReservationFilter::overlapping(room, query(1, 5));
        assert!(!filter.matches(&a));
        assert!(filter.with_canceled().matches(&a));
    }

    #[test]
    fn excluded_id_skipped() {
        let room = Ulid::new();
        let a = booked(room, 1, 5);
        let filter = ReservationFilter::overlapping(room, query(1, 5));
        assert!(!filter.excluding(a.id).matches(&a));
        assert!(filter.excluding(Ulid::new()).matches(&a));
    }

    #[test]
    fn from_only_bound() {
        let room = Ulid::new();
        let before = booked(room, 1, 2);
        let straddling = booked(room, 2, 4);
        let after = booked(room, 5, 6);
        let filter = ReservationFilter::overlapping(room, Period::new(Some(day(3)), None));
        assert!(!filter.matches(&before));
        assert!(filter.matches(&straddling));
        assert!(filter.matches(&after));
    }

    #[test]
    fn to_only_bound() {
        let room = Ulid::new();
        let before = booked(room, 1, 2);
        let straddling = booked(room, 2, 4);
        let after = booked(room, 5, 6);
        let filter =
            ReservationFilter::overlapping(room, Period::new(None, Some(end_of_day(day(3)))));
        assert!(filter.matches(&before));
        assert!(filter.matches(&straddling));
        assert!(!filter.matches(&after));
    }

    #[test]
    fn unbounded_matches_all_active() {
        let room = Ulid::new();
        let filter = ReservationFilter::overlapping(room, Period::unbounded());
        assert!(filter.matches(&booked(room, 1, 1)));
        assert!(filter.matches(&booked(room, 300, 400)));
    }

    #[test]
    fn sort_by_start_then_id() {
        let room = Ulid::new();
        let mut rs = vec![booked(room, 9, 9), booked(room, 1, 1), booked(room, 5, 5)];
        sort_reservations(&mut rs);
        assert_eq!(rs[0].rented_from, day(1));
        assert_eq!(rs[1].rented_from, day(5));
        assert_eq!(rs[2].rented_from, day(9));
    }
}
