use chrono::NaiveDateTime;
use serde::Serialize;
use crate::models::{Booking, BookingStatus};

/// Bookings created within this many milliseconds of each other (same
/// field, user, and status) are shown as one checkout session.
pub const SESSION_WINDOW_MS: i64 = 60_000;

#[derive(Debug, Serialize)]
pub struct BookingSession {
    pub field_id: i32,
    pub user_id: i32,
    pub status: BookingStatus,
    /// `created_at` of the session's first (earliest) member.
    pub created_at: NaiveDateTime,
    pub total_amount: i64,
    pub total_hours: i64,
    pub bookings: Vec<Booking>,
}

fn same_session(first: &Booking, candidate: &Booking) -> bool {
    first.field_id == candidate.field_id
        && first.user_id == candidate.user_id
        && first.status == candidate.status
        && (candidate.created_at - first.created_at).num_milliseconds() < SESSION_WINDOW_MS
}

/// Cluster a flat booking list into checkout sessions.
///
/// Greedy single pass over the bookings sorted by `created_at`: each
/// booking joins the first group whose *first member* it matches on
/// field/user/status and creation-time window, otherwise it opens a new
/// group. A booking never moves once assigned. The window is measured
/// against the group's first member, not its latest, so a burst longer
/// than the window splits at the first booking past it.
///
/// Groups come back newest-first by their first member's `created_at`.
pub fn group_sessions(mut bookings: Vec<Booking>) -> Vec<BookingSession> {
    bookings.sort_by_key(|b| b.created_at);

    let mut groups: Vec<Vec<Booking>> = Vec::new();
    for booking in bookings {
        match groups.iter_mut().find(|g| same_session(&g[0], &booking)) {
            Some(group) => group.push(booking),
            None => groups.push(vec![booking]),
        }
    }

    groups.sort_by(|a, b| b[0].created_at.cmp(&a[0].created_at));

    groups
        .into_iter()
        .map(|members| BookingSession {
            field_id: members[0].field_id,
            user_id: members[0].user_id,
            status: members[0].status,
            created_at: members[0].created_at,
            total_amount: members.iter().map(|b| b.amount_paid).sum(),
            total_hours: members
                .iter()
                .map(|b| (b.end_time - b.start_time).num_hours())
                .sum(),
            bookings: members,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentType;
    use chrono::{Duration, NaiveDate};

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn booking(id: i32, field_id: i32, status: BookingStatus, created_offset_ms: i64) -> Booking {
        let start = base_time() + Duration::hours(1);
        Booking {
            booking_id: id,
            user_id: 1,
            field_id,
            status,
            payment_type: PaymentType::DEPOSIT,
            start_time: start,
            end_time: start + Duration::hours(2),
            amount_paid: 60_000,
            proof_image_url: None,
            created_at: base_time() + Duration::milliseconds(created_offset_ms),
        }
    }

    #[test]
    fn bookings_inside_window_merge() {
        let sessions = group_sessions(vec![
            booking(1, 1, BookingStatus::PENDING, 0),
            booking(2, 1, BookingStatus::PENDING, 59_999),
        ]);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].bookings.len(), 2);
        assert_eq!(sessions[0].total_amount, 120_000);
        assert_eq!(sessions[0].total_hours, 4);
    }

    #[test]
    fn bookings_outside_window_split() {
        let sessions = group_sessions(vec![
            booking(1, 1, BookingStatus::PENDING, 0),
            booking(2, 1, BookingStatus::PENDING, 61_000),
        ]);
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn mismatched_attributes_never_merge() {
        let sessions = group_sessions(vec![
            booking(1, 1, BookingStatus::PENDING, 0),
            booking(2, 2, BookingStatus::PENDING, 100),
            booking(3, 1, BookingStatus::APPROVED, 200),
        ]);
        assert_eq!(sessions.len(), 3);
    }

    #[test]
    fn window_is_anchored_on_first_member() {
        // 0ms and 40s merge; 80s is within 40s of the second booking but
        // past the window of the first, so it opens a new session.
        let sessions = group_sessions(vec![
            booking(1, 1, BookingStatus::PENDING, 0),
            booking(2, 1, BookingStatus::PENDING, 40_000),
            booking(3, 1, BookingStatus::PENDING, 80_000),
        ]);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[1].bookings.len(), 2);
        assert_eq!(sessions[0].bookings.len(), 1);
    }

    #[test]
    fn sessions_are_ordered_newest_first() {
        let sessions = group_sessions(vec![
            booking(1, 1, BookingStatus::PENDING, 0),
            booking(2, 1, BookingStatus::PENDING, 300_000),
            booking(3, 1, BookingStatus::PENDING, 150_000),
        ]);
        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0].bookings[0].booking_id, 2);
        assert_eq!(sessions[1].bookings[0].booking_id, 3);
        assert_eq!(sessions[2].bookings[0].booking_id, 1);
    }

    #[test]
    fn unsorted_input_is_sorted_before_grouping() {
        let sessions = group_sessions(vec![
            booking(2, 1, BookingStatus::PENDING, 30_000),
            booking(1, 1, BookingStatus::PENDING, 0),
        ]);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].bookings[0].booking_id, 1);
        assert_eq!(sessions[0].created_at, base_time());
    }
}
