use serde::{Deserialize, Serialize};
use crate::schema::{bookings, fields, users};
use chrono::NaiveDateTime;
use diesel::{deserialize::{self, FromSql}, pg::{Pg, PgValue}, serialize::{self, Output, ToSql}, sql_types::Text, AsChangeset, Insertable, Selectable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::BookingStatus)]
pub enum BookingStatus {
    PENDING,
    APPROVED,
    REJECTED,
    COMPLETED,
    CANCELLED,
}

impl ToSql<crate::schema::sql_types::BookingStatus, Pg> for BookingStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            BookingStatus::PENDING => "PENDING",
            BookingStatus::APPROVED => "APPROVED",
            BookingStatus::REJECTED => "REJECTED",
            BookingStatus::COMPLETED => "COMPLETED",
            BookingStatus::CANCELLED => "CANCELLED",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::BookingStatus, Pg> for BookingStatus {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "PENDING" => Ok(BookingStatus::PENDING),
            "APPROVED" => Ok(BookingStatus::APPROVED),
            "REJECTED" => Ok(BookingStatus::REJECTED),
            "COMPLETED" => Ok(BookingStatus::COMPLETED),
            "CANCELLED" => Ok(BookingStatus::CANCELLED),
            s => Err(format!("Unrecognized booking status: {}", s).into()),
        }
    }
}

impl BookingStatus {
    /// Legal admin transitions. Terminal states have no outgoing moves.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (PENDING, APPROVED)
                | (PENDING, REJECTED)
                | (PENDING, CANCELLED)
                | (APPROVED, COMPLETED)
                | (APPROVED, CANCELLED)
        )
    }

    /// Statuses that hold a time slot on the calendar. Rejected and
    /// cancelled bookings free their window.
    pub fn slot_blocking() -> [BookingStatus; 3] {
        [BookingStatus::PENDING, BookingStatus::APPROVED, BookingStatus::COMPLETED]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::PaymentType)]
pub enum PaymentType {
    FULL,
    DEPOSIT,
}

impl ToSql<crate::schema::sql_types::PaymentType, Pg> for PaymentType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            PaymentType::FULL => "FULL",
            PaymentType::DEPOSIT => "DEPOSIT",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::PaymentType, Pg> for PaymentType {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "FULL" => Ok(PaymentType::FULL),
            "DEPOSIT" => Ok(PaymentType::DEPOSIT),
            s => Err(format!("Unrecognized payment type: {}", s).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::UserRole)]
pub enum UserRole {
    ADMIN,
    USER,
}

impl ToSql<crate::schema::sql_types::UserRole, Pg> for UserRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            UserRole::ADMIN => "ADMIN",
            UserRole::USER => "USER",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::UserRole, Pg> for UserRole {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "ADMIN" => Ok(UserRole::ADMIN),
            "USER" => Ok(UserRole::USER),
            s => Err(format!("Unrecognized user role: {}", s).into()),
        }
    }
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize, Selectable)]
#[diesel(table_name = fields)]
pub struct Field {
    pub field_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price_per_hour: i64,
    pub image_url: Option<String>,
    pub capacity: i32,
    pub amenities: Vec<String>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Insertable, Deserialize)]
#[diesel(table_name = fields)]
pub struct NewField {
    pub name: String,
    pub description: Option<String>,
    pub price_per_hour: i64,
    pub image_url: Option<String>,
    pub capacity: i32,
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, AsChangeset, Deserialize)]
#[diesel(table_name = fields)]
pub struct UpdateField {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_per_hour: Option<i64>,
    pub image_url: Option<String>,
    pub capacity: Option<i32>,
    pub amenities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize, Selectable)]
#[diesel(table_name = bookings)]
pub struct Booking {
    pub booking_id: i32,
    pub user_id: i32,
    pub field_id: i32,
    pub status: BookingStatus,
    pub payment_type: PaymentType,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub amount_paid: i64,
    pub proof_image_url: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bookings)]
pub struct NewBooking {
    pub user_id: i32,
    pub field_id: i32,
    pub status: BookingStatus,
    pub payment_type: PaymentType,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub amount_paid: i64,
}

// Request/Response models for API

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: i32,
    pub field_id: i32,
    pub start: String,
    pub end: String,
    pub payment_type: PaymentType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiSlotBookingRequest {
    pub user_id: i32,
    pub field_id: i32,
    pub slots: Vec<SlotRange>,
    pub payment_type: PaymentType,
}

#[derive(Debug, Deserialize)]
pub struct PaymentProofRequest {
    pub proof_image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct UserBookingsQuery {
    pub user_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct AdminBookingsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<BookingStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateBookingResponse {
    pub booking_ids: Vec<i32>,
    pub status: BookingStatus,
    pub total: i64,
    pub deposit: i64,
    pub remaining: i64,
    pub amount_paid: i64,
    pub message: String,
}

/// Booking joined with the user and field it references, for admin listings.
#[derive(Debug, Clone, Serialize)]
pub struct AdminBooking {
    #[serde(flatten)]
    pub booking: Booking,
    pub user_name: String,
    pub user_email: String,
    pub field_name: String,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub completed: i64,
    pub cancelled: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminBookingsResponse {
    pub bookings: Vec<AdminBooking>,
    pub pagination: Pagination,
    pub status_counts: StatusCounts,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub total_bookings: i64,
    pub status_counts: StatusCounts,
    pub total_fields: i64,
    pub total_users: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::BookingStatus::{self, *};

    #[test]
    fn legal_transitions_are_allowed() {
        assert!(PENDING.can_transition_to(APPROVED));
        assert!(PENDING.can_transition_to(REJECTED));
        assert!(PENDING.can_transition_to(CANCELLED));
        assert!(APPROVED.can_transition_to(COMPLETED));
        assert!(APPROVED.can_transition_to(CANCELLED));
    }

    #[test]
    fn pending_cannot_skip_to_completed() {
        assert!(!PENDING.can_transition_to(COMPLETED));
    }

    #[test]
    fn terminal_states_have_no_outgoing_moves() {
        for terminal in [REJECTED, COMPLETED, CANCELLED] {
            for next in [PENDING, APPROVED, REJECTED, COMPLETED, CANCELLED] {
                assert!(!terminal.can_transition_to(next), "{:?} -> {:?}", terminal, next);
            }
        }
    }

    #[test]
    fn no_status_transitions_to_itself_or_back_to_pending() {
        for s in [PENDING, APPROVED, REJECTED, COMPLETED, CANCELLED] {
            assert!(!s.can_transition_to(s));
            assert!(!s.can_transition_to(PENDING));
        }
    }

    #[test]
    fn only_active_statuses_block_slots() {
        let blocking = BookingStatus::slot_blocking();
        assert_eq!(blocking, [PENDING, APPROVED, COMPLETED]);
        assert!(!blocking.contains(&REJECTED));
        assert!(!blocking.contains(&CANCELLED));
    }
}
