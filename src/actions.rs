use diesel::prelude::*;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use crate::availability::{self, BookedWindow, CLOSING_HOUR, OPENING_HOUR};
use crate::models::{self, BookingStatus, UserRole};
use crate::pricing;

type DbError = Box<dyn std::error::Error + Send + Sync>;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn insert_new_user(conn: &mut PgConnection, user_name: &str, user_email: &str) -> Result<models::User, DbError> {
    use crate::schema::users::dsl::users;

    let new_user = models::NewUser {
        name: user_name.to_owned(),
        email: user_email.to_owned(),
        role: UserRole::USER,
    };

    let user = diesel::insert_into(users)
        .values(&new_user)
        .get_result::<models::User>(conn)?;

    Ok(user)
}

pub fn get_user_by_id(conn: &mut PgConnection, uid: i32) -> Result<models::User, DbError> {
    use crate::schema::users::dsl::users;

    let user = users.find(uid).first::<models::User>(conn)?;

    Ok(user)
}

pub fn list_users(conn: &mut PgConnection) -> Result<Vec<models::User>, DbError> {
    use crate::schema::users::dsl::{created_at, users};

    let all_users = users
        .order(created_at.desc())
        .load::<models::User>(conn)?;

    Ok(all_users)
}

pub fn create_new_field(conn: &mut PgConnection, form: &models::NewField) -> Result<models::Field, DbError> {
    use crate::schema::fields::dsl::fields;

    if form.price_per_hour <= 0 {
        return Err("Price per hour must be greater than 0".into());
    }

    if form.capacity <= 0 {
        return Err("Capacity must be greater than 0".into());
    }

    let field = diesel::insert_into(fields)
        .values(form)
        .get_result::<models::Field>(conn)?;

    Ok(field)
}

pub fn update_field(conn: &mut PgConnection, fid: i32, form: &models::UpdateField) -> Result<models::Field, DbError> {
    use crate::schema::fields::dsl::fields;

    if matches!(form.price_per_hour, Some(p) if p <= 0) {
        return Err("Price per hour must be greater than 0".into());
    }

    if matches!(form.capacity, Some(c) if c <= 0) {
        return Err("Capacity must be greater than 0".into());
    }

    let field = diesel::update(fields.find(fid))
        .set(form)
        .get_result::<models::Field>(conn)?;

    Ok(field)
}

pub fn delete_field(conn: &mut PgConnection, fid: i32) -> Result<(), DbError> {
    use crate::schema::bookings::dsl::{bookings, field_id as bookings_field_id};
    use crate::schema::fields::dsl::fields;

    conn.transaction(|conn| {
        // Make sure the field exists before checking references
        fields.find(fid).first::<models::Field>(conn)?;

        let referenced: i64 = bookings
            .filter(bookings_field_id.eq(fid))
            .count()
            .get_result(conn)?;

        if referenced > 0 {
            return Err("Cannot delete a field that has bookings".into());
        }

        diesel::delete(fields.find(fid)).execute(conn)?;

        Ok(())
    })
}

pub fn list_fields(conn: &mut PgConnection) -> Result<Vec<models::Field>, DbError> {
    use crate::schema::fields::dsl::{fields, name};

    let all_fields = fields.order(name.asc()).load::<models::Field>(conn)?;

    Ok(all_fields)
}

pub fn get_field_by_id(conn: &mut PgConnection, fid: i32) -> Result<models::Field, DbError> {
    use crate::schema::fields::dsl::fields;

    let field = fields.find(fid).first::<models::Field>(conn)?;

    Ok(field)
}

/// Windows of slot-holding bookings for one field on one date. Cancelled
/// and rejected bookings do not block the calendar.
pub fn field_booked_windows(
    conn: &mut PgConnection,
    fid: i32,
    date: NaiveDate,
) -> Result<Vec<BookedWindow>, DbError> {
    use crate::schema::bookings::dsl::{
        bookings,
        end_time,
        field_id as bookings_field_id,
        start_time,
        status,
    };

    let day_start = date.and_hms_opt(0, 0, 0).ok_or("invalid date")?;
    let day_end = day_start + chrono::Duration::days(1);

    let windows: Vec<(NaiveDateTime, NaiveDateTime)> = bookings
        .filter(bookings_field_id.eq(fid))
        .filter(status.eq_any(BookingStatus::slot_blocking()))
        .filter(start_time.lt(day_end).and(end_time.gt(day_start)))
        .select((start_time, end_time))
        .order(start_time.asc())
        .load(conn)?;

    Ok(windows
        .into_iter()
        .map(|(s, e)| BookedWindow { start: s, end: e })
        .collect())
}

pub fn parse_booking_time(raw: &str) -> Result<NaiveDateTime, DbError> {
    let parsed = NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|_| format!("timestamp '{}' not in {} format", raw, TIME_FORMAT))?;
    Ok(parsed)
}

/// Validate one booking window and return its whole-hour duration.
fn validate_window(start: NaiveDateTime, end: NaiveDateTime, now: NaiveDateTime) -> Result<i64, DbError> {
    if start >= end {
        return Err("Start timestamp must be before end timestamp".into());
    }

    if start < now {
        return Err("Cannot book a time slot in the past".into());
    }

    if start.minute() != 0 || start.second() != 0 || end.minute() != 0 || end.second() != 0 {
        return Err("Bookings must start and end on the hour".into());
    }

    if start.date() != end.date() {
        return Err("A booking cannot span multiple days".into());
    }

    if start.hour() < OPENING_HOUR || end.hour() > CLOSING_HOUR {
        return Err(format!(
            "Bookings must fall between {:02}:00 and {:02}:00",
            OPENING_HOUR, CLOSING_HOUR
        )
        .into());
    }

    let hours = (end - start).num_hours();
    if hours < 1 {
        return Err("Bookings must cover at least one whole hour".into());
    }

    Ok(hours)
}

fn overlapping_booking(
    conn: &mut PgConnection,
    fid: i32,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Result<Option<i32>, DbError> {
    use crate::schema::bookings::dsl::{
        bookings,
        booking_id,
        end_time,
        field_id as bookings_field_id,
        start_time,
        status,
    };

    // Overlap check: (start1 < end2) AND (start2 < end1)
    let existing: Option<i32> = bookings
        .filter(bookings_field_id.eq(fid))
        .filter(status.eq_any(BookingStatus::slot_blocking()))
        .filter(start_time.lt(window_end).and(end_time.gt(window_start)))
        .select(booking_id)
        .first(conn)
        .optional()?;

    Ok(existing)
}

/// Create a single booking. The field row is locked for the duration of the
/// transaction so two concurrent requests for the same slot cannot both
/// pass the overlap check.
pub fn create_booking_atomic(
    conn: &mut PgConnection,
    form: &models::CreateBookingRequest,
    now: NaiveDateTime,
) -> Result<(models::Booking, pricing::Quote), DbError> {
    use crate::schema::bookings::dsl::bookings;
    use crate::schema::fields::dsl::{field_id as fields_field_id, fields};

    let start = parse_booking_time(&form.start)?;
    let end = parse_booking_time(&form.end)?;
    let hours = validate_window(start, end, now)?;

    // The simple grid only sells fixed-size slots
    if hours % availability::SLOT_HOURS as i64 != 0 {
        return Err(format!("Booking duration must be a multiple of {} hours", availability::SLOT_HOURS).into());
    }

    get_user_by_id(conn, form.user_id)?;

    conn.transaction(|conn| {
        let field: models::Field = fields
            .filter(fields_field_id.eq(form.field_id))
            .for_update()
            .first(conn)?;

        if overlapping_booking(conn, field.field_id, start, end)?.is_some() {
            return Err("The selected time slot is already booked".into());
        }

        let quote = pricing::quote(field.price_per_hour, hours, form.payment_type);

        let new_booking = models::NewBooking {
            user_id: form.user_id,
            field_id: field.field_id,
            status: BookingStatus::PENDING,
            payment_type: form.payment_type,
            start_time: start,
            end_time: end,
            amount_paid: quote.amount_due,
        };

        let booking = diesel::insert_into(bookings)
            .values(&new_booking)
            .get_result::<models::Booking>(conn)?;

        Ok((booking, quote))
    })
}

/// Create every slot of a multi-slot checkout in one transaction. All rows
/// share the transaction's `now()` as `created_at`, which is what groups
/// them into a single session on the display side.
pub fn create_multi_slot_atomic(
    conn: &mut PgConnection,
    form: &models::MultiSlotBookingRequest,
    now: NaiveDateTime,
) -> Result<(Vec<models::Booking>, pricing::Quote), DbError> {
    use crate::schema::bookings::dsl::bookings;
    use crate::schema::fields::dsl::{field_id as fields_field_id, fields};

    if form.slots.is_empty() {
        return Err("At least one time slot is required".into());
    }

    let mut windows = Vec::with_capacity(form.slots.len());
    let mut total_hours = 0i64;
    for slot in &form.slots {
        let start = parse_booking_time(&slot.start)?;
        let end = parse_booking_time(&slot.end)?;
        total_hours += validate_window(start, end, now)?;
        windows.push((start, end));
    }

    // Slots within one request must not overlap each other either
    for (i, a) in windows.iter().enumerate() {
        for b in windows.iter().skip(i + 1) {
            if a.0 < b.1 && b.0 < a.1 {
                return Err("Requested time slots overlap each other".into());
            }
        }
    }

    get_user_by_id(conn, form.user_id)?;

    conn.transaction(|conn| {
        let field: models::Field = fields
            .filter(fields_field_id.eq(form.field_id))
            .for_update()
            .first(conn)?;

        for (start, end) in &windows {
            if overlapping_booking(conn, field.field_id, *start, *end)?.is_some() {
                return Err("One of the selected time slots is already booked".into());
            }
        }

        let quote = pricing::quote(field.price_per_hour, total_hours, form.payment_type);

        // The checkout's amount is split across the rows proportionally to
        // each slot's span; the last row absorbs the rounding remainder.
        let mut created = Vec::with_capacity(windows.len());
        let mut allocated = 0i64;
        for (i, (start, end)) in windows.iter().enumerate() {
            let hours = (*end - *start).num_hours();
            let share = if i == windows.len() - 1 {
                quote.amount_due - allocated
            } else {
                (quote.amount_due as f64 * hours as f64 / total_hours as f64).round() as i64
            };
            allocated += share;

            let new_booking = models::NewBooking {
                user_id: form.user_id,
                field_id: field.field_id,
                status: BookingStatus::PENDING,
                payment_type: form.payment_type,
                start_time: *start,
                end_time: *end,
                amount_paid: share,
            };

            let booking = diesel::insert_into(bookings)
                .values(&new_booking)
                .get_result::<models::Booking>(conn)?;

            created.push(booking);
        }

        Ok((created, quote))
    })
}

pub fn list_user_bookings(conn: &mut PgConnection, uid: i32) -> Result<Vec<models::Booking>, DbError> {
    use crate::schema::bookings::dsl::{bookings, created_at, user_id as bookings_user_id};

    let user_bookings = bookings
        .filter(bookings_user_id.eq(uid))
        .order(created_at.desc())
        .load::<models::Booking>(conn)?;

    Ok(user_bookings)
}

pub fn attach_payment_proof(
    conn: &mut PgConnection,
    bid: i32,
    proof_url: &str,
) -> Result<models::Booking, DbError> {
    use crate::schema::bookings::dsl::{bookings, proof_image_url};

    conn.transaction(|conn| {
        let booking = bookings.find(bid).first::<models::Booking>(conn)?;

        if booking.status != BookingStatus::PENDING {
            return Err("Payment proof can only be attached to a pending booking".into());
        }

        let updated = diesel::update(bookings.find(bid))
            .set(proof_image_url.eq(Some(proof_url.to_owned())))
            .get_result::<models::Booking>(conn)?;

        Ok(updated)
    })
}

pub fn update_booking_status(
    conn: &mut PgConnection,
    bid: i32,
    next: BookingStatus,
) -> Result<models::Booking, DbError> {
    use crate::schema::bookings::dsl::{bookings, status};

    conn.transaction(|conn| {
        let booking = bookings.find(bid).first::<models::Booking>(conn)?;

        if !booking.status.can_transition_to(next) {
            return Err(format!(
                "Cannot change booking status from {:?} to {:?}",
                booking.status, next
            )
            .into());
        }

        let updated = diesel::update(bookings.find(bid))
            .set(status.eq(next))
            .get_result::<models::Booking>(conn)?;

        Ok(updated)
    })
}

pub fn list_bookings_paginated(
    conn: &mut PgConnection,
    page: i64,
    limit: i64,
    status_filter: Option<BookingStatus>,
    search: Option<&str>,
) -> Result<models::AdminBookingsResponse, DbError> {
    use crate::schema::{bookings, fields, users};

    let page = page.max(1);
    let limit = limit.clamp(1, 100);
    let pattern = search.map(|s| format!("%{}%", s));

    let mut query = bookings::table
        .inner_join(users::table)
        .inner_join(fields::table)
        .into_boxed();
    let mut count_query = bookings::table
        .inner_join(users::table)
        .inner_join(fields::table)
        .into_boxed();

    if let Some(p) = &pattern {
        query = query.filter(
            users::name
                .ilike(p.clone())
                .or(users::email.ilike(p.clone()))
                .or(fields::name.ilike(p.clone())),
        );
        count_query = count_query.filter(
            users::name
                .ilike(p.clone())
                .or(users::email.ilike(p.clone()))
                .or(fields::name.ilike(p.clone())),
        );
    }

    if let Some(s) = status_filter {
        query = query.filter(bookings::status.eq(s));
        count_query = count_query.filter(bookings::status.eq(s));
    }

    let total: i64 = count_query.count().get_result(conn)?;

    let rows: Vec<(models::Booking, String, String, String)> = query
        .select((bookings::all_columns, users::name, users::email, fields::name))
        .order(bookings::created_at.desc())
        .offset((page - 1) * limit)
        .limit(limit)
        .load(conn)?;

    let listed = rows
        .into_iter()
        .map(|(booking, user_name, user_email, field_name)| models::AdminBooking {
            booking,
            user_name,
            user_email,
            field_name,
        })
        .collect();

    // Status counts honor the search filter but not the status filter, so
    // the admin tabs keep their totals while one tab is selected.
    let status_counts = count_statuses(conn, pattern.as_deref())?;

    Ok(models::AdminBookingsResponse {
        bookings: listed,
        pagination: models::Pagination {
            page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        },
        status_counts,
    })
}

fn count_statuses(conn: &mut PgConnection, pattern: Option<&str>) -> Result<models::StatusCounts, DbError> {
    use crate::schema::{bookings, fields, users};

    let mut counts = models::StatusCounts::default();

    for s in [
        BookingStatus::PENDING,
        BookingStatus::APPROVED,
        BookingStatus::REJECTED,
        BookingStatus::COMPLETED,
        BookingStatus::CANCELLED,
    ] {
        let mut query = bookings::table
            .inner_join(users::table)
            .inner_join(fields::table)
            .filter(bookings::status.eq(s))
            .into_boxed();

        if let Some(p) = pattern {
            query = query.filter(
                users::name
                    .ilike(p.to_owned())
                    .or(users::email.ilike(p.to_owned()))
                    .or(fields::name.ilike(p.to_owned())),
            );
        }

        let n: i64 = query.count().get_result(conn)?;
        match s {
            BookingStatus::PENDING => counts.pending = n,
            BookingStatus::APPROVED => counts.approved = n,
            BookingStatus::REJECTED => counts.rejected = n,
            BookingStatus::COMPLETED => counts.completed = n,
            BookingStatus::CANCELLED => counts.cancelled = n,
        }
    }

    Ok(counts)
}

pub fn booking_analytics(conn: &mut PgConnection) -> Result<models::AnalyticsResponse, DbError> {
    use crate::schema::bookings::dsl::{amount_paid, bookings, status};
    use crate::schema::fields::dsl::fields;
    use crate::schema::users::dsl::users;

    let status_counts = count_statuses(conn, None)?;
    let total_bookings: i64 = bookings.count().get_result(conn)?;
    let total_fields: i64 = fields.count().get_result(conn)?;
    let total_users: i64 = users.count().get_result(conn)?;

    // SUM(bigint) widens to numeric in Postgres; summing client-side keeps
    // the amounts as plain i64
    let paid_amounts: Vec<i64> = bookings
        .filter(status.eq_any([BookingStatus::APPROVED, BookingStatus::COMPLETED]))
        .select(amount_paid)
        .load(conn)?;
    let revenue: i64 = paid_amounts.iter().sum();

    Ok(models::AnalyticsResponse {
        total_bookings,
        status_counts,
        total_fields,
        total_users,
        revenue,
    })
}
