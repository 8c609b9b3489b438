#[macro_use]
extern crate diesel;

use actix_web::{delete, error, get, middleware, patch, post, web, App, HttpResponse, HttpServer, Responder};
use chrono::{NaiveDate, Utc};
use diesel::{prelude::*, r2d2};
use regex::Regex;
use dotenvy;
mod actions;
mod availability;
mod models;
mod pricing;
mod schema;
mod sessions;

type DbPool = r2d2::Pool<r2d2::ConnectionManager<PgConnection>>;
type DbError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, serde::Serialize)]
struct Res {
    message: String,
}

#[post("/users")]
async fn register_user(pool: web::Data<DbPool>, form: web::Json<models::RegisterUserRequest>) -> actix_web::Result<impl Responder> {
    let name_re = Regex::new(r"^[a-zA-Z0-9 ]+$").unwrap();
    let email_re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();

    if name_re.captures(&form.name).is_none() {
        return Ok(HttpResponse::BadRequest().json(Res { message: "name should be Alphanumeric String. Spaces are the only special character allowed".to_string() }));
    }

    if email_re.captures(&form.email).is_none() {
        return Ok(HttpResponse::BadRequest().json(Res { message: "email is not valid".to_string() }));
    }

    let user = web::block(move || {
        let mut conn = pool.get()?;
        actions::insert_new_user(&mut conn, &form.name, &form.email)
    })
    .await?
    .map_err(|e| {
        let detail = e.to_string();
        log::error!("Failed to register user: {:?}", e);

        if let Some(diesel_error) = e.downcast_ref::<diesel::result::Error>() {
            match diesel_error {
                diesel::result::Error::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, _) => {
                    error::InternalError::from_response(
                        e.to_string(),
                        HttpResponse::BadRequest().json(Res { message: "A user with this email already exists".to_owned() })
                    )
                }
                _ => error::InternalError::from_response(
                    e.to_string(),
                    HttpResponse::BadRequest().json(Res { message: detail })
                )
            }
        } else {
            error::InternalError::from_response(
                e.to_string(),
                HttpResponse::BadRequest().json(Res { message: detail })
            )
        }
    })?;

    Ok(HttpResponse::Created().json(user))
}

#[get("/fields")]
async fn list_fields(pool: web::Data<DbPool>) -> actix_web::Result<impl Responder> {
    let fields = web::block(move || {
        let mut conn = pool.get()?;
        actions::list_fields(&mut conn)
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to list fields: {:?}", e);
        error::InternalError::from_response(e, HttpResponse::BadRequest().json(Res { message: detail }))
    })?;

    Ok(HttpResponse::Ok().json(fields))
}

#[get("/fields/{field_id}")]
async fn get_field(pool: web::Data<DbPool>, path: web::Path<i32>) -> actix_web::Result<impl Responder> {
    let field_id = path.into_inner();

    let field = web::block(move || {
        let mut conn = pool.get()?;
        actions::get_field_by_id(&mut conn, field_id)
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to get field: {:?}", e);

        if let Some(diesel_error) = e.downcast_ref::<diesel::result::Error>() {
            match diesel_error {
                diesel::result::Error::NotFound => {
                    error::InternalError::from_response(
                        e,
                        HttpResponse::NotFound().json(Res { message: "Field not found".to_string() })
                    )
                }
                _ => error::InternalError::from_response(
                    e,
                    HttpResponse::BadRequest().json(Res { message: detail })
                )
            }
        } else {
            error::InternalError::from_response(
                e,
                HttpResponse::BadRequest().json(Res { message: detail })
            )
        }
    })?;

    Ok(HttpResponse::Ok().json(field))
}

#[get("/fields/{field_id}/availability")]
async fn field_availability(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    query: web::Query<models::AvailabilityQuery>,
) -> actix_web::Result<impl Responder> {
    let field_id = path.into_inner();

    let date = match NaiveDate::parse_from_str(&query.date, "%Y-%m-%d") {
        Ok(d) => d,
        Err(_) => return Ok(HttpResponse::BadRequest().json(Res { message: "date not in YYYY-MM-DD format".to_string() })),
    };

    let windows = web::block(move || {
        let mut conn = pool.get()?;
        // 404 before computing a grid for a field that does not exist
        actions::get_field_by_id(&mut conn, field_id)?;
        actions::field_booked_windows(&mut conn, field_id, date)
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to load field availability: {:?}", e);

        if let Some(diesel_error) = e.downcast_ref::<diesel::result::Error>() {
            match diesel_error {
                diesel::result::Error::NotFound => {
                    error::InternalError::from_response(
                        e,
                        HttpResponse::NotFound().json(Res { message: "Field not found".to_string() })
                    )
                }
                _ => error::InternalError::from_response(
                    e,
                    HttpResponse::BadRequest().json(Res { message: detail })
                )
            }
        } else {
            error::InternalError::from_response(
                e,
                HttpResponse::BadRequest().json(Res { message: detail })
            )
        }
    })?;

    let slots = availability::slot_grid(date, &windows, Utc::now().naive_utc());

    Ok(HttpResponse::Ok().json(slots))
}

#[post("/bookings")]
async fn create_booking(pool: web::Data<DbPool>, form: web::Json<models::CreateBookingRequest>) -> actix_web::Result<impl Responder> {
    let (booking, quote) = web::block(move || {
        let mut conn = pool.get()?;
        actions::create_booking_atomic(&mut conn, &form, Utc::now().naive_utc())
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to create booking: {:?}", e);
        error::InternalError::from_response(e, HttpResponse::BadRequest().json(Res { message: detail }))
    })?;

    Ok(HttpResponse::Created().json(models::CreateBookingResponse {
        booking_ids: vec![booking.booking_id],
        status: booking.status,
        total: quote.total,
        deposit: quote.deposit,
        remaining: quote.remaining,
        amount_paid: quote.amount_due,
        message: "Booking created successfully".to_string(),
    }))
}

#[post("/bookings/multi-slot")]
async fn create_multi_slot_booking(pool: web::Data<DbPool>, form: web::Json<models::MultiSlotBookingRequest>) -> actix_web::Result<impl Responder> {
    let (bookings, quote) = web::block(move || {
        let mut conn = pool.get()?;
        actions::create_multi_slot_atomic(&mut conn, &form, Utc::now().naive_utc())
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to create multi-slot booking: {:?}", e);
        error::InternalError::from_response(e, HttpResponse::BadRequest().json(Res { message: detail }))
    })?;

    Ok(HttpResponse::Created().json(models::CreateBookingResponse {
        booking_ids: bookings.iter().map(|b| b.booking_id).collect(),
        status: models::BookingStatus::PENDING,
        total: quote.total,
        deposit: quote.deposit,
        remaining: quote.remaining,
        amount_paid: quote.amount_due,
        message: format!("{} bookings created successfully", bookings.len()),
    }))
}

#[get("/bookings")]
async fn list_user_bookings(pool: web::Data<DbPool>, query: web::Query<models::UserBookingsQuery>) -> actix_web::Result<impl Responder> {
    let user_id = query.user_id;

    let bookings = web::block(move || {
        let mut conn = pool.get()?;
        actions::list_user_bookings(&mut conn, user_id)
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to list bookings: {:?}", e);
        error::InternalError::from_response(e, HttpResponse::BadRequest().json(Res { message: detail }))
    })?;

    Ok(HttpResponse::Ok().json(bookings))
}

#[get("/bookings/sessions")]
async fn list_user_booking_sessions(pool: web::Data<DbPool>, query: web::Query<models::UserBookingsQuery>) -> actix_web::Result<impl Responder> {
    let user_id = query.user_id;

    let bookings = web::block(move || {
        let mut conn = pool.get()?;
        actions::list_user_bookings(&mut conn, user_id)
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to list booking sessions: {:?}", e);
        error::InternalError::from_response(e, HttpResponse::BadRequest().json(Res { message: detail }))
    })?;

    Ok(HttpResponse::Ok().json(sessions::group_sessions(bookings)))
}

#[post("/bookings/{booking_id}/payment-proof")]
async fn attach_payment_proof(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    form: web::Json<models::PaymentProofRequest>,
) -> actix_web::Result<impl Responder> {
    let booking_id = path.into_inner();

    if !form.proof_image_url.starts_with("http://") && !form.proof_image_url.starts_with("https://") {
        return Ok(HttpResponse::BadRequest().json(Res { message: "proof_image_url must be an http(s) URL".to_string() }));
    }

    let booking = web::block(move || {
        let mut conn = pool.get()?;
        actions::attach_payment_proof(&mut conn, booking_id, &form.proof_image_url)
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to attach payment proof: {:?}", e);

        if let Some(diesel_error) = e.downcast_ref::<diesel::result::Error>() {
            match diesel_error {
                diesel::result::Error::NotFound => {
                    error::InternalError::from_response(
                        e,
                        HttpResponse::NotFound().json(Res { message: "Booking not found".to_string() })
                    )
                }
                _ => error::InternalError::from_response(
                    e,
                    HttpResponse::BadRequest().json(Res { message: detail })
                )
            }
        } else {
            error::InternalError::from_response(
                e,
                HttpResponse::BadRequest().json(Res { message: detail })
            )
        }
    })?;

    Ok(HttpResponse::Ok().json(booking))
}

#[get("/admin/bookings")]
async fn admin_list_bookings(pool: web::Data<DbPool>, query: web::Query<models::AdminBookingsQuery>) -> actix_web::Result<impl Responder> {
    let search_re = Regex::new(r"^[a-zA-Z0-9@. ]*$").unwrap();

    if let Some(search) = &query.search {
        if search_re.captures(search).is_none() {
            return Ok(HttpResponse::BadRequest().json(Res { message: "search may only contain letters, digits, spaces, '@' and '.'".to_string() }));
        }
    }

    let result = web::block(move || {
        let mut conn = pool.get()?;
        actions::list_bookings_paginated(
            &mut conn,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(10),
            query.status,
            query.search.as_deref(),
        )
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to list admin bookings: {:?}", e);
        error::InternalError::from_response(e, HttpResponse::BadRequest().json(Res { message: detail }))
    })?;

    Ok(HttpResponse::Ok().json(result))
}

#[patch("/admin/bookings/{booking_id}")]
async fn admin_update_booking_status(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    form: web::Json<models::UpdateBookingStatusRequest>,
) -> actix_web::Result<impl Responder> {
    let booking_id = path.into_inner();
    let next = form.status;

    let booking = web::block(move || {
        let mut conn = pool.get()?;
        actions::update_booking_status(&mut conn, booking_id, next)
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to update booking status: {:?}", e);

        if let Some(diesel_error) = e.downcast_ref::<diesel::result::Error>() {
            match diesel_error {
                diesel::result::Error::NotFound => {
                    error::InternalError::from_response(
                        e,
                        HttpResponse::NotFound().json(Res { message: "Booking not found".to_string() })
                    )
                }
                _ => error::InternalError::from_response(
                    e,
                    HttpResponse::BadRequest().json(Res { message: detail })
                )
            }
        } else {
            error::InternalError::from_response(
                e,
                HttpResponse::BadRequest().json(Res { message: detail })
            )
        }
    })?;

    Ok(HttpResponse::Ok().json(booking))
}

#[post("/admin/fields")]
async fn admin_create_field(pool: web::Data<DbPool>, form: web::Json<models::NewField>) -> actix_web::Result<impl Responder> {
    let name_re = Regex::new(r"^[a-zA-Z0-9 ]+$").unwrap();

    if name_re.captures(&form.name).is_none() {
        return Ok(HttpResponse::BadRequest().json(Res { message: "name should be Alphanumeric String. Spaces are the only special character allowed".to_string() }));
    }

    let field = web::block(move || {
        let mut conn = pool.get()?;
        actions::create_new_field(&mut conn, &form)
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to create field: {:?}", e);

        if let Some(diesel_error) = e.downcast_ref::<diesel::result::Error>() {
            match diesel_error {
                diesel::result::Error::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, _) => {
                    error::InternalError::from_response(
                        e.to_string(),
                        HttpResponse::BadRequest().json(Res { message: "A field with this name already exists".to_owned() })
                    )
                }
                _ => error::InternalError::from_response(
                    e.to_string(),
                    HttpResponse::BadRequest().json(Res { message: detail })
                )
            }
        } else {
            error::InternalError::from_response(
                e.to_string(),
                HttpResponse::BadRequest().json(Res { message: detail })
            )
        }
    })?;

    Ok(HttpResponse::Created().json(field))
}

#[patch("/admin/fields/{field_id}")]
async fn admin_update_field(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    form: web::Json<models::UpdateField>,
) -> actix_web::Result<impl Responder> {
    let field_id = path.into_inner();

    if let Some(name) = &form.name {
        let name_re = Regex::new(r"^[a-zA-Z0-9 ]+$").unwrap();
        if name_re.captures(name).is_none() {
            return Ok(HttpResponse::BadRequest().json(Res { message: "name should be Alphanumeric String. Spaces are the only special character allowed".to_string() }));
        }
    }

    let field = web::block(move || {
        let mut conn = pool.get()?;
        actions::update_field(&mut conn, field_id, &form)
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to update field: {:?}", e);

        if let Some(diesel_error) = e.downcast_ref::<diesel::result::Error>() {
            match diesel_error {
                diesel::result::Error::NotFound => {
                    error::InternalError::from_response(
                        e,
                        HttpResponse::NotFound().json(Res { message: "Field not found".to_string() })
                    )
                }
                _ => error::InternalError::from_response(
                    e,
                    HttpResponse::BadRequest().json(Res { message: detail })
                )
            }
        } else {
            error::InternalError::from_response(
                e,
                HttpResponse::BadRequest().json(Res { message: detail })
            )
        }
    })?;

    Ok(HttpResponse::Ok().json(field))
}

#[delete("/admin/fields/{field_id}")]
async fn admin_delete_field(pool: web::Data<DbPool>, path: web::Path<i32>) -> actix_web::Result<impl Responder> {
    let field_id = path.into_inner();

    web::block(move || {
        let mut conn = pool.get()?;
        actions::delete_field(&mut conn, field_id)
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to delete field: {:?}", e);

        if let Some(diesel_error) = e.downcast_ref::<diesel::result::Error>() {
            match diesel_error {
                diesel::result::Error::NotFound => {
                    error::InternalError::from_response(
                        e,
                        HttpResponse::NotFound().json(Res { message: "Field not found".to_string() })
                    )
                }
                _ => error::InternalError::from_response(
                    e,
                    HttpResponse::BadRequest().json(Res { message: detail })
                )
            }
        } else {
            error::InternalError::from_response(
                e,
                HttpResponse::BadRequest().json(Res { message: detail })
            )
        }
    })?;

    Ok(HttpResponse::Ok().json(models::ApiResponse {
        message: "Field deleted successfully".to_string(),
    }))
}

#[get("/admin/users")]
async fn admin_list_users(pool: web::Data<DbPool>) -> actix_web::Result<impl Responder> {
    let users = web::block(move || {
        let mut conn = pool.get()?;
        actions::list_users(&mut conn)
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to list users: {:?}", e);
        error::InternalError::from_response(e, HttpResponse::BadRequest().json(Res { message: detail }))
    })?;

    Ok(HttpResponse::Ok().json(users))
}

#[get("/admin/analytics")]
async fn admin_analytics(pool: web::Data<DbPool>) -> actix_web::Result<impl Responder> {
    let analytics = web::block(move || {
        let mut conn = pool.get()?;
        actions::booking_analytics(&mut conn)
    })
    .await?
    .map_err(|e: DbError| {
        let detail = e.to_string();
        log::error!("Failed to compute analytics: {:?}", e);
        error::InternalError::from_response(e, HttpResponse::BadRequest().json(Res { message: detail }))
    })?;

    Ok(HttpResponse::Ok().json(analytics))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // initialize DB pool outside of `HttpServer::new` so that it is shared across all workers
    let pool = initialize_db_pool();

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    log::info!("starting HTTP server at http://{}", bind_addr);

    let http = HttpServer::new(move || {
        App::new()
            // add DB pool handle to app data; enables use of `web::Data<DbPool>` extractor
            .app_data(web::Data::new(pool.clone()))
            .wrap(middleware::Logger::default())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                let detail = err.to_string();
                let response = match err {
                    error::JsonPayloadError::ContentType => {
                        HttpResponse::UnsupportedMediaType().body("Unsupported Media Type")
                    }
                    error::JsonPayloadError::Deserialize(ref err) => {
                        HttpResponse::BadRequest().json(Res { message: err.to_string() })
                    }

                    _ => HttpResponse::BadRequest().json(Res { message: detail }),
                };
                error::InternalError::from_response(err, response).into()
            }))
            .service(register_user)
            .service(list_fields)
            .service(field_availability)
            .service(get_field)
            .service(create_multi_slot_booking)
            .service(list_user_booking_sessions)
            .service(create_booking)
            .service(list_user_bookings)
            .service(attach_payment_proof)
            .service(admin_list_bookings)
            .service(admin_update_booking_status)
            .service(admin_create_field)
            .service(admin_update_field)
            .service(admin_delete_field)
            .service(admin_list_users)
            .service(admin_analytics)
    })
    .bind(&bind_addr)?
    .run();

    http.await
}

fn initialize_db_pool() -> DbPool {
    let conn_spec = std::env::var("DATABASE_URL").expect("DATABASE_URL should be set");
    let manager = r2d2::ConnectionManager::<PgConnection>::new(conn_spec);
    r2d2::Pool::builder()
        .build(manager)
        .expect("DATABASE_URL should be a valid Postgres connection string")
}
