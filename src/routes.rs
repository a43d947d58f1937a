use std::sync::Arc;

use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::anyhow;

use crate::{
    api::{announcement, assessment, attendance, batch, fee, timetable, viewer},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::AppError,
};

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-route limiters. Built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct RateLimiters {
    login: Limiter,
    register: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

fn build_limiter(requests_per_min: u32) -> anyhow::Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min}/min"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

impl RateLimiters {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            register: build_limiter(config.rate_register_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

/// Malformed bodies, paths and queries get the same error envelope as handlers.
fn extractor_errors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &RateLimiters) {
    extractor_errors(cfg);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Teacher routes
    cfg.service(
        web::scope(&format!("{}/admin", config.api_prefix))
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(web::resource("/students").route(web::get().to(batch::list_students)))
            .service(
                web::scope("/batches")
                    // /batches
                    .service(
                        web::resource("")
                            .route(web::get().to(batch::list_batches))
                            .route(web::post().to(batch::create_batch)),
                    )
                    // /batches/{batch_id}
                    .service(
                        web::resource("/{batch_id}")
                            .route(web::get().to(batch::get_batch))
                            .route(web::put().to(batch::update_batch))
                            .route(web::delete().to(batch::delete_batch)),
                    )
                    // /batches/{batch_id}/students
                    .service(
                        web::resource("/{batch_id}/students")
                            .route(web::post().to(batch::enroll_student)),
                    )
                    .service(
                        web::resource("/{batch_id}/students/{student_id}")
                            .route(web::delete().to(batch::remove_student)),
                    )
                    // /batches/{batch_id}/attendance
                    .service(
                        web::resource("/{batch_id}/attendance")
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::post().to(attendance::create_attendance)),
                    )
                    .service(
                        web::resource("/{batch_id}/attendance/{session_id}")
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    )
                    // /batches/{batch_id}/tests
                    .service(
                        web::resource("/{batch_id}/tests")
                            .route(web::get().to(assessment::list_tests))
                            .route(web::post().to(assessment::create_test)),
                    )
                    .service(
                        web::resource("/{batch_id}/tests/{test_id}")
                            .route(web::put().to(assessment::update_test))
                            .route(web::delete().to(assessment::delete_test)),
                    )
                    // /batches/{batch_id}/fees
                    .service(
                        web::resource("/{batch_id}/fees")
                            .route(web::get().to(fee::list_fees))
                            .route(web::post().to(fee::save_fee)),
                    )
                    .service(
                        web::resource("/{batch_id}/fees/{fee_id}")
                            .route(web::put().to(fee::update_fee))
                            .route(web::delete().to(fee::delete_fee)),
                    )
                    // /batches/{batch_id}/timetable
                    .service(
                        web::resource("/{batch_id}/timetable")
                            .route(web::get().to(timetable::list_timetable))
                            .route(web::post().to(timetable::save_timetable_entry)),
                    )
                    .service(
                        web::resource("/{batch_id}/timetable/{entry_id}")
                            .route(web::delete().to(timetable::delete_timetable_entry)),
                    )
                    // /batches/{batch_id}/announcements
                    .service(
                        web::resource("/{batch_id}/announcements")
                            .route(web::get().to(announcement::list_announcements))
                            .route(web::post().to(announcement::create_announcement)),
                    )
                    .service(
                        web::resource("/{batch_id}/announcements/{announcement_id}")
                            .route(web::delete().to(announcement::delete_announcement)),
                    ),
            ),
    );

    // Student and parent routes
    cfg.service(
        web::scope(&format!("{}/user", config.api_prefix))
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(web::resource("/me").route(web::get().to(handlers::me)))
            .service(
                web::scope("/{viewer}/batches")
                    .service(web::resource("").route(web::get().to(viewer::list_batches)))
                    .service(web::resource("/{batch_id}").route(web::get().to(viewer::get_batch)))
                    .service(
                        web::resource("/{batch_id}/attendance")
                            .route(web::get().to(viewer::attendance)),
                    )
                    .service(
                        web::resource("/{batch_id}/tests")
                            .route(web::get().to(viewer::test_results)),
                    )
                    .service(web::resource("/{batch_id}/fees").route(web::get().to(viewer::fees)))
                    .service(
                        web::resource("/{batch_id}/timetable")
                            .route(web::get().to(viewer::timetable)),
                    )
                    .service(
                        web::resource("/{batch_id}/announcements")
                            .route(web::get().to(viewer::announcements)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token + refresh_token (old one revoked)
