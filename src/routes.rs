use crate::{
    api::{scan, session, sweep},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    cfg.service(
        web::scope(&config.api_prefix)
            // the QR scan entry point; authentication happens upstream
            .service(
                web::resource("/scan/{token}")
                    .wrap(build_limiter(config.rate_scan_per_min))
                    .route(web::post().to(scan::scan)),
            )
            // scheduler-facing batch close-out
            .service(
                web::scope("/attendance").service(
                    web::resource("/sweep")
                        .wrap(build_limiter(config.rate_sweep_per_min))
                        .route(web::post().to(sweep::run_sweep)),
                ),
            )
            // session registry
            .service(
                web::scope("/sessions")
                    .wrap(build_limiter(config.rate_registry_per_min))
                    .service(
                        web::resource("")
                            .route(web::post().to(session::create_session))
                            .route(web::get().to(session::list_sessions)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(session::get_session)))
                    .service(
                        web::resource("/{id}/qr-ref")
                            .route(web::put().to(session::attach_qr_ref)),
                    ),
            ),
    );
}
