use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use booking_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    BookingFlowApi,
    BookingQueryApi,
    SqliteDatabase,
};
use log::*;
use qpay_tools::QPayApi;

use crate::{
    catalog::RestCatalogApi,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    middleware::SignatureMiddlewareFactory,
    qpay_routes::QpayWebhookRoute,
    routes::{
        health,
        AvailabilityRoute,
        BookingByIdRoute,
        CancelReservationRoute,
        CompleteReservationRoute,
        CreatePaymentRoute,
        CreateReservationRoute,
        ForceStatusRoute,
        MyReservationsRoute,
        PaymentStatusRoute,
    },
};

/// Wires up the full server: database pool, event dispatch, the hold expiry sweeper, and the
/// actix instance. Runs until the process is told to stop.
pub async fn run_server(config: ServerConfig, hooks: EventHooks) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not connect to the database. {e}")))?;
    let handlers = EventHandlers::new(64, hooks);
    let producers = handlers.producers();
    handlers.start_handlers();
    start_expiry_worker(db.clone(), producers.clone(), config.sweep_interval);
    let qpay = QPayApi::new(config.qpay.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not create the QPay client. {e}")))?;
    let catalog = RestCatalogApi::new(&config.catalog_url);
    let srv = create_server_instance(config, db, producers, qpay, catalog)?;
    srv.await.map_err(|e| ServerError::Unspecified(format!("Server execution failed. {e}")))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    qpay: QPayApi,
    catalog: RestCatalogApi,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let shutdown_timeout = config.shutdown_timeout;
    let options = ServerOptions::from_config(&config);
    let srv = HttpServer::new(move || {
        let flow_api = BookingFlowApi::new(db.clone(), producers.clone()).with_auto_refunds(config.auto_refunds);
        let query_api = BookingQueryApi::new(db.clone());
        debug!("🚦️ Initializing app instance");
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("tbs::access_log"))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(query_api))
            .app_data(web::Data::new(qpay.clone()))
            .app_data(web::Data::new(catalog.clone()))
            .app_data(web::Data::new(options));
        let api_scope = web::scope("/api")
            .service(CreateReservationRoute::<SqliteDatabase, RestCatalogApi>::new())
            .service(MyReservationsRoute::<SqliteDatabase>::new())
            .service(BookingByIdRoute::<SqliteDatabase>::new())
            .service(CreatePaymentRoute::<SqliteDatabase, QPayApi>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, QPayApi>::new())
            .service(CancelReservationRoute::<SqliteDatabase>::new())
            .service(CompleteReservationRoute::<SqliteDatabase>::new())
            .service(AvailabilityRoute::<SqliteDatabase>::new())
            .service(ForceStatusRoute::<SqliteDatabase>::new());
        // The webhook lives in its own scope so the signature check never runs for client routes.
        let webhook_scope = web::scope("/webhook")
            .wrap(SignatureMiddlewareFactory::new(
                config.qpay.checksum_key.clone(),
                !config.disable_webhook_signature,
            ))
            .service(QpayWebhookRoute::<SqliteDatabase>::new());
        app.service(health).service(api_scope).service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .shutdown_timeout(shutdown_timeout)
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
