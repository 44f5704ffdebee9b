use booking_engine::events::EventHooks;
use booking_server::{cli::handle_command_line_args, config::ServerConfig, server::run_server};
use dotenvy::dotenv;
use futures::future::BoxFuture;
use log::*;

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    if handle_command_line_args() {
        return;
    }
    let config = ServerConfig::from_env_or_default();
    info!("🚀️ Starting server on {}:{}", config.host, config.port);
    match run_server(config, notification_hooks()).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}

/// Stand-in notification channel. Every lifecycle event lands under the `tbs::notify` log target,
/// where a mail or chat relay can tail them until a real dispatcher is wired in.
fn notification_hooks() -> EventHooks {
    EventHooks::default()
        .on_new_booking(|ev| {
            let deadline = ev.booking.expires_at.map(|t| t.to_string()).unwrap_or_else(|| "never".to_string());
            info!(target: "tbs::notify", "📣️ {}. Hold deadline: {deadline}", ev.booking);
            no_op()
        })
        .on_booking_confirmed(|ev| {
            info!(target: "tbs::notify", "📣️ {} confirmed, paid with [{}]", ev.booking, ev.payment.order_code);
            no_op()
        })
        .on_hold_expired(|ev| {
            info!(target: "tbs::notify", "📣️ Hold expired: {}", ev.booking);
            no_op()
        })
        .on_payment_failed(|ev| {
            info!(
                target: "tbs::notify",
                "📣️ Payment [{}] for booking #{} ended {}",
                ev.payment.order_code,
                ev.booking.id,
                ev.payment.status
            );
            no_op()
        })
        .on_booking_cancelled(|ev| {
            info!(target: "tbs::notify", "📣️ {} cancelled. Refund due: {}", ev.booking, ev.refund_due);
            no_op()
        })
        .on_payment_orphaned(|ev| {
            warn!(
                target: "tbs::notify",
                "📣️ Payment [{}] settled after booking #{} lost its hold. Needs manual attention.",
                ev.payment.order_code,
                ev.booking.id
            );
            no_op()
        })
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
