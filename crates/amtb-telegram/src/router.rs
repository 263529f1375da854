use std::{sync::Arc, time::Duration};

use teloxide::{
    dispatching::{Dispatcher, ShutdownToken},
    dptree,
    prelude::*,
};
use tokio_util::sync::CancellationToken;

use amtb_core::bot::App;

use crate::handlers;

const SHUTDOWN_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Long-poll Telegram and feed every update through `app` until `cancel`
/// fires.
///
/// All updates share one distribution key, so they are processed one at a
/// time in arrival order.
pub async fn run_polling(bot: Bot, app: Arc<App>, cancel: CancellationToken) {
    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "telegram bot started"),
        Err(e) => tracing::warn!(error = %e, "could not fetch bot identity"),
    }

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message))
        .branch(Update::filter_edited_message().endpoint(handlers::handle_edited_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![app])
        .distribution_function(|_| Some(()))
        .default_handler(|upd| async move {
            tracing::debug!(update_id = upd.id, "cannot parse update data");
        })
        .build();

    if cancel.is_cancelled() {
        tracing::info!("shutdown requested before polling started");
        return;
    }

    let shutdown = dispatcher.shutdown_token();
    let stopped = CancellationToken::new();
    let watcher = tokio::spawn(stop_on_cancel(shutdown, cancel, stopped.clone()));

    dispatcher.dispatch().await;
    stopped.cancel();
    if let Err(e) = watcher.await {
        tracing::error!(error = %e, "telegram shutdown task panicked");
    }
}

/// Shut the dispatcher down once `cancel` fires. A dispatcher that is still
/// starting up reports itself idle, so keep asking until it accepts or
/// `stopped` says dispatch has already returned.
async fn stop_on_cancel(
    shutdown: ShutdownToken,
    cancel: CancellationToken,
    stopped: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = stopped.cancelled() => return,
    }
    loop {
        match shutdown.shutdown() {
            Ok(done) => {
                done.await;
                tracing::info!("telegram polling stopped");
                return;
            }
            Err(_) => {
                tracing::debug!("telegram dispatcher not running yet, retrying shutdown");
                tokio::select! {
                    _ = tokio::time::sleep(SHUTDOWN_RETRY_DELAY) => {}
                    _ = stopped.cancelled() => return,
                }
            }
        }
    }
}
