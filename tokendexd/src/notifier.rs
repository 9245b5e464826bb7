//! Notice printer.
//!
//! Subscribes to the engine event bus and writes user-facing notices to the
//! console. Other events are only logged.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tokendex_engine::{EngineEvent, EventReceiver, NoticeLevel};

/// Console rendering of an event, if it is shown to the user.
pub fn format_event(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::Notice(notice) => {
            let tag = match notice.level {
                NoticeLevel::Success => "ok",
                NoticeLevel::Warning => "!!",
                NoticeLevel::Error => "error",
            };
            Some(format!("[{}] {}", tag, notice.message))
        },
        _ => None,
    }
}

/// Print notices until `shutdown` is cancelled or the bus closes.
///
/// Events already queued at shutdown are still printed.
pub fn spawn_printer<W>(
    mut receiver: EventReceiver,
    mut writer: W,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    for event in receiver.drain() {
                        print_event(&mut writer, &event).await;
                    }
                    break;
                }
                next = receiver.recv() => match next {
                    Some(Ok(event)) => print_event(&mut writer, &event).await,
                    Some(Err(lag_msg)) => warn!(%lag_msg, "Notice printer lagged"),
                    None => break,
                },
            }
        }
        debug!("Notice printer stopped");
    })
}

async fn print_event<W: AsyncWrite + Unpin>(writer: &mut W, event: &EngineEvent) {
    let Some(line) = format_event(event) else {
        debug!(?event, "Engine event");
        return;
    };

    let written = async {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        warn!(error = %e, "Failed to print notice");
    }
}
