use fmlink_client::{
    BroadcastPublisher, CloseReason, Connection, EventForwarder, Fanout, Publication,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{client_error, close_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_event, print_publication, OutputFormat};

const PUBLICATION_BACKLOG: usize = 64;

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let (forwarder, mut events) = EventForwarder::channel();

    let (connection, mut publications) = match &args.topic {
        Some(topic) => {
            let publisher = BroadcastPublisher::new(PUBLICATION_BACKLOG);
            let subscription = publisher.subscribe();
            let handler = Fanout::new(forwarder, publisher, topic.clone());
            (args.connect.open(handler).await?, Some(subscription))
        }
        None => (args.connect.open(forwarder).await?, None),
    };

    send_defaults(&connection, args.volume, args.channel).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printed = 0u64;
    loop {
        tokio::select! {
            event = events.recv() => {
                // The read loop owns the sender; `None` means it has stopped.
                let Some(event) = event else { break };
                print_event(&event, format);
                printed = printed.saturating_add(1);

                if args.count.is_some_and(|count| printed >= count) {
                    connection.close().await;
                    return Ok(SUCCESS);
                }
            }
            Some(publication) = next_publication(&mut publications) => {
                print_publication(&publication, format);
            }
            signal = &mut ctrl_c => {
                signal.map_err(|err| {
                    CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
                })?;
                info!("interrupted");
                connection.close().await;
                return Ok(SUCCESS);
            }
        }
    }

    match connection.closed().await {
        CloseReason::Local => Ok(SUCCESS),
        reason => Err(close_error(&reason)),
    }
}

/// Apply the startup volume and channel without ordering between the two.
async fn send_defaults(connection: &Connection, volume: u32, channel: u32) -> CliResult<()> {
    let (volume_sent, channel_sent) =
        tokio::join!(connection.set_volume(volume), connection.set_channel(channel));
    volume_sent.map_err(|err| client_error("set volume failed", err))?;
    channel_sent.map_err(|err| client_error("set channel failed", err))?;
    info!(volume, channel, "startup settings sent");
    Ok(())
}

async fn next_publication(
    subscription: &mut Option<broadcast::Receiver<Publication>>,
) -> Option<Publication> {
    let Some(receiver) = subscription else {
        return std::future::pending().await;
    };
    loop {
        match receiver.recv().await {
            Ok(publication) => return Some(publication),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "publication output lagging"),
            Err(RecvError::Closed) => return None,
        }
    }
}
