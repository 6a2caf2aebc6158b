use std::time::Duration;

use fmlink_client::EventForwarder;
use fmlink_frame::{Event, EventTag};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::cmd::{parse_duration, SetArgs, SetTarget};
use crate::exit::{client_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_event, OutputFormat};

/// Reports of each kind the device sends to a client as it joins. They carry
/// the state from before the command.
const JOIN_REPORTS: usize = 1;

pub async fn run(args: SetArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let (forwarder, mut events) = EventForwarder::channel();
    let connection = args.connect.open(forwarder).await?;

    let sent = match args.target {
        SetTarget::Volume => connection.set_volume(args.value).await,
        SetTarget::Channel => connection.set_channel(args.value).await,
    };
    sent.map_err(|err| client_error("send failed", err))?;
    info!(setting = ?args.target, value = args.value, "command sent");

    if args.wait {
        let event = wait_for_report(
            &mut events,
            report_tag(args.target),
            JOIN_REPORTS,
            wait_timeout,
        )
        .await;
        connection.close().await;
        print_event(&event?, format);
    } else {
        connection.close().await;
    }

    Ok(SUCCESS)
}

fn report_tag(target: SetTarget) -> EventTag {
    match target {
        SetTarget::Volume => EventTag::Volume,
        SetTarget::Channel => EventTag::Channel,
    }
}

/// Wait for the first event of kind `tag` after the first `skip` of that kind.
///
/// Reports of other kinds are ignored.
async fn wait_for_report(
    events: &mut UnboundedReceiver<Event>,
    tag: EventTag,
    skip: usize,
    timeout: Duration,
) -> CliResult<Event> {
    let wait = async {
        let mut skipped = 0usize;
        while let Some(event) = events.recv().await {
            if event.tag() != tag {
                debug!(event = event.tag().name(), "skipping unrelated report");
            } else if skipped < skip {
                skipped += 1;
                debug!(?event, "skipping join report");
            } else {
                return Ok(event);
            }
        }
        Err(CliError::new(
            FAILURE,
            "connection closed before the device reported back",
        ))
    };

    tokio::time::timeout(timeout, wait).await.map_err(|_| {
        CliError::new(
            TIMEOUT,
            format!("no {} report within {timeout:?}", tag.name()),
        )
    })?
}
