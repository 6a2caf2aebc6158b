use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fmlink_client::Publication;
use fmlink_frame::Event;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum EventValue<'a> {
    Number(u16),
    Text(&'a str),
}

#[derive(Serialize)]
struct EventOutput<'a> {
    event: &'static str,
    tag: u8,
    value: EventValue<'a>,
    timestamp: String,
}

fn event_value(event: &Event) -> EventValue<'_> {
    match event {
        Event::Volume(volume) => EventValue::Number(u16::from(*volume)),
        Event::Channel(channel) => EventValue::Number(*channel),
        Event::RadioName(name) => EventValue::Text(name),
        Event::RadioText(text) => EventValue::Text(text),
    }
}

fn display_value(value: &EventValue<'_>) -> String {
    match value {
        EventValue::Number(n) => n.to_string(),
        EventValue::Text(text) => format!("{text:?}"),
    }
}

pub fn render_event(event: &Event, format: OutputFormat) -> String {
    let tag = event.tag();
    let value = event_value(event);
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                event: tag.name(),
                tag: tag as u8,
                value,
                timestamp: now_unix_seconds(),
            };
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "TAG", "VALUE"])
                .add_row(vec![
                    tag.name().to_string(),
                    format!("0x{:02X}", tag as u8),
                    display_value(&value),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => format!("{}={}", tag.name(), display_value(&value)),
    }
}

pub fn print_event(event: &Event, format: OutputFormat) {
    println!("{}", render_event(event, format));
}

#[derive(Serialize)]
struct PublicationOutput<'a> {
    #[serde(flatten)]
    publication: &'a Publication,
    timestamp: String,
}

pub fn render_publication(publication: &Publication, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let out = PublicationOutput {
                publication,
                timestamp: now_unix_seconds(),
            };
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TOPIC", "FIELD", "VALUE"])
                .add_row(vec![
                    publication.topic.clone(),
                    field_name(publication),
                    publication.value.clone(),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => format!(
            "[{}] {}={:?}",
            publication.topic,
            field_name(publication),
            publication.value
        ),
    }
}

pub fn print_publication(publication: &Publication, format: OutputFormat) {
    println!("{}", render_publication(publication, format));
}

fn field_name(publication: &Publication) -> String {
    match publication.field {
        fmlink_client::RadioField::Name => "name".to_string(),
        fmlink_client::RadioField::Text => "text".to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use fmlink_client::RadioField;

    use super::*;

    #[test]
    fn json_event_carries_name_tag_and_value() {
        let line = render_event(&Event::Channel(954), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "channel");
        assert_eq!(value["tag"], 2);
        assert_eq!(value["value"], 954);

        let line = render_event(&Event::RadioText("news".to_string()), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "radio_text");
        assert_eq!(value["value"], "news");
    }

    #[test]
    fn pretty_event_is_one_line() {
        assert_eq!(render_event(&Event::Volume(5), OutputFormat::Pretty), "volume=5");
        assert_eq!(
            render_event(&Event::RadioName("ABC".to_string()), OutputFormat::Pretty),
            "radio_name=\"ABC\""
        );
    }

    #[test]
    fn table_event_has_header() {
        let table = render_event(&Event::Volume(5), OutputFormat::Table);
        assert!(table.contains("EVENT"));
        assert!(table.contains("0x01"));
    }

    #[test]
    fn json_publication_is_flat() {
        let publication = Publication {
            topic: "radio".to_string(),
            field: RadioField::Text,
            value: "hello".to_string(),
        };
        let line = render_publication(&publication, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["topic"], "radio");
        assert_eq!(value["field"], "text");
        assert!(value.get("timestamp").is_some());

        assert_eq!(
            render_publication(&publication, OutputFormat::Pretty),
            "[radio] text=\"hello\""
        );
    }
}
