//! Stacktrace reconstruction from issue events
//!
//! Walks an event's entries in order, picks the `exception` entries and
//! renders every chained exception with its frames and source context.

use crate::types::EventRecord;
use serde::de::IgnoredAny;
use serde::Deserialize;

/// Returned when an event carries no exception entries
pub const NO_STACKTRACE: &str = "No stacktrace found";

const EXCEPTION_ENTRY: &str = "exception";

#[derive(Debug, Default, Deserialize)]
struct ExceptionData {
    #[serde(default)]
    values: Vec<ExceptionValue>,
}

#[derive(Debug, Default, Deserialize)]
struct ExceptionValue {
    #[serde(default, rename = "type")]
    exception_type: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    stacktrace: Option<Stacktrace>,
}

#[derive(Debug, Default, Deserialize)]
struct Stacktrace {
    #[serde(default)]
    frames: Vec<Frame>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Frame {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    line_no: Option<u64>,
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    context: Option<Vec<ContextLine>>,
}

/// `[lineNo, source]` pair
/// `[line_no, source]`; only the source is rendered
#[derive(Debug, Deserialize)]
struct ContextLine(IgnoredAny, Option<String>);

/// Render the event's exceptions as a readable trace
///
/// Returns [`NO_STACKTRACE`] when there is nothing to render. Exception
/// entries whose payload cannot be read are skipped.
pub fn format_stacktrace(event: &EventRecord) -> String {
    let mut blocks = Vec::new();

    for entry in &event.entries {
        if entry.entry_type != EXCEPTION_ENTRY {
            continue;
        }

        let data: ExceptionData = match serde_json::from_value(entry.data.clone()) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(
                    event_id = ?event.event_id,
                    error = %e,
                    "Skipping unreadable exception entry"
                );
                continue;
            }
        };

        for exception in &data.values {
            blocks.push(render_exception(exception));
        }
    }

    if blocks.is_empty() {
        NO_STACKTRACE.to_string()
    } else {
        blocks.join("\n")
    }
}

fn render_exception(exception: &ExceptionValue) -> String {
    let mut text = format!(
        "Exception: {}: {}\n\n",
        exception.exception_type.as_deref().unwrap_or("Unknown"),
        exception.value.as_deref().unwrap_or(""),
    );

    let Some(ref stacktrace) = exception.stacktrace else {
        return text;
    };

    text.push_str("Stacktrace:\n");
    for frame in &stacktrace.frames {
        let line = frame
            .line_no
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        text.push_str(&format!(
            "{}:{} in {}\n",
            frame.filename.as_deref().unwrap_or("Unknown"),
            line,
            frame.function.as_deref().unwrap_or("Unknown"),
        ));

        for ContextLine(_, source) in frame.context.iter().flatten() {
            text.push_str("    ");
            text.push_str(source.as_deref().unwrap_or(""));
            text.push('\n');
        }

        text.push('\n');
    }

    text
}
