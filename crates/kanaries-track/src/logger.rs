// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log formatting for the tracking client.
//!
//! Every line is prefixed so the client's own diagnostics stand out in the
//! host application's output:
//!
//! ```text
//! KANARIES_TRACK | LEVEL | [span_name{span_fields}:] message {event_fields}
//! ```
//!
//! ```text
//! KANARIES_TRACK | DEBUG | Consumer 0 uploading 12 events
//! KANARIES_TRACK | WARN | Event queue is full, dropping event queue_size=20000
//! ```
//!
//! The library only installs a subscriber when asked to: [`init`] is called by
//! the emitter binary, and by every client built with `debug` set. An already
//! installed global subscriber is left in place.

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

const LOG_PREFIX: &str = "KANARIES_TRACK";

/// Event formatter for the client's diagnostics.
///
/// # Format
///
/// 1. **Prefix**: always `KANARIES_TRACK`, so the lines can be filtered out of
///    the host application's output
/// 2. **Level**: `ERROR`, `WARN`, `INFO`, `DEBUG` or `TRACE`
/// 3. **Span context**: every active span from the root, each as
///    `name{fields}: `, braces omitted when the span has no fields
/// 4. **Message and fields**: rendered by the subscriber's field formatter
///
/// ```text
/// KANARIES_TRACK | WARN | Failed to send 3 events after 210 ms and 5 attempts, dropping batch: ...
/// KANARIES_TRACK | DEBUG | consumer{id=0}: uploading count=12
/// ```
///
/// Colors are not part of the format; [`init`] disables ANSI output.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(&mut writer, "{LOG_PREFIX} | {} | ", metadata.level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                // Populated by the fmt layer in `new_span`
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Builds the filter used by [`init`]: `RUST_LOG` when set, otherwise the
/// crate's level with noisy HTTP internals silenced.
pub fn env_filter(debug: bool) -> EnvFilter {
    let level = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("h2=off,hyper=off,rustls=off,{level}")))
}

/// Installs a global fmt subscriber using [`Formatter`]. No-op when a global
/// subscriber already exists.
pub fn init(debug: bool) {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter(debug))
        .with_ansi(false)
        .event_format(Formatter)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(buffer.clone())
            .with_ansi(false)
            .event_format(Formatter)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        buffer.contents()
    }

    #[test]
    fn test_prefix_and_level() {
        let output = capture(|| tracing::warn!(queue_size = 3, "queue is full"));
        assert_eq!(output, "KANARIES_TRACK | WARN | queue is full queue_size=3\n");
    }

    #[test]
    fn test_span_context_is_included() {
        let output = capture(|| {
            let span = tracing::debug_span!("consumer", id = 1);
            let _guard = span.enter();
            tracing::debug!("uploading");
        });
        assert_eq!(output, "KANARIES_TRACK | DEBUG | consumer{id=1}: uploading\n");
    }
}
