use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Line format shared by the console and the per-run log file, e.g.
///
/// ```text
/// [2026-10-14T04:06:00.123456+02:00]  [INFO ] [run_sampling] [typhoon_subset::pipeline: src/pipeline.rs:72]: Loading data from "WP"
/// ```
///
/// The third field is the innermost span (`run_sampling` for the whole
/// pipeline), or the module name for events logged outside any span.
pub struct BracketedFormatter;

impl<S, N> FormatEvent<S, N> for BracketedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        let now = chrono::Local::now();
        write!(writer, "[{}]  ", now.format("%Y-%m-%dT%H:%M:%S%.6f%:z"))?;
        write!(writer, "[{:5}] ", metadata.level())?;

        let scope_name = match ctx.event_scope() {
            Some(scope) => scope.from_root().last().map(|span| span.name()).unwrap_or("unknown"),
            None => module_name(metadata.target()),
        };
        write!(writer, "[{}] ", scope_name)?;

        if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
            write!(writer, "[{}: {}:{}]: ", metadata.target(), file, line)?;
        } else {
            write!(writer, "[{}]: ", metadata.target())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// `typhoon_subset::core::sampling::selector` -> `selector`
fn module_name(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}
