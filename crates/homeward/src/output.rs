//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Detail views use a
//! pre-formatted string, structured formats go through serde.

use std::io::{self, IsTerminal};

use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses a custom `detail_fn` returning a pre-formatted
/// string; `plain` emits just the identifier from `id_fn`.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

fn render_json<T: serde::Serialize>(data: &T, compact: bool) -> String {
    let result = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    result.unwrap_or_else(|e| format!("serialization error: {e}"))
}

fn render_yaml<T: serde::Serialize>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("serialization error: {e}"))
}

/// Render key/value detail rows as a two-column table.
pub fn render_kv(rows: &[(&str, String)]) -> String {
    #[derive(Tabled)]
    struct Row<'a> {
        #[tabled(rename = "Field")]
        key: &'a str,
        #[tabled(rename = "Value")]
        value: &'a str,
    }

    let rows: Vec<Row<'_>> = rows
        .iter()
        .map(|(key, value)| Row {
            key,
            value: value.as_str(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    println!("{output}");
}
