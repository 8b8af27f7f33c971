//! Rendering of cinema listings for the terminal.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use kino_core::{Cinema, Movie};
use std::fmt::Write as _;

/// Output format options supported by `kino list`
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable listing
    Text,
    /// Pretty-printed JSON in the same shape the HTTP service returns
    Json,
}

impl OutputFormat {
    /// Whether the format is meant for other programs to consume.
    pub const fn is_machine_readable(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Render `cinemas` in `format`.
pub fn render(cinemas: &[Cinema], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(cinemas)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(cinemas)?),
    }
}

fn render_text(cinemas: &[Cinema]) -> String {
    if cinemas.is_empty() {
        return "No cinemas listed.\n".to_string();
    }

    let mut out = String::new();
    for cinema in cinemas {
        let _ = writeln!(out, "{}", cinema.name.bold());
        if cinema.movies.is_empty() {
            let _ = writeln!(out, "  {}", "no screenings".bright_black());
        }
        for movie in &cinema.movies {
            let _ = writeln!(out, "  {}", movie_line(movie));
        }
        out.push('\n');
    }
    out
}

fn movie_line(movie: &Movie) -> String {
    let rating = if movie.rating.is_unknown() {
        movie.rating.to_string().bright_black()
    } else {
        movie.rating.to_string().green()
    };

    let mut line = format!("{} [{}]", movie.name, rating);
    if !movie.times.is_empty() {
        let _ = write!(line, "  {}", movie.times.join(", "));
    }
    if !movie.flags.is_empty() {
        let _ = write!(line, "  ({})", movie.flags.join(", "));
    }
    line
}
