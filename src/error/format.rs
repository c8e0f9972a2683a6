use crate::error::{ErrorContext, HabitatError};
use colored::Colorize;

pub fn format_error_chain(error: &HabitatError) -> String {
    let context = ErrorContext::new(error);
    context.to_string()
}

/// Error report for the terminal: headline, details, then one bullet per
/// suggestion line. Styling is applied only when `use_color` is set.
pub fn format_error_with_color(error: &HabitatError, use_color: bool) -> String {
    let paint = |text: &str, style: fn(&str) -> colored::ColoredString| {
        if use_color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    };

    let context = ErrorContext::new(error);
    let mut output = format!("{} {error}\n", paint("Error:", |s| s.red().bold()));

    if let Some(details) = &context.details {
        output.push_str(&format!("\n{details}\n"));
    }

    if let Some(suggestion) = &context.suggestion {
        output.push_str(&format!("\n{}\n", paint("Suggestions:", |s| s.yellow().bold())));
        for line in suggestion.lines().filter(|line| !line.trim().is_empty()) {
            output.push_str(&paint(&format!("• {line}"), |s| s.cyan()));
            output.push('\n');
        }
    }

    output
}
