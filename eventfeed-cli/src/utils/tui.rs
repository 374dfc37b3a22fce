use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TICK_STRINGS: &[&str] = &["-", "\\", "|", "/"];

/// Spinner drawn on stderr.
pub fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner().tick_strings(TICK_STRINGS);
    spinner.set_style(style.clone().template("{msg} {spinner}").unwrap_or(style));
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
