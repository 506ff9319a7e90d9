// src/utils/banner.rs

//! Banner-style log helpers.
//!
//! Formats section headers and summaries through the `log` facade so they
//! share the logger configured by the binary.

const RULE_WIDTH: usize = 60;

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(RULE_WIDTH);
    log::info!("{border}");
    log::info!("  {title}");
    log::info!("{border}");
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    log::info!("    {message}");
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {title}");
    for (key, value) in items {
        log::info!("    {key}: {value}");
    }
}
