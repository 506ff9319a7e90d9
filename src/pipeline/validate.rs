// src/pipeline/validate.rs

use crate::error::Result;
use crate::models::Config;
use crate::services::SelectorExtractor;
use crate::utils::banner;

/// Validate configuration and compile the extractor rules.
pub fn run_validate(config: &Config) -> Result<()> {
    banner::header("Validating configuration");

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {e}");
        return Err(e);
    }
    SelectorExtractor::new(&config.extractor)?;

    log::info!("✓ Config OK");
    banner::sub_item(&format!("Source: {}", config.source.base_url));
    banner::sub_item(&format!("User agent: {}", config.crawler.user_agent));
    banner::sub_item(&format!("Page delay: {} ms", config.crawler.page_delay_ms));
    banner::sub_item(&format!(
        "Empty page limit: {}",
        config.crawler.empty_page_limit
    ));
    banner::sub_item(&format!(
        "Required fields: {}",
        config.schema.required.join(", ")
    ));
    banner::sub_item(&format!(
        "Archive: {}",
        config.paths.archive_file.display()
    ));

    Ok(())
}
