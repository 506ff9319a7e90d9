//! Service layer for the harvester.
//!
//! Collaborators the crawl talks to:
//! - Page rendering (`PageRenderer`, `HttpRenderer`)
//! - Structured extraction (`StructuredExtractor`, `SelectorExtractor`)
//! - Browsing session identity (`SessionToken`)

mod extractor;
mod renderer;
mod session;

pub use extractor::{Extraction, ExtractionUsage, SelectorExtractor, StructuredExtractor};
pub use renderer::{HttpRenderer, PageRenderer, RenderedPage};
pub use session::SessionToken;
