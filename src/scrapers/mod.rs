pub mod browser;
pub mod consent;
pub mod extractor;
pub mod traits;
pub mod types;

pub use browser::ChromeDriver;
pub use consent::{resolve_consent, ConsentState};
pub use extractor::extract_listing;
pub use traits::{BrowserDriver, BrowserSession, ImageFetcher, PageHandle};
