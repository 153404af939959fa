mod scraper;

pub use scraper::{ScrapedPage, WebScraper};
