pub mod catalog;
pub mod chrome;

pub use catalog::HttpCatalogFetcher;
pub use chrome::ChromeDetailFetcher;
