pub mod browser;
pub mod columns;
pub mod completion;
pub mod health;
pub mod receive;
pub mod scrape;
pub mod select_next;
