pub mod caption;
pub mod fetcher;
pub mod manifest;
pub mod processor;
pub mod reconcile;
