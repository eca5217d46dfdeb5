//! Crawl queue implementations and the worker that drains them.

pub mod memory;
pub mod worker;

pub use memory::MemoryCrawlQueue;
pub use worker::{CrawlWorker, CrawlWorkerConfig};
