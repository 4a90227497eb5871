//! Task history: the record model and its durable repository.

mod record;
mod repository;

pub use record::DownloadRecord;
pub use repository::HistoryRepository;
