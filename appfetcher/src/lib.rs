pub mod error;
pub mod fetcher;
pub mod loader;
pub mod mapper;
pub mod models;
pub mod params;
pub mod parse;

pub use crate::fetcher::AppRecordFetcher;
pub use crate::loader::RecordLoader;
pub use crate::params::LoaderParams;
