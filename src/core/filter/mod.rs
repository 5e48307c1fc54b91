pub mod word_filter_service;

pub use word_filter_service::*;
