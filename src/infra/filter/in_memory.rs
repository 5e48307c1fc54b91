use crate::core::filter::{BannedWordStore, FilterError};
use async_trait::async_trait;
use dashmap::DashSet;

#[derive(Default)]
pub struct InMemoryWordStore {
    words: DashSet<String>,
}

impl InMemoryWordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BannedWordStore for InMemoryWordStore {
    async fn add_word(&self, word: &str) -> Result<bool, FilterError> {
        Ok(self.words.insert(word.to_string()))
    }

    async fn remove_word(&self, word: &str) -> Result<bool, FilterError> {
        Ok(self.words.remove(word).is_some())
    }

    async fn list_words(&self) -> Result<Vec<String>, FilterError> {
        Ok(self.words.iter().map(|word| word.clone()).collect())
    }
}
