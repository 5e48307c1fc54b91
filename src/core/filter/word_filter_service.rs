// Banned-word filter.
//
// Words are stored lowercase. A message is filtered when its lowercased text
// contains any banned word as a substring.

use async_trait::async_trait;
use thiserror::Error;

pub const MIN_WORD_LEN: usize = 2;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Banned words must be at least 2 characters, got {0:?}")]
    WordTooShort(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait BannedWordStore: Send + Sync {
    /// Returns false if the word was already present.
    async fn add_word(&self, word: &str) -> Result<bool, FilterError>;

    /// Returns false if the word was not present.
    async fn remove_word(&self, word: &str) -> Result<bool, FilterError>;

    async fn list_words(&self) -> Result<Vec<String>, FilterError>;
}

#[async_trait]
impl<T: BannedWordStore + ?Sized> BannedWordStore for Box<T> {
    async fn add_word(&self, word: &str) -> Result<bool, FilterError> {
        (**self).add_word(word).await
    }

    async fn remove_word(&self, word: &str) -> Result<bool, FilterError> {
        (**self).remove_word(word).await
    }

    async fn list_words(&self) -> Result<Vec<String>, FilterError> {
        (**self).list_words().await
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct WordFilterService<S: BannedWordStore> {
    store: S,
}

fn normalize(word: &str) -> String {
    word.trim().to_lowercase()
}

impl<S: BannedWordStore> WordFilterService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn add_word(&self, word: &str) -> Result<bool, FilterError> {
        let word = normalize(word);
        if word.chars().count() < MIN_WORD_LEN {
            return Err(FilterError::WordTooShort(word));
        }
        let added = self.store.add_word(&word).await?;
        if added {
            tracing::info!(word = %word, "Banned word added");
        }
        Ok(added)
    }

    pub async fn remove_word(&self, word: &str) -> Result<bool, FilterError> {
        let word = normalize(word);
        let removed = self.store.remove_word(&word).await?;
        if removed {
            tracing::info!(word = %word, "Banned word removed");
        }
        Ok(removed)
    }

    /// Alphabetical.
    pub async fn list_words(&self) -> Result<Vec<String>, FilterError> {
        let mut words = self.store.list_words().await?;
        words.sort();
        Ok(words)
    }

    /// The first banned word (alphabetically) found in `content`, if any.
    pub async fn check(&self, content: &str) -> Result<Option<String>, FilterError> {
        let content = content.to_lowercase();
        Ok(self
            .list_words()
            .await?
            .into_iter()
            .find(|word| content.contains(word.as_str())))
    }
}

// ============================================================================
// TESTS
// ============================================================================
