// Console commands for the banned-word list.

use super::{arg, Context, Error};
use crate::core::permissions::Capability;

pub async fn badword(ctx: Context<'_>, args: &[&str]) -> Result<String, Error> {
    ctx.require(Capability::Administer)?;
    let filter = &ctx.data().filter;
    let action: String = arg(args, 0, "add|remove|list")?;

    match action.as_str() {
        "add" => {
            let word: String = arg(args, 1, "word")?;
            Ok(if filter.add_word(&word).await? {
                format!("Added '{}' to banned words", word.to_lowercase())
            } else {
                format!("'{}' is already banned", word.to_lowercase())
            })
        }
        "remove" => {
            let word: String = arg(args, 1, "word")?;
            Ok(if filter.remove_word(&word).await? {
                format!("Removed '{}' from banned words", word.to_lowercase())
            } else {
                format!("'{}' was not banned", word.to_lowercase())
            })
        }
        "list" => {
            let words = filter.list_words().await?;
            Ok(if words.is_empty() {
                "No banned words".to_string()
            } else {
                format!("Banned words ({}): {}", words.len(), words.join(", "))
            })
        }
        other => Err(format!("unknown badword action '{other}'").into()),
    }
}
