use crate::Result;
use crate::page::PageAdapter;
use crate::wait::Clock;
use std::time::Duration;

/// Append `entries` to the existing exclude-list text, one per line.
///
/// Existing content is kept (trimmed) and never replaced.
pub fn merge_exclude_text(existing: &str, entries: &[String]) -> String {
    let existing = existing.trim();
    if entries.is_empty() {
        return existing.to_string();
    }
    let added = entries.join("\n");
    if existing.is_empty() {
        added
    } else {
        format!("{}\n{}", existing, added)
    }
}

/// Write the collected websites into the host's exclude list and save it.
///
/// Returns false when the input or the save control is missing; the caller
/// treats that as fatal and does not retry.
pub async fn write_exclude_list<A>(
    page: &mut A,
    clock: &dyn Clock,
    websites: &[String],
    settle: Duration,
) -> Result<bool>
where
    A: PageAdapter + ?Sized,
{
    tracing::info!("Processing {} unique websites for exclusion", websites.len());

    if !page.append_exclude_entries(websites).await? {
        tracing::warn!("Exclude text area not found");
        return Ok(false);
    }

    if !page.click_exclude_save().await? {
        tracing::warn!("Exclude save button not found");
        return Ok(false);
    }

    tracing::debug!("Waiting {:?} for the exclude list to save", settle);
    clock.sleep(settle).await;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_merge_appends_after_existing_content() {
        let merged = merge_exclude_text("old.com\n\n", &entries(&["a.com", "b.com"]));
        assert_eq!(merged, "old.com\na.com\nb.com");
    }

    #[test]
    fn test_merge_into_empty_input() {
        assert_eq!(merge_exclude_text("  ", &entries(&["a.com"])), "a.com");
    }

    #[test]
    fn test_merge_without_entries_keeps_content() {
        assert_eq!(merge_exclude_text("old.com", &[]), "old.com");
    }
}
