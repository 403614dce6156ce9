//! Embedding with split-and-average fallback
//!
//! When the provider rejects a text (typically because it is too long),
//! the text is cut in two near its middle, each half is embedded the same
//! way, and the two vectors are averaged element-wise.
//!
//! Author: hephaex@gmail.com

use futures::future::{BoxFuture, FutureExt};
use mm_core::{EmbeddingProvider, Result};

/// Limits on recursive splitting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitPolicy {
    /// Give up after this many nested splits (unbounded when `None`)
    pub max_depth: Option<u32>,
}

impl SplitPolicy {
    pub fn unbounded() -> Self {
        Self { max_depth: None }
    }

    pub fn with_max_depth(max_depth: u32) -> Self {
        Self {
            max_depth: Some(max_depth),
        }
    }
}

/// Byte offset at which to cut `text` in two
///
/// Prefers the position just after the last `.` before the character
/// midpoint, then just after the first `.` from the midpoint on, then the
/// midpoint itself. Returns `None` for texts shorter than two characters.
/// Both halves are always non-empty.
pub fn split_point(text: &str) -> Option<usize> {
    let char_count = text.chars().count();
    if char_count < 2 {
        return None;
    }

    let mid = text.char_indices().nth(char_count / 2).map(|(i, _)| i)?;

    let after_period = text[..mid]
        .rfind('.')
        .or_else(|| text[mid..].find('.').map(|p| mid + p))
        .map(|p| p + 1);

    match after_period {
        Some(cut) if cut < text.len() => Some(cut),
        _ => Some(mid),
    }
}

/// Element-wise mean of two vectors
pub fn average(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| (x + y) / 2.0).collect()
}

/// Embed `text`, splitting and averaging whenever the provider fails
///
/// Returns the provider's error if a text that cannot be split further
/// (or that sits at the depth limit) is still rejected.
pub fn embed_with_fallback<'a>(
    embedder: &'a dyn EmbeddingProvider,
    text: &'a str,
    policy: SplitPolicy,
) -> BoxFuture<'a, Result<Vec<f32>>> {
    embed_at_depth(embedder, text, policy, 0)
}

fn embed_at_depth<'a>(
    embedder: &'a dyn EmbeddingProvider,
    text: &'a str,
    policy: SplitPolicy,
    depth: u32,
) -> BoxFuture<'a, Result<Vec<f32>>> {
    async move {
        let err = match embedder.embed(text).await {
            Ok(embedding) => return Ok(embedding),
            Err(err) => err,
        };

        if policy.max_depth.is_some_and(|max| depth >= max) {
            return Err(err);
        }
        let Some(cut) = split_point(text) else {
            return Err(err);
        };

        tracing::debug!(
            depth,
            chars = text.chars().count(),
            error = %err,
            "Embedding failed, splitting text"
        );

        let (first, second) = text.split_at(cut);
        let first = embed_at_depth(embedder, first, policy, depth + 1).await?;
        let second = embed_at_depth(embedder, second, policy, depth + 1).await?;

        Ok(average(&first, &second))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mm_core::MmError;
    use proptest::prelude::*;
    use std::sync::Mutex;

    /// Accepts texts up to `limit` characters; embeds as `[chars, first byte]`
    struct LimitedEmbedder {
        limit: usize,
        seen: Mutex<Vec<String>>,
    }

    impl LimitedEmbedder {
        fn new(limit: usize) -> Self {
            Self {
                limit,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for LimitedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.seen.lock().unwrap().push(text.to_string());
            let chars = text.chars().count();
            if chars > self.limit {
                return Err(MmError::EmbeddingError("input too long".to_string()));
            }
            let first = text.bytes().next().unwrap_or(0) as f32;
            Ok(vec![chars as f32, first])
        }

        fn model(&self) -> &str {
            "limited"
        }
    }

    #[test]
    fn test_split_prefers_period_before_midpoint() {
        let text = "One. Two three four five six.";
        let cut = split_point(text).unwrap();
        assert_eq!(&text[..cut], "One.");
    }

    #[test]
    fn test_split_uses_period_after_midpoint() {
        let text = "abcdefghij klmnop. qrs";
        let cut = split_point(text).unwrap();
        assert_eq!(&text[..cut], "abcdefghij klmnop.");
        assert_eq!(&text[cut..], " qrs");
    }

    #[test]
    fn test_split_without_periods_uses_midpoint() {
        assert_eq!(split_point("abcdef"), Some(3));
        assert_eq!(split_point("ab"), Some(1));
    }

    #[test]
    fn test_trailing_period_falls_back_to_midpoint() {
        // The only period ends the text; cutting there would not shrink it
        assert_eq!(split_point("abcd."), Some(2));
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "ééééé";
        let cut = split_point(text).unwrap();
        assert!(text.is_char_boundary(cut));
        assert_eq!(text[..cut].chars().count(), 2);
    }

    #[test]
    fn test_unsplittable_text() {
        assert_eq!(split_point(""), None);
        assert_eq!(split_point("x"), None);
    }

    #[tokio::test]
    async fn test_fitting_text_is_embedded_directly() {
        let embedder = LimitedEmbedder::new(100);
        let v = embed_with_fallback(&embedder, "A short plot.", SplitPolicy::default())
            .await
            .unwrap();
        assert_eq!(v, vec![13.0, b'A' as f32]);
        assert_eq!(embedder.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_text_is_average_of_halves() {
        let embedder = LimitedEmbedder::new(12);
        let text = "Hero leaves. Villain waits."; // 27 chars, cut after "Hero leaves."

        let v = embed_with_fallback(&embedder, text, SplitPolicy::default())
            .await
            .unwrap();

        let first = [12.0, b'H' as f32];
        let second = [15.0, b' ' as f32];
        // second half (15 chars) is split again at its midpoint " Villai" / "n waits."
        let second_left = [7.0, b' ' as f32];
        let second_right = [8.0, b'n' as f32];
        let second_avg = average(&second_left, &second_right);
        assert_ne!(second_avg, second.to_vec());

        assert_eq!(v, average(&first, &second_avg));
    }

    #[tokio::test]
    async fn test_single_char_failure_is_returned() {
        let embedder = LimitedEmbedder::new(0);
        let result = embed_with_fallback(&embedder, "abc", SplitPolicy::default()).await;
        assert!(matches!(result, Err(MmError::EmbeddingError(_))));
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let embedder = LimitedEmbedder::new(1);
        let text = "abcdefghijklmnop";

        let limited = embed_with_fallback(&embedder, text, SplitPolicy::with_max_depth(2)).await;
        assert!(limited.is_err());

        let unlimited = embed_with_fallback(&embedder, text, SplitPolicy::unbounded()).await;
        assert!(unlimited.is_ok());
    }

    proptest! {
        #[test]
        fn prop_split_point_shrinks_both_halves(text in "[a-z .]{2,80}") {
            let cut = split_point(&text).unwrap();
            let (a, b) = text.split_at(cut);
            prop_assert!(!a.is_empty());
            prop_assert!(!b.is_empty());
            prop_assert_eq!(format!("{a}{b}"), text.clone());
        }

        #[test]
        fn prop_fallback_terminates(text in "[a-zA-Z ,.]{1,200}", limit in 1usize..20) {
            let embedder = LimitedEmbedder::new(limit);
            let result = tokio_test::block_on(
                embed_with_fallback(&embedder, &text, SplitPolicy::default()),
            );
            prop_assert!(result.is_ok());
            prop_assert_eq!(result.unwrap().len(), 2);
        }
    }
}
