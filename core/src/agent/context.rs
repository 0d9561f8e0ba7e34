//! Turning the transcript into a request payload
//!
//! The transcript itself is never modified; strategies work on a copy.

use crate::llm::{ContentBlock, LlmMessage, ToolResultContent};

/// Builds the messages sent to the model from the full transcript
pub trait ContextStrategy: Send + Sync {
    /// Produce the payload for one model consultation
    fn build_payload(&self, transcript: &[LlmMessage]) -> Vec<LlmMessage>;

    /// Strategy name for logs
    fn name(&self) -> &str;
}

/// Sends the whole transcript every time
#[derive(Debug, Clone, Copy, Default)]
pub struct FullTranscript;

impl ContextStrategy for FullTranscript {
    fn build_payload(&self, transcript: &[LlmMessage]) -> Vec<LlmMessage> {
        transcript.to_vec()
    }

    fn name(&self) -> &str {
        "full_transcript"
    }
}

/// Keeps only the `keep` most recent images inside tool results
#[derive(Debug, Clone, Copy)]
pub struct RecentImages {
    pub keep: usize,
}

impl RecentImages {
    pub fn new(keep: usize) -> Self {
        Self { keep }
    }
}

impl Default for RecentImages {
    fn default() -> Self {
        Self { keep: 3 }
    }
}

impl ContextStrategy for RecentImages {
    fn build_payload(&self, transcript: &[LlmMessage]) -> Vec<LlmMessage> {
        let mut payload = transcript.to_vec();

        let total: usize = payload
            .iter()
            .flat_map(|m| m.content.iter())
            .map(image_count)
            .sum();

        let mut to_remove = total.saturating_sub(self.keep);
        if to_remove == 0 {
            return payload;
        }

        // Oldest images go first
        'messages: for message in payload.iter_mut() {
            for block in message.content.iter_mut() {
                if to_remove == 0 {
                    break 'messages;
                }
                if let ContentBlock::ToolResult { content, .. } = block {
                    content.retain(|part| {
                        if to_remove > 0 && matches!(part, ToolResultContent::Image { .. }) {
                            to_remove -= 1;
                            false
                        } else {
                            true
                        }
                    });
                }
            }
        }

        payload
    }

    fn name(&self) -> &str {
        "recent_images"
    }
}

fn image_count(block: &ContentBlock) -> usize {
    match block {
        ContentBlock::ToolResult { content, .. } => content
            .iter()
            .filter(|part| matches!(part, ToolResultContent::Image { .. }))
            .count(),
        _ => 0,
    }
}

/// Strategy for a configured image budget, 0 disables pruning
pub fn strategy_for(keep_recent_images: usize) -> Box<dyn ContextStrategy> {
    if keep_recent_images == 0 {
        Box::new(FullTranscript)
    } else {
        Box::new(RecentImages::new(keep_recent_images))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolOutput;

    fn screenshot_round(id: &str, data: &str) -> LlmMessage {
        LlmMessage::tool_results(vec![ToolOutput::ok(format!("step {id}"))
            .with_image(data)
            .into_block(id)])
    }

    fn images_in(payload: &[LlmMessage]) -> Vec<String> {
        payload
            .iter()
            .flat_map(|m| m.content.iter())
            .filter_map(|b| match b {
                ContentBlock::ToolResult { content, .. } => Some(content),
                _ => None,
            })
            .flatten()
            .filter_map(|p| match p {
                ToolResultContent::Image { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_keeps_most_recent_images() {
        let transcript: Vec<LlmMessage> = (1..=5)
            .map(|i| screenshot_round(&format!("t{i}"), &format!("img{i}")))
            .collect();

        let payload = RecentImages::new(3).build_payload(&transcript);
        assert_eq!(images_in(&payload), vec!["img3", "img4", "img5"]);

        // Text parts survive pruning
        let ContentBlock::ToolResult { content, .. } = &payload[0].content[0] else {
            panic!("expected tool result");
        };
        assert_eq!(content.len(), 1);
    }

    #[test]
    fn test_transcript_is_untouched() {
        let transcript = vec![
            screenshot_round("t1", "img1"),
            screenshot_round("t2", "img2"),
        ];
        let before = transcript.clone();
        let _ = RecentImages::new(1).build_payload(&transcript);
        assert_eq!(transcript, before);
    }

    #[test]
    fn test_under_budget_is_unchanged() {
        let transcript = vec![screenshot_round("t1", "img1")];
        let payload = RecentImages::default().build_payload(&transcript);
        assert_eq!(payload, transcript);
    }

    #[test]
    fn test_zero_budget_means_full_transcript() {
        let transcript = vec![
            screenshot_round("t1", "img1"),
            screenshot_round("t2", "img2"),
        ];
        let strategy = strategy_for(0);
        assert_eq!(strategy.name(), "full_transcript");
        assert_eq!(images_in(&strategy.build_payload(&transcript)).len(), 2);
    }
}
