//! Per-generation stream state owned by an event producer.
//!
//! A producer keeps exactly one [`StreamState`] per in-flight generation and
//! consults the `should_emit_*` predicates before emitting start events, so a
//! generation never reports two starts without an intervening complete.

use serde::{Deserialize, Serialize};

/// Token usage accumulator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_tokens: Option<u64>,
}

// Absent is the additive identity; it never erases a recorded value.
fn sum_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.saturating_add(b)),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            ..Self::default()
        }
    }

    pub fn cache_write_input_tokens(mut self, tokens: u64) -> Self {
        self.cache_write_input_tokens = Some(tokens);
        self
    }

    pub fn cache_read_input_tokens(mut self, tokens: u64) -> Self {
        self.cache_read_input_tokens = Some(tokens);
        self
    }

    pub fn thought_tokens(mut self, tokens: u64) -> Self {
        self.thought_tokens = Some(tokens);
        self
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }

    /// Field-wise sum of two usage records.
    pub fn combine(&self, other: &Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens.saturating_add(other.prompt_tokens),
            completion_tokens: self
                .completion_tokens
                .saturating_add(other.completion_tokens),
            cache_write_input_tokens: sum_optional(
                self.cache_write_input_tokens,
                other.cache_write_input_tokens,
            ),
            cache_read_input_tokens: sum_optional(
                self.cache_read_input_tokens,
                other.cache_read_input_tokens,
            ),
            thought_tokens: sum_optional(self.thought_tokens, other.thought_tokens),
        }
    }
}

/// Mutable state for one in-flight generation.
#[derive(Clone, Debug, Default)]
pub struct StreamState {
    message_id: String,
    reasoning_id: String,
    model: String,
    has_stream_started: bool,
    has_text_started: bool,
    has_thinking_started: bool,
    step_open: bool,
    current_text: String,
    current_thinking: String,
    usage: Option<Usage>,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.message_id = id.into();
        self
    }

    pub fn with_reasoning_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.reasoning_id = id.into();
        self
    }

    pub fn with_model(&mut self, model: impl Into<String>) -> &mut Self {
        self.model = model.into();
        self
    }

    pub fn mark_stream_started(&mut self) -> &mut Self {
        self.has_stream_started = true;
        self
    }

    pub fn mark_step_started(&mut self) -> &mut Self {
        self.step_open = true;
        self
    }

    pub fn mark_step_finished(&mut self) -> &mut Self {
        self.step_open = false;
        self
    }

    pub fn mark_text_started(&mut self) -> &mut Self {
        self.has_text_started = true;
        self
    }

    pub fn mark_text_completed(&mut self) -> &mut Self {
        self.has_text_started = false;
        self
    }

    pub fn mark_thinking_started(&mut self) -> &mut Self {
        self.has_thinking_started = true;
        self
    }

    pub fn mark_thinking_completed(&mut self) -> &mut Self {
        self.has_thinking_started = false;
        self
    }

    pub fn append_text(&mut self, delta: &str) -> &mut Self {
        self.current_text.push_str(delta);
        self
    }

    pub fn append_thinking(&mut self, delta: &str) -> &mut Self {
        self.current_thinking.push_str(delta);
        self
    }

    /// Merges `usage` into the running total. The first call seeds it verbatim.
    pub fn add_usage(&mut self, usage: Usage) -> &mut Self {
        self.usage = Some(match self.usage.take() {
            Some(existing) => existing.combine(&usage),
            None => usage,
        });
        self
    }

    /// Clears turn-scoped fields so a new model turn can reuse the outer stream.
    ///
    /// `has_stream_started` and `usage` survive a reset.
    pub fn reset(&mut self) -> &mut Self {
        self.message_id.clear();
        self.reasoning_id.clear();
        self.current_text.clear();
        self.current_thinking.clear();
        self.has_text_started = false;
        self.has_thinking_started = false;
        self
    }

    pub fn should_emit_stream_start(&self) -> bool {
        !self.has_stream_started
    }

    pub fn should_emit_text_start(&self) -> bool {
        !self.has_text_started
    }

    pub fn should_emit_thinking_start(&self) -> bool {
        !self.has_thinking_started
    }

    pub fn should_emit_step_start(&self) -> bool {
        !self.step_open
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn reasoning_id(&self) -> &str {
        &self.reasoning_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_stream_started(&self) -> bool {
        self.has_stream_started
    }

    pub fn has_text_started(&self) -> bool {
        self.has_text_started
    }

    pub fn has_thinking_started(&self) -> bool {
        self.has_thinking_started
    }

    pub fn is_step_open(&self) -> bool {
        self.step_open
    }

    pub fn current_text(&self) -> &str {
        &self.current_text
    }

    pub fn current_thinking(&self) -> &str {
        &self.current_thinking
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_usage_seeds_accumulator_verbatim() {
        let mut state = StreamState::new();
        let first = Usage::new(10, 5).cache_read_input_tokens(3);
        state.add_usage(first.clone());
        assert_eq!(state.usage(), Some(&first));
    }

    #[test]
    fn usage_sums_elementwise() {
        let mut state = StreamState::new();
        state
            .add_usage(Usage::new(10, 5).thought_tokens(2))
            .add_usage(Usage::new(7, 1).thought_tokens(4));
        let usage = state.usage().expect("usage");
        assert_eq!(usage.prompt_tokens, 17);
        assert_eq!(usage.completion_tokens, 6);
        assert_eq!(usage.thought_tokens, Some(6));
        assert_eq!(usage.total_tokens(), 23);
    }

    #[test]
    fn absent_optional_fields_do_not_erase_recorded_values() {
        let mut state = StreamState::new();
        state
            .add_usage(
                Usage::new(1, 1)
                    .cache_write_input_tokens(8)
                    .cache_read_input_tokens(4),
            )
            .add_usage(Usage::new(1, 1));
        let usage = state.usage().expect("usage");
        assert_eq!(usage.cache_write_input_tokens, Some(8));
        assert_eq!(usage.cache_read_input_tokens, Some(4));
        assert_eq!(usage.thought_tokens, None);

        state.add_usage(Usage::new(0, 0).thought_tokens(9));
        assert_eq!(state.usage().and_then(|u| u.thought_tokens), Some(9));
    }

    #[test]
    fn reset_preserves_stream_start_and_usage() {
        let mut state = StreamState::new();
        state
            .with_message_id("msg_1")
            .with_reasoning_id("rs_1")
            .with_model("gpt-5-nano")
            .mark_stream_started()
            .mark_text_started()
            .mark_thinking_started()
            .append_text("hello")
            .append_thinking("hmm")
            .add_usage(Usage::new(3, 4));

        state.reset();

        assert!(state.has_stream_started());
        assert!(!state.should_emit_stream_start());
        assert_eq!(state.usage(), Some(&Usage::new(3, 4)));
        assert_eq!(state.message_id(), "");
        assert_eq!(state.reasoning_id(), "");
        assert_eq!(state.current_text(), "");
        assert_eq!(state.current_thinking(), "");
        assert!(state.should_emit_text_start());
        assert!(state.should_emit_thinking_start());
        assert_eq!(state.model(), "gpt-5-nano");
    }

    #[test]
    fn step_predicate_toggles_with_start_and_finish() {
        let mut state = StreamState::new();
        assert!(state.should_emit_step_start());
        state.mark_step_started();
        assert!(!state.should_emit_step_start());
        state.mark_step_finished();
        assert!(state.should_emit_step_start());
    }

    #[test]
    fn completing_unstarted_flags_is_a_no_op() {
        let mut state = StreamState::new();
        state
            .mark_text_completed()
            .mark_thinking_completed()
            .mark_step_finished();
        assert!(!state.has_text_started());
        assert!(!state.has_thinking_started());
        assert!(!state.is_step_open());
    }

    #[test]
    fn buffers_only_grow_by_append() {
        let mut state = StreamState::new();
        state.append_text("Hi").append_text(" there");
        state.append_thinking("a").append_thinking("b");
        state.mark_text_completed();
        assert_eq!(state.current_text(), "Hi there");
        assert_eq!(state.current_thinking(), "ab");
    }
}
