/// OpenAI Responses API provider.
pub mod openai;
