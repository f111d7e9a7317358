use std::sync::Arc;

use genstream_harness::prelude::*;
use genstream_harness::vendors::openai::{
    OpenAiProvider, OpenAiRequestOptions, OpenAiRunBuilderExt,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), HarnessError> {
    genstream_harness::init_observability("info");
    let harness = Harness::builder()
        .register_provider(Arc::new(OpenAiProvider::from_env()?))
        .build()?;

    let output = harness
        .session(SessionConfig::named("collect"))
        .run(ModelRef::new("openai", "gpt-5-nano"))
        .system_prompt("You are a concise assistant. Reply with a short sentence.")
        .user_json(serde_json::json!({"task": "say hello"}))
        .openai_options(OpenAiRequestOptions::default().store(false))
        .collect_output()
        .await?;

    println!("{}", output.text());
    if let Some(usage) = output.usage {
        println!(
            "tokens: {} prompt + {} completion",
            usage.prompt_tokens, usage.completion_tokens
        );
    }
    Ok(())
}
