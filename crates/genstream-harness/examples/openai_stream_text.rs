use std::sync::Arc;

use genstream_harness::prelude::*;
use genstream_harness::vendors::openai::{
    OpenAiProvider, OpenAiReasoningEffort, OpenAiRequestOptions, OpenAiRunBuilderExt,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), HarnessError> {
    let harness = Harness::builder()
        .register_provider(Arc::new(OpenAiProvider::from_env()?))
        .build()?;

    let mut run = harness
        .session(SessionConfig::named("stream"))
        .run(ModelRef::new("openai", "gpt-5-nano"))
        .system_prompt("Think briefly, then answer.")
        .user_text("Why is the sky blue?")
        .openai_options(
            OpenAiRequestOptions::default()
                .store(false)
                .reasoning_effort(OpenAiReasoningEffort::Low),
        )
        .start_stream()
        .await?;

    while let Some(item) = run.next_event().await {
        match item {
            Ok(event) => match event.kind {
                EventKind::ThinkingDelta { delta, .. } => eprint!("{delta}"),
                EventKind::ThinkingComplete { .. } => eprintln!(),
                EventKind::TextDelta { delta, .. } => print!("{delta}"),
                EventKind::StreamEnd { finish_reason, .. } => {
                    println!();
                    eprintln!("finished: {finish_reason}");
                }
                _ => {}
            },
            Err(failure) => eprintln!("run failed: {failure}"),
        }
    }

    let _ = run.finish().await?;
    Ok(())
}
