//! Streaming text generation against OpenAI.
//!
//! API key comes from the environment:
//!   OPENAI_API_KEY="your_key" cargo run --example stream_text

use chaincall::{
    GenerationConfig, GenerationRequest, InvocationResult, Message, Orchestrator,
    ProviderDescriptor, ProviderKind, StreamChunk,
};
use futures::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let api_key = std::env::var("OPENAI_API_KEY")?;

    let request = GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::Openai, api_key),
        GenerationConfig::for_model("gpt-4o-mini"),
    )
    .message(Message::system("You are a helpful assistant."))
    .message(Message::user("Explain streaming generation in two sentences."))
    .build()?;

    let orchestrator = Orchestrator::new();
    let result = orchestrator.run(request).await?;

    let mut text = match result {
        InvocationResult::Text(t) => t,
        InvocationResult::Object(_) => unreachable!("no schema was requested"),
    };

    while let Some(chunk) = text.full_stream.next().await {
        match chunk {
            StreamChunk::TextDelta { text } => print!("{text}"),
            StreamChunk::StreamError { message } => eprintln!("\nstream error: {message}"),
            _ => {}
        }
    }
    println!();

    let usage = text.usage.get().await?;
    println!(
        "usage: {} in / {} out / {} total",
        usage.input_tokens, usage.output_tokens, usage.total_tokens
    );

    Ok(())
}
