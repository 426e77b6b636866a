//! Schema-constrained generation with an eventual final object.
//!
//! API key comes from the environment:
//!   OPENAI_API_KEY="your_key" cargo run --example structured_output

use chaincall::{
    schema_for_type, GenerationConfig, GenerationRequest, InvocationResult, Message, Orchestrator,
    OutputMode, ProviderDescriptor, ProviderKind,
};
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
struct Recipe {
    name: String,
    servings: u32,
    ingredients: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let api_key = std::env::var("OPENAI_API_KEY")?;
    let schema = schema_for_type::<Recipe>()?;

    let request = GenerationRequest::builder(
        ProviderDescriptor::new(ProviderKind::Openai, api_key),
        GenerationConfig::for_model("gpt-4o-mini"),
    )
    .message(Message::user("A simple pancake recipe, please."))
    .schema(schema, OutputMode::Object)
    .build()?;

    let orchestrator = Orchestrator::new();
    let result = orchestrator.run(request).await?;

    let object = match result {
        InvocationResult::Object(o) => o,
        InvocationResult::Text(_) => unreachable!("a schema was requested"),
    };

    // No need to drain the stream; await the validated final value directly.
    let value = object.object.get().await?;
    let recipe: Recipe = serde_json::from_value(value)?;
    println!("{recipe:#?}");

    Ok(())
}
