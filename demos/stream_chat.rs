use claude_vertex::{
    CancellationToken, ClaudeVertexClient, Error, GenerationRequest, Message, Progress,
    ReplyAccumulator,
};
use std::io::Write;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = ClaudeVertexClient::from_env()?;
    let config = client.config();
    println!("📋 Configuration:");
    println!("  Project: {}", config.project_id);
    println!("  Location: {}", config.location);
    println!("  Model: {}", config.model);

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Write a haiku about the sea.".to_string());
    let request = GenerationRequest::new(vec![Message::user(prompt)])
        .system("You are a concise assistant.")
        .max_tokens(512)
        .stream(true);

    // Ctrl-C aborts the call.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    println!("📥 Streaming:");
    let mut reply = ReplyAccumulator::new();
    let summary = client
        .stream_with(&request, &cancel, |progress| {
            match &progress {
                Progress::Text(text) => print!("{text}"),
                Progress::Fragment(value) => {
                    if let Some(text) = value["delta"]["text"].as_str() {
                        print!("{text}");
                    }
                }
                Progress::Done => println!(),
            }
            std::io::stdout().flush().ok();
            reply.push(&progress);
        })
        .await?;

    println!("🏁 {summary:?}");
    println!("📄 Reply length: {} characters", reply.text().len());
    if let Some(reason) = reply.stop_reason() {
        println!("🛑 Stop reason: {reason}");
    }

    let replies = client
        .generate(&request.clone().stream(false), &cancel)
        .await?;
    println!("📄 Single-shot replies: {replies:?}");

    Ok(())
}
