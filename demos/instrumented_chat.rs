//! Instrumented Chat Example - one traced unit of work, end to end
//!
//! This example plays the role of the HTTP front door for a single request:
//! 1. Opens a trace with the inbound request descriptor
//! 2. Runs the handler inside the trace's context
//! 3. The handler calls an instrumented OpenAI-compatible client; the call is
//!    recorded on the trace automatically
//! 4. Attaches the response descriptor and ends the trace, which ships it to
//!    the collector fire-and-forget
//!
//! Run with: cargo run --example instrumented_chat
//!
//! Expects OBSY_API_KEY, OBSY_PROJECT_ID, and OPENAI_API_KEY (or a Groq key
//! with OPENAI_API_ENDPOINT pointed at the Groq API) in the environment.

use obsy::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Set up logging
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let obsy = Arc::new(ObsyClient::from_env());
    let openai = instrument_openai(Arc::new(OpenAiClient::new()));

    // the front door opens one trace per inbound request
    let trace = ObsyTrace::new(
        Arc::clone(&obsy),
        Some(HttpRequestInfo {
            url: "/chat".to_string(),
            method: "POST".to_string(),
            query: json!({}),
            headers: json!({"content-type": "application/json"}),
            body: json!({"prompt": "Hello"}),
        }),
        None,
    );

    // handler code runs inside the trace's context; the instrumented client
    // finds the trace itself
    let response = trace
        .run_in_context(async {
            let request = ChatCompletionRequest::new(
                "llama3-8b-8192",
                vec![ChatMessage::user("Hello! Reply in one short sentence.")],
            );
            openai.create(request).await
        })
        .await?;

    if let Some(choice) = response.choices.first() {
        println!("assistant: {}", choice.message.content);
    }

    trace.add_response(HttpResponseInfo {
        status_code: 200,
        headers: json!({"content-type": "application/json"}),
    });
    trace.end();

    // end() ships asynchronously; give the delivery a moment before exiting
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    Ok(())
}
