//! Loopback Calculator Example
//!
//! Two engines wired back to back through in-process channels. The "server"
//! side registers calculator methods; the "client" side calls them with
//! named and positional params, sends a notification, and issues a batch.
//!
//! Run with `RUST_LOG=debug` to see the engine's own tracing.

use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use turul_json_rpc_peer::prelude::*;

/// Forward everything one engine writes into the other engine's inbound side
fn pump(mut outbound: UnboundedReceiver<OutboundPayload<()>>, peer: JsonRpcEngine) {
    tokio::spawn(async move {
        while let Some(OutboundPayload { payload, context }) = outbound.recv().await {
            // One task per message so a handler may call back into its peer
            let peer = peer.clone();
            tokio::spawn(async move {
                if let Err(e) = peer.handle_message(payload, context).await {
                    warn!(error = %e, "Peer rejected message");
                }
            });
        }
    });
}

fn register_calculator(server: &JsonRpcEngine) -> Result<(), RegistrationError> {
    server.register_fn("add", BindingMode::named(["a", "b"]), |args, _ctx| async move {
        let a: f64 = args[0].parse("a")?;
        let b: f64 = args[1].parse("b")?;
        Ok(Some(json!(a + b)))
    })?;

    server.register_fn("subtract", BindingMode::Positional, |args, _ctx| async move {
        let a: f64 = args.first().unwrap_or(&Argument::Missing).parse("minuend")?;
        let b: f64 = args.get(1).unwrap_or(&Argument::Missing).parse("subtrahend")?;
        Ok(Some(json!(a - b)))
    })?;

    server.register_fn("divide", BindingMode::named(["a", "b"]), |args, _ctx| async move {
        let a: f64 = args[0].parse("a")?;
        let b: f64 = args[1].parse("b")?;
        if b == 0.0 {
            return Err(HandlerError::failed_with_data(
                "division by zero",
                json!({"dividend": a}),
            ));
        }
        Ok(Some(json!(a / b)))
    })?;

    server.register_fn("log", BindingMode::Pass, |args, _ctx| async move {
        if let Some(message) = args.first().and_then(Argument::as_value) {
            info!(message = %message, "Client says");
        }
        Ok(None)
    })?;

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (client_transport, client_outbound) = ChannelTransport::new();
    let (server_transport, server_outbound) = ChannelTransport::new();

    let client: JsonRpcEngine = JsonRpcEngine::builder(client_transport)
        .with_id_generator(SequentialIdGenerator::new())
        .build();
    let server: JsonRpcEngine = JsonRpcEngine::new(server_transport);
    register_calculator(&server)?;

    pump(client_outbound, server.clone());
    pump(server_outbound, client.clone());

    let sum = client
        .call("add", RequestParams::from_value(json!({"b": 2, "a": 40})), ())
        .await?;
    info!(result = %sum, "add");

    let difference = client
        .call("subtract", RequestParams::from_value(json!([10, 4])), ())
        .await?;
    info!(result = %difference, "subtract");

    match client
        .call("divide", RequestParams::from_value(json!({"a": 1, "b": 0})), ())
        .await
    {
        Ok(value) => info!(result = %value, "divide"),
        Err(e) => warn!(code = e.code, data = ?e.data, "divide failed"),
    }

    client
        .notify("log", RequestParams::from_value(json!({"text": "hello from the client"})), ())
        .await;

    let outcomes = client
        .batch(
            vec![
                BatchRequest::call("add", RequestParams::from_value(json!({"a": 1, "b": 1}))),
                BatchRequest::notify("log", RequestParams::from_value(json!({"text": "batched"}))),
                BatchRequest::call("multiply", RequestParams::from_value(json!([2, 3]))),
            ],
            (),
        )
        .await;
    for outcome in outcomes {
        match outcome {
            Ok(value) => info!(result = %value, "batch element"),
            Err(e) => warn!(code = e.code, message = %e.message, "batch element failed"),
        }
    }

    let cancelled = client.shutdown() + server.shutdown();
    info!(cancelled, "Done");
    Ok(())
}
