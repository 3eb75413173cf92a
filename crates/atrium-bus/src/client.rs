// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bus client held by each service.
//!
//! The client wraps a broker handle with the lifecycle the services need:
//! `initialize` declares the two durable topic exchanges, `publish` sends an
//! enveloped payload with persistent delivery, `subscribe` attaches a
//! consumer task to a durable queue, and `close` tears everything down.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use atrium_provisioning_core::wire::{AUTH_EVENTS_EXCHANGE, USER_EVENTS_EXCHANGE};
use atrium_provisioning_core::EventEnvelope;

use crate::broker::{Broker, Delivery};
use crate::error::{HandlerError, Result};

/// A consumer callback invoked once per delivered message.
///
/// The wrapper around the handler always acknowledges: a returned error is
/// logged and the message is dropped, never requeued. Handlers that need
/// retries must arrange them at the application level.
#[async_trait]
pub trait MessageHandler: Send + Sync {
	async fn handle(&self, delivery: Delivery) -> std::result::Result<(), HandlerError>;
}

struct ClientState {
	initialized: bool,
	handles: Vec<JoinHandle<()>>,
}

/// Explicitly constructed, injected bus connection. Callers hold an
/// `Arc<BusClient>`, not a module global.
pub struct BusClient {
	broker: Broker,
	state: Mutex<ClientState>,
	shutdown_tx: broadcast::Sender<()>,
}

impl BusClient {
	pub fn new(broker: Broker) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			broker,
			state: Mutex::new(ClientState {
				initialized: false,
				handles: Vec::new(),
			}),
			shutdown_tx,
		}
	}

	/// Declare the two durable topic exchanges. Repeat calls are no-ops.
	#[instrument(skip(self))]
	pub async fn initialize(&self) -> Result<()> {
		let mut state = self.state.lock().await;
		if state.initialized {
			return Ok(());
		}

		self.broker.declare_exchange(USER_EVENTS_EXCHANGE).await;
		self.broker.declare_exchange(AUTH_EVENTS_EXCHANGE).await;

		state.initialized = true;
		info!("bus connection established");
		Ok(())
	}

	/// Serialize `payload` into an event envelope and publish it with
	/// persistent delivery.
	///
	/// Callers on the primary request path log and swallow the error; a bus
	/// outage must never fail the operation that triggered the publish.
	#[instrument(skip(self, payload), fields(exchange = %exchange, routing_key = %routing_key, event_type = %event_type))]
	pub async fn publish<T: Serialize + Sync>(
		&self,
		exchange: &str,
		routing_key: &str,
		event_type: &str,
		payload: &T,
	) -> Result<()> {
		self.ensure_initialized().await?;

		let envelope = EventEnvelope::new(event_type, payload)?;
		let body = serde_json::to_vec(&envelope)?;

		let delivered = self
			.broker
			.route(Delivery {
				exchange: exchange.to_string(),
				routing_key: routing_key.to_string(),
				body,
				persistent: true,
			})
			.await?;

		debug!(delivered, "published event");
		Ok(())
	}

	/// Declare a durable queue bound to `routing_key` on `exchange` and
	/// attach `handler` to it.
	///
	/// The consumer task acknowledges after the handler returns, and also
	/// acknowledges when the handler fails: a poison message is drained,
	/// not retried indefinitely.
	#[instrument(skip(self, handler), fields(queue = %queue, exchange = %exchange, routing_key = %routing_key))]
	pub async fn subscribe(
		&self,
		queue: &str,
		exchange: &str,
		routing_key: &str,
		handler: Arc<dyn MessageHandler>,
	) -> Result<()> {
		self.ensure_initialized().await?;

		let queue_state = self.broker.declare_queue(queue).await;
		self.broker.bind_queue(queue, exchange, routing_key).await?;

		let mut shutdown_rx = self.shutdown_tx.subscribe();
		let queue_name = queue.to_string();

		let handle = tokio::spawn(async move {
			loop {
				while let Some(delivery) = queue_state.peek().await {
					if let Err(e) = handler.handle(delivery).await {
						warn!(
							queue = %queue_name,
							error = %e,
							"message handler failed; dropping message"
						);
					}
					queue_state.ack().await;
				}

				tokio::select! {
					_ = queue_state.notified() => {}
					_ = shutdown_rx.recv() => {
						debug!(queue = %queue_name, "consumer shutting down");
						break;
					}
				}
			}
		});

		let mut state = self.state.lock().await;
		state.handles.push(handle);
		info!("consumer started");
		Ok(())
	}

	/// Tear down the connection: stop all consumer tasks and forget the
	/// initialized state. Idempotent; safe to call even if `initialize`
	/// never succeeded.
	#[instrument(skip(self))]
	pub async fn close(&self) {
		let _ = self.shutdown_tx.send(());

		let mut state = self.state.lock().await;
		for handle in state.handles.drain(..) {
			let _ = handle.await;
		}
		state.initialized = false;
		info!("bus connection closed");
	}

	async fn ensure_initialized(&self) -> Result<()> {
		let needs_init = {
			let state = self.state.lock().await;
			!state.initialized
		};
		if needs_init {
			self.initialize().await?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;
	use tokio::time::sleep;

	struct CountingHandler {
		seen: AtomicUsize,
		fail: bool,
	}

	impl CountingHandler {
		fn new(fail: bool) -> Arc<Self> {
			Arc::new(Self {
				seen: AtomicUsize::new(0),
				fail,
			})
		}
	}

	#[async_trait]
	impl MessageHandler for CountingHandler {
		async fn handle(&self, _delivery: Delivery) -> std::result::Result<(), HandlerError> {
			self.seen.fetch_add(1, Ordering::SeqCst);
			if self.fail {
				return Err("boom".into());
			}
			Ok(())
		}
	}

	async fn wait_for(condition: impl Fn() -> bool) {
		for _ in 0..200 {
			if condition() {
				return;
			}
			sleep(Duration::from_millis(5)).await;
		}
		panic!("condition not reached within deadline");
	}

	#[tokio::test]
	async fn test_initialize_is_idempotent() {
		let client = BusClient::new(Broker::new());
		client.initialize().await.unwrap();
		client.initialize().await.unwrap();
	}

	#[tokio::test]
	async fn test_publish_and_consume() {
		let broker = Broker::new();
		let client = BusClient::new(broker);
		client.initialize().await.unwrap();

		let handler = CountingHandler::new(false);
		client
			.subscribe(
				"user_creation_response",
				AUTH_EVENTS_EXCHANGE,
				"user.created",
				handler.clone(),
			)
			.await
			.unwrap();

		client
			.publish(
				AUTH_EVENTS_EXCHANGE,
				"user.created",
				"user.created",
				&serde_json::json!({"id": "abc"}),
			)
			.await
			.unwrap();

		wait_for(|| handler.seen.load(Ordering::SeqCst) == 1).await;
		client.close().await;
	}

	#[tokio::test]
	async fn test_messages_published_before_subscribe_are_delivered() {
		let broker = Broker::new();

		// A publisher-side client binds the durable queue and publishes
		// while no consumer is attached.
		let publisher = BusClient::new(broker.clone());
		publisher.initialize().await.unwrap();
		broker.declare_queue("user_creation").await;
		broker
			.bind_queue("user_creation", AUTH_EVENTS_EXCHANGE, "user_creation")
			.await
			.unwrap();
		publisher
			.publish(
				AUTH_EVENTS_EXCHANGE,
				"user_creation",
				"user.creation_requested",
				&serde_json::json!({"username": "alice"}),
			)
			.await
			.unwrap();

		// A consumer attaching later still sees the message.
		let consumer = BusClient::new(broker);
		let handler = CountingHandler::new(false);
		consumer
			.subscribe(
				"user_creation",
				AUTH_EVENTS_EXCHANGE,
				"user_creation",
				handler.clone(),
			)
			.await
			.unwrap();

		wait_for(|| handler.seen.load(Ordering::SeqCst) == 1).await;
		publisher.close().await;
		consumer.close().await;
	}

	#[tokio::test]
	async fn test_failing_handler_still_acks() {
		let broker = Broker::new();
		let client = BusClient::new(broker.clone());
		client.initialize().await.unwrap();

		let handler = CountingHandler::new(true);
		client
			.subscribe(
				"user_creation_response",
				AUTH_EVENTS_EXCHANGE,
				"user.created",
				handler.clone(),
			)
			.await
			.unwrap();

		for _ in 0..3 {
			client
				.publish(
					AUTH_EVENTS_EXCHANGE,
					"user.created",
					"user.created",
					&serde_json::json!({}),
				)
				.await
				.unwrap();
		}

		// Each poison message is seen exactly once and then drained.
		wait_for(|| handler.seen.load(Ordering::SeqCst) == 3).await;
		sleep(Duration::from_millis(20)).await;
		assert_eq!(handler.seen.load(Ordering::SeqCst), 3);
		client.close().await;
	}

	#[tokio::test]
	async fn test_close_without_initialize() {
		let client = BusClient::new(Broker::new());
		client.close().await;
		client.close().await;
	}

	#[tokio::test]
	async fn test_publish_to_unknown_exchange_fails() {
		let client = BusClient::new(Broker::new());
		client.initialize().await.unwrap();

		let result = client
			.publish("nope", "user.created", "user.created", &serde_json::json!({}))
			.await;
		assert!(matches!(result, Err(crate::BusError::UnknownExchange(_))));
	}
}
