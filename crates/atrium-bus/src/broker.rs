// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process broker: named topic exchanges routing to durable queues.
//!
//! A queue outlives its consumer. Messages published while no consumer is
//! attached stay in the queue and are delivered once one attaches, which is
//! what lets a restarted service pick up where it left off.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use crate::error::{BusError, Result};

/// A single message as it sits in a queue.
#[derive(Debug, Clone)]
pub struct Delivery {
	pub exchange: String,
	pub routing_key: String,
	pub body: Vec<u8>,
	pub persistent: bool,
}

struct Binding {
	queue: String,
	pattern: String,
}

#[derive(Default)]
struct Exchange {
	bindings: Vec<Binding>,
}

pub(crate) struct QueueState {
	messages: Mutex<VecDeque<Delivery>>,
	notify: Notify,
}

impl QueueState {
	fn new() -> Self {
		Self {
			messages: Mutex::new(VecDeque::new()),
			notify: Notify::new(),
		}
	}

	async fn push(&self, delivery: Delivery) {
		self.messages.lock().await.push_back(delivery);
		self.notify.notify_one();
	}

	/// Look at the head of the queue without removing it. The message is
	/// only removed by `ack`, so a consumer killed mid-handler leaves it in
	/// place for redelivery.
	pub(crate) async fn peek(&self) -> Option<Delivery> {
		self.messages.lock().await.front().cloned()
	}

	/// Acknowledge the head of the queue, removing it.
	pub(crate) async fn ack(&self) {
		self.messages.lock().await.pop_front();
	}

	pub(crate) async fn notified(&self) {
		self.notify.notified().await;
	}

	pub(crate) async fn len(&self) -> usize {
		self.messages.lock().await.len()
	}
}

#[derive(Default)]
struct BrokerState {
	exchanges: HashMap<String, Exchange>,
	queues: HashMap<String, Arc<QueueState>>,
}

/// Shared broker registry. Cloning yields another handle to the same
/// exchanges and queues.
#[derive(Clone, Default)]
pub struct Broker {
	inner: Arc<Mutex<BrokerState>>,
}

impl Broker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Declare a durable topic exchange. Idempotent.
	pub(crate) async fn declare_exchange(&self, name: &str) {
		let mut state = self.inner.lock().await;
		state.exchanges.entry(name.to_string()).or_default();
	}

	/// Declare a durable queue. Idempotent; redeclaring returns the existing
	/// queue with its contents intact.
	pub(crate) async fn declare_queue(&self, name: &str) -> Arc<QueueState> {
		let mut state = self.inner.lock().await;
		Arc::clone(
			state
				.queues
				.entry(name.to_string())
				.or_insert_with(|| Arc::new(QueueState::new())),
		)
	}

	/// Bind a queue to an exchange under a routing-key pattern. Duplicate
	/// bindings collapse to one.
	pub(crate) async fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> Result<()> {
		let mut state = self.inner.lock().await;
		if !state.queues.contains_key(queue) {
			// Binding an undeclared queue is a programming error on our own
			// side; declare_queue always runs first in the client.
			state
				.queues
				.insert(queue.to_string(), Arc::new(QueueState::new()));
		}
		let exchange_state = state
			.exchanges
			.get_mut(exchange)
			.ok_or_else(|| BusError::UnknownExchange(exchange.to_string()))?;

		let exists = exchange_state
			.bindings
			.iter()
			.any(|b| b.queue == queue && b.pattern == pattern);
		if !exists {
			exchange_state.bindings.push(Binding {
				queue: queue.to_string(),
				pattern: pattern.to_string(),
			});
		}
		Ok(())
	}

	/// Route a delivery to every queue whose binding pattern matches the
	/// routing key. Returns the number of queues that received it; zero
	/// matches is not an error, mirroring topic-exchange semantics.
	pub(crate) async fn route(&self, delivery: Delivery) -> Result<usize> {
		let targets = {
			let state = self.inner.lock().await;
			let exchange = state
				.exchanges
				.get(&delivery.exchange)
				.ok_or_else(|| BusError::UnknownExchange(delivery.exchange.clone()))?;

			exchange
				.bindings
				.iter()
				.filter(|b| topic_matches(&b.pattern, &delivery.routing_key))
				.filter_map(|b| state.queues.get(&b.queue).map(Arc::clone))
				.collect::<Vec<_>>()
		};

		for queue in &targets {
			queue.push(delivery.clone()).await;
		}
		Ok(targets.len())
	}

	#[cfg(test)]
	pub(crate) async fn queue_len(&self, name: &str) -> usize {
		let queue = {
			let state = self.inner.lock().await;
			state.queues.get(name).map(Arc::clone)
		};
		match queue {
			Some(q) => q.len().await,
			None => 0,
		}
	}
}

/// AMQP topic matching: `.`-separated words, `*` matches exactly one word,
/// `#` matches zero or more.
pub(crate) fn topic_matches(pattern: &str, routing_key: &str) -> bool {
	fn matches(pattern: &[&str], key: &[&str]) -> bool {
		match pattern.split_first() {
			None => key.is_empty(),
			Some((&"#", rest)) => {
				if matches(rest, key) {
					return true;
				}
				match key.split_first() {
					Some((_, key_rest)) => matches(pattern, key_rest),
					None => false,
				}
			}
			Some((&"*", rest)) => match key.split_first() {
				Some((_, key_rest)) => matches(rest, key_rest),
				None => false,
			},
			Some((word, rest)) => match key.split_first() {
				Some((key_word, key_rest)) => word == key_word && matches(rest, key_rest),
				None => false,
			},
		}
	}

	let pattern: Vec<&str> = pattern.split('.').collect();
	let key: Vec<&str> = routing_key.split('.').collect();
	matches(&pattern, &key)
}
