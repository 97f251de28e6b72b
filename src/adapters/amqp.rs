//! RabbitMQ integration: `CaseAssigned` consumer and `SolutionsGenerated`
//! publisher.
//!
//! Both sides use durable fan-out exchanges. The consumer binds a durable
//! queue, relies on the prefetch limit for backpressure and processes each
//! delivery in its own task.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::EventPublisher;
use crate::config::AmqpSettings;
use crate::core::{CaseAssignedHandler, FailurePolicy, HandlerError, Settlement};
use crate::domain::{decode_case_assigned, Envelope, EnvelopeError, SolutionsGenerated};

const CONSUMER_TAG: &str = "case-solver";

/// Persistent delivery mode
const PERSISTENT: u8 = 2;

async fn open_channel(url: &str) -> Result<(Connection, Channel)> {
    let connection = Connection::connect(url, ConnectionProperties::default())
        .await
        .context("Failed to connect to message broker")?;
    let channel = connection
        .create_channel()
        .await
        .context("Failed to open broker channel")?;
    Ok((connection, channel))
}

async fn declare_fanout(channel: &Channel, exchange: &str) -> Result<()> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Fanout,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .with_context(|| format!("Failed to declare exchange '{}'", exchange))
}

/// Publishes `SolutionsGenerated` events with publisher confirms
pub struct AmqpPublisher {
    _connection: Connection,
    channel: Channel,
    exchange: String,
    routing_key: String,
}

impl AmqpPublisher {
    /// Connect and declare the outbound exchange
    pub async fn connect(settings: &AmqpSettings) -> Result<Self> {
        let (connection, channel) = open_channel(&settings.url).await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;
        declare_fanout(&channel, &settings.solutions_exchange).await?;

        Ok(Self {
            _connection: connection,
            channel,
            exchange: settings.solutions_exchange.clone(),
            routing_key: settings.solutions_routing_key.clone(),
        })
    }
}

#[async_trait]
impl EventPublisher for AmqpPublisher {
    async fn publish_solutions(&self, event: &SolutionsGenerated) -> Result<()> {
        let envelope = Envelope::solutions_generated(event.clone());
        let payload =
            serde_json::to_vec(&envelope).context("Failed to serialize SolutionsGenerated")?;

        let confirmation = self
            .channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(PERSISTENT),
            )
            .await
            .context("Failed to publish SolutionsGenerated")?
            .await
            .context("Broker did not confirm SolutionsGenerated")?;

        if confirmation.is_nack() {
            anyhow::bail!("Broker rejected SolutionsGenerated for case {}", event.case_id);
        }

        info!(case_id = %event.case_id, exchange = %self.exchange, "Published SolutionsGenerated");
        Ok(())
    }
}

/// Consumes `CaseAssigned` events from a durable queue
pub struct CaseAssignedConsumer {
    _connection: Connection,
    consumer: Consumer,
    policy: FailurePolicy,
}

impl CaseAssignedConsumer {
    /// Connect, declare and bind the topology, and start consuming
    pub async fn connect(settings: &AmqpSettings) -> Result<Self> {
        let (connection, channel) = open_channel(&settings.url).await?;

        channel
            .basic_qos(settings.prefetch, BasicQosOptions::default())
            .await
            .context("Failed to set prefetch")?;

        declare_fanout(&channel, &settings.assigned_exchange).await?;
        channel
            .queue_declare(
                &settings.assigned_queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("Failed to declare queue '{}'", settings.assigned_queue))?;
        channel
            .queue_bind(
                &settings.assigned_queue,
                &settings.assigned_exchange,
                &settings.assigned_routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .context("Failed to bind CaseAssigned queue")?;

        let consumer = channel
            .basic_consume(
                &settings.assigned_queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .context("Failed to start consuming CaseAssigned")?;

        info!(
            queue = %settings.assigned_queue,
            exchange = %settings.assigned_exchange,
            prefetch = settings.prefetch,
            policy = ?settings.on_failure,
            "Consuming CaseAssigned events"
        );

        Ok(Self {
            _connection: connection,
            consumer,
            policy: settings.on_failure,
        })
    }

    /// Process deliveries until `shutdown` resolves or the stream ends.
    pub async fn run<S>(self, handler: Arc<CaseAssignedHandler>, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let policy = self.policy;
        drain_stream(self.consumer, shutdown, move |delivery: Delivery| {
            let handler = Arc::clone(&handler);
            async move { process_delivery(delivery, &handler, policy).await }
        })
        .await
        .context("CaseAssigned consumer failed")
    }
}

/// Spawn `process` for every item of `stream` until `shutdown` resolves, the
/// stream ends or it yields an error.
///
/// Spawned tasks always run to completion before this returns, including
/// when the stream fails; the stream error is returned afterwards.
pub async fn drain_stream<St, T, E, S, F, Fut>(mut stream: St, shutdown: S, process: F) -> Result<(), E>
where
    St: Stream<Item = Result<T, E>> + Unpin,
    E: std::fmt::Display,
    S: Future<Output = ()>,
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut in_flight = JoinSet::new();
    let mut failure = None;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer consuming");
                break;
            }
            next = stream.next() => match next {
                Some(Ok(item)) => {
                    in_flight.spawn(process(item));
                }
                Some(Err(e)) => {
                    error!(error = %e, in_flight = in_flight.len(), "Delivery stream failed");
                    failure = Some(e);
                    break;
                }
                None => {
                    warn!("Delivery stream ended");
                    break;
                }
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "Delivery task panicked");
                }
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Delivery task panicked");
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// What became of one delivery body
#[derive(Debug)]
pub enum Processed {
    /// The body is not a `CaseAssigned` envelope; the handler never ran
    Undecodable(EnvelopeError),

    /// The handler ran to completion or failed at some stage
    Handled(Result<SolutionsGenerated, HandlerError>),
}

/// Decide how to settle a processed delivery.
///
/// Undecodable messages are rejected outright. A delivery that was already
/// redelivered once is rejected rather than requeued again.
pub fn settlement_for(processed: &Processed, redelivered: bool, policy: FailurePolicy) -> Settlement {
    match processed {
        Processed::Undecodable(_) => Settlement::Reject,
        Processed::Handled(outcome) => match policy.settle(outcome) {
            Settlement::Requeue if redelivered => Settlement::Reject,
            other => other,
        },
    }
}

/// Decode `body`, run the handler and decide the settlement
pub async fn process_body(
    body: &[u8],
    redelivered: bool,
    handler: &CaseAssignedHandler,
    policy: FailurePolicy,
) -> Settlement {
    let processed = match decode_case_assigned(body) {
        Err(e) => {
            error!(error = %e, "Discarding undecodable CaseAssigned message");
            Processed::Undecodable(e)
        }
        Ok(event) => {
            let outcome = handler.handle(&event).await;
            if let Err(e) = &outcome {
                error!(
                    case_id = %event.case_id,
                    stage = %e.stage(),
                    error = %e,
                    "CaseAssigned handling failed"
                );
            }
            Processed::Handled(outcome)
        }
    };

    settlement_for(&processed, redelivered, policy)
}

async fn process_delivery(delivery: Delivery, handler: &CaseAssignedHandler, policy: FailurePolicy) {
    let settlement = process_body(&delivery.data, delivery.redelivered, handler, policy).await;

    let settled = match settlement {
        Settlement::Ack => delivery
            .acker
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ()),
        Settlement::Requeue | Settlement::Reject => delivery
            .acker
            .nack(BasicNackOptions {
                requeue: settlement == Settlement::Requeue,
                ..Default::default()
            })
            .await
            .map(|_| ()),
    };

    if let Err(e) = settled {
        error!(error = %e, ?settlement, "Failed to settle delivery");
    }
}
