use crate::infrastructure::queue::rabbitmq::{RabbitMqService, declare_queue};
use crate::pipeline::error::PipelineError;
use crate::pipeline::job::{JobDescriptor, JobResult};
use crate::pipeline::sequencer::Sequencer;
use anyhow::{Result, anyhow};
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, BasicRejectOptions,
};
use lapin::types::FieldTable;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const CONSUMER_TAG: &str = "video_worker";

/// How a delivery is settled with the broker once its job has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Nack { requeue: bool },
    Reject,
}

/// Success and refusals of finished, unknown or running jobs are acknowledged.
/// A failed run is nacked, requeued only when configured and only once. A run
/// that could not record its failure is requeued once regardless.
pub fn disposition(
    outcome: &Result<JobResult, PipelineError>,
    requeue_failed: bool,
    redelivered: bool,
) -> Disposition {
    match outcome {
        Ok(_) => Disposition::Ack,
        Err(e) if e.is_permanent() => Disposition::Ack,
        Err(e) if e.left_processing() => Disposition::Nack {
            requeue: !redelivered,
        },
        Err(_) => Disposition::Nack {
            requeue: requeue_failed && !redelivered,
        },
    }
}

pub struct VideoWorker {
    queue: RabbitMqService,
    queue_name: String,
    sequencer: Arc<Sequencer>,
    concurrency: usize,
    requeue_failed: bool,
}

impl VideoWorker {
    pub fn new(
        queue: RabbitMqService,
        queue_name: impl Into<String>,
        sequencer: Arc<Sequencer>,
        concurrency: usize,
        requeue_failed: bool,
    ) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            sequencer,
            concurrency: concurrency.max(1),
            requeue_failed,
        }
    }

    /// Consume until `shutdown` fires, then let in-flight jobs finish.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!("🎥 Starting Video Worker...");

        let channel = self.queue.create_channel().await?;
        declare_queue(&channel, &self.queue_name).await?;

        let prefetch = u16::try_from(self.concurrency).unwrap_or(u16::MAX);
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set prefetch: {}", e))?;

        let mut consumer = channel
            .basic_consume(
                self.queue_name.as_str(),
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to create consumer: {}", e))?;

        let (tx, rx) = async_channel::bounded::<Delivery>(self.concurrency);
        let mut executors = JoinSet::new();
        for executor_id in 0..self.concurrency {
            executors.spawn(execute(
                executor_id,
                rx.clone(),
                self.sequencer.clone(),
                self.requeue_failed,
                shutdown.clone(),
            ));
        }
        drop(rx);

        info!(
            "🎥 Video Worker listening on '{}' with {} executors",
            self.queue_name, self.concurrency
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Video Worker shutting down, waiting for in-flight jobs");
                    break;
                }
                next = consumer.next() => match next {
                    Some(Ok(delivery)) => {
                        if tx.send(delivery).await.is_err() {
                            error!("All executors stopped, closing consumer");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!("❌ Consumer error: {}", e);
                        break;
                    }
                    None => {
                        warn!("Consumer stream ended");
                        break;
                    }
                }
            }
        }

        tx.close();
        while let Some(joined) = executors.join_next().await {
            if let Err(e) = joined {
                error!("Executor task panicked: {}", e);
            }
        }

        info!("🎥 Video Worker stopped");
        Ok(())
    }
}

async fn execute(
    executor_id: usize,
    rx: async_channel::Receiver<Delivery>,
    sequencer: Arc<Sequencer>,
    requeue_failed: bool,
    shutdown: CancellationToken,
) {
    while let Ok(delivery) = rx.recv().await {
        if shutdown.is_cancelled() {
            // Hand undispatched messages back to the broker.
            settle(&delivery, Disposition::Nack { requeue: true }).await;
            continue;
        }

        let decision = match serde_json::from_slice::<JobDescriptor>(&delivery.data) {
            Ok(job) => {
                info!(executor_id, job_id = %job.id, "📦 Received video job");
                let outcome = sequencer.run(&job).await;
                match &outcome {
                    Ok(result) => info!(job_id = %result.job_id, "✅ Job completed"),
                    Err(e) if e.is_permanent() => warn!(job_id = %e.job_id(), "Skipping job: {}", e),
                    Err(e) => error!(job_id = %e.job_id(), "❌ Job failed: {}", e),
                }
                disposition(&outcome, requeue_failed, delivery.redelivered)
            }
            Err(e) => {
                error!("❌ Failed to parse job: {}", e);
                Disposition::Reject
            }
        };

        settle(&delivery, decision).await;
    }
}

async fn settle(delivery: &Delivery, decision: Disposition) {
    let result = match decision {
        Disposition::Ack => delivery.ack(BasicAckOptions::default()).await,
        Disposition::Nack { requeue } => {
            delivery
                .nack(BasicNackOptions {
                    requeue,
                    ..BasicNackOptions::default()
                })
                .await
        }
        Disposition::Reject => {
            delivery
                .reject(BasicRejectOptions { requeue: false })
                .await
        }
    };

    if let Err(e) = result {
        error!("Failed to settle message: {}", e);
    }
}
