use box_office::config::AppConfig;
use box_office::kafka::KafkaConsumer;
use box_office::metrics::Metrics;
use box_office::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

mod tasks;
mod worker;

use tasks::{SimulatedEmailSender, SimulatedTicketRenderer};
use worker::{NotificationWorker, SoldSeatProcessor};

#[derive(Parser, Debug)]
#[command(name = "notification-worker")]
#[command(about = "Downstream worker for sold-seat notifications")]
struct Args {
    /// Config file path
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Kafka consumer group id
    #[arg(long = "group", default_value = "notification-worker")]
    group: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;

    info!("Starting notification worker (group {})", args.group);

    let consumer = KafkaConsumer::new(config.kafka.to_client_config(&args.group))?;
    consumer.subscribe(&[config.booking.sold_topic.as_str()])?;

    let metrics = Arc::new(Metrics::new()?);
    let processor = SoldSeatProcessor::new(
        Box::new(SimulatedTicketRenderer),
        Box::new(SimulatedEmailSender),
    )
    .with_metrics(metrics);

    NotificationWorker::new(consumer, processor).run().await
}
