use async_trait::async_trait;
use box_office::domain::SeatSold;
use box_office::Result;
use tokio::time::{sleep, Duration};
use tracing::info;

/// Renders the ticket artifact for a confirmed sale.
#[async_trait]
pub trait TicketRenderer: Send + Sync {
    async fn render(&self, sale: &SeatSold) -> Result<()>;
}

/// Delivers the purchase confirmation to the buyer.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, sale: &SeatSold) -> Result<()>;
}

/// Simulated renderer: stands in for PDF generation.
pub struct SimulatedTicketRenderer;

#[async_trait]
impl TicketRenderer for SimulatedTicketRenderer {
    async fn render(&self, sale: &SeatSold) -> Result<()> {
        sleep(Duration::from_millis(50)).await;
        info!(
            "Rendered ticket for seat {} ({}) of event {}",
            sale.seat_id, sale.seat_number, sale.event_id
        );
        Ok(())
    }
}

/// Simulated email dispatch.
pub struct SimulatedEmailSender;

#[async_trait]
impl NotificationSender for SimulatedEmailSender {
    async fn send(&self, sale: &SeatSold) -> Result<()> {
        sleep(Duration::from_millis(20)).await;
        info!(
            "Sent purchase confirmation to holder {} for seat {}",
            sale.holder_id, sale.seat_number
        );
        Ok(())
    }
}
