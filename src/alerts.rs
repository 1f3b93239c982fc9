// =============================================================================
// Alert hook — best-effort notifications on trade events
// =============================================================================
//
// Dispatch is fire-and-forget: a failed or missing alert never rolls back a
// position change. The default sink writes structured log lines; a chat
// dispatcher can be plugged in behind the same trait.
// =============================================================================

use tracing::info;

/// A trade event worth telling a human about.
#[derive(Debug, Clone)]
pub enum AlertEvent {
    PositionOpened {
        symbol: String,
        address: String,
        price: f64,
        sol_amount: f64,
        action: String,
        is_paper: bool,
    },
    PositionClosed {
        symbol: String,
        address: String,
        entry_price: f64,
        exit_price: f64,
        pnl_pct: f64,
        reason: String,
        is_paper: bool,
    },
    TradingError {
        message: String,
    },
}

/// Alert sink. Implementations must be infallible from the caller's view.
pub trait Alerts: Send + Sync {
    fn notify(&self, event: AlertEvent);
}

/// Default sink: structured log lines only.
pub struct LogAlerts;

impl Alerts for LogAlerts {
    fn notify(&self, event: AlertEvent) {
        match event {
            AlertEvent::PositionOpened {
                symbol,
                address,
                price,
                sol_amount,
                action,
                is_paper,
            } => {
                info!(
                    symbol = %symbol,
                    address = %address,
                    price,
                    sol_amount,
                    action = %action,
                    is_paper,
                    "alert: position opened"
                );
            }
            AlertEvent::PositionClosed {
                symbol,
                address,
                entry_price,
                exit_price,
                pnl_pct,
                reason,
                is_paper,
            } => {
                info!(
                    symbol = %symbol,
                    address = %address,
                    entry_price,
                    exit_price,
                    pnl_pct,
                    reason = %reason,
                    is_paper,
                    "alert: position closed"
                );
            }
            AlertEvent::TradingError { message } => {
                info!(message = %message, "alert: trading error");
            }
        }
    }
}
