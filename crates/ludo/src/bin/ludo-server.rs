//! Standalone Ludo server.
//!
//! Environment:
//! - `LUDO_BIND` (default `0.0.0.0:8080`)
//! - `LUDO_SEATS`: `2` or `4` (default `2`)
//! - `LUDO_TURN_TIMEOUT_SECS` (default 30)
//! - `LUDO_RECONNECT_GRACE_SECS` (default 30)
//! - `RUST_LOG` (default `info`)

use std::str::FromStr;
use std::time::Duration;

use ludo::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Records results in the log until a real ledger is wired in.
struct LogSettlement;

impl SettlementHook for LogSettlement {
    async fn settle(&self, outcome: MatchOutcome) -> Result<(), SettlementError> {
        info!(
            room_code = %outcome.room_code,
            winner = %outcome.winner,
            winner_color = %outcome.winner_color,
            players = outcome.players.len(),
            "match settled"
        );
        Ok(())
    }
}

/// Reads `key`, keeping `default` when it is unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}

fn seat_count(seats: usize) -> SeatCount {
    SeatCount::from_seats(seats).unwrap_or_else(|| {
        warn!(seats, "LUDO_SEATS must be 2 or 4, using 2");
        SeatCount::Two
    })
}

fn match_config() -> MatchConfig {
    let seats = seat_count(env_or("LUDO_SEATS", 2));
    let defaults = MatchConfig::default();
    MatchConfig {
        seats,
        turn_timeout: Duration::from_secs(env_or("LUDO_TURN_TIMEOUT_SECS", defaults.turn_timeout.as_secs())),
        reconnect_grace: Duration::from_secs(env_or(
            "LUDO_RECONNECT_GRACE_SECS",
            defaults.reconnect_grace.as_secs(),
        )),
        ..defaults
    }
}

#[tokio::main]
async fn main() -> Result<(), LudoError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bind: String = env_or("LUDO_BIND", "0.0.0.0:8080".to_string());
    let config = match_config();
    // Sessions and seats share one grace window.
    let session_config = SessionConfig {
        reconnect_grace_secs: config.reconnect_grace.as_secs(),
    };

    let server = LudoServerBuilder::new()
        .bind(&bind)
        .match_config(config)
        .session_config(session_config)
        .build(DevAuthenticator, LogSettlement)
        .await?;

    let addr = server
        .local_addr()
        .map_or_else(|_| bind.clone(), |addr| addr.to_string());
    info!(%addr, seats = ?config.seats, "listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "ctrl-c handler failed, shutting down");
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_count_accepts_two_or_four() {
        assert_eq!(seat_count(2), SeatCount::Two);
        assert_eq!(seat_count(4), SeatCount::Four);
    }

    #[test]
    fn test_seat_count_falls_back_to_two() {
        assert_eq!(seat_count(3), SeatCount::Two);
        assert_eq!(seat_count(0), SeatCount::Two);
    }
}
