//! Alert rules over incoming samples and the current board.
//!
//! Alerts are observability signals only: each rule returns a value the
//! monitor logs, with no state change, retry, or escalation behind it.

use std::collections::HashMap;

use tracing::warn;

use crate::exchange::types::RateSample;

#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// A single venue's rate magnitude crossed the absolute threshold.
    AbsoluteRate {
        exchange: String,
        symbol: String,
        rate: f64,
        threshold: f64,
    },

    /// The rate's sign strictly changed for one `(symbol, exchange)`.
    Flip {
        exchange: String,
        symbol: String,
        previous: f64,
        current: f64,
    },

    /// Two venues' current rates for one symbol diverged past the
    /// difference threshold.
    Spread {
        symbol: String,
        exchange_a: String,
        rate_a: f64,
        exchange_b: String,
        rate_b: f64,
        diff: f64,
        threshold: f64,
    },
}

pub fn absolute_rate(sample: &RateSample, threshold: f64) -> Option<Alert> {
    (sample.funding_rate.abs() >= threshold).then(|| Alert::AbsoluteRate {
        exchange: sample.exchange.clone(),
        symbol: sample.symbol.clone(),
        rate: sample.funding_rate,
        threshold,
    })
}

/// Strict sign change only: a transition through exactly zero on either
/// side is not a flip.
pub fn flip(previous: Option<&RateSample>, current: &RateSample) -> Option<Alert> {
    let prev = previous?;

    let flipped = (prev.funding_rate > 0.0 && current.funding_rate < 0.0)
        || (prev.funding_rate < 0.0 && current.funding_rate > 0.0);

    flipped.then(|| Alert::Flip {
        exchange: current.exchange.clone(),
        symbol: current.symbol.clone(),
        previous: prev.funding_rate,
        current: current.funding_rate,
    })
}

/// Cross-exchange pass for one symbol's board entries: every unordered
/// venue pair evaluated exactly once.
pub fn spreads(
    symbol: &str,
    entries: &HashMap<String, RateSample>,
    threshold: f64,
) -> Vec<Alert> {
    let mut names: Vec<&String> = entries.keys().collect();
    names.sort();

    let mut out = Vec::new();
    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            let rate_a = entries[*a].funding_rate;
            let rate_b = entries[*b].funding_rate;
            let diff = (rate_a - rate_b).abs();

            if diff >= threshold {
                out.push(Alert::Spread {
                    symbol: symbol.to_string(),
                    exchange_a: (*a).clone(),
                    rate_a,
                    exchange_b: (*b).clone(),
                    rate_b,
                    diff,
                    threshold,
                });
            }
        }
    }

    out
}

pub fn emit(alert: &Alert) {
    match alert {
        Alert::AbsoluteRate {
            exchange,
            symbol,
            rate,
            threshold,
        } => warn!(
            exchange = %exchange,
            symbol = %symbol,
            rate = rate,
            threshold = threshold,
            "funding rate above absolute threshold"
        ),
        Alert::Flip {
            exchange,
            symbol,
            previous,
            current,
        } => warn!(
            exchange = %exchange,
            symbol = %symbol,
            previous = previous,
            current = current,
            "funding rate sign flipped"
        ),
        Alert::Spread {
            symbol,
            exchange_a,
            rate_a,
            exchange_b,
            rate_b,
            diff,
            threshold,
        } => warn!(
            symbol = %symbol,
            exchange_a = %exchange_a,
            rate_a = rate_a,
            exchange_b = %exchange_b,
            rate_b = rate_b,
            diff = diff,
            threshold = threshold,
            "significant cross-exchange funding spread"
        ),
    }
}
