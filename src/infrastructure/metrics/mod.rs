//! Prometheus Metrics Module
//!
//! Session-layer metrics collected with Prometheus.
//!
//! # Metrics Collected
//! - Inbound channel events by name
//! - Duplicate deliveries dropped, by source
//! - Reconnection attempts and credential refreshes
//! - Room evictions
//! - Current connection status

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::domain::entities::ConnectionStatus;

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Inbound events published on session buses, by event name
pub static CHANNEL_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("channel_events_total", "Total number of inbound channel events")
            .namespace("community_session"),
        &["event"],
    )
    .expect("Failed to create CHANNEL_EVENTS_TOTAL metric")
});

/// Duplicate deliveries silently dropped, by source ("room_message", "notification", ...)
pub static DUPLICATES_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("duplicates_dropped_total", "Duplicate deliveries dropped by id")
            .namespace("community_session"),
        &["source"],
    )
    .expect("Failed to create DUPLICATES_DROPPED_TOTAL metric")
});

/// Reconnection attempts, by outcome class ("transient", "auth_refresh")
pub static RECONNECT_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reconnect_attempts_total", "Live channel reconnection attempts")
            .namespace("community_session"),
        &["reason"],
    )
    .expect("Failed to create RECONNECT_ATTEMPTS_TOTAL metric")
});

/// Rooms the local identity was evicted from
pub static ROOM_EVICTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("room_evictions_total", "Forced room evictions").namespace("community_session"),
    )
    .expect("Failed to create ROOM_EVICTIONS_TOTAL metric")
});

/// Connection status: 0 idle, 1 connecting, 2 connected, 3 reconnecting, 4 disconnected
pub static CONNECTION_STATUS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("connection_status", "Current live channel status")
            .namespace("community_session"),
    )
    .expect("Failed to create CONNECTION_STATUS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CHANNEL_EVENTS_TOTAL.clone()))
        .expect("Failed to register CHANNEL_EVENTS_TOTAL");
    registry
        .register(Box::new(DUPLICATES_DROPPED_TOTAL.clone()))
        .expect("Failed to register DUPLICATES_DROPPED_TOTAL");
    registry
        .register(Box::new(RECONNECT_ATTEMPTS_TOTAL.clone()))
        .expect("Failed to register RECONNECT_ATTEMPTS_TOTAL");
    registry
        .register(Box::new(ROOM_EVICTIONS_TOTAL.clone()))
        .expect("Failed to register ROOM_EVICTIONS_TOTAL");
    registry
        .register(Box::new(CONNECTION_STATUS.clone()))
        .expect("Failed to register CONNECTION_STATUS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_event(name: &str) {
    CHANNEL_EVENTS_TOTAL.with_label_values(&[name]).inc();
}

pub fn record_duplicate(source: &str) {
    DUPLICATES_DROPPED_TOTAL.with_label_values(&[source]).inc();
}

pub fn record_reconnect_attempt(reason: &str) {
    RECONNECT_ATTEMPTS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_eviction() {
    ROOM_EVICTIONS_TOTAL.inc();
}

pub fn set_connection_status(status: ConnectionStatus) {
    let value = match status {
        ConnectionStatus::Idle => 0,
        ConnectionStatus::Connecting => 1,
        ConnectionStatus::Connected => 2,
        ConnectionStatus::Reconnecting => 3,
        ConnectionStatus::Disconnected => 4,
    };
    CONNECTION_STATUS.set(value);
}
