// Copyright 2025 Cowboy AI, LLC.

//! Generic event handler trait for host lifecycle events

use async_trait::async_trait;

/// Trait for handling specific host events
#[async_trait]
pub trait EventHandler<E> {
    /// Error type for this handler
    type Error;

    /// Handle one host event
    async fn handle(&self, event: E) -> Result<(), Self::Error>;
}
