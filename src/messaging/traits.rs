//! Messaging trait and dynamic dispatch companion.

use crate::error::Result;
use crate::{ChatUser, InboundMessage, OutboundResponse};
use futures::Stream;
use std::pin::Pin;

/// Message stream type.
pub type InboundStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// Static trait for messaging adapters.
/// Use this for type-safe implementations.
pub trait Messaging: Send + Sync + 'static {
    /// Unique name for this adapter.
    fn name(&self) -> &str;

    /// Start the adapter and return inbound message stream.
    fn start(&self) -> impl std::future::Future<Output = Result<InboundStream>> + Send;

    /// Send a reply into the channel `message` arrived on.
    fn respond(
        &self,
        message: &InboundMessage,
        response: OutboundResponse,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Look up the profile of a chat user.
    fn user_info(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<ChatUser>> + Send;

    /// Health check.
    fn health_check(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Graceful shutdown.
    fn shutdown(&self) -> impl std::future::Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

/// Dynamic trait for runtime polymorphism.
/// Use this when you need `Arc<dyn MessagingDyn>` for storing different adapters.
pub trait MessagingDyn: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn start<'a>(
        &'a self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<InboundStream>> + Send + 'a>>;

    fn respond<'a>(
        &'a self,
        message: &'a InboundMessage,
        response: OutboundResponse,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;

    fn user_info<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<ChatUser>> + Send + 'a>>;

    fn health_check<'a>(
        &'a self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;

    fn shutdown<'a>(&'a self)
    -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;
}

/// Blanket implementation: any type implementing Messaging automatically implements MessagingDyn.
impl<T: Messaging> MessagingDyn for T {
    fn name(&self) -> &str {
        Messaging::name(self)
    }

    fn start<'a>(
        &'a self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<InboundStream>> + Send + 'a>> {
        Box::pin(Messaging::start(self))
    }

    fn respond<'a>(
        &'a self,
        message: &'a InboundMessage,
        response: OutboundResponse,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(Messaging::respond(self, message, response))
    }

    fn user_info<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<ChatUser>> + Send + 'a>> {
        Box::pin(Messaging::user_info(self, user_id))
    }

    fn health_check<'a>(
        &'a self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(Messaging::health_check(self))
    }

    fn shutdown<'a>(
        &'a self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(Messaging::shutdown(self))
    }
}
