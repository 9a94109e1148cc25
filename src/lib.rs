pub mod addr;
pub mod config;
pub mod resolver;

use async_trait::async_trait;

pub use crate::addr::{
    address_to_text, text_to_address, AddrError, Family, RawAddress, TextAddress,
};
pub use crate::resolver::{resolve, EndpointCandidate, Mode, ResolutionQuery, ResolveError};

#[async_trait]
pub trait Resolver: Send {
    async fn resolve(&self, query: ResolutionQuery)
        -> Result<Vec<EndpointCandidate>, ResolveError>;
}

/// Runs lookups through the platform resolver on tokio's blocking pool.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(
        &self,
        query: ResolutionQuery,
    ) -> Result<Vec<EndpointCandidate>, ResolveError> {
        tokio::task::spawn_blocking(move || resolver::resolve(&query)).await?
    }
}
