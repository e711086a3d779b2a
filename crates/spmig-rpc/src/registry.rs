//! Service registry — composes independently-owned service roles behind
//! one gRPC listener.
//!
//! Each role is a value implementing [`ServiceRole`]; the daemon builds a
//! registry at startup and hands it to [`crate::RpcServer::start`]. There is
//! no process-wide dispatch table.

use spmig_core::ServerConfig;
use tonic::service::{Routes, RoutesBuilder};
use tracing::debug;

use crate::server::RpcError;

/// A gRPC service that can be mounted on the shared listener.
pub trait ServiceRole: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Mount this role's service(s), applying the server's message limits.
    fn register(
        self: Box<Self>,
        routes: &mut RoutesBuilder,
        limits: &ServerConfig,
    ) -> Result<(), RpcError>;
}

/// Ordered set of service roles to serve.
#[derive(Default)]
pub struct ServiceRegistry {
    roles: Vec<Box<dyn ServiceRole>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role. Roles are mounted in insertion order.
    pub fn with(mut self, role: impl ServiceRole + 'static) -> Self {
        self.roles.push(Box::new(role));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.roles.iter().map(|role| role.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Build the route table for the listener.
    pub fn into_routes(self, limits: &ServerConfig) -> Result<Routes, RpcError> {
        let mut builder = RoutesBuilder::default();
        for role in self.roles {
            debug!(role = role.name(), "registering service role");
            role.register(&mut builder, limits)?;
        }
        Ok(builder.routes())
    }
}
