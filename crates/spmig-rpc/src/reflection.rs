//! gRPC server reflection, so tools such as grpcurl can list and describe
//! the services on the listener without local proto files.

use spmig_core::ServerConfig;
use tonic::service::RoutesBuilder;

use crate::registry::ServiceRole;
use crate::server::RpcError;
use crate::FILE_DESCRIPTOR_SET;

/// Serves reflection (v1 and v1alpha) for the migrate services.
pub struct ReflectionRole;

impl ServiceRole for ReflectionRole {
    fn name(&self) -> &'static str {
        "reflection"
    }

    fn register(
        self: Box<Self>,
        routes: &mut RoutesBuilder,
        _limits: &ServerConfig,
    ) -> Result<(), RpcError> {
        let v1 = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()?;
        let v1alpha = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1alpha()?;
        routes.add_service(v1).add_service(v1alpha);
        Ok(())
    }
}
