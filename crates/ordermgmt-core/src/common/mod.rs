pub mod error;
pub mod types;

pub use error::{Error, Result};

/// Generated protobuf messages and gRPC client/server stubs.
pub mod proto {
    tonic::include_proto!("ecommerce");

    /// Encoded file descriptor set used to register gRPC reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("ordermgmt_descriptor");
}
