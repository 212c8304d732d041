use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use ordermgmt_core::types::DEFAULT_BATCH_SIZE;

/// Runtime configuration for the `ordermgmt-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first), with defaults matching the reference deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ordermgmt-server",
    version,
    about = "A gRPC service for managing orders and batching shipments"
)]
pub struct CliArgs {
    /// Number of order ids accepted by a `ProcessOrders` session before the
    /// accumulated shipments are flushed to the client.
    ///
    /// Environment variable: `BATCH_SIZE`
    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Capacity of the outbound buffer between a streaming task and the gRPC
    /// response.
    ///
    /// Once full, the producing task waits for the client to consume more
    /// messages.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Upper bound, in seconds, on the lifetime of a single `ProcessOrders`
    /// session. A shorter `grpc-timeout` sent by the client wins. Set to 0 to
    /// rely on the client deadline alone.
    ///
    /// Environment variable: `MAX_SESSION_SECS`
    #[arg(long, env = "MAX_SESSION_SECS", default_value_t = 300)]
    pub max_session_secs: u64,

    /// Seconds to wait for in-flight streams to drain during shutdown before
    /// they are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/ordermgmt.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Start with an empty store instead of the sample orders.
    ///
    /// Environment variable: `NO_SEED`
    #[arg(long, env = "NO_SEED", default_value_t = false)]
    pub no_seed: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub batch_size: usize,
    pub stream_buffer_size: usize,
    pub max_session: Option<Duration>,
    pub shutdown_timeout: Duration,
    pub server_addr: String,
    pub uds: bool,
    pub seed_sample_data: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.batch_size == 0 {
            bail!("BATCH_SIZE must be greater than 0");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        let max_session =
            (args.max_session_secs > 0).then(|| Duration::from_secs(args.max_session_secs));

        Ok(Self {
            batch_size: args.batch_size,
            stream_buffer_size: args.stream_buffer_size,
            max_session,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            server_addr: args.server_addr,
            uds: args.uds,
            seed_sample_data: !args.no_seed,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            stream_buffer_size: 8,
            max_session: Some(Duration::from_secs(300)),
            shutdown_timeout: Duration::from_secs(3),
            server_addr: String::from("0.0.0.0:50051"),
            uds: false,
            seed_sample_data: true,
        }
    }
}
