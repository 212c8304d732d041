use core::{fmt, hint::black_box};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::stream::{FuturesUnordered, StreamExt};
use ordermgmt_core::proto::{
    Order, OrderId,
    order_management_client::OrderManagementClient,
    order_management_server::OrderManagementServer,
};
use ordermgmt_server::server::{
    config::ServerConfig, service::handler::OrderService, shipment::ShipmentBatcher,
    store::OrderStore,
};
use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};
use tokio::{net::TcpListener, runtime::Builder};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{
    codec::CompressionEncoding,
    transport::{Channel, Server},
};

const DESTINATIONS: [&str; 4] = ["shenzhen", "changsha", "San Jose, CA", "Mountain View, CA"];

#[derive(Clone, Copy, Debug)]
enum Compression {
    None,
    Gzip,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

impl From<Compression> for Option<CompressionEncoding> {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => None,
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Zstd => Some(CompressionEncoding::Zstd),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct GrpcBenchParams {
    ids_per_session: usize,
    concurrency: usize,
    compression: Compression,
}

fn bench_store(orders: usize) -> OrderStore {
    let store = OrderStore::new();
    for i in 0..orders {
        store.put(Order {
            id: i.to_string(),
            items: vec![format!("item-{i}")],
            destination: DESTINATIONS[i % DESTINATIONS.len()].to_string(),
            price: i as f64,
        });
    }
    store
}

async fn spawn_server(store: OrderStore) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig {
        batch_size: 16,
        stream_buffer_size: 64,
        ..ServerConfig::default()
    };
    let service = OrderManagementServer::new(OrderService::new(config, store))
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip);

    tokio::spawn(async move {
        Server::builder()
            .add_service(service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

fn grpc_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    let ids_per_session_cases = [100, 1_000, 10_000];
    let concurrency_cases = [1, 8, 32];
    let compression_cases = [Compression::None, Compression::Zstd, Compression::Gzip];

    let mut cases = Vec::new();
    for &ids_per_session in &ids_per_session_cases {
        for &concurrency in &concurrency_cases {
            for &compression in &compression_cases {
                cases.push(GrpcBenchParams {
                    ids_per_session,
                    concurrency,
                    compression,
                });
            }
        }
    }

    let addr = rt.block_on(spawn_server(bench_store(1_000)));
    let channel = rt.block_on(async {
        Channel::from_shared(format!("http://{addr}"))
            .unwrap()
            .connect()
            .await
            .expect("Failed to connect to server")
    });

    for params in &cases {
        let mut group = c.benchmark_group("grpc/process_orders");
        group.throughput(Throughput::Elements(
            (params.ids_per_session * params.concurrency) as u64,
        ));

        group.bench_function(
            format!(
                "ids/{}/conc/{}/comp/{}",
                params.ids_per_session, params.concurrency, params.compression,
            ),
            |b| {
                b.to_async(&rt).iter_custom(|iters| {
                    let channel = channel.clone();
                    async move {
                        let start = Instant::now();
                        for _ in 0..iters {
                            run_process_orders(&channel, params).await;
                        }
                        start.elapsed()
                    }
                });
            },
        );

        group.finish();
    }
}

async fn run_process_orders(channel: &Channel, params: &GrpcBenchParams) {
    let mut tasks = FuturesUnordered::new();

    for _ in 0..params.concurrency {
        let channel = channel.clone();
        let compression = params.compression;
        let ids = params.ids_per_session;

        tasks.push(tokio::spawn(async move {
            let mut client = OrderManagementClient::new(channel);
            if let Some(encoding) = compression.into() {
                client = client.accept_compressed(encoding).send_compressed(encoding)
            }

            let outbound =
                tokio_stream::iter((0..ids).map(|i| OrderId { value: (i % 1_000).to_string() }));
            let mut stream = client
                .process_orders(outbound)
                .await
                .expect("stream call failed")
                .into_inner();

            let mut orders = 0;
            while let Some(shipment) = stream.message().await.expect("shipment") {
                orders += shipment.orders_list.len();
                black_box(&shipment);
            }
            assert_eq!(orders, ids);
        }));
    }

    while let Some(res) = tasks.next().await {
        res.unwrap();
    }
}

fn batcher_bench(c: &mut Criterion) {
    let store = bench_store(1_000);
    let ids: Vec<String> = (0..1_000).map(|i| i.to_string()).collect();

    let mut group = c.benchmark_group("batcher/push");
    group.throughput(Throughput::Elements(ids.len() as u64));

    for batch_size in [3, 32, 256] {
        group.bench_function(format!("batch/{batch_size}"), |b| {
            b.iter(|| {
                let mut batcher = ShipmentBatcher::new(store.clone(), batch_size);
                for id in &ids {
                    if let Some(flushed) = batcher.push(id).unwrap() {
                        black_box(flushed);
                    }
                }
                black_box(batcher.flush());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, batcher_bench, grpc_bench);
criterion_main!(benches);
