use clap::{Parser, Subcommand};
use core::time::Duration;
use ordermgmt_core::proto::{
    Order, OrderId, SearchQuery, order_management_client::OrderManagementClient,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, codec::CompressionEncoding, transport::Channel};
use tracing_subscriber::EnvFilter;

/// Command-line client exercising each `OrderManagement` call shape.
#[derive(Parser, Debug)]
#[command(name = "ordermgmt-client", version, about)]
struct Cli {
    /// Server endpoint.
    ///
    /// Environment variable: `ORDERMGMT_ADDR`
    #[arg(
        long,
        env = "ORDERMGMT_ADDR",
        default_value_t = String::from("http://127.0.0.1:50051")
    )]
    addr: String,

    /// Deadline applied to each call, in seconds.
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Add order 101, then read it back.
    Add,
    /// Fetch one order by id.
    Get {
        #[arg(default_value = "101")]
        id: String,
    },
    /// Stream every order with an item containing `query`.
    Search {
        #[arg(default_value = "Google")]
        query: String,
    },
    /// Replace orders 102, 103 and 104.
    Update,
    /// Batch orders 102, 103, 104, then 101, into combined shipments.
    Process,
    /// Run every call in sequence.
    All,
}

type Client = OrderManagementClient<Channel>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let deadline = Duration::from_secs(cli.timeout_secs);

    let channel = Channel::from_shared(cli.addr.clone())?.connect().await?;
    let mut client = OrderManagementClient::new(channel)
        .send_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Zstd);

    match cli.command {
        Command::Add => add_order(&mut client, deadline).await?,
        Command::Get { id } => get_order(&mut client, &id, deadline).await?,
        Command::Search { query } => search_orders(&mut client, &query, deadline).await?,
        Command::Update => update_orders(&mut client, deadline).await?,
        Command::Process => process_orders(&mut client, deadline).await?,
        Command::All => {
            add_order(&mut client, deadline).await?;
            search_orders(&mut client, "Google", deadline).await?;
            update_orders(&mut client, deadline).await?;
            process_orders(&mut client, deadline).await?;
        }
    }

    Ok(())
}

fn with_deadline<T>(message: T, deadline: Duration) -> Request<T> {
    let mut request = Request::new(message);
    request.set_timeout(deadline);
    request
}

async fn add_order(client: &mut Client, deadline: Duration) -> anyhow::Result<()> {
    let order = Order {
        id: "101".into(),
        items: vec!["test order1".into(), "test order2".into()],
        destination: "shenzhen".into(),
        price: 2300.01,
    };

    let res = client.add_order(with_deadline(order, deadline)).await?;
    tracing::info!("AddOrder response: {}", res.get_ref().value);

    get_order(client, "101", deadline).await
}

async fn get_order(client: &mut Client, id: &str, deadline: Duration) -> anyhow::Result<()> {
    let req = with_deadline(OrderId { value: id.into() }, deadline);
    match client.get_order(req).await {
        Ok(res) => tracing::info!("GetOrder response: {:?}", res.get_ref()),
        Err(status) => tracing::warn!("GetOrder failed: {}", status.message()),
    }
    Ok(())
}

async fn search_orders(client: &mut Client, query: &str, deadline: Duration) -> anyhow::Result<()> {
    let req = with_deadline(SearchQuery { value: query.into() }, deadline);
    let mut stream = client.search_orders(req).await?.into_inner();

    while let Some(order) = stream.message().await? {
        tracing::info!("Search result: {:?}", order);
    }
    tracing::info!("Search stream finished");
    Ok(())
}

async fn update_orders(client: &mut Client, deadline: Duration) -> anyhow::Result<()> {
    let updates = vec![
        Order {
            id: "102".into(),
            items: vec!["Google Pixel 3A".into(), "Google Pixel Book".into()],
            destination: "Mountain View, CA".into(),
            price: 1100.0,
        },
        Order {
            id: "103".into(),
            items: vec![
                "Apple Watch S4".into(),
                "Mac Book Pro".into(),
                "iPad Pro".into(),
            ],
            destination: "San Jose, CA".into(),
            price: 2800.0,
        },
        Order {
            id: "104".into(),
            items: vec![
                "Google Home Mini".into(),
                "Google Nest Hub".into(),
                "iPad Mini".into(),
            ],
            destination: "Mountain View, CA".into(),
            price: 2200.0,
        },
    ];

    let req = with_deadline(tokio_stream::iter(updates), deadline);
    let res = client.update_orders(req).await?;
    tracing::info!("UpdateOrders response: {}", res.get_ref().value);
    Ok(())
}

async fn process_orders(client: &mut Client, deadline: Duration) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel(4);
    let req = with_deadline(ReceiverStream::new(rx), deadline);

    for id in ["102", "103", "104"] {
        tx.send(OrderId { value: id.into() }).await?;
    }

    let mut stream = client.process_orders(req).await?.into_inner();
    let reader = tokio::spawn(async move {
        while let Some(shipment) = stream.message().await? {
            let ids: Vec<_> = shipment.orders_list.iter().map(|o| o.id.as_str()).collect();
            tracing::info!("Combined shipment {}: {:?}", shipment.id, ids);
        }
        Ok::<(), tonic::Status>(())
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    tx.send(OrderId { value: "101".into() }).await?;
    drop(tx);

    match reader.await? {
        Ok(()) => tracing::info!("ProcessOrders stream finished"),
        Err(status) => tracing::warn!("ProcessOrders failed: {}", status.message()),
    }
    Ok(())
}
