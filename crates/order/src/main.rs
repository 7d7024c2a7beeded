use anyhow::{Context, Result};
use axum::Router;
use genproto::order::{
    order_command_service_server::OrderCommandServiceServer,
    order_query_service_server::OrderQueryServiceServer,
};
use order::{
    config::{myconfig::Config, server_config::ServerConfig},
    handler::order::{OrderCommandGrpcServiceImpl, OrderQueryGrpcServiceImpl},
    kafka::{CheckoutConsumer, CheckoutEventHandler, ConsumerSettings, KafkaCheckoutStream},
    metrics::{health_check, metrics_handler},
    state::AppState,
};
use shared::{
    config::ConnectionManager,
    utils::{Telemetry, init_logger},
};
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

struct ServerHandles {
    grpc_handle: JoinHandle<()>,
    consumer_handle: JoinHandle<()>,
    metrics_handle: JoinHandle<()>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let (server_config, state, telemetry, _log_guard) =
        setup().await.context("Failed to setup application")?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut shutdown_rx = shutdown_tx.subscribe();

    let handles = run_servers(server_config, state, &shutdown_tx);

    shutdown_listener(shutdown_tx.clone());

    let _ = shutdown_rx.recv().await;

    shutdown(telemetry, handles).await;

    Ok(())
}

async fn setup() -> Result<(ServerConfig, Arc<AppState>, Telemetry, Option<WorkerGuard>)> {
    dotenv::dotenv().ok();

    let is_dev = std::env::var("DEV_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    let is_enable_file = std::env::var("ENABLE_FILE_LOG")
        .map(|v| v == "true")
        .unwrap_or(false);

    let config = Config::init().context("Failed to load configuration")?;
    let server_config = ServerConfig::from_config(&config)?;

    let mut telemetry = Telemetry::new("order-service", config.otel_endpoint.clone());
    let logger_provider = telemetry
        .init_logger()
        .context("Failed to initialize OpenTelemetry logger")?;
    telemetry
        .init_meter()
        .context("Failed to initialize OpenTelemetry meter")?;
    telemetry
        .init_tracer()
        .context("Failed to initialize OpenTelemetry tracer")?;

    let log_guard = init_logger(logger_provider, "order-service", is_dev, is_enable_file);

    let db_pool = ConnectionManager::new_pool(
        &server_config.database_url,
        config.db_min_conn,
        config.db_max_conn,
    )
    .await
    .context("Failed to initialize database pool")?;

    if server_config.run_migrations {
        run_migrations(&db_pool)
            .await
            .context("failed to migration database")?;
    }

    let state = Arc::new(AppState::new(db_pool, config).context("Failed to create AppState")?);

    info!("✅ Application setup completed successfully.");
    Ok((server_config, state, telemetry, log_guard))
}

fn run_servers(
    server_config: ServerConfig,
    state: Arc<AppState>,
    shutdown_tx: &broadcast::Sender<()>,
) -> ServerHandles {
    let order_command =
        OrderCommandGrpcServiceImpl::new(Arc::new(state.di_container.order_command.clone()));
    let order_query =
        OrderQueryGrpcServiceImpl::new(Arc::new(state.di_container.order_query.clone()));

    let grpc_addr = server_config.grpc_addr;
    let grpc_shutdown_rx = shutdown_tx.subscribe();
    let grpc_handle = tokio::spawn(async move {
        loop {
            match start_grpc_server(
                order_command.clone(),
                order_query.clone(),
                grpc_addr,
                grpc_shutdown_rx.resubscribe(),
            )
            .await
            {
                Ok(()) => {
                    info!("gRPC server stopped gracefully.");
                    break;
                }
                Err(e) => {
                    error!("❌ gRPC server failed: {e}. Restarting in 5s...");
                    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                }
            }
        }
    });

    let consumer_handle = spawn_checkout_consumer(state.clone(), shutdown_tx.subscribe());

    let metrics_addr = server_config.metrics_addr;
    let metrics_shutdown_rx = shutdown_tx.subscribe();
    let metrics_handle = tokio::spawn(async move {
        loop {
            info!("🔧 Starting metrics server on {metrics_addr}");
            match start_metrics_server(
                state.clone(),
                metrics_addr,
                metrics_shutdown_rx.resubscribe(),
            )
            .await
            {
                Ok(()) => {
                    info!("Metrics server stopped gracefully");
                    break;
                }
                Err(e) => {
                    error!("❌ Metrics server failed: {e}. Retrying in 3s...");
                    tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;
                }
            }
        }
    });

    ServerHandles {
        grpc_handle,
        consumer_handle,
        metrics_handle,
    }
}

fn spawn_checkout_consumer(
    state: Arc<AppState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let kafka = &state.config.kafka;
        let timeouts = &state.config.timeouts;

        loop {
            let stream = match KafkaCheckoutStream::new(
                &kafka.broker,
                &kafka.group_id,
                &kafka.checkout_topic,
            ) {
                Ok(stream) => Arc::new(stream),
                Err(e) => {
                    error!("💀 Kafka consumer error: {e}. Restarting in 5s...");
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(tokio::time::Duration::from_secs(5)) => continue,
                    }
                }
            };

            let handler = CheckoutEventHandler::new(Arc::new(
                state.di_container.order_command.clone(),
            ));

            let settings = ConsumerSettings {
                fetch_timeout: timeouts.fetch,
                retry_min_delay: timeouts.retry_min_delay,
                retry_max_delay: timeouts.retry_max_delay,
                dead_letter_max_attempts: timeouts.dead_letter_max_attempts,
            };

            let consumer = CheckoutConsumer::new(
                stream,
                handler,
                state.di_container.dead_letter_sink.clone(),
                settings,
                state.consumer_metrics.clone(),
            );

            let final_state = consumer.run(shutdown_rx.resubscribe()).await;
            info!("Checkout consumer finished in state {final_state}");
            break;
        }
    })
}

fn shutdown_listener(shutdown_tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("🛑 Shutdown signal received.");
                if let Err(e) = shutdown_tx.send(()) {
                    warn!("Failed to send shutdown signal: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        }
    });
}

async fn shutdown(telemetry: Telemetry, handles: ServerHandles) {
    info!("🛑 Shutting down all servers...");

    let ServerHandles {
        grpc_handle,
        consumer_handle,
        metrics_handle,
    } = handles;

    let shutdown_timeout = tokio::time::Duration::from_secs(30);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        let (grpc, consumer, metrics) = tokio::join!(grpc_handle, consumer_handle, metrics_handle);
        for (name, result) in [("gRPC", grpc), ("consumer", consumer), ("metrics", metrics)] {
            if let Err(e) = result {
                error!("{name} task panicked: {e}");
            }
        }
    })
    .await;

    match shutdown_result {
        Ok(()) => info!("✅ All servers shutdown gracefully."),
        Err(_) => {
            warn!("⚠️  Shutdown timeout reached, forcing exit.");
        }
    }

    if let Err(e) = telemetry.shutdown().await {
        error!("Failed to shutdown telemetry: {}", e);
    }

    info!("✅ Order Service shutdown complete.");
}

async fn start_grpc_server(
    order_command_handler: OrderCommandGrpcServiceImpl,
    order_query_handler: OrderQueryGrpcServiceImpl,
    addr: std::net::SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    info!("Starting gRPC server on {addr}");

    let shutdown_future = async move {
        let _ = shutdown_rx.recv().await;
        info!("gRPC server received shutdown signal");
    };

    tonic::transport::Server::builder()
        .add_service(OrderCommandServiceServer::new(order_command_handler))
        .add_service(OrderQueryServiceServer::new(order_query_handler))
        .serve_with_shutdown(addr, shutdown_future)
        .await
        .context("gRPC server failed to start or serve")
}

async fn start_metrics_server(
    state: Arc<AppState>,
    addr: std::net::SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let app = Router::new()
        .route("/metrics", axum::routing::get(metrics_handler))
        .route("/health", axum::routing::get(health_check))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics listener on {addr}"))?;

    let shutdown_future = async move {
        let _ = shutdown_rx.recv().await;
        info!("Metrics server received shutdown signal");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_future)
        .await
        .context("Metrics server failed to start or serve")
}

pub async fn run_migrations(pool: &Pool<Postgres>) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;

    Ok(())
}
