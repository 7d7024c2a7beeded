use anyhow::{Context, Result, anyhow};
use std::{str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub grpc_port: u16,
    pub metric_port: u16,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub broker: String,
    pub group_id: String,
    pub checkout_topic: String,
    pub dead_letter_topic: String,
    pub order_created_topic: String,
}

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub price_lookup: Duration,
    pub store: Duration,
    pub fetch: Duration,
    pub retry_min_delay: Duration,
    pub retry_max_delay: Duration,
    pub dead_letter_max_attempts: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub run_migrations: bool,
    pub order: ServiceConfig,
    pub kafka: KafkaConfig,
    pub timeouts: TimeoutConfig,
    pub otel_endpoint: String,
    pub db_max_conn: u32,
    pub db_min_conn: u32,
}

impl Config {
    pub fn init() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("Missing environment variable: DATABASE_URL")?;
        let run_migrations_str = std::env::var("RUN_MIGRATIONS")
            .context("Missing environment variable: RUN_MIGRATIONS")?;

        let run_migrations = match run_migrations_str.as_str() {
            "true" => true,
            "false" => false,
            other => {
                return Err(anyhow!(
                    "RUN_MIGRATIONS must be 'true' or 'false', got '{}'",
                    other
                ));
            }
        };

        let db_max_conn: u32 = env_or("DB_MAX_CONNECTION", 5)?;
        let db_min_conn: u32 = env_or("DB_MIN_CONNECTION", 1)?;

        // order
        let order_grpc_port = std::env::var("ORDER_GRPC_PORT")
            .context("Missing environment variable: ORDER_GRPC_PORT")?
            .parse::<u16>()
            .context("ORDER_GRPC_PORT must be a valid u16 integer")?;

        let order_metric_port = std::env::var("ORDER_METRIC_PORT")
            .context("Missing environment variable: ORDER_METRIC_PORT")?
            .parse::<u16>()
            .context("ORDER_METRIC_PORT must be a valid u16 integer")?;

        // kafka
        let kafka = KafkaConfig {
            broker: std::env::var("KAFKA").context("Missing environment variable: KAFKA")?,
            group_id: env_string_or("KAFKA_GROUP_ID", "order-service-group"),
            checkout_topic: env_string_or("KAFKA_CHECKOUT_TOPIC", "cart-events"),
            dead_letter_topic: env_string_or("KAFKA_DEAD_LETTER_TOPIC", "cart-events.dlq"),
            order_created_topic: env_string_or("KAFKA_ORDER_CREATED_TOPIC", "order.created"),
        };

        let timeouts = TimeoutConfig {
            price_lookup: Duration::from_millis(env_or("PRICE_LOOKUP_TIMEOUT_MS", 2_000)?),
            store: Duration::from_millis(env_or("STORE_TIMEOUT_MS", 5_000)?),
            fetch: Duration::from_millis(env_or("FETCH_TIMEOUT_MS", 1_000)?),
            retry_min_delay: Duration::from_millis(env_or("RETRY_MIN_DELAY_MS", 200)?),
            retry_max_delay: Duration::from_millis(env_or("RETRY_MAX_DELAY_MS", 30_000)?),
            dead_letter_max_attempts: env_or("DEAD_LETTER_MAX_ATTEMPTS", 5)?,
        };

        if timeouts.retry_min_delay > timeouts.retry_max_delay {
            return Err(anyhow!(
                "RETRY_MIN_DELAY_MS must not exceed RETRY_MAX_DELAY_MS"
            ));
        }

        if timeouts.dead_letter_max_attempts == 0 {
            return Err(anyhow!("DEAD_LETTER_MAX_ATTEMPTS must be at least 1"));
        }

        let otel_endpoint = env_string_or("OTEL_ENDPOINT", "http://otel-collector:4317");

        Ok(Self {
            database_url,
            run_migrations,
            order: ServiceConfig {
                grpc_port: order_grpc_port,
                metric_port: order_metric_port,
            },
            kafka,
            timeouts,
            otel_endpoint,
            db_max_conn,
            db_min_conn,
        })
    }
}

fn env_string_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Unable to parse {name}: '{raw}'")),
        Err(_) => Ok(default),
    }
}
