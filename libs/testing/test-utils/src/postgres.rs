//! PostgreSQL test infrastructure
//!
//! Starts a disposable PostgreSQL container. Schema setup is left to the code
//! under test (the relational waitlist store creates its own table).

use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

pub const POSTGRES_USER: &str = "postgres";
pub const POSTGRES_PASSWORD: &str = "postgres";
pub const POSTGRES_DB: &str = "postgres";

/// PostgreSQL container wrapper
///
/// The container is stopped and removed when this struct is dropped.
pub struct TestPostgres {
    #[allow(dead_code)]
    container: ContainerAsync<Postgres>,
    pub host: String,
    pub port: u16,
}

impl TestPostgres {
    /// Start a fresh PostgreSQL container
    ///
    /// # Example
    ///
    /// ```no_run
    /// use test_utils::TestPostgres;
    ///
    /// # async fn example() {
    /// let pg = TestPostgres::new().await;
    /// let url = pg.url();
    /// # }
    /// ```
    pub async fn new() -> Self {
        // Use Postgres 18 to match production
        let container = Postgres::default()
            .with_tag("18-alpine")
            .start()
            .await
            .expect("Failed to start Postgres container");

        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get host port");

        tracing::info!(port, "Test database ready (Postgres 18)");

        Self {
            container,
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    /// Connection string for the default database
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            POSTGRES_USER, POSTGRES_PASSWORD, self.host, self.port, POSTGRES_DB
        )
    }
}

impl Drop for TestPostgres {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test database container");
    }
}
