//! MSSQL metadata provider implementation.
//!
//! Implements the `MetadataProvider` trait against a live SQL Server using
//! Tiberius with a single-connection bb8 pool. Exports issue one query at a
//! time, so the pool never needs more than one connection.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use chrono::NaiveDateTime;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::core::identifier::{qualify_mssql, quote_mssql};
use crate::core::{ColumnKey, ColumnRef, ColumnType, ForeignKeyRef, MetadataProvider, SqlValue, TableRef};
use crate::error::{ExportError, Result};

/// Maximum TDS packet size (32767 bytes, ~32KB).
const TDS_MAX_PACKET_SIZE: u32 = 32767;

/// Connection acquisition timeout from pool (30 seconds).
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

const LIST_TABLES_QUERY: &str = r#"
    SELECT SCHEMA_NAME(t.schema_id), t.name
    FROM sys.tables t
    ORDER BY 1, 2
"#;

const LIST_FOREIGN_KEYS_QUERY: &str = r#"
    SELECT
        SCHEMA_NAME(st.schema_id),
        st.name,
        sc.name,
        SCHEMA_NAME(tt.schema_id),
        tt.name,
        tc.name
    FROM sys.foreign_key_columns AS fk
    INNER JOIN sys.tables AS st ON fk.parent_object_id = st.object_id
    INNER JOIN sys.columns AS sc ON fk.parent_object_id = sc.object_id AND fk.parent_column_id = sc.column_id
    INNER JOIN sys.tables AS tt ON fk.referenced_object_id = tt.object_id
    INNER JOIN sys.columns AS tc ON fk.referenced_object_id = tc.object_id AND fk.referenced_column_id = tc.column_id
    ORDER BY 1, 2, 3
"#;

const PRIMARY_KEY_QUERY: &str = r#"
    SELECT c.COLUMN_NAME
    FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
    JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE c
        ON c.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
        AND c.TABLE_SCHEMA = tc.TABLE_SCHEMA
        AND c.TABLE_NAME = tc.TABLE_NAME
    WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
      AND tc.TABLE_SCHEMA = @P1
      AND tc.TABLE_NAME = @P2
    ORDER BY c.ORDINAL_POSITION
"#;

const LIST_COLUMNS_QUERY: &str = r#"
    SELECT COLUMN_NAME, DATA_TYPE
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2
    ORDER BY ORDINAL_POSITION
"#;

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: SourceConfig,
}

impl TiberiusConnectionManager {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> std::result::Result<Config, tiberius::error::Error> {
        if let Some(connection_string) = &self.config.connection_string {
            let mut config = Config::from_ado_string(connection_string)?;
            config.packet_size(TDS_MAX_PACKET_SIZE);
            return Ok(config);
        }

        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database(&self.config.database);
        config.authentication(AuthMethod::sql_server(&self.config.user, &self.config.password));

        if self.config.encrypt {
            if self.config.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config.packet_size(TDS_MAX_PACKET_SIZE);
        Ok(config)
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config()?;
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;

        if let Err(e) = tcp.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY on MSSQL connection: {}", e);
        }

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// SQL Server metadata and row provider.
pub struct MssqlProvider {
    pool: Pool<TiberiusConnectionManager>,
}

impl MssqlProvider {
    /// Connect to SQL Server and verify the connection.
    pub async fn new(config: SourceConfig) -> Result<Self> {
        let describe = describe_source(&config);
        let manager = TiberiusConnectionManager::new(config);
        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .test_on_check_out(false)
            .build(manager)
            .await
            .map_err(|e| ExportError::pool(e, "creating MSSQL connection pool"))?;

        let provider = Self { pool };
        provider.test_connection().await?;

        info!("Connected to MSSQL: {}", describe);
        Ok(provider)
    }

    /// Get the pooled connection.
    async fn get_client(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| ExportError::pool(e, "getting MSSQL connection from pool"))
    }

    /// Run a query whose single column holds a string and collect its values.
    async fn query_strings(&self, sql: &str, params: &[&str]) -> Result<Vec<String>> {
        let mut client = self.get_client().await?;
        let mut query = Query::new(sql);
        for param in params {
            query.bind(*param);
        }

        let stream = query.query(&mut client).await?;
        let rows = stream.into_first_result().await?;

        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(value) = row.try_get::<&str, _>(0)? {
                values.push(value.to_string());
            }
        }
        Ok(values)
    }
}

#[async_trait]
impl MetadataProvider for MssqlProvider {
    async fn list_tables(&self) -> Result<Vec<TableRef>> {
        let mut client = self.get_client().await?;
        let rows = client
            .simple_query(LIST_TABLES_QUERY)
            .await?
            .into_first_result()
            .await?;

        let tables = rows
            .iter()
            .map(|row| -> Result<TableRef> {
                Ok(TableRef::new(required_str(row, 0)?, required_str(row, 1)?))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Listed {} tables", tables.len());
        Ok(tables)
    }

    async fn list_foreign_keys(&self) -> Result<Vec<ForeignKeyRef>> {
        let mut client = self.get_client().await?;
        let rows = client
            .simple_query(LIST_FOREIGN_KEYS_QUERY)
            .await?
            .into_first_result()
            .await?;

        rows.iter()
            .map(|row| -> Result<ForeignKeyRef> {
                let source = ColumnKey {
                    table: TableRef::new(required_str(row, 0)?, required_str(row, 1)?),
                    column: required_str(row, 2)?,
                };
                let target = ColumnKey {
                    table: TableRef::new(required_str(row, 3)?, required_str(row, 4)?),
                    column: required_str(row, 5)?,
                };
                Ok(ForeignKeyRef::new(source, target))
            })
            .collect()
    }

    async fn primary_key_column(&self, table: &TableRef) -> Result<Option<String>> {
        let columns = self
            .query_strings(PRIMARY_KEY_QUERY, &[table.schema.as_str(), table.name.as_str()])
            .await?;
        if columns.len() > 1 {
            warn!(
                "{} has a composite primary key ({}); rows are addressed by {} only",
                table,
                columns.join(", "),
                columns[0]
            );
        }
        debug!("Primary key for {}: {:?}", table, columns.first());
        Ok(columns.into_iter().next())
    }

    async fn list_columns(&self, table: &TableRef) -> Result<Vec<ColumnRef>> {
        let mut client = self.get_client().await?;
        let mut query = Query::new(LIST_COLUMNS_QUERY);
        query.bind(&table.schema);
        query.bind(&table.name);

        let stream = query.query(&mut client).await?;
        let rows = stream.into_first_result().await?;

        let columns = rows
            .iter()
            .map(|row| -> Result<ColumnRef> {
                Ok(ColumnRef::new(required_str(row, 0)?, required_str(row, 1)?))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn read_row(
        &self,
        table: &TableRef,
        pk_column: &str,
        columns: &[ColumnRef],
        id: &str,
    ) -> Result<Option<Vec<SqlValue>>> {
        let types = columns
            .iter()
            .map(|c| c.column_type(table))
            .collect::<Result<Vec<_>>>()?;
        let column_list = columns
            .iter()
            .map(|c| quote_mssql(&c.name))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = @P1",
            column_list,
            qualify_mssql(&table.schema, &table.name)?,
            quote_mssql(pk_column)?
        );

        let mut client = self.get_client().await?;
        let mut query = Query::new(sql);
        query.bind(id);
        let stream = query.query(&mut client).await?;
        let rows = stream.into_first_result().await?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let values = columns
            .iter()
            .zip(types)
            .enumerate()
            .map(|(idx, (column, ty))| convert_row_value(row, idx, ty, &column.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(values))
    }

    async fn read_referencing_ids(
        &self,
        table: &TableRef,
        pk_column: &str,
        column: &str,
        id: &str,
    ) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT CONVERT(nvarchar(max), {}) FROM {} WHERE {} = @P1",
            quote_mssql(pk_column)?,
            qualify_mssql(&table.schema, &table.name)?,
            quote_mssql(column)?
        );
        self.query_strings(&sql, &[id]).await
    }

    async fn lookup_value(
        &self,
        table: &TableRef,
        id_column: &str,
        lookup_column: &str,
        id: &str,
    ) -> Result<Option<String>> {
        let sql = format!(
            "SELECT CONVERT(nvarchar(max), {}) FROM {} WHERE {} = @P1",
            quote_mssql(lookup_column)?,
            qualify_mssql(&table.schema, &table.name)?,
            quote_mssql(id_column)?
        );
        Ok(self.query_strings(&sql, &[id]).await?.into_iter().next())
    }

    async fn test_connection(&self) -> Result<()> {
        let mut client = self.get_client().await?;
        client.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mssql"
    }
}

/// Human-readable source description without credentials.
fn describe_source(config: &SourceConfig) -> String {
    match &config.connection_string {
        Some(_) => "(from connection string)".to_string(),
        None => format!("{}:{}/{}", config.host, config.port, config.database),
    }
}

fn required_str(row: &Row, idx: usize) -> Result<String> {
    row.try_get::<&str, _>(idx)?
        .map(str::to_string)
        .ok_or_else(|| ExportError::Metadata(format!("Unexpected NULL in metadata column {}", idx)))
}

/// Convert a row value to SqlValue based on the column type.
fn convert_row_value(row: &Row, idx: usize, ty: ColumnType, column: &str) -> Result<SqlValue> {
    let value = match ty {
        ColumnType::String => row
            .try_get::<&str, _>(idx)?
            .map(|s| SqlValue::Text(s.to_string())),
        ColumnType::BigInt => row.try_get::<i64, _>(idx)?.map(SqlValue::I64),
        ColumnType::Int => row.try_get::<i32, _>(idx)?.map(SqlValue::I32),
        ColumnType::Decimal => row
            .try_get::<rust_decimal::Decimal, _>(idx)?
            .map(SqlValue::Decimal),
        ColumnType::Bit => row.try_get::<bool, _>(idx)?.map(SqlValue::Bool),
        ColumnType::DateTime2 => row
            .try_get::<NaiveDateTime, _>(idx)?
            .map(SqlValue::DateTime),
        ColumnType::Binary => row
            .try_get::<&[u8], _>(idx)?
            .map(|v| SqlValue::Bytes(v.to_vec())),
    };

    if value.is_none() {
        debug!("Column {} is NULL", column);
    }
    Ok(value.unwrap_or(SqlValue::Null))
}
