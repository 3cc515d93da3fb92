use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::Sink;
use futures::stream;
use pgwire::api::auth::StartupHandler;
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use tokio::net::TcpStream;

use crate::engine::{Engine, EngineError, parse_span};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command, SqlError};

pub struct RoomAllocHandler {
    engine: Arc<Engine>,
    query_parser: Arc<RoomAllocQueryParser>,
}

impl RoomAllocHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(RoomAllocQueryParser),
        }
    }

    async fn execute_command(
        &self,
        cmd: Command,
        format: &Format,
    ) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.dispatch(cmd, format).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn dispatch(&self, cmd: Command, format: &Format) -> PgWireResult<Vec<Response>> {
        let engine = &self.engine;
        match cmd {
            Command::InsertBooking {
                start,
                end,
                number_of_people,
            } => {
                let confirmation = engine
                    .allocate(&start, &end, number_of_people)
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(allocation_schema(format));
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&(confirmation.booking_id as i64))?;
                encoder.encode_field(&confirmation.room)?;
                encoder.encode_field(&confirmation.to_string())?;
                let rows: Vec<PgWireResult<_>> = vec![Ok(encoder.take_row())];

                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectBooking { id } => {
                let booking = engine.get_booking(id).await.map_err(engine_err)?;
                Ok(vec![bookings_response(vec![booking], format)])
            }
            Command::SelectRoomBookings {
                room,
                after,
                before,
            } => {
                let within = match (after, before) {
                    (Some(after), Some(before)) => {
                        Some(parse_span(&after, &before).map_err(engine_err)?)
                    }
                    (None, None) => None,
                    _ => return Err(sql_err(SqlError::MissingFilter("start and end together"))),
                };
                let bookings = engine
                    .bookings_for_room(&room, within)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![bookings_response(bookings, format)])
            }
            Command::DeleteBooking { id } => {
                engine.delete_booking(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::DeleteAllBookings => {
                let removed = engine.clear_bookings().await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(removed))])
            }
            Command::SelectRooms => Ok(vec![rooms_response(engine.list_rooms(), format)?]),
            Command::SelectAvailability { start, end } => {
                let rooms = engine
                    .available_rooms(&start, &end)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![rooms_response(rooms, format)?])
            }
        }
    }
}

fn rooms_response(rooms: Vec<Arc<Room>>, format: &Format) -> PgWireResult<Response> {
    let schema = Arc::new(rooms_schema(format));
    let mut rows: Vec<PgWireResult<_>> = Vec::with_capacity(rooms.len());
    for room in rooms {
        let maintenance = serde_json::to_string(&room.maintenance)
            .map_err(|e| PgWireError::ApiError(Box::new(e)))?;
        let mut encoder = DataRowEncoder::new(schema.clone());
        encoder.encode_field(&room.name)?;
        encoder.encode_field(&(room.capacity as i64))?;
        encoder.encode_field(&maintenance)?;
        rows.push(Ok(encoder.take_row()));
    }
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

fn bookings_response(bookings: Vec<Booking>, format: &Format) -> Response {
    let schema = Arc::new(bookings_schema(format));
    let rows: Vec<PgWireResult<_>> = bookings
        .into_iter()
        .map(|booking| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&(booking.id as i64))?;
            encoder.encode_field(&booking.room)?;
            encoder.encode_field(&fmt_time(booking.span.start).to_string())?;
            encoder.encode_field(&fmt_time(booking.span.end).to_string())?;
            encoder.encode_field(&(booking.number_of_people as i64))?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

// ── Result schemas ───────────────────────────────────────────────

fn field(name: &str, ty: Type, format: &Format, idx: usize) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, format.format_for(idx))
}

fn allocation_schema(format: &Format) -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8, format, 0),
        field("room", Type::VARCHAR, format, 1),
        field("message", Type::VARCHAR, format, 2),
    ]
}

fn bookings_schema(format: &Format) -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8, format, 0),
        field("room", Type::VARCHAR, format, 1),
        field("start", Type::VARCHAR, format, 2),
        field("end", Type::VARCHAR, format, 3),
        field("people", Type::INT8, format, 4),
    ]
}

fn rooms_schema(format: &Format) -> Vec<FieldInfo> {
    vec![
        field("name", Type::VARCHAR, format, 0),
        field("capacity", Type::INT8, format, 1),
        field("maintenance", Type::VARCHAR, format, 2),
    ]
}

/// Result columns a statement will produce, judged from its text before
/// parameters are bound.
fn describe_schema(sql: &str, format: &Format) -> Vec<FieldInfo> {
    let upper = sql.trim_start().to_uppercase();
    if upper.starts_with("INSERT") {
        allocation_schema(format)
    } else if upper.starts_with("SELECT") {
        match from_table(&upper) {
            Some("AVAILABILITY") | Some("ROOMS") => rooms_schema(format),
            _ => bookings_schema(format),
        }
    } else {
        vec![]
    }
}

/// Table named right after the first `FROM`, unquoted and without schema.
fn from_table(upper: &str) -> Option<&str> {
    let mut tokens = upper.split_whitespace();
    tokens.find(|t| *t == "FROM")?;
    let name = tokens.next()?.trim_end_matches(';');
    let name = name.rsplit('.').next().unwrap_or(name);
    Some(name.trim_matches('"'))
}

#[async_trait]
impl SimpleQueryHandler for RoomAllocHandler {
    async fn do_query<C>(
        &self,
        _client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_command(cmd, &Format::UnifiedText).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct RoomAllocQueryParser;

#[async_trait]
impl QueryParser for RoomAllocQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(describe_schema(
            stmt,
            column_format.unwrap_or(&Format::UnifiedText),
        ))
    }
}

#[async_trait]
impl ExtendedQueryHandler for RoomAllocHandler {
    type Statement = String;
    type QueryParser = RoomAllocQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self
            .execute_command(cmd, &portal.result_column_format)
            .await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            describe_schema(&target.statement, &Format::UnifiedText),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(describe_schema(
            &target.statement.statement,
            &target.result_column_format,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
            {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let mut result = portal.statement.statement.to_string();

    // Highest index first so $1 never clobbers the prefix of $10.
    for (i, param) in portal.parameters.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct RoomAllocFactory {
    handler: Arc<RoomAllocHandler>,
    noop: Arc<NoopHandler>,
}

impl RoomAllocFactory {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            handler: Arc::new(RoomAllocHandler::new(engine)),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for RoomAllocFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.noop.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it disconnects.
pub async fn process_connection(socket: TcpStream, engine: Arc<Engine>) -> std::io::Result<()> {
    let factory = Arc::new(RoomAllocFactory::new(engine));
    pgwire::tokio::process_socket(socket, None, factory).await
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        e.sqlstate().into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_params_finds_highest_placeholder() {
        assert_eq!(count_params("SELECT * FROM rooms"), 0);
        assert_eq!(
            count_params(r#"INSERT INTO bookings (start, "end", people) VALUES ($1, $2, $3)"#),
            3
        );
        assert_eq!(count_params("SELECT * FROM bookings WHERE id = $12"), 12);
    }

    #[test]
    fn describe_schema_by_statement_kind() {
        let text = Format::UnifiedText;
        let names = |sql: &str| -> Vec<String> {
            describe_schema(sql, &text)
                .iter()
                .map(|f| f.name().to_string())
                .collect()
        };
        assert_eq!(names("INSERT INTO bookings VALUES ($1, $2, $3)"), ["id", "room", "message"]);
        assert_eq!(names("SELECT * FROM rooms"), ["name", "capacity", "maintenance"]);
        assert_eq!(
            names(r#"select * from availability where start >= $1 and "end" <= $2"#),
            ["name", "capacity", "maintenance"]
        );
        assert_eq!(
            names("SELECT * FROM bookings WHERE id = $1"),
            ["id", "room", "start", "end", "people"]
        );
        assert!(names("DELETE FROM bookings").is_empty());
        assert_eq!(
            names("SELECT * FROM bookings WHERE room = 'Boardrooms' AND id = $1"),
            ["id", "room", "start", "end", "people"]
        );
        assert_eq!(
            names(r#"SELECT * FROM public."rooms""#),
            ["name", "capacity", "maintenance"]
        );
    }

    #[test]
    fn from_table_reads_name_after_from() {
        assert_eq!(from_table("SELECT * FROM ROOMS;"), Some("ROOMS"));
        assert_eq!(
            from_table("SELECT * FROM BOOKINGS WHERE ROOM = 'ROOMS'"),
            Some("BOOKINGS")
        );
        assert_eq!(from_table("SELECT 1"), None);
    }
}
