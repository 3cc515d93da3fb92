use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::model::BookingId;

/// Parsed command from SQL input. Times stay as text so the engine reports
/// malformed values with its own messages.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// `INSERT INTO bookings (start, "end", people) VALUES (...)`
    InsertBooking {
        start: String,
        end: String,
        number_of_people: u32,
    },
    /// `SELECT * FROM bookings WHERE id = ...`
    SelectBooking {
        id: BookingId,
    },
    /// `SELECT * FROM bookings WHERE room = ... [AND start < ... AND "end" > ...]`,
    /// the optional window being the bookings overlapping `[after, before)`.
    SelectRoomBookings {
        room: String,
        after: Option<String>,
        before: Option<String>,
    },
    DeleteBooking {
        id: BookingId,
    },
    /// `DELETE FROM bookings` without a filter.
    DeleteAllBookings,
    SelectRooms,
    /// `SELECT * FROM availability WHERE start >= ... AND "end" <= ...`
    SelectAvailability {
        start: String,
        end: String,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    if table != "bookings" {
        return Err(SqlError::UnknownTable(table));
    }

    let rows = extract_all_insert_rows(insert)?;
    if rows.len() > 1 {
        return Err(SqlError::Unsupported("one booking per INSERT".into()));
    }
    let values = &rows[0];
    if values.len() < 3 {
        return Err(SqlError::WrongArity("bookings", 3, values.len()));
    }
    Ok(Command::InsertBooking {
        start: parse_text_expr(&values[0])?,
        end: parse_text_expr(&values[1])?,
        number_of_people: parse_party_size(&values[2])?,
    })
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    if table != "bookings" {
        return Err(SqlError::UnknownTable(table));
    }
    match &delete.selection {
        None => Ok(Command::DeleteAllBookings),
        Some(selection) => {
            let filters = Filters::extract(selection)?;
            Ok(Command::DeleteBooking {
                id: filters.id.ok_or(SqlError::MissingFilter("id"))?,
            })
        }
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let filters = match &select.selection {
        Some(selection) => Filters::extract(selection)?,
        None => Filters::default(),
    };

    match table.as_str() {
        "rooms" => Ok(Command::SelectRooms),
        "availability" => Ok(Command::SelectAvailability {
            start: filters.start.ok_or(SqlError::MissingFilter("start"))?,
            end: filters.end.ok_or(SqlError::MissingFilter("end"))?,
        }),
        "bookings" => {
            if let Some(id) = filters.id {
                Ok(Command::SelectBooking { id })
            } else if let Some(room) = filters.room {
                Ok(Command::SelectRoomBookings {
                    room,
                    after: filters.ends_after,
                    before: filters.starts_before,
                })
            } else {
                Err(SqlError::MissingFilter("id or room"))
            }
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Column filters recognised in WHERE clauses joined by AND.
#[derive(Debug, Default)]
struct Filters {
    id: Option<BookingId>,
    room: Option<String>,
    /// `start >= x`
    start: Option<String>,
    /// `"end" <= x`
    end: Option<String>,
    /// `start < x`
    starts_before: Option<String>,
    /// `"end" > x`
    ends_after: Option<String>,
}

impl Filters {
    fn extract(expr: &Expr) -> Result<Self, SqlError> {
        let mut filters = Self::default();
        filters.visit(expr)?;
        Ok(filters)
    }

    fn visit(&mut self, expr: &Expr) -> Result<(), SqlError> {
        match expr {
            Expr::Nested(inner) => self.visit(inner)?,
            Expr::BinaryOp { left, op, right } => match op {
                ast::BinaryOperator::And => {
                    self.visit(left)?;
                    self.visit(right)?;
                }
                ast::BinaryOperator::Eq => match expr_column_name(left).as_deref() {
                    Some("id") => self.id = Some(parse_booking_id(right)?),
                    Some("room") => self.room = Some(parse_text_expr(right)?),
                    _ => {}
                },
                ast::BinaryOperator::GtEq => {
                    if expr_column_name(left).as_deref() == Some("start") {
                        self.start = Some(parse_text_expr(right)?);
                    }
                }
                ast::BinaryOperator::LtEq => {
                    if expr_column_name(left).as_deref() == Some("end") {
                        self.end = Some(parse_text_expr(right)?);
                    }
                }
                ast::BinaryOperator::Lt => {
                    if expr_column_name(left).as_deref() == Some("start") {
                        self.starts_before = Some(parse_text_expr(right)?);
                    }
                }
                ast::BinaryOperator::Gt => {
                    if expr_column_name(left).as_deref() == Some("end") {
                        self.ends_after = Some(parse_text_expr(right)?);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_all_insert_rows(insert: &ast::Insert) -> Result<Vec<Vec<Expr>>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows.clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_text_expr(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .trim()
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer {s:?}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_booking_id(expr: &Expr) -> Result<BookingId, SqlError> {
    let v = parse_i64_expr(expr)?;
    BookingId::try_from(v)
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| SqlError::Parse(format!("invalid booking id {v}: must be a positive integer")))
}

/// Negative sizes clamp to zero so the engine rejects them as too few people.
fn parse_party_size(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64_expr(expr)?;
    Ok(u32::try_from(v.max(0)).unwrap_or(u32::MAX))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
