use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor,
    TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::engine::dates;
use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRoom {
        id: Ulid,
        name: Option<String>,
    },
    DeleteRoom {
        id: Ulid,
    },
    SelectRooms,
    InsertReservation {
        room_id: Ulid,
        rented_from: Ms,
        rented_to: Ms,
    },
    SelectReservation {
        id: Ulid,
    },
    SelectRoomReservations {
        room_id: Ulid,
        period: Period,
    },
    UpdateReservation {
        id: Ulid,
        patch: ReservationPatch,
    },
    DeleteReservation {
        id: Ulid,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(&table.relation, assignments, selection),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;

    match table.as_str() {
        "rooms" => {
            let row = bind_columns("rooms", &["id", "name"], insert, values)?;
            let id = parse_ulid_expr(required(&row, "id")?)?;
            let name = match column(&row, "name") {
                Some(expr) => parse_string_or_null(expr)?,
                None => None,
            };
            Ok(Command::InsertRoom { id, name })
        }
        "reservations" => {
            let row = bind_columns(
                "reservations",
                &["room_id", "rented_from", "rented_to"],
                insert,
                values,
            )?;
            Ok(Command::InsertReservation {
                room_id: parse_ulid_expr(required(&row, "room_id")?)?,
                rented_from: parse_date_expr(required(&row, "rented_from")?)?,
                rented_to: parse_date_expr(required(&row, "rented_to")?)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Pair VALUES with the statement's column list, or with `known` in order
/// when the list is omitted.
fn bind_columns(
    table: &'static str,
    known: &[&'static str],
    insert: &ast::Insert,
    values: Vec<Expr>,
) -> Result<Vec<(String, Expr)>, SqlError> {
    let columns: Vec<String> = if insert.columns.is_empty() {
        known.iter().take(values.len()).map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
    };
    if columns.len() != values.len() {
        return Err(SqlError::WrongArity(table, columns.len(), values.len()));
    }
    for (i, col) in columns.iter().enumerate() {
        if !known.contains(&col.as_str()) || columns[..i].contains(col) {
            return Err(SqlError::UnknownColumn(col.clone()));
        }
    }
    Ok(columns.into_iter().zip(values).collect())
}

fn column<'a>(row: &'a [(String, Expr)], name: &str) -> Option<&'a Expr> {
    row.iter().find(|(col, _)| col == name).map(|(_, expr)| expr)
}

fn required<'a>(row: &'a [(String, Expr)], name: &'static str) -> Result<&'a Expr, SqlError> {
    column(row, name).ok_or(SqlError::MissingColumn(name))
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "rooms" => Ok(Command::DeleteRoom { id }),
        "reservations" => Ok(Command::DeleteReservation { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;

    match table.as_str() {
        "rooms" => Ok(Command::SelectRooms),
        "reservations" => {
            let mut filters = ReservationFilters::default();
            if let Some(selection) = &select.selection {
                filters.collect(selection)?;
            }
            if let Some(id) = filters.id {
                return Ok(Command::SelectReservation { id });
            }
            Ok(Command::SelectRoomReservations {
                room_id: filters.room_id.ok_or(SqlError::MissingFilter("room_id"))?,
                period: Period::new(filters.from, filters.to),
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// `WHERE` conjuncts understood on `reservations`.
#[derive(Default)]
struct ReservationFilters {
    id: Option<Ulid>,
    room_id: Option<Ulid>,
    from: Option<Ms>,
    to: Option<Ms>,
}

impl ReservationFilters {
    fn collect(&mut self, expr: &Expr) -> Result<(), SqlError> {
        match expr {
            Expr::Nested(inner) => self.collect(inner),
            Expr::BinaryOp { left, op, right } => {
                let col = expr_column_name(left);
                match (op, col.as_deref()) {
                    (ast::BinaryOperator::And, _) => {
                        self.collect(left)?;
                        self.collect(right)
                    }
                    (ast::BinaryOperator::Eq, Some("id")) => {
                        self.id = Some(parse_ulid_expr(right)?);
                        Ok(())
                    }
                    (ast::BinaryOperator::Eq, Some("room_id")) => {
                        self.room_id = Some(parse_ulid_expr(right)?);
                        Ok(())
                    }
                    (ast::BinaryOperator::GtEq, Some("rented_from")) => {
                        self.from = Some(parse_date_expr(right)?);
                        Ok(())
                    }
                    (ast::BinaryOperator::LtEq, Some("rented_to")) => {
                        self.to = Some(parse_date_expr(right)?);
                        Ok(())
                    }
                    _ => Err(SqlError::Unsupported(format!("filter: {expr}"))),
                }
            }
            _ => Err(SqlError::Unsupported(format!("filter: {expr}"))),
        }
    }
}

fn parse_update(
    relation: &TableFactor,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(relation)?;
    if table != "reservations" {
        return Err(SqlError::UnknownTable(table));
    }
    let id = extract_where_id(selection)?;

    let mut patch = ReservationPatch::default();
    for assignment in assignments {
        let column = match &assignment.target {
            AssignmentTarget::ColumnName(name) => object_name_last(name)
                .ok_or_else(|| SqlError::Parse("empty column name".into()))?,
            AssignmentTarget::Tuple(_) => {
                return Err(SqlError::Unsupported("tuple assignment".into()));
            }
        };
        let value = &assignment.value;
        match column.as_str() {
            "room_id" => patch.room_id = Some(parse_ulid_expr(value)?),
            "rented_from" => patch.rented_from = Some(parse_date_expr(value)?),
            "rented_to" => patch.rented_to = Some(parse_date_expr(value)?),
            "is_canceled" => patch.is_canceled = Some(parse_bool(value)?),
            _ => return Err(SqlError::UnknownColumn(column)),
        }
    }
    Ok(Command::UpdateReservation { id, patch })
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
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
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

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.clone()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => parse_ulid_expr(right),
        _ => Err(SqlError::MissingFilter("id")),
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

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => {
            Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
        }
        Some(value) => Err(SqlError::Parse(format!("expected ULID string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

/// Integer milliseconds, or a quoted `YYYY-MM-DD` / RFC 3339 literal.
fn parse_date_expr(expr: &Expr) -> Result<Ms, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        return Ok(-parse_date_expr(expr)?);
    }
    match extract_value(expr) {
        Some(Value::Number(s, _)) => s
            .parse()
            .map_err(|e| SqlError::Parse(format!("bad timestamp {s}: {e}"))),
        Some(Value::SingleQuotedString(s)) => {
            dates::parse_date(s).ok_or_else(|| SqlError::Parse(format!("bad date: {s}")))
        }
        Some(value) => Err(SqlError::Parse(format!("expected date, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s)) => Ok(Some(s.clone())),
        Some(value) => Err(SqlError::Parse(format!("expected string or NULL, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    match extract_value(expr) {
        Some(Value::Boolean(b)) => Ok(*b),
        Some(Value::SingleQuotedString(s)) => match s.to_lowercase().as_str() {
            "true" | "t" | "1" => Ok(true),
            "false" | "f" | "0" => Ok(false),
            _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
        },
        Some(Value::Number(n, _)) => Ok(n != "0"),
        Some(value) => Err(SqlError::Parse(format!("expected bool, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
    MissingColumn(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::MissingColumn(col) => write!(f, "missing column: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    // 2024-01-01T00:00:00Z
    const JAN_1: Ms = 1_704_067_200_000;

    fn id() -> Ulid {
        Ulid::from_string(ID).unwrap()
    }

    #[test]
    fn parse_insert_room() {
        let cmd = parse_sql(&format!("INSERT INTO rooms (id) VALUES ('{ID}')")).unwrap();
        assert_eq!(cmd, Command::InsertRoom { id: id(), name: None });
    }

    #[test]
    fn parse_insert_room_with_name() {
        let sql = format!("INSERT INTO rooms (id, name) VALUES ('{ID}', 'Blue Room')");
        let cmd = parse_sql(&sql).unwrap();
        assert_eq!(
            cmd,
            Command::InsertRoom {
                id: id(),
                name: Some("Blue Room".into())
            }
        );
        let sql = format!("INSERT INTO rooms (id, name) VALUES ('{ID}', NULL)");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertRoom { id: id(), name: None }
        );
    }

    #[test]
    fn parse_delete_room() {
        let cmd = parse_sql(&format!("DELETE FROM rooms WHERE id = '{ID}'")).unwrap();
        assert_eq!(cmd, Command::DeleteRoom { id: id() });
    }

    #[test]
    fn parse_select_rooms() {
        assert_eq!(parse_sql("SELECT * FROM rooms").unwrap(), Command::SelectRooms);
    }

    #[test]
    fn parse_insert_reservation_with_dates() {
        let sql = format!(
            "INSERT INTO reservations (room_id, rented_from, rented_to) VALUES ('{ID}', '2024-01-01', '2024-01-05T12:00:00Z')"
        );
        let cmd = parse_sql(&sql).unwrap();
        assert_eq!(
            cmd,
            Command::InsertReservation {
                room_id: id(),
                rented_from: JAN_1,
                rented_to: JAN_1 + 4 * 86_400_000 + 12 * 3_600_000,
            }
        );
    }

    #[test]
    fn parse_insert_reservation_with_millis() {
        let sql = format!(
            "INSERT INTO reservations (room_id, rented_from, rented_to) VALUES ('{ID}', 1000, 2000)"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertReservation {
                rented_from,
                rented_to,
                ..
            } => {
                assert_eq!(rented_from, 1000);
                assert_eq!(rented_to, 2000);
            }
            cmd => panic!("expected InsertReservation, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_reservation_wrong_arity() {
        let sql = format!(
            "INSERT INTO reservations (room_id, rented_from, rented_to) VALUES ('{ID}', 1000)"
        );
        assert!(matches!(
            parse_sql(&sql),
            Err(SqlError::WrongArity("reservations", 3, 2))
        ));
        let sql = format!("INSERT INTO reservations VALUES ('{ID}')");
        assert!(matches!(
            parse_sql(&sql),
            Err(SqlError::MissingColumn("rented_from"))
        ));
    }

    #[test]
    fn parse_insert_reservation_honours_column_order() {
        let sql = format!(
            "INSERT INTO reservations (rented_to, room_id, rented_from) VALUES (2000, '{ID}', 1000)"
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertReservation {
                room_id: id(),
                rented_from: 1000,
                rented_to: 2000,
            }
        );
    }

    #[test]
    fn parse_insert_rejects_unknown_or_repeated_columns() {
        let sql = format!(
            "INSERT INTO reservations (room_id, rented_from, price) VALUES ('{ID}', 1000, 2000)"
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownColumn(c)) if c == "price"));
        let sql = format!(
            "INSERT INTO reservations (room_id, rented_from, rented_from) VALUES ('{ID}', 1000, 2000)"
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownColumn(c)) if c == "rented_from"));
        let sql = "INSERT INTO rooms (name) VALUES ('Blue')";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingColumn("id"))));
    }

    #[test]
    fn parse_insert_reservation_bad_date() {
        let sql = format!(
            "INSERT INTO reservations (room_id, rented_from, rented_to) VALUES ('{ID}', 'soon', '2024-01-05')"
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_select_reservation_by_id() {
        let cmd = parse_sql(&format!("SELECT * FROM reservations WHERE id = '{ID}'")).unwrap();
        assert_eq!(cmd, Command::SelectReservation { id: id() });
    }

    #[test]
    fn parse_select_room_reservations() {
        let sql = format!(
            "SELECT * FROM reservations WHERE room_id = '{ID}' AND rented_from >= '2024-01-01' AND rented_to <= 1704412800000"
        );
        let cmd = parse_sql(&sql).unwrap();
        assert_eq!(
            cmd,
            Command::SelectRoomReservations {
                room_id: id(),
                period: Period::between(JAN_1, 1_704_412_800_000),
            }
        );
    }

    #[test]
    fn parse_select_room_reservations_single_bound() {
        let sql = format!("SELECT * FROM reservations WHERE room_id = '{ID}' AND rented_to <= '2024-01-01'");
        match parse_sql(&sql).unwrap() {
            Command::SelectRoomReservations { period, .. } => {
                assert_eq!(period, Period::new(None, Some(JAN_1)));
            }
            cmd => panic!("expected SelectRoomReservations, got {cmd:?}"),
        }

        let sql = format!("SELECT * FROM reservations WHERE room_id = '{ID}'");
        match parse_sql(&sql).unwrap() {
            Command::SelectRoomReservations { period, .. } => {
                assert_eq!(period, Period::unbounded());
            }
            cmd => panic!("expected SelectRoomReservations, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_reservations_requires_room() {
        assert!(matches!(
            parse_sql("SELECT * FROM reservations"),
            Err(SqlError::MissingFilter("room_id"))
        ));
    }

    #[test]
    fn parse_select_reservations_rejects_unknown_filter() {
        let sql = format!("SELECT * FROM reservations WHERE room_id = '{ID}' OR rented_to <= 5");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_update_cancel() {
        let sql = format!("UPDATE reservations SET is_canceled = true WHERE id = '{ID}'");
        let cmd = parse_sql(&sql).unwrap();
        assert_eq!(
            cmd,
            Command::UpdateReservation {
                id: id(),
                patch: ReservationPatch::cancel(),
            }
        );
    }

    #[test]
    fn parse_update_dates_and_room() {
        let sql = format!(
            "UPDATE reservations SET rented_from = '2024-01-01', rented_to = 5000, room_id = '{ID}' WHERE id = '{ID}'"
        );
        match parse_sql(&sql).unwrap() {
            Command::UpdateReservation { patch, .. } => {
                assert_eq!(patch.rented_from, Some(JAN_1));
                assert_eq!(patch.rented_to, Some(5000));
                assert_eq!(patch.room_id, Some(id()));
                assert_eq!(patch.is_canceled, None);
            }
            cmd => panic!("expected UpdateReservation, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_unknown_column() {
        let sql = format!("UPDATE reservations SET price = 10 WHERE id = '{ID}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownColumn(c)) if c == "price"));
    }

    #[test]
    fn parse_update_requires_id() {
        let sql = "UPDATE reservations SET is_canceled = true";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingFilter("id"))));
    }

    #[test]
    fn parse_update_rooms_rejected() {
        let sql = format!("UPDATE rooms SET name = 'x' WHERE id = '{ID}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn parse_delete_reservation() {
        let cmd = parse_sql(&format!("DELETE FROM reservations WHERE id = '{ID}'")).unwrap();
        assert_eq!(cmd, Command::DeleteReservation { id: id() });
    }

    #[test]
    fn parse_unknown_table_errors() {
        let sql = format!("INSERT INTO bookings (id) VALUES ('{ID}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
