//! Downloads a settlement as a CSV file.
//!
//! The file starts with one `name,value` row per settlement field, followed by
//! a header row and one row per entry.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use csv::WriterBuilder;
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::UserID,
    database_id::SettlementId,
    html::format_date_time,
    income::{IncomeEntry, get_settlement_entries},
    settlement::{Settlement, get_settlement},
};

/// The state needed to export a settlement.
#[derive(Debug, Clone)]
pub struct ExportSettlementState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ExportSettlementState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

const ENTRY_HEADER: [&str; 7] = [
    "id",
    "entry_date",
    "destination",
    "custom_destination",
    "amount",
    "is_fuel_expense",
    "created_at",
];

/// Serve the settlement `settlement_id` of the logged in user as a CSV attachment.
pub async fn export_settlement_endpoint(
    State(state): State<ExportSettlementState>,
    Extension(user_id): Extension<UserID>,
    Path(settlement_id): Path<SettlementId>,
) -> Result<Response, Error> {
    let (settlement, entries) = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        (
            get_settlement(user_id, settlement_id, &connection)?,
            get_settlement_entries(user_id, settlement_id, &connection)?,
        )
    };

    let csv = settlement_to_csv(&settlement, &entries)?;
    let file_name = format!("attachment; filename=\"settlement-{}.csv\"", settlement.id);

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (CONTENT_DISPOSITION, file_name),
        ],
        csv,
    )
        .into_response())
}

fn settlement_to_csv(settlement: &Settlement, entries: &[IncomeEntry]) -> Result<Vec<u8>, Error> {
    let csv_error = |error: csv::Error| Error::CsvError(error.to_string());

    // The summary rows have two fields and the entry rows have seven.
    let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());

    let summary = [
        ("settlement_id", settlement.id.to_string()),
        (
            "settlement_time",
            format_date_time(settlement.settlement_time),
        ),
        ("total_amount", settlement.total_amount.to_string()),
        (
            "total_amount_excluding_fuel",
            settlement.total_amount_excluding_fuel.to_string(),
        ),
        (
            "total_fuel_expense",
            settlement.total_fuel_expense.to_string(),
        ),
        ("entry_count", entries.len().to_string()),
    ];

    for (name, value) in &summary {
        writer
            .write_record([*name, value.as_str()])
            .map_err(csv_error)?;
    }

    writer.write_record(ENTRY_HEADER).map_err(csv_error)?;

    for entry in entries {
        writer
            .write_record([
                entry.id.to_string(),
                entry.entry_date.to_string(),
                entry.destination.to_string(),
                entry.custom_destination.clone().unwrap_or_default(),
                entry.amount.to_string(),
                entry.is_fuel_expense.to_string(),
                format_date_time(entry.created_at),
            ])
            .map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|error| Error::CsvError(error.to_string()))
}

#[cfg(test)]
mod export_settlement_tests {
    use axum::{
        Extension,
        extract::{Path, State},
        http::StatusCode,
    };
    use time::macros::{date, datetime};

    use crate::{
        Error,
        settlement::{
            export_endpoint::{ExportSettlementState, export_settlement_endpoint},
            settle,
        },
        test_utils::{
            assert_content_type, get_header, get_shared_test_connection, insert_test_entry,
            insert_test_user,
        },
    };

    #[tokio::test]
    async fn exports_summary_and_entries() {
        let db_connection = get_shared_test_connection();
        let (user, result) = {
            let connection = db_connection.lock().unwrap();
            let user = insert_test_user("driver", false, &connection);
            insert_test_entry(user.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);
            insert_test_entry(user.id, date!(2025 - 03 - 02), "FUEL", 6_000, &connection);
            let result = settle(user.id, datetime!(2025-03-03 09:00:00), &connection).unwrap();
            (user, result)
        };
        let state = ExportSettlementState { db_connection };

        let response = export_settlement_endpoint(
            State(state),
            Extension(user.id),
            Path(result.settlement_id),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_content_type(&response, "text/csv");
        assert_eq!(
            get_header(&response, "content-disposition"),
            format!(
                "attachment; filename=\"settlement-{}.csv\"",
                result.settlement_id
            )
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(body.as_ref());
        let rows: Vec<Vec<String>> = reader
            .records()
            .map(|record| record.unwrap().iter().map(str::to_owned).collect())
            .collect();

        assert_eq!(
            rows[0],
            vec!["settlement_id", result.settlement_id.to_string().as_str()]
        );
        assert_eq!(rows[1], vec!["settlement_time", "2025-03-03 09:00"]);
        assert_eq!(rows[2], vec!["total_amount", "260.00"]);
        assert_eq!(rows[3], vec!["total_amount_excluding_fuel", "200.00"]);
        assert_eq!(rows[4], vec!["total_fuel_expense", "60.00"]);
        assert_eq!(rows[5], vec!["entry_count", "2"]);
        assert_eq!(rows[6][0], "id");
        assert_eq!(rows.len(), 9);
        assert_eq!(rows[7][1..6], ["2025-03-01", "ONT8", "", "200.00", "false"]);
        assert_eq!(rows[8][1..6], ["2025-03-02", "FUEL", "", "60.00", "true"]);
    }

    #[tokio::test]
    async fn other_users_settlement_is_not_found() {
        let db_connection = get_shared_test_connection();
        let (other, result) = {
            let connection = db_connection.lock().unwrap();
            let owner = insert_test_user("owner", false, &connection);
            let other = insert_test_user("other", false, &connection);
            insert_test_entry(owner.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);
            let result = settle(owner.id, datetime!(2025-03-02 09:00:00), &connection).unwrap();
            (other, result)
        };
        let state = ExportSettlementState { db_connection };

        let result = export_settlement_endpoint(
            State(state),
            Extension(other.id),
            Path(result.settlement_id),
        )
        .await;

        assert_eq!(result.err(), Some(Error::NotFound));
    }
}
