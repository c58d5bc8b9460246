use serde_json::json;

use crate::export::ct_history_csv;
use crate::records::{parse_entries, CtHistoryEntry};

#[test]
fn csv_reproduces_table_rows_in_order() {
    // Arrange
    let entries: Vec<CtHistoryEntry> = parse_entries(&json!({
        "-a": { "time": "2024-05-01T09:15:00", "loop_number": 12, "mode": "+5", "duration_minutes": 14.24 },
        "-b": { "time": "2024-05-01 10:02:03.5", "loop_number": 13, "mode": 8, "duration_seconds": 600 },
        "-c": { "time": "pending", "loop_number": 14, "mode": "a,b" }
    }));

    // Act
    let csv = ct_history_csv(&entries);

    // Assert
    assert_eq!(
        csv,
        "date,time,loop,mode,duration_minutes\n\
         2024-05-01,09:15:00,12,+5,14.2\n\
         2024-05-01,10:02:03,13,8,10.0\n\
         pending,,14,\"a,b\",0.0\n"
    );
}

#[test]
fn csv_of_empty_history_is_header_only() {
    assert_eq!(ct_history_csv(&[]), "date,time,loop,mode,duration_minutes\n");
}
