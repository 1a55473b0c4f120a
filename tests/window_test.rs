/*!
# Tests for Window Functions

Pipeline-level coverage of RANK, LAG and trailing moving averages: ordering
within partitions, preserved input row order, partial frames and the
date-granularity pitfall in gap analysis.
*/

use chrono::NaiveDate;
use reltab::{
    BinaryOperator, EngineError, Expr, FieldType, FieldValue, Params, PipelineSpec, ReportEngine,
    Row, Schema, SortKey, Table, WindowFunction, WindowSpec,
};

fn date(y: i32, m: u32, d: u32) -> FieldValue {
    FieldValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn txn_row(customer: &str, txn_date: FieldValue, amount: i64) -> Row {
    Row::from([
        (
            "customer".to_string(),
            FieldValue::String(customer.to_string()),
        ),
        ("txn_date".to_string(), txn_date),
        ("amount".to_string(), FieldValue::Integer(amount)),
    ])
}

fn transactions_engine(rows: Vec<Row>) -> ReportEngine {
    let schema = Schema::new(vec![
        ("customer".to_string(), FieldType::Text),
        ("txn_date".to_string(), FieldType::Date),
        ("amount".to_string(), FieldType::Integer),
    ])
    .unwrap();
    let mut engine = ReportEngine::new();
    engine.register_table("transactions", Table::new(schema, rows).unwrap());
    engine
}

fn lag_txn_date(output: &str) -> WindowSpec {
    WindowSpec {
        output: output.to_string(),
        function: WindowFunction::Lag {
            target: Expr::column("txn_date"),
            offset: 1,
        },
        partition_by: vec!["customer".to_string()],
        order_by: vec![SortKey::asc("txn_date")],
    }
}

#[test]
fn test_lag_of_transaction_dates_per_customer() {
    let engine = transactions_engine(vec![
        txn_row("alice", date(2023, 1, 1), 10),
        txn_row("alice", date(2023, 1, 2), 20),
        txn_row("alice", date(2023, 1, 5), 30),
    ]);
    let spec = PipelineSpec::new("transactions").window(lag_txn_date("prev_date"));
    let result = engine.execute(&spec, &Params::new()).unwrap();

    let prev: Vec<_> = result
        .rows()
        .iter()
        .map(|row| row.get("prev_date").cloned().unwrap())
        .collect();
    assert_eq!(
        prev,
        vec![FieldValue::Null, date(2023, 1, 1), date(2023, 1, 2)]
    );
}

#[test]
fn test_lag_partitions_do_not_leak_across_customers() {
    let engine = transactions_engine(vec![
        txn_row("alice", date(2023, 1, 1), 10),
        txn_row("bob", date(2023, 1, 2), 20),
        txn_row("alice", date(2023, 1, 3), 30),
    ]);
    let spec = PipelineSpec::new("transactions").window(lag_txn_date("prev_date"));
    let result = engine.execute(&spec, &Params::new()).unwrap();

    // Bob's single transaction has no predecessor; alice's second one lags
    // over her own first, not bob's. Input row order is preserved.
    let prev: Vec<_> = result
        .rows()
        .iter()
        .map(|row| row.get("prev_date").cloned().unwrap())
        .collect();
    assert_eq!(prev, vec![FieldValue::Null, FieldValue::Null, date(2023, 1, 1)]);
}

#[test]
fn test_minute_gap_filter_on_day_dates_matches_nothing() {
    // Dates carry day granularity: consecutive days are 1440 minutes apart,
    // and a first transaction's null gap filters out too. A "gap < 5 minutes"
    // report over date columns is therefore always empty.
    let engine = transactions_engine(vec![
        txn_row("alice", date(2023, 1, 1), 10),
        txn_row("alice", date(2023, 1, 2), 20),
        txn_row("alice", date(2023, 1, 5), 30),
    ]);
    let spec = PipelineSpec::new("transactions")
        .window(lag_txn_date("prev_date"))
        .filter(Expr::binary(
            Expr::func(
                "DATEDIFF",
                vec![
                    Expr::string("minutes"),
                    Expr::column("prev_date"),
                    Expr::column("txn_date"),
                ],
            ),
            BinaryOperator::LessThan,
            Expr::integer(5),
        ));
    let result = engine.execute(&spec, &Params::new()).unwrap();
    assert_eq!(result.row_count(), 0);
}

#[test]
fn test_rank_over_salary_within_department() {
    let schema = Schema::new(vec![
        ("dept".to_string(), FieldType::Text),
        ("salary".to_string(), FieldType::Integer),
    ])
    .unwrap();
    let rows = [("eng", 50), ("eng", 70), ("eng", 70), ("eng", 40), ("hr", 60)]
        .iter()
        .map(|(dept, salary)| {
            Row::from([
                ("dept".to_string(), FieldValue::String(dept.to_string())),
                ("salary".to_string(), FieldValue::Integer(*salary)),
            ])
        })
        .collect();
    let mut engine = ReportEngine::new();
    engine.register_table("employees", Table::new(schema, rows).unwrap());

    let spec = PipelineSpec::new("employees").window(WindowSpec {
        output: "salary_rank".to_string(),
        function: WindowFunction::Rank,
        partition_by: vec!["dept".to_string()],
        order_by: vec![SortKey::desc("salary")],
    });
    let result = engine.execute(&spec, &Params::new()).unwrap();

    // eng by descending salary: 70, 70 tie at 1; 50 ranks 3; 40 ranks 4.
    // hr restarts at 1. Rows come back in input order.
    let ranks: Vec<_> = result
        .rows()
        .iter()
        .map(|row| row.get("salary_rank").cloned().unwrap())
        .collect();
    assert_eq!(
        ranks,
        vec![
            FieldValue::Integer(3),
            FieldValue::Integer(1),
            FieldValue::Integer(1),
            FieldValue::Integer(4),
            FieldValue::Integer(1),
        ]
    );
}

#[test]
fn test_moving_average_partial_frames_at_partition_start() {
    let engine = transactions_engine(vec![
        txn_row("alice", date(2023, 1, 1), 10),
        txn_row("alice", date(2023, 1, 2), 20),
        txn_row("alice", date(2023, 1, 3), 30),
        txn_row("alice", date(2023, 1, 4), 40),
    ]);
    let spec = PipelineSpec::new("transactions").window(WindowSpec {
        output: "trailing_avg".to_string(),
        function: WindowFunction::MovingAvg {
            target: Expr::column("amount"),
            preceding: 2,
        },
        partition_by: vec!["customer".to_string()],
        order_by: vec![SortKey::asc("txn_date")],
    });
    let result = engine.execute(&spec, &Params::new()).unwrap();

    let averages: Vec<_> = result
        .rows()
        .iter()
        .map(|row| row.get("trailing_avg").cloned().unwrap())
        .collect();
    assert_eq!(
        averages,
        vec![
            FieldValue::Float(10.0),
            FieldValue::Float(15.0),
            FieldValue::Float(20.0),
            FieldValue::Float(30.0),
        ]
    );
}

#[test]
fn test_moving_average_skips_null_values_in_frame() {
    let engine = transactions_engine(vec![
        txn_row("alice", date(2023, 1, 1), 10),
        {
            let mut row = txn_row("alice", date(2023, 1, 2), 0);
            row.insert("amount".to_string(), FieldValue::Null);
            row
        },
        txn_row("alice", date(2023, 1, 3), 30),
    ]);
    let spec = PipelineSpec::new("transactions").window(WindowSpec {
        output: "trailing_avg".to_string(),
        function: WindowFunction::MovingAvg {
            target: Expr::column("amount"),
            preceding: 2,
        },
        partition_by: vec![],
        order_by: vec![SortKey::asc("txn_date")],
    });
    let result = engine.execute(&spec, &Params::new()).unwrap();

    // The null contributes neither to the sum nor to the divisor
    let averages: Vec<_> = result
        .rows()
        .iter()
        .map(|row| row.get("trailing_avg").cloned().unwrap())
        .collect();
    assert_eq!(
        averages,
        vec![
            FieldValue::Float(10.0),
            FieldValue::Float(10.0),
            FieldValue::Float(20.0),
        ]
    );
}

#[test]
fn test_window_errors_surface_at_validation() {
    let engine = transactions_engine(vec![txn_row("alice", date(2023, 1, 1), 10)]);

    // Unknown order-by column
    let spec = PipelineSpec::new("transactions").window(WindowSpec {
        output: "prev".to_string(),
        function: WindowFunction::Lag {
            target: Expr::column("txn_date"),
            offset: 1,
        },
        partition_by: vec![],
        order_by: vec![SortKey::asc("posted_at")],
    });
    let err = engine.validate(&spec, &Params::new()).unwrap_err();
    assert_eq!(
        err,
        EngineError::schema_error("Unknown column", Some("posted_at"))
    );
    // execute runs the same validation first
    assert_eq!(engine.execute(&spec, &Params::new()).unwrap_err(), err);

    // Rank with no ordering key is meaningless
    let spec = PipelineSpec::new("transactions").window(WindowSpec {
        output: "r".to_string(),
        function: WindowFunction::Rank,
        partition_by: vec!["customer".to_string()],
        order_by: vec![],
    });
    assert!(matches!(
        engine.validate(&spec, &Params::new()).unwrap_err(),
        EngineError::SchemaError { .. }
    ));
}
