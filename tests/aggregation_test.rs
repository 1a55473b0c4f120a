/*!
# Tests for Grouping and Aggregation

Covers SQL GROUP BY semantics over in-memory tables: partition invariants,
null-skipping aggregates, null grouping keys and HAVING-style post-aggregation
filters.
*/

use reltab::{
    AggregateFunction, AggregateSpec, BinaryOperator, EngineError, Expr, FieldType, FieldValue,
    NamedExpr, Params, PipelineSpec, ReportEngine, Row, Schema, Table,
};

fn employee_row(id: i64, name: &str, dept: Option<&str>, salary: Option<i64>) -> Row {
    Row::from([
        ("id".to_string(), FieldValue::Integer(id)),
        ("name".to_string(), FieldValue::String(name.to_string())),
        (
            "dept".to_string(),
            dept.map(|d| FieldValue::String(d.to_string()))
                .unwrap_or(FieldValue::Null),
        ),
        (
            "salary".to_string(),
            salary.map(FieldValue::Integer).unwrap_or(FieldValue::Null),
        ),
    ])
}

fn employee_schema() -> Schema {
    Schema::new(vec![
        ("id".to_string(), FieldType::Integer),
        ("name".to_string(), FieldType::Text),
        ("dept".to_string(), FieldType::Text),
        ("salary".to_string(), FieldType::Integer),
    ])
    .unwrap()
}

fn engine_with(rows: Vec<Row>) -> ReportEngine {
    let mut engine = ReportEngine::new();
    engine.register_table("employees", Table::new(employee_schema(), rows).unwrap());
    engine
}

fn group_by_dept(aggregates: Vec<AggregateSpec>) -> PipelineSpec {
    PipelineSpec::new("employees").group_by(
        vec![NamedExpr::new("dept", Expr::column("dept"))],
        aggregates,
    )
}

fn dept_of(row: &Row) -> Option<String> {
    match row.get("dept") {
        Some(FieldValue::String(s)) => Some(s.clone()),
        _ => None,
    }
}

#[test]
fn test_avg_salary_by_department() {
    let engine = engine_with(vec![
        employee_row(1, "A", Some("Eng"), Some(30_000)),
        employee_row(2, "B", Some("Eng"), Some(50_000)),
        employee_row(3, "C", Some("HR"), Some(40_000)),
    ]);
    let spec = group_by_dept(vec![AggregateSpec::new(
        "avg_salary",
        AggregateFunction::Avg {
            expr: Expr::column("salary"),
        },
    )]);
    let result = engine.execute(&spec, &Params::new()).unwrap();
    assert_eq!(result.row_count(), 2);

    for row in result.rows() {
        // Both departments average to exactly 40000.0
        assert_eq!(row.get("avg_salary"), Some(&FieldValue::Float(40_000.0)));
    }
}

#[test]
fn test_count_star_partitions_sum_to_input_row_count() {
    let rows = vec![
        employee_row(1, "A", Some("Eng"), Some(10)),
        employee_row(2, "B", Some("HR"), None),
        employee_row(3, "C", None, Some(30)),
        employee_row(4, "D", Some("Eng"), None),
        employee_row(5, "E", None, Some(50)),
    ];
    let input_count = rows.len() as i64;
    let engine = engine_with(rows);
    let spec = group_by_dept(vec![AggregateSpec::new("n", AggregateFunction::CountStar)]);
    let result = engine.execute(&spec, &Params::new()).unwrap();

    let total: i64 = result
        .rows()
        .iter()
        .map(|row| match row.get("n") {
            Some(FieldValue::Integer(n)) => *n,
            other => panic!("unexpected count value {:?}", other),
        })
        .sum();
    assert_eq!(total, input_count);
}

#[test]
fn test_grouping_is_invariant_under_row_shuffle() {
    let rows = vec![
        employee_row(1, "A", Some("Eng"), Some(10)),
        employee_row(2, "B", Some("HR"), Some(20)),
        employee_row(3, "C", Some("Eng"), Some(30)),
        employee_row(4, "D", Some("Ops"), Some(40)),
        employee_row(5, "E", Some("HR"), Some(50)),
    ];
    let mut shuffled = rows.clone();
    shuffled.reverse();
    shuffled.rotate_left(2);

    let spec = group_by_dept(vec![AggregateSpec::new("n", AggregateFunction::CountStar)]);

    let collect = |rows: Vec<Row>| -> Vec<(Option<String>, i64)> {
        let result = engine_with(rows).execute(&spec, &Params::new()).unwrap();
        let mut partitions: Vec<(Option<String>, i64)> = result
            .rows()
            .iter()
            .map(|row| {
                let n = match row.get("n") {
                    Some(FieldValue::Integer(n)) => *n,
                    other => panic!("unexpected count value {:?}", other),
                };
                (dept_of(row), n)
            })
            .collect();
        partitions.sort();
        partitions
    };

    // Set-equal partitions; only display order may differ
    assert_eq!(collect(rows), collect(shuffled));
}

#[test]
fn test_count_expr_skips_nulls_count_star_does_not() {
    let engine = engine_with(vec![
        employee_row(1, "A", Some("Eng"), Some(10)),
        employee_row(2, "B", Some("Eng"), None),
        employee_row(3, "C", Some("Eng"), None),
    ]);
    let spec = group_by_dept(vec![
        AggregateSpec::new("all_rows", AggregateFunction::CountStar),
        AggregateSpec::new(
            "with_salary",
            AggregateFunction::Count {
                expr: Expr::column("salary"),
            },
        ),
    ]);
    let result = engine.execute(&spec, &Params::new()).unwrap();
    let row = &result.rows()[0];
    assert_eq!(row.get("all_rows"), Some(&FieldValue::Integer(3)));
    assert_eq!(row.get("with_salary"), Some(&FieldValue::Integer(1)));
}

#[test]
fn test_stddev_needs_two_non_null_values() {
    let engine = engine_with(vec![
        employee_row(1, "A", Some("Eng"), Some(10)),
        employee_row(2, "B", Some("Eng"), None),
        employee_row(3, "C", Some("HR"), Some(30)),
        employee_row(4, "D", Some("HR"), Some(50)),
    ]);
    let spec = group_by_dept(vec![AggregateSpec::new(
        "sd",
        AggregateFunction::Stddev {
            expr: Expr::column("salary"),
        },
    )]);
    let result = engine.execute(&spec, &Params::new()).unwrap();

    for row in result.rows() {
        match dept_of(row).as_deref() {
            // One non-null value only
            Some("Eng") => assert_eq!(row.get("sd"), Some(&FieldValue::Null)),
            // Sample stdev of {30, 50} is sqrt(200)
            Some("HR") => match row.get("sd") {
                Some(FieldValue::Float(sd)) => assert!((sd - 200f64.sqrt()).abs() < 1e-9),
                other => panic!("unexpected stdev {:?}", other),
            },
            other => panic!("unexpected dept {:?}", other),
        }
    }
}

#[test]
fn test_null_grouping_keys_form_one_partition() {
    let engine = engine_with(vec![
        employee_row(1, "A", None, Some(10)),
        employee_row(2, "B", None, Some(20)),
        employee_row(3, "C", Some("Eng"), Some(30)),
    ]);
    let spec = group_by_dept(vec![AggregateSpec::new("n", AggregateFunction::CountStar)]);
    let result = engine.execute(&spec, &Params::new()).unwrap();
    assert_eq!(result.row_count(), 2);

    let null_partition = result
        .rows()
        .iter()
        .find(|row| row.get("dept") == Some(&FieldValue::Null))
        .expect("null partition present");
    assert_eq!(null_partition.get("n"), Some(&FieldValue::Integer(2)));
}

#[test]
fn test_sum_min_max_skip_nulls_and_all_null_is_null() {
    let engine = engine_with(vec![
        employee_row(1, "A", Some("Eng"), Some(10)),
        employee_row(2, "B", Some("Eng"), None),
        employee_row(3, "C", Some("HR"), None),
    ]);
    let spec = group_by_dept(vec![
        AggregateSpec::new(
            "total",
            AggregateFunction::Sum {
                expr: Expr::column("salary"),
            },
        ),
        AggregateSpec::new(
            "lowest",
            AggregateFunction::Min {
                expr: Expr::column("salary"),
            },
        ),
        AggregateSpec::new(
            "highest",
            AggregateFunction::Max {
                expr: Expr::column("salary"),
            },
        ),
    ]);
    let result = engine.execute(&spec, &Params::new()).unwrap();

    for row in result.rows() {
        match dept_of(row).as_deref() {
            Some("Eng") => {
                assert_eq!(row.get("total"), Some(&FieldValue::Integer(10)));
                assert_eq!(row.get("lowest"), Some(&FieldValue::Integer(10)));
                assert_eq!(row.get("highest"), Some(&FieldValue::Integer(10)));
            }
            Some("HR") => {
                assert_eq!(row.get("total"), Some(&FieldValue::Null));
                assert_eq!(row.get("lowest"), Some(&FieldValue::Null));
                assert_eq!(row.get("highest"), Some(&FieldValue::Null));
            }
            other => panic!("unexpected dept {:?}", other),
        }
    }
}

#[test]
fn test_sum_overflow_aborts_the_run_with_row_position() {
    let engine = engine_with(vec![
        employee_row(1, "A", Some("Eng"), Some(i64::MAX)),
        employee_row(2, "B", Some("Eng"), Some(1)),
    ]);
    let spec = group_by_dept(vec![AggregateSpec::new(
        "total",
        AggregateFunction::Sum {
            expr: Expr::column("salary"),
        },
    )]);
    let err = engine.execute(&spec, &Params::new()).unwrap_err();
    match err {
        EngineError::ArithmeticError { row, .. } => assert_eq!(row, Some(1)),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_having_is_a_filter_over_the_grouped_result() {
    let engine = engine_with(vec![
        employee_row(1, "A", Some("Eng"), Some(10)),
        employee_row(2, "B", Some("Eng"), Some(20)),
        employee_row(3, "C", Some("HR"), Some(30)),
    ]);
    // GROUP BY dept HAVING count(*) >= 2
    let spec = group_by_dept(vec![AggregateSpec::new("n", AggregateFunction::CountStar)])
        .filter(Expr::binary(
            Expr::column("n"),
            BinaryOperator::GreaterThanOrEqual,
            Expr::integer(2),
        ));
    let result = engine.execute(&spec, &Params::new()).unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(dept_of(&result.rows()[0]).as_deref(), Some("Eng"));
}

#[test]
fn test_first_occurrence_order_is_preserved() {
    let engine = engine_with(vec![
        employee_row(1, "A", Some("HR"), Some(10)),
        employee_row(2, "B", Some("Eng"), Some(20)),
        employee_row(3, "C", Some("HR"), Some(30)),
        employee_row(4, "D", Some("Ops"), Some(40)),
    ]);
    let spec = group_by_dept(vec![AggregateSpec::new("n", AggregateFunction::CountStar)]);
    let result = engine.execute(&spec, &Params::new()).unwrap();
    let order: Vec<Option<String>> = result.rows().iter().map(dept_of).collect();
    assert_eq!(
        order,
        vec![
            Some("HR".to_string()),
            Some("Eng".to_string()),
            Some("Ops".to_string())
        ]
    );
}
