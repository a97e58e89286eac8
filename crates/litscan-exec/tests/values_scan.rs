//! Integration tests for the VALUES scan operator.

mod common;

use std::sync::Arc;

use common::*;
use litscan_common::{ErrorKind, ExecError, ExecutorConfig};
use litscan_exec::{
    BinaryOp, DataType, ExecutionContext, Operator, Row, RowSlot, ScalarExpr, ScanDirection,
    Value, ValuesScanExec, ValuesScanNode,
};

#[test]
fn test_forward_then_backward_scenario() {
    let mut ctx = test_context();
    let rows = literal_rows(vec![
        vec![Value::int(1), Value::string("a")],
        vec![Value::int(2), Value::string("b")],
        vec![Value::int(3), Value::string("c")],
    ]);
    let mut exec = default_scan(ValuesScanNode::new(rows), &mut ctx);

    let schema = exec.schema().clone();
    assert_eq!(schema.field(0).unwrap().name(), "column1");
    assert_eq!(schema.field(1).unwrap().name(), "column2");

    let expected: Vec<Row> = vec![
        Row::new(vec![Value::int(1), Value::string("a")]),
        Row::new(vec![Value::int(2), Value::string("b")]),
        Row::new(vec![Value::int(3), Value::string("c")]),
    ];
    assert_eq!(drain(&mut exec, &mut ctx), expected);
    assert_eq!(exec.cursor().index(), 3);

    ctx.set_direction(ScanDirection::Backward);
    let backward = drain(&mut exec, &mut ctx);
    assert_eq!(backward, expected.into_iter().rev().collect::<Vec<_>>());
    assert_eq!(exec.cursor().index(), -1);
}

#[test]
fn test_end_of_data_is_sticky() {
    let mut ctx = test_context();
    let mut exec = default_scan(ValuesScanNode::new(int_rows(2)), &mut ctx);

    assert_eq!(first_column(&drain(&mut exec, &mut ctx)), vec![0, 1]);
    for _ in 0..3 {
        assert!(exec.next_row(&mut ctx).unwrap().is_none());
        assert_eq!(exec.cursor().index(), 2);
    }
}

#[test]
fn test_empty_values_list() {
    let mut ctx = test_context();
    let mut exec = default_scan(ValuesScanNode::new(vec![]), &mut ctx);
    assert!(exec.schema().is_empty());

    assert!(exec.next_row(&mut ctx).unwrap().is_none());
    ctx.set_direction(ScanDirection::Backward);
    assert!(exec.next_row(&mut ctx).unwrap().is_none());
    ctx.set_direction(ScanDirection::Forward);
    assert!(exec.next_row(&mut ctx).unwrap().is_none());
}

#[test]
fn test_single_row_alternating_directions() {
    use ScanDirection::{Backward, Forward};

    let mut ctx = test_context();
    let mut exec = default_scan(ValuesScanNode::new(int_rows(1)), &mut ctx);

    let steps = [
        (Forward, Some(0)),
        (Backward, None),
        (Backward, None),
        (Forward, Some(0)),
        (Forward, None),
        (Forward, None),
        (Backward, Some(0)),
        (Forward, None),
    ];
    for (direction, expected) in steps {
        ctx.set_direction(direction);
        let got = exec
            .next_row(&mut ctx)
            .unwrap()
            .map(|slot| slot.values()[0].to_i64().unwrap());
        assert_eq!(got, expected, "step {:?}", direction);
        assert!((-1..=1).contains(&exec.cursor().index()));
    }
}

#[test]
fn test_direction_switch_mid_scan() {
    let mut ctx = test_context();
    let mut exec = default_scan(ValuesScanNode::new(int_rows(4)), &mut ctx);

    let next = |exec: &mut ValuesScanExec, ctx: &mut ExecutionContext, dir| {
        ctx.set_direction(dir);
        exec.next_row(ctx)
            .unwrap()
            .map(|slot| slot.values()[0].to_i64().unwrap())
    };

    assert_eq!(next(&mut exec, &mut ctx, ScanDirection::Forward), Some(0));
    assert_eq!(next(&mut exec, &mut ctx, ScanDirection::Forward), Some(1));
    assert_eq!(next(&mut exec, &mut ctx, ScanDirection::Backward), Some(0));
    assert_eq!(next(&mut exec, &mut ctx, ScanDirection::Backward), None);
    assert_eq!(next(&mut exec, &mut ctx, ScanDirection::Forward), Some(0));
    assert_eq!(next(&mut exec, &mut ctx, ScanDirection::Forward), Some(1));
}

#[test]
fn test_rescan_reproduces_sequence() {
    let mut ctx = test_context();
    let rows = literal_rows(vec![
        vec![Value::int(7), Value::Null],
        vec![Value::int(8), Value::string("x")],
    ]);
    let mut exec = default_scan(ValuesScanNode::new(rows), &mut ctx);

    let first = drain(&mut exec, &mut ctx);
    exec.rescan(&mut ctx).unwrap();
    assert_eq!(exec.cursor().index(), -1);
    assert!(exec.materializer().slot().is_empty());

    let second = drain(&mut exec, &mut ctx);
    assert_eq!(first, second);
    assert_eq!(exec.metrics().rescans, 1);
}

#[test]
fn test_null_flags() {
    let mut ctx = test_context();
    let rows = literal_rows(vec![vec![Value::Null, Value::int(1)]]);
    let mut exec = default_scan(ValuesScanNode::new(rows), &mut ctx);

    let slot = exec.next_row(&mut ctx).unwrap().unwrap();
    assert_eq!(slot.nulls(), &[true, false]);
    assert_eq!(slot.get(0), Some((&Value::Null, true)));
}

#[test]
fn test_recheck_always_true() {
    let mut ctx = test_context();
    let mut exec = default_scan(ValuesScanNode::new(int_rows(3)), &mut ctx);

    assert!(exec.recheck(&RowSlot::new(0)));
    assert!(exec.recheck(&RowSlot::new(5)));

    ctx.set_recheck(true);
    let rows = drain(&mut exec, &mut ctx);
    assert_eq!(first_column(&rows), vec![0, 1, 2]);

    // Past the end the slot is empty; the hook still accepts it.
    assert!(exec.recheck(exec.materializer().slot()));
}

#[test]
fn test_transient_state_rebuilt_every_visit() {
    use Event::*;

    let mut ctx = test_context();
    let evaluator = TrackingEvaluator::default();
    let tracker = evaluator.tracker.clone();
    let mut exec =
        ValuesScanExec::init(ValuesScanNode::new(int_rows(3)), Arc::new(evaluator), &mut ctx)
            .unwrap();

    // Nothing is built up front.
    assert!(tracker.events().is_empty());
    assert_eq!(exec.materializer().store().persistent_rows(), 0);

    assert_eq!(first_column(&drain(&mut exec, &mut ctx)), vec![0, 1, 2]);
    assert_eq!(
        tracker.events(),
        vec![
            Build(1),
            Eval(1),
            Cleanup(1),
            Drop(1),
            Build(2),
            Eval(2),
            Cleanup(2),
            Drop(2),
            Build(3),
            Eval(3),
        ]
    );

    // Revisiting rows builds new state each time.
    ctx.set_direction(ScanDirection::Backward);
    assert_eq!(first_column(&drain(&mut exec, &mut ctx)), vec![2, 1, 0]);
    assert_eq!(tracker.builds(), 6);
    assert_eq!(tracker.cleanups(), 5);

    // Teardown runs the last row's callback.
    exec.shutdown(&mut ctx);
    assert_eq!(tracker.cleanups(), 6);
    assert_eq!(tracker.drops(), 6);

    let metrics = exec.metrics();
    assert_eq!(metrics.transient_builds, 6);
    assert_eq!(metrics.persistent_reuses, 0);
}

#[test]
fn test_persistent_state_reused_across_rescan() {
    let mut ctx = test_context().with_params(vec![Value::BigInt(3)]);
    register_times_hundred(&mut ctx, 1);

    let rows = vec![
        vec![ScalarExpr::subplan(
            1,
            vec![ScalarExpr::param(0, DataType::BigInt)],
            DataType::BigInt,
        )],
        vec![ScalarExpr::lit_i64(5)],
    ];
    let evaluator = TrackingEvaluator::default();
    let tracker = evaluator.tracker.clone();
    let mut exec =
        ValuesScanExec::init(ValuesScanNode::new(rows), Arc::new(evaluator), &mut ctx).unwrap();

    // Built eagerly and linked into the plan.
    assert_eq!(tracker.events(), vec![Event::Build(1)]);
    assert_eq!(exec.materializer().store().persistent_rows(), 1);
    let linked = ctx.plan().linked_states();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].owner, exec.id());
    assert_eq!(linked[0].row, 0);
    assert!(linked[0].state.is_linked());
    let original = Arc::clone(&linked[0].state);
    assert!(Arc::ptr_eq(
        &original,
        exec.materializer().store().persistent(0).unwrap()
    ));
    assert!(ctx.plan().explain().iter().any(|l| l.contains("SubPlan 1")));

    assert_eq!(first_column(&drain(&mut exec, &mut ctx)), vec![300, 5]);
    exec.rescan(&mut ctx).unwrap();
    assert_eq!(first_column(&drain(&mut exec, &mut ctx)), vec![300, 5]);

    // One build for the persistent row, one per visit for the other.
    assert_eq!(tracker.count(|e| *e == Event::Build(1)), 1);
    assert_eq!(tracker.builds(), 3);
    assert!(Arc::ptr_eq(
        &original,
        exec.materializer().store().persistent(0).unwrap()
    ));
    assert_eq!(exec.metrics().persistent_reuses, 2);

    // Operator teardown leaves plan-owned state alone.
    exec.shutdown(&mut ctx);
    assert_eq!(tracker.count(|e| *e == Event::Cleanup(1)), 0);
    assert_eq!(tracker.count(|e| *e == Event::Drop(1)), 0);
    drop(original);

    ctx.finish();
    assert_eq!(tracker.count(|e| *e == Event::Cleanup(1)), 1);
    assert_eq!(tracker.count(|e| *e == Event::Drop(1)), 1);
    assert!(ctx.plan().linked_states().is_empty());
}

#[test]
fn test_subplan_rows_are_transient_without_plan_support() {
    let mut ctx = test_context();
    let rows = vec![vec![ScalarExpr::subplan(1, vec![], DataType::Int)]];
    let mut exec = default_scan(ValuesScanNode::new(rows), &mut ctx);

    assert_eq!(exec.materializer().store().persistent_rows(), 0);
    let err = exec.next_row(&mut ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Programming);
}

#[test]
fn test_plain_rows_stay_transient_with_plan_support() {
    let mut ctx = test_context();
    register_times_hundred(&mut ctx, 1);
    let exec = default_scan(ValuesScanNode::new(int_rows(5)), &mut ctx);

    assert_eq!(exec.materializer().store().persistent_rows(), 0);
    assert!(ctx.plan().linked_states().is_empty());
}

#[test]
fn test_output_values_are_read_only() {
    let mut ctx = test_context();
    let rows = vec![vec![ScalarExpr::Array(vec![
        ScalarExpr::lit_i64(1),
        ScalarExpr::lit_i64(2),
        ScalarExpr::lit_i64(3),
    ])]];
    let mut exec = default_scan(ValuesScanNode::new(rows), &mut ctx);

    let slot = exec.next_row(&mut ctx).unwrap().unwrap();
    let Value::Array(stored) = slot.values()[0].clone() else {
        panic!("expected array");
    };
    assert!(stored.is_read_only());

    // A consumer mutating its handle gets a private copy.
    let mut handle = stored.clone();
    handle.push(Value::BigInt(4));
    assert!(!handle.shares_buffer_with(&stored));
    assert_eq!(handle.len(), 4);
    assert_eq!(stored.len(), 3);

    let slot = exec.materializer().slot();
    match slot.get(0) {
        Some((Value::Array(a), false)) => assert_eq!(a.len(), 3),
        other => panic!("unexpected slot contents {:?}", other),
    }
}

#[test]
fn test_projection_cannot_mutate_scan_output() {
    let mut ctx = test_context();
    let rows = vec![vec![ScalarExpr::Array(vec![ScalarExpr::lit_i64(1)])]];
    let node = ValuesScanNode::new(rows).with_projection(vec![
        ScalarExpr::call(
            "array_append",
            vec![ScalarExpr::column("column1", 0), ScalarExpr::lit_i64(2)],
        ),
        ScalarExpr::call("cardinality", vec![ScalarExpr::column("column1", 0)]),
    ]);
    let mut exec = default_scan(node, &mut ctx);

    let row = exec.next_row(&mut ctx).unwrap().unwrap().to_row().unwrap();
    match row.get(0) {
        Some(Value::Array(a)) => assert_eq!(a.len(), 2),
        other => panic!("expected array, got {:?}", other),
    }
    assert_eq!(row.get(1), Some(&Value::BigInt(1)));

    match exec.materializer().slot().get(0) {
        Some((Value::Array(a), _)) => assert_eq!(a.to_vec(), vec![Value::BigInt(1)]),
        other => panic!("expected array, got {:?}", other),
    }
}

/// Deep copy of a row's contents, arrays included.
fn snapshot(row: &Row) -> Vec<Value> {
    row.values()
        .iter()
        .map(|v| match v {
            Value::Array(a) => Value::array(a.to_vec()),
            other => other.clone(),
        })
        .collect()
}

#[test]
fn test_appending_to_literal_array_is_stable_across_rescans() {
    let mut ctx = test_context();
    let rows = vec![vec![ScalarExpr::call(
        "array_append",
        vec![
            ScalarExpr::lit(Value::array(vec![Value::BigInt(1)])),
            ScalarExpr::lit_i64(2),
        ],
    )]];
    let mut exec = default_scan(ValuesScanNode::new(rows), &mut ctx);

    let first = drain(&mut exec, &mut ctx);
    let held = first[0].clone();
    let expected = vec![Value::array(vec![Value::BigInt(1), Value::BigInt(2)])];
    assert_eq!(snapshot(&held), expected);

    for _ in 0..3 {
        exec.rescan(&mut ctx).unwrap();
        let again = drain(&mut exec, &mut ctx);
        assert_eq!(again.len(), 1);
        assert_eq!(snapshot(&again[0]), expected);
    }

    ctx.set_direction(ScanDirection::Backward);
    let backward = drain(&mut exec, &mut ctx);
    assert_eq!(snapshot(&backward[0]), expected);

    // The row handed out by the first scan never changed.
    assert_eq!(snapshot(&held), expected);
}

#[test]
fn test_appending_to_param_array_leaves_params_and_earlier_rows() {
    let param = Value::array(vec![Value::BigInt(1)]);
    let mut ctx = test_context().with_params(vec![param.clone()]);
    let append = || {
        vec![ScalarExpr::call(
            "array_append",
            vec![
                ScalarExpr::param(0, DataType::Array(Box::new(DataType::BigInt))),
                ScalarExpr::lit_i64(9),
            ],
        )]
    };
    let mut exec = default_scan(ValuesScanNode::new(vec![append(), append()]), &mut ctx);

    let row0 = exec.next_row(&mut ctx).unwrap().unwrap().to_row().unwrap();
    let row1 = exec.next_row(&mut ctx).unwrap().unwrap().to_row().unwrap();

    let expected = vec![Value::array(vec![Value::BigInt(1), Value::BigInt(9)])];
    assert_eq!(snapshot(&row0), expected);
    assert_eq!(snapshot(&row1), expected);

    match &ctx.params()[0] {
        Value::Array(a) => assert_eq!(a.to_vec(), vec![Value::BigInt(1)]),
        other => panic!("expected array param, got {:?}", other),
    }
    assert_eq!(param, Value::array(vec![Value::BigInt(1)]));
}

#[test]
fn test_nested_arrays_are_read_only() {
    let mut ctx = test_context();
    let rows = vec![vec![ScalarExpr::Array(vec![ScalarExpr::Array(vec![
        ScalarExpr::lit_i64(1),
    ])])]];
    let mut exec = default_scan(ValuesScanNode::new(rows), &mut ctx);

    let slot = exec.next_row(&mut ctx).unwrap().unwrap();
    let Value::Array(outer) = slot.values()[0].clone() else {
        panic!("expected array");
    };
    let Some(Value::Array(mut inner)) = outer.get(0) else {
        panic!("expected nested array");
    };
    assert!(inner.is_read_only());

    // A downstream write lands in a private copy.
    inner.push(Value::BigInt(99));
    assert_eq!(inner.len(), 2);

    match exec.materializer().slot().get(0) {
        Some((Value::Array(a), false)) => {
            assert_eq!(a.to_vec(), vec![Value::array(vec![Value::BigInt(1)])]);
        }
        other => panic!("unexpected slot contents {:?}", other),
    }
}

#[test]
fn test_qual_and_projection() {
    let mut ctx = test_context();
    let node = ValuesScanNode::new(int_rows(6))
        .with_qual(ScalarExpr::binary(
            ScalarExpr::column("column1", 0),
            BinaryOp::Gt,
            ScalarExpr::lit_i64(2),
        ))
        .with_projection(vec![ScalarExpr::binary(
            ScalarExpr::column("column1", 0),
            BinaryOp::Multiply,
            ScalarExpr::lit_i64(2),
        )]);
    let mut exec = default_scan(node, &mut ctx);

    assert_eq!(first_column(&drain(&mut exec, &mut ctx)), vec![6, 8, 10]);
    ctx.set_direction(ScanDirection::Backward);
    assert_eq!(first_column(&drain(&mut exec, &mut ctx)), vec![10, 8, 6]);
    assert_eq!(exec.metrics().rows_emitted, 6);
}

#[test]
fn test_outer_params_in_rows() {
    let mut ctx = test_context().with_params(vec![Value::BigInt(41)]);
    let rows = vec![vec![ScalarExpr::binary(
        ScalarExpr::param(0, DataType::BigInt),
        BinaryOp::Plus,
        ScalarExpr::lit_i64(1),
    )]];
    let mut exec = default_scan(ValuesScanNode::new(rows), &mut ctx);
    assert_eq!(first_column(&drain(&mut exec, &mut ctx)), vec![42]);
}

#[test]
fn test_arity_mismatch_is_fatal() {
    let mut ctx = test_context();
    let rows = literal_rows(vec![
        vec![Value::int(1), Value::int(2)],
        vec![Value::int(3)],
    ]);
    let mut exec = default_scan(ValuesScanNode::new(rows), &mut ctx);

    assert!(exec.next_row(&mut ctx).unwrap().is_some());
    let err = exec.next_row(&mut ctx).unwrap_err();
    assert!(matches!(
        err,
        ExecError::ArityMismatch {
            row: 1,
            expected: 2,
            actual: 1
        }
    ));
    assert!(err.is_programming_error());
}

#[test]
fn test_evaluation_error_propagates() {
    let mut ctx = test_context();
    let rows = vec![vec![ScalarExpr::binary(
        ScalarExpr::lit_i64(1),
        BinaryOp::Divide,
        ScalarExpr::lit_i64(0),
    )]];
    let mut exec = default_scan(ValuesScanNode::new(rows), &mut ctx);

    let err = exec.next_row(&mut ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Evaluation);
}

#[test]
fn test_row_scope_limit() {
    let config = ExecutorConfig {
        row_memory_limit: 512,
        ..ExecutorConfig::for_testing()
    };
    let mut ctx = ExecutionContext::new(config);
    let rows = literal_rows(vec![vec![Value::string("x".repeat(4096))]]);
    let mut exec = default_scan(ValuesScanNode::new(rows), &mut ctx);

    let err = exec.next_row(&mut ctx).unwrap_err();
    match &err {
        ExecError::OutOfMemory { scope, limit, .. } => {
            assert_eq!(scope, "row");
            assert_eq!(*limit, 512);
        }
        other => panic!("expected OutOfMemory, got {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::Allocation);
}

#[test]
fn test_row_memory_stays_bounded() {
    let config = ExecutorConfig {
        row_memory_limit: 4096,
        ..ExecutorConfig::for_testing()
    };
    let mut ctx = ExecutionContext::new(config);
    let rows: Vec<Vec<ScalarExpr>> = (0..10_000)
        .map(|i| vec![ScalarExpr::lit_i64(i), ScalarExpr::lit_str(format!("row-{:05}", i))])
        .collect();
    let mut exec = default_scan(ValuesScanNode::new(rows), &mut ctx);

    for _ in 0..10 {
        exec.next_row(&mut ctx).unwrap().unwrap();
    }
    let early_peak = exec.metrics().peak_row_bytes;
    assert!(early_peak > 0);

    let mut remaining = 0;
    while exec.next_row(&mut ctx).unwrap().is_some() {
        remaining += 1;
    }
    assert_eq!(remaining, 9_990);
    assert_eq!(exec.metrics().peak_row_bytes, early_peak);
    assert_eq!(exec.materializer().row_scope().resets(), 10_000);
}

#[test]
fn test_shutdown_releases_operator_scopes() {
    let mut ctx = test_context();
    let evaluator = TrackingEvaluator::default();
    let tracker = evaluator.tracker.clone();
    let node = ValuesScanNode::new(int_rows(2)).with_qual(ScalarExpr::lit(Value::boolean(true)));
    let mut exec = ValuesScanExec::init(node, Arc::new(evaluator), &mut ctx).unwrap();

    // The qual is compiled up front against the plan.
    assert_eq!(tracker.builds(), 1);

    exec.next_row(&mut ctx).unwrap();
    exec.shutdown(&mut ctx);

    assert!(exec.materializer().slot().is_empty());
    assert_eq!(exec.materializer().row_scope().used(), 0);
    assert_eq!(exec.materializer().store().persistent_rows(), 0);
    // Row state cleaned up; qual state belongs to the plan.
    assert_eq!(tracker.cleanups(), 1);

    ctx.finish();
    assert_eq!(tracker.cleanups(), 2);
}
