mod common;

use common::{Harness, CALC, CALC_COMPARISON};
use heurist_bytecode::Value;
use heurist_distance::heuristic::DEFAULT_REACHED;
use heurist_instrument::error::TracerError;
use heurist_instrument::naming;

const CLASS: &str = "com/acme/Calc";

fn sign(h: &Harness, a: i64, b: i64) -> Value {
    h.loader
        .run(CLASS, "sign", "(JJ)I", vec![Value::Int(a), Value::Int(b)])
        .expect("sign failed")
        .expect("sign returns a value")
}

#[test]
fn test_instrumented_class_keeps_semantics() {
    let h = Harness::new();
    h.load(CALC);
    assert_eq!(sign(&h, 1, 9), Value::Int(-1));
    assert_eq!(sign(&h, 4, 4), Value::Int(0));
    assert_eq!(sign(&h, 9, 1), Value::Int(1));
}

#[test]
fn test_report_counts_objectives() {
    let h = Harness::new();
    let loaded = h.load(CALC);
    assert!(loaded.report.is_sut);
    assert_eq!(loaded.report.class_name, "com.acme.Calc");
    assert_eq!(loaded.report.instrumented_methods, vec!["sign(JJ)I".to_string()]);
    assert!(loaded.report.skipped_methods.is_empty());
    // 2 lines, the class, 2 branch pairs, 3 comparison outcomes
    assert_eq!(loaded.report.objectives, 10);
    assert_eq!(h.loader.recorder().number_of_targets(), 10);

    let units = h.loader.units().snapshot();
    assert!(units.unit_names.contains("com.acme.Calc"));
    assert_eq!(units.number_of_lines, 2);
    assert_eq!(units.number_of_branches, 4);
    assert_eq!(units.number_of_numeric_comparisons, 1);
    assert_eq!(units.number_of_success_calls, 0);
}

#[test]
fn test_loading_twice_uses_cache() {
    let h = Harness::new();
    let first = h.load(CALC);
    let second = h.load(CALC);
    assert!(std::sync::Arc::ptr_eq(&first.class, &second.class));
    assert_eq!(h.loader.units().snapshot().number_of_lines, 2);
}

#[test]
fn test_numeric_comparison_less_than() {
    let h = Harness::new();
    h.load(CALC);
    assert_eq!(sign(&h, 5, 10), Value::Int(-1));

    let lt = h.value(&format!("{CALC_COMPARISON}_LT"));
    let eq = h.value(&format!("{CALC_COMPARISON}_EQ"));
    let gt = h.value(&format!("{CALC_COMPARISON}_GT"));
    assert_eq!(lt, 1.0);
    assert!(eq > DEFAULT_REACHED && eq < 1.0);
    assert!(gt > DEFAULT_REACHED && gt < 1.0);
}

#[test]
fn test_lines_and_branches() {
    let h = Harness::new();
    h.load(CALC);
    sign(&h, 5, 10);

    assert_eq!(h.value(&naming::line_objective_name(CLASS, 3)), 1.0);
    assert_eq!(h.value(&naming::class_objective_name(CLASS)), 1.0);
    let line5 = naming::line_objective_name(CLASS, 5);
    assert_eq!(h.tracer().value(&line5), Err(TracerError::UnknownObjective(line5.clone())));

    // `ifge` not taken: the source condition held
    let then_side = h.value(&naming::branch_objective_name(CLASS, 3, 0, true));
    let else_side = h.value(&naming::branch_objective_name(CLASS, 3, 0, false));
    assert_eq!(then_side, 1.0);
    assert!(else_side > DEFAULT_REACHED && else_side < 1.0);

    sign(&h, 9, 1);
    assert_eq!(h.value(&naming::branch_objective_name(CLASS, 3, 0, false)), 1.0);
    assert_eq!(h.value(&naming::branch_objective_name(CLASS, 5, 0, false)), 1.0);
    assert_eq!(h.value(&line5), 1.0);
}

#[test]
fn test_non_covered_objectives() {
    let h = Harness::new();
    h.load(CALC);
    sign(&h, 5, 10);
    let open = h.tracer().non_covered_objectives(naming::BRANCH);
    assert_eq!(
        open.into_iter().collect::<Vec<_>>(),
        vec![naming::branch_objective_name(CLASS, 3, 0, false)]
    );
    assert_eq!(h.tracer().number_of_non_covered_objectives(naming::NUMERIC_COMPARISON), 2);
    assert_eq!(h.loader.recorder().compute_coverage(naming::LINE), 0.5);
}

#[test]
fn test_branch_dependencies() {
    let h = Harness::new();
    h.load(CALC);
    let deps = h.loader.units().snapshot().branch_dependencies;
    let parent = naming::branch_objective_name(CLASS, 3, 0, false);
    for then_branch in [true, false] {
        let child = naming::branch_objective_name(CLASS, 5, 0, then_branch);
        assert_eq!(deps[&child].iter().collect::<Vec<_>>(), vec![&parent]);
    }
    assert!(!deps.contains_key(&parent));
}

#[test]
fn test_startup_objectives() {
    let h = Harness::new();
    let loaded = h.load(CALC);
    // outside an action
    let mut vm = h.loader.vm(&loaded);
    vm.invoke("sign", "(JJ)I", vec![Value::Int(1), Value::Int(1)]).unwrap();
    let line3 = naming::line_objective_name(CLASS, 3);
    assert_eq!(h.loader.recorder().reached_at_startup().get(&line3), Some(&1.0));

    // `ifne` jumps only inside the action
    sign(&h, 9, 1);
    let positive = naming::branch_objective_name(CLASS, 5, 0, false);
    assert_eq!(h.loader.recorder().best_value(&positive), Some(1.0));
    assert!(h.loader.recorder().reached_at_startup()[&positive] < 1.0);
}

#[test]
fn test_last_executed_statement() {
    let h = Harness::new();
    h.load(CALC);
    sign(&h, 9, 1);
    // the return on line 5 popped the statement stack empty
    assert_eq!(
        h.tracer().last_executed_statement().as_deref(),
        Some("com.acme.Calc_5_sign")
    );
}

/// A method and its lambda body compiled onto the same source line.
const TWIN: &str = r#"
.class com/acme/Twin

.method static a (JJ)I
    .line 3
    load 0
    load 1
    lcmp
    ret
.end

.method static lambda$a$0 (JJ)I
    .line 3
    load 0
    load 1
    lcmp
    ret
.end
"#;

#[test]
fn test_same_line_in_two_methods_gets_distinct_ids() {
    let h = Harness::new();
    let loaded = h.load(TWIN);
    // line, class, and three outcomes per comparison
    assert_eq!(loaded.report.objectives, 8);
    assert_eq!(h.loader.recorder().number_of_targets(), 8);
    assert_eq!(h.loader.units().snapshot().number_of_numeric_comparisons, 2);

    let outer_gt = "NumericComparison_at_com.acme.Twin_00003_0_GT";
    let lambda_gt = "NumericComparison_at_com.acme.Twin_00003_1_GT";
    let args = |a: i64, b: i64| vec![Value::Int(a), Value::Int(b)];
    h.loader.run("com/acme/Twin", "a", "(JJ)I", args(1, 2)).unwrap();
    let before = h.value(outer_gt);
    assert!(before < 1.0);

    h.loader.run("com/acme/Twin", "lambda$a$0", "(JJ)I", args(5, 2)).unwrap();
    assert_eq!(h.value(lambda_gt), 1.0);
    assert_eq!(h.value(outer_gt), before);
}
