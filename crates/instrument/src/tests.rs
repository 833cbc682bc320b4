#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use heurist_bytecode::{ClassFile, FieldDef, JumpKind, Op, Value};
    use heurist_distance::Truthness;

    use crate::category::{ReplacementCategory, ReplacementType};
    use crate::cfg::ControlFlowGraph;
    use crate::config::{self, InstrumentationConfig};
    use crate::error::{ConfigError, InstrumentError, TracerError};
    use crate::ir::{MethodBody, MAX_CODE_LENGTH};
    use crate::naming;
    use crate::recorder::ObjectiveRecorder;
    use crate::schema::class_to_schema;
    use crate::tracer::additional_info::{AdditionalInfo, StringSpecialization, StringSpecializationInfo};
    use crate::tracer::taint;
    use crate::tracer::{Action, ExecutionTracer};
    use crate::units::{UnitsInfo, UnitsInfoRecorder};

    fn tracer() -> ExecutionTracer {
        ExecutionTracer::new(Arc::new(ObjectiveRecorder::new()))
    }

    // --- Naming ---

    #[test]
    fn test_objective_names() {
        assert_eq!(naming::class_objective_name("com/foo/Bar"), "Class_com.foo.Bar");
        assert_eq!(naming::line_objective_name("com/foo/Bar", 7), "Line_at_com.foo.Bar_00007");
        assert_eq!(
            naming::branch_objective_name("com.foo.Bar", 12, 0, true),
            "Branch_at_com.foo.Bar_at_line_00012_position_0_trueBranch"
        );
        assert_eq!(
            naming::branch_objective_name("com/foo/Bar", 12, 1, false),
            "Branch_at_com.foo.Bar_at_line_00012_position_1_falseBranch"
        );
        assert_eq!(
            naming::success_call_objective_name("com/foo/Bar", 3, 2),
            "Success_Call_at_com.foo.Bar_00003_2"
        );
        let template = naming::numeric_comparison_template("com/foo/Bar", 4, 0);
        assert_eq!(template, "NumericComparison_at_com.foo.Bar_00004_0");
        assert_eq!(naming::numeric_comparison_objective_name(&template, -7), format!("{template}_LT"));
        assert_eq!(naming::numeric_comparison_objective_name(&template, 0), format!("{template}_EQ"));
        assert_eq!(naming::numeric_comparison_objective_name(&template, 3), format!("{template}_GT"));
    }

    #[test]
    fn test_names_are_stable() {
        let a = naming::line_objective_name("x/Y", 10);
        let b = naming::line_objective_name("x.Y", 10);
        assert_eq!(a, b);
        assert_ne!(a, naming::line_objective_name("x/Y", 100));
        assert_ne!(
            naming::branch_objective_name("x/Y", 1, 10, true),
            naming::branch_objective_name("x/Y", 11, 0, true)
        );
    }

    #[test]
    fn test_ids_are_interned() {
        let first = naming::line_objective_id("a/Interned", 3);
        let second = naming::line_objective_id("a.Interned", 3);
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &naming::line_objective_id("a/Interned", 3)));
        assert!(!Arc::ptr_eq(&first, &naming::line_objective_id("a/Interned", 4)));
        assert!(Arc::ptr_eq(
            &naming::branch_objective_id("a/Interned", 3, 0, true),
            &naming::branch_objective_id("a/Interned", 3, 0, true)
        ));

        let (statement, method) = naming::statement_ids("a/Interned", "m", "()V", 3);
        assert_eq!(&*statement, "a/Interned_3_m");
        assert_eq!(&*method, "a/Interned_m_()V");
        let (again, _) = naming::statement_ids("a/Interned", "m", "()V", 3);
        assert!(Arc::ptr_eq(&statement, &again));
    }

    #[test]
    fn test_replacement_names() {
        let template = naming::method_replacement_template("a/B", 9, 1);
        assert_eq!(template, "MethodReplacement_at_a.B_00009_1");
        assert_eq!(
            naming::method_replacement_objective_name(&template, true, ReplacementType::Boolean).unwrap(),
            "MethodReplacement_at_a.B_00009_1_BOOLEAN_true"
        );
        assert_eq!(
            naming::method_replacement_objective_name("Line_at_a.B_00001", false, ReplacementType::Exception),
            Err(TracerError::InvalidTemplate(Some("Line_at_a.B_00001".into())))
        );
    }

    #[test]
    fn test_pad_number() {
        assert_eq!(naming::pad_number(42).unwrap(), "00042");
        assert_eq!(naming::pad_number(123456).unwrap(), "123456");
        assert_eq!(naming::pad_number(-1), Err(TracerError::NegativePad(-1)));
    }

    // --- Categories and config ---

    #[test]
    fn test_category_names() {
        assert_eq!(ReplacementCategory::Ext0.to_string(), "EXT_0");
        assert_eq!("ext_0".parse::<ReplacementCategory>().unwrap(), ReplacementCategory::Ext0);
        assert_eq!("Redis".parse::<ReplacementCategory>().unwrap(), ReplacementCategory::Redis);
        assert!(matches!(
            "FOO".parse::<ReplacementCategory>(),
            Err(ConfigError::UnknownCategory(name)) if name == "FOO"
        ));
        assert_eq!(ReplacementType::Collection.to_string(), "COLLECTION");
    }

    #[test]
    fn test_config_defaults() {
        let cfg = InstrumentationConfig::default();
        assert_eq!(cfg.replacement_categories.len(), 6);
        assert_eq!(cfg.heuristics.reached, 0.2);
        assert_eq!(cfg.heuristics.boundary_delta, 0.1);
        assert!(cfg.is_sut("com/anything/Foo"));
        assert!(!cfg.is_sut("org/heurist/instrumentation/ExecutionTracer"));
    }

    #[test]
    fn test_config_from_lookup() {
        let cfg = InstrumentationConfig::from_lookup(|key| match key {
            config::ENV_REPLACEMENT_CATEGORIES => Some("base, NET".into()),
            config::ENV_SUT_PACKAGES => Some("com.acme.,org.shop.".into()),
            config::ENV_REACHED => Some("0.3".into()),
            _ => None,
        })
        .unwrap();
        let expected: BTreeSet<_> = [ReplacementCategory::Base, ReplacementCategory::Net].into();
        assert_eq!(cfg.replacement_categories, expected);
        assert!(cfg.is_enabled(ReplacementCategory::Net));
        assert!(!cfg.is_enabled(ReplacementCategory::Sql));
        assert_eq!(cfg.heuristics.reached, 0.3);
        assert!(cfg.is_sut("com/acme/Calc"));
        assert!(!cfg.is_sut("com/google/gson/Gson"));
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let unknown = InstrumentationConfig::from_lookup(|key| {
            (key == config::ENV_REPLACEMENT_CATEGORIES).then(|| "BASE,XML".to_string())
        });
        assert!(matches!(unknown, Err(ConfigError::UnknownCategory(c)) if c == "XML"));

        let reached = InstrumentationConfig::from_lookup(|key| {
            (key == config::ENV_REACHED).then(|| "high".to_string())
        });
        assert!(matches!(reached, Err(ConfigError::InvalidValue { .. })));

        let out_of_range = InstrumentationConfig::from_lookup(|key| {
            (key == config::ENV_REACHED).then(|| "1.5".to_string())
        });
        assert!(matches!(out_of_range, Err(ConfigError::Heuristic(_))));
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heurist.json");
        std::fs::write(
            &path,
            r#"{"replacement_categories": ["SQL", "EXT_0"], "max_steps": 5000, "heuristics": {"reached": 0.25}}"#,
        )
        .unwrap();
        let cfg = InstrumentationConfig::from_file(&path).unwrap();
        assert!(cfg.is_enabled(ReplacementCategory::Sql));
        assert!(!cfg.is_enabled(ReplacementCategory::Base));
        assert_eq!(cfg.max_steps, 5000);
        assert_eq!(cfg.heuristics.reached, 0.25);
        assert_eq!(cfg.heuristics.not_null, 0.1);

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(InstrumentationConfig::from_file(&path), Err(ConfigError::Json(_))));
    }

    // --- IR ---

    #[test]
    fn test_lower_remaps_jumps_to_slot_start() {
        let code = vec![
            Op::Line(1),
            Op::LoadLocal(0),
            Op::Jump(JumpKind::Ifeq, 4),
            Op::PushConst(0),
            Op::Ret,
        ];
        let mut body = MethodBody::lift(&code);
        assert!(!body.is_modified());
        assert_eq!(body.lower("m").unwrap(), code);

        body.slots[1].after.push(Op::Nop);
        body.slots[4].before.push(Op::Nop);
        let lowered = body.lower("m").unwrap();
        assert_eq!(
            lowered,
            vec![
                Op::Line(1),
                Op::LoadLocal(0),
                Op::Nop,
                Op::Jump(JumpKind::Ifeq, 5),
                Op::PushConst(0),
                Op::Nop,
                Op::Ret,
            ]
        );
    }

    #[test]
    fn test_lower_rejects_unsafe_insertions() {
        let code = vec![Op::PushConst(0), Op::Ret];
        let mut body = MethodBody::lift(&code);
        body.slots[1].after.push(Op::Nop);
        assert!(matches!(body.lower("m"), Err(InstrumentError::UnsupportedShape { .. })));

        let mut body = MethodBody::lift(&code);
        body.slots[0].before.push(Op::Jump(JumpKind::Goto, 0));
        assert!(matches!(body.lower("m"), Err(InstrumentError::UnsupportedShape { .. })));

        let mut body = MethodBody::lift(&code);
        body.slots[0].before = vec![Op::Nop; MAX_CODE_LENGTH];
        assert!(matches!(body.lower("m"), Err(InstrumentError::CodeTooLong { .. })));
    }

    // --- Control flow ---

    fn diamond() -> Vec<Op> {
        vec![
            Op::Line(1),
            Op::LoadLocal(0),
            Op::Jump(JumpKind::Ifeq, 6),
            Op::PushConst(0),
            Op::StoreLocal(1),
            Op::Jump(JumpKind::Goto, 8),
            Op::PushConst(1),
            Op::StoreLocal(1),
            Op::LoadLocal(1),
            Op::Ret,
            // dead code
            Op::PushConst(0),
            Op::Ret,
        ]
    }

    #[test]
    fn test_cfg_blocks() {
        let cfg = ControlFlowGraph::build(&diamond());
        let starts: Vec<usize> = cfg.blocks().iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![0, 3, 6, 8, 10, 12]);
        assert_eq!(cfg.exit(), 5);
        assert_eq!(cfg.blocks()[0].succs, vec![1, 2]);
        assert_eq!(cfg.blocks()[1].succs, vec![3]);
        assert_eq!(cfg.blocks()[2].succs, vec![3]);
        assert_eq!(cfg.blocks()[3].succs, vec![5]);
        assert_eq!(cfg.blocks()[3].preds, vec![1, 2]);
        assert_eq!(cfg.block_of(7), Some(2));

        let reachable = cfg.reachable();
        assert!(reachable[3]);
        assert!(!reachable[4]);
        assert!(!cfg.is_reachable(10));
    }

    #[test]
    fn test_dominators() {
        let cfg = ControlFlowGraph::build(&diamond());
        let dom = cfg.dominators();
        assert_eq!(dom.root(), 0);
        assert_eq!(dom.idom(0), None);
        assert_eq!(dom.idom(1), Some(0));
        assert_eq!(dom.idom(2), Some(0));
        assert_eq!(dom.idom(3), Some(0));
        assert!(dom.dominates(0, 3));
        assert!(!dom.dominates(1, 3));
        assert!(!dom.contains(4));

        let pdom = cfg.post_dominators();
        assert_eq!(pdom.idom(3), Some(5));
        assert_eq!(pdom.idom(1), Some(3));
        assert_eq!(pdom.idom(0), Some(3));
        assert!(pdom.dominates(3, 0));
    }

    #[test]
    fn test_control_dependences() {
        let cfg = ControlFlowGraph::build(&diamond());
        let deps = cfg.control_dependences();
        assert_eq!(deps[1], vec![(0, 1)]);
        assert_eq!(deps[2], vec![(0, 2)]);
        assert!(deps[0].is_empty());
        assert!(deps[3].is_empty());
    }

    #[test]
    fn test_loop_dominators() {
        // 0: load 0; 1: ifle 4; 2: nop; 3: goto 0; 4: ret
        let code = vec![
            Op::LoadLocal(0),
            Op::Jump(JumpKind::Ifle, 4),
            Op::Nop,
            Op::Jump(JumpKind::Goto, 0),
            Op::Ret,
        ];
        let cfg = ControlFlowGraph::build(&code);
        let dom = cfg.dominators();
        let body = cfg.block_of(2).unwrap();
        let head = cfg.block_of(0).unwrap();
        assert_eq!(dom.idom(body), Some(head));
        // the loop body and the head itself run again depending on the test
        let deps = cfg.control_dependences();
        assert!(deps[body].contains(&(head, body)));
        assert!(deps[head].contains(&(head, body)));
    }

    // --- Taint ---

    #[test]
    fn test_taint_names() {
        assert_eq!(taint::taint_name(3), "_EM_3_XYZ_");
        assert!(taint::is_taint_input("_EM_0_XYZ_"));
        assert!(taint::is_taint_input("_em_12_xyz_"));
        assert!(!taint::is_taint_input("_EM__XYZ_"));
        assert!(!taint::is_taint_input("x_EM_1_XYZ_"));
        assert!(taint::includes_taint_input("foo_EM_1_XYZ_bar"));
        assert!(!taint::includes_taint_input("_EM_1_XY"));
    }

    // --- Tracer ---

    #[test]
    fn test_update_keeps_best_value() {
        let t = tracer();
        t.update_objective("Line_a", 0.3).unwrap();
        t.update_objective("Line_a", 0.2).unwrap();
        assert_eq!(t.value("Line_a").unwrap(), 0.3);
        t.update_objective("Line_a", 1.0).unwrap();
        assert_eq!(t.value("Line_a").unwrap(), 1.0);
        assert_eq!(
            t.update_objective("Line_a", 1.5),
            Err(TracerError::InvalidValue { id: "Line_a".into(), value: 1.5 })
        );
        assert_eq!(t.value("Line_b"), Err(TracerError::UnknownObjective("Line_b".into())));
    }

    #[test]
    fn test_non_covered_by_prefix() {
        let t = tracer();
        t.update_objective("Line_1", 1.0).unwrap();
        t.update_objective("Line_2", 0.4).unwrap();
        t.update_objective("Branch_1", 0.5).unwrap();
        assert_eq!(t.number_of_objectives(), 3);
        assert_eq!(t.number_of_objectives_with_prefix("Line"), 2);
        assert_eq!(t.number_of_non_covered_objectives("Line"), 1);
        let all: Vec<String> = t.non_covered_objectives("").into_iter().collect();
        assert_eq!(all, vec!["Branch_1".to_string(), "Line_2".to_string()]);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let t = tracer();
        t.executed_line("a/B", "m", "()V", 3).unwrap();
        t.add_query_parameter("q");
        t.set_kill_switch(true);
        t.reset();
        assert_eq!(t.number_of_objectives(), 0);
        assert!(!t.is_kill_switch());
        let once = t.expose_additional_info_list();
        t.reset();
        assert_eq!(t.number_of_objectives(), 0);
        assert_eq!(t.expose_additional_info_list(), once);
        assert_eq!(once.len(), 1);
        assert!(once[0].query_parameters.is_empty());
    }

    #[test]
    fn test_expensive_operation_budget() {
        let t = tracer();
        for _ in 0..crate::tracer::MAX_EXPENSIVE_OPERATIONS - 1 {
            t.increase_expensive_operation_count();
        }
        assert!(!t.is_too_many_expensive_operations());
        t.increase_expensive_operation_count();
        assert!(t.is_too_many_expensive_operations());
        t.reset();
        assert!(!t.is_too_many_expensive_operations());

        for _ in 0..crate::tracer::MAX_EXPENSIVE_OPERATIONS {
            t.increase_expensive_operation_count();
        }
        t.set_action(Action { index: 1, ..Action::default() });
        assert!(!t.is_too_many_expensive_operations());
    }

    #[test]
    fn test_executed_line_covers_class() {
        let t = tracer();
        t.executed_line("com/acme/Calc", "sign", "(JJ)I", 5).unwrap();
        assert_eq!(t.value("Line_at_com.acme.Calc_00005").unwrap(), 1.0);
        assert_eq!(t.value("Class_com.acme.Calc").unwrap(), 1.0);
        assert_eq!(t.last_executed_statement().as_deref(), Some("com/acme/Calc_5_sign"));
    }

    #[test]
    fn test_update_branch_sides() {
        let t = tracer();
        // jump taken, 0.4 away from falling through
        let taken = Truthness::taken_true(0.4).unwrap();
        t.update_branch("a/B", 2, 0, &taken).unwrap();
        assert_eq!(t.value(&naming::branch_objective_name("a/B", 2, 0, false)).unwrap(), 1.0);
        assert_eq!(t.value(&naming::branch_objective_name("a/B", 2, 0, true)).unwrap(), 0.4);
    }

    #[test]
    fn test_branch_jump_from_operands() {
        let t = tracer();
        t.executing_branch_jump(JumpKind::IfIcmplt, &[Value::Int(1), Value::Int(5)], "a/B", 4, 0)
            .unwrap();
        assert_eq!(t.value(&naming::branch_objective_name("a/B", 4, 0, false)).unwrap(), 1.0);
        let then_side = t.value(&naming::branch_objective_name("a/B", 4, 0, true)).unwrap();
        assert!(then_side > 0.0 && then_side < 1.0);

        t.executing_branch_jump(JumpKind::Ifnull, &[Value::Null], "a/B", 5, 0).unwrap();
        assert_eq!(t.value(&naming::branch_objective_name("a/B", 5, 0, false)).unwrap(), 1.0);
    }

    #[test]
    fn test_executing_method() {
        let t = tracer();
        t.executing_method("a/B", 3, 0, false).unwrap();
        let id = naming::success_call_objective_name("a/B", 3, 0);
        assert_eq!(t.value(&id).unwrap(), 0.5);
        t.executing_method("a/B", 3, 0, true).unwrap();
        assert_eq!(t.value(&id).unwrap(), 1.0);
    }

    #[test]
    fn test_nested_executing_action() {
        let t = tracer();
        t.set_executing_action(true);
        t.set_executing_action(true);
        t.set_executing_action(false);
        assert!(t.is_executing_action());
        t.update_objective("Line_1", 1.0).unwrap();
        assert!(t.recorder().reached_at_startup().is_empty());

        t.set_executing_action(false);
        t.set_executing_action(false);
        assert!(!t.is_executing_action());
        t.update_objective("Line_2", 1.0).unwrap();
        assert_eq!(t.recorder().reached_at_startup().get("Line_2"), Some(&1.0));

        t.set_executing_action(true);
        assert!(t.is_executing_action());
    }

    #[test]
    fn test_objective_coverage_snapshot() {
        let t = tracer();
        t.update_objective("Line_x", 1.0).unwrap();
        t.set_action(Action { index: 1, name: Some("GET /x".into()), ..Action::default() });
        t.update_objective("Line_y", 0.5).unwrap();
        let coverage = t.objective_coverage();
        assert_eq!(coverage["Line_x"].action_index, 0);
        assert_eq!(coverage["Line_y"].action_index, 1);
        assert_eq!(coverage["Line_y"].value, 0.5);
        assert_ne!(coverage["Line_x"].mapped_id, coverage["Line_y"].mapped_id);
        assert_eq!(t.action_name().as_deref(), Some("GET /x"));
    }

    #[test]
    fn test_actions_split_additional_info() {
        let t = tracer();
        t.add_header("x-a");
        t.set_action(Action { index: 0, ..Action::default() });
        t.add_header("x-b");
        t.set_action(Action { index: 1, ..Action::default() });
        t.add_query_parameter("page");
        let infos = t.expose_additional_info_list();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].headers, vec!["x-a".to_string(), "x-b".to_string()]);
        assert_eq!(infos[1].query_parameters, vec!["page".to_string()]);
    }

    #[test]
    fn test_taint_for_string_equals() {
        let t = tracer();
        t.handle_taint_for_string_equals(Some("_EM_0_XYZ_"), Some("admin"), false);
        t.handle_taint_for_string_equals(Some("Guest"), Some("_EM_1_XYZ_"), true);
        t.handle_taint_for_string_equals(Some("plain"), Some("admin"), false);
        let info = &t.expose_additional_info_list()[0];
        assert_eq!(
            info.string_specializations["_EM_0_XYZ_"],
            vec![StringSpecializationInfo::new(StringSpecialization::Constant, "admin")]
        );
        assert_eq!(
            info.string_specializations["_EM_1_XYZ_"],
            vec![StringSpecializationInfo::new(StringSpecialization::ConstantIgnoreCase, "Guest")]
        );
        assert_eq!(info.string_specializations.len(), 2);
    }

    #[test]
    fn test_taint_between_inputs() {
        let t = tracer();
        t.handle_taint_for_string_equals(Some("_EM_0_XYZ_"), Some("_EM_1_XYZ_"), false);
        t.handle_taint_for_string_equals(Some("_EM_2_XYZ_"), Some("_EM_2_XYZ_"), false);
        let info = &t.expose_additional_info_list()[0];
        let id = format!("{}___{}", taint::taint_name(0), taint::taint_name(1));
        let equal = StringSpecializationInfo::new(StringSpecialization::Equal, id);
        assert_eq!(info.string_specializations["_EM_0_XYZ_"], vec![equal.clone()]);
        assert_eq!(info.string_specializations["_EM_1_XYZ_"], vec![equal]);
        assert!(!info.string_specializations.contains_key("_EM_2_XYZ_"));
    }

    #[test]
    fn test_input_variables_are_taint() {
        let t = tracer();
        assert_eq!(t.taint_type(Some("token-42")), taint::TaintType::None);
        t.set_action(Action {
            index: 0,
            name: None,
            input_variables: ["token-42".to_string()].into(),
        });
        assert_eq!(t.taint_type(Some("token-42")), taint::TaintType::FullMatch);
        assert_eq!(t.taint_type(Some("Bearer token-42")), taint::TaintType::PartialMatch);
        assert_eq!(t.taint_type(Some("x_EM_4_XYZ_")), taint::TaintType::PartialMatch);
        assert_eq!(t.taint_type(None), taint::TaintType::None);
    }

    #[test]
    fn test_string_specialization_requires_taint() {
        let t = tracer();
        let info = StringSpecializationInfo::new(StringSpecialization::Integer, "");
        assert_eq!(
            t.add_string_specialization("hello", info.clone()),
            Err(TracerError::NotTainted("hello".into()))
        );
        assert!(t.add_string_specialization("_EM_5_XYZ_", info).is_ok());
    }

    #[test]
    fn test_extra_param_and_header_taint() {
        let t = tracer();
        t.handle_extra_param_taint(Some(taint::EXTRA_PARAM_TAINT), Some("debug"));
        t.handle_extra_param_taint(Some("verbose"), Some(taint::EXTRA_PARAM_TAINT));
        t.handle_extra_param_taint(Some(taint::EXTRA_PARAM_TAINT), Some(taint::EXTRA_PARAM_TAINT));
        t.handle_extra_header_taint(Some("x-trace"), Some(taint::EXTRA_HEADER_TAINT));
        t.handle_extra_header_taint(Some(""), Some(taint::EXTRA_HEADER_TAINT));
        let info = &t.expose_additional_info_list()[0];
        assert_eq!(info.query_parameters, vec!["debug".to_string(), "verbose".to_string()]);
        assert_eq!(info.headers, vec!["x-trace".to_string()]);
    }

    #[test]
    fn test_last_executed_statement_stack() {
        let info = AdditionalInfo::new();
        assert_eq!(info.last_executed_statement(), None);
        info.push_last_executed_statement("A_1_m".into(), "A_m_()V".into());
        info.push_last_executed_statement("A_2_m".into(), "A_m_()V".into());
        info.push_last_executed_statement("B_5_n".into(), "B_n_()V".into());
        assert_eq!(info.last_executed_statement().as_deref(), Some("B_5_n"));
        info.pop_last_executed_statement();
        assert_eq!(info.last_executed_statement().as_deref(), Some("A_2_m"));
        info.pop_last_executed_statement();
        // an empty stack remembers the statement that returned last
        assert_eq!(info.last_executed_statement().as_deref(), Some("A_2_m"));
        info.pop_last_executed_statement();
        assert_eq!(info.last_executed_statement().as_deref(), Some("A_2_m"));
    }

    // --- Recorders ---

    #[test]
    fn test_recorder_coverage() {
        let recorder = ObjectiveRecorder::new();
        assert_eq!(recorder.compute_coverage("Line"), 1.0);
        recorder.register_target("Line_1");
        recorder.register_target("Line_2");
        recorder.register_target("Branch_1");
        recorder.update("Line_1", 1.0, false);
        recorder.update("Line_2", 0.7, false);
        assert_eq!(recorder.compute_coverage("Line"), 0.5);
        assert_eq!(recorder.compute_coverage("Branch"), 0.0);
        let report = recorder.coverage_report("");
        assert_eq!((report.total, report.covered), (3, 1));
    }

    #[test]
    fn test_recorder_keeps_run_best() {
        let recorder = ObjectiveRecorder::new();
        recorder.update("Branch_x", 0.6, true);
        recorder.update("Branch_x", 0.3, false);
        assert_eq!(recorder.best_value("Branch_x"), Some(0.6));
        assert_eq!(recorder.reached_at_startup()["Branch_x"], 0.6);
        recorder.update("Branch_y", 0.1, false);
        assert_eq!(recorder.first_time_encountered(), vec!["Branch_x".to_string(), "Branch_y".to_string()]);
        recorder.clear_first_time_encountered();
        recorder.update("Branch_x", 0.9, false);
        assert!(recorder.first_time_encountered().is_empty());
    }

    #[test]
    fn test_recorder_id_mapping() {
        let recorder = ObjectiveRecorder::new();
        let a = recorder.mapped_id("Line_a");
        let b = recorder.mapped_id("Line_b");
        assert_ne!(a, b);
        assert_eq!(recorder.mapped_id("Line_a"), a);
        assert_eq!(recorder.descriptive_id(b).as_deref(), Some("Line_b"));
        recorder.reset(true);
        assert_eq!(recorder.descriptive_id(b), None);
        assert_eq!(recorder.number_of_targets(), 0);
    }

    #[test]
    fn test_units_snapshot() {
        let units = UnitsInfoRecorder::new();
        units.mark_new_unit("com.acme.Calc");
        units.mark_new_lines(4);
        units.mark_new_branch_pair();
        units.mark_new_replaced_method_in_sut();
        units.mark_new_replaced_method_in_third_party();
        units.mark_new_tracked_method();
        units.add_branch_dependency("Branch_child", "Branch_parent");
        units.register_parsed_dto("com.acme.Dto", None);
        let info = units.snapshot();
        assert_eq!(info.number_of_lines, 4);
        assert_eq!(info.number_of_branches, 2);
        assert_eq!(info.number_of_replaced_methods_in_sut, 1);
        assert_eq!(info.number_of_replaced_methods_in_third_party, 1);
        assert_eq!(info.number_of_tracked_methods, 1);
        assert!(info.unit_names.contains("com.acme.Calc"));
        assert!(info.branch_dependencies["Branch_child"].contains("Branch_parent"));
        assert_eq!(info.parsed_dtos["com.acme.Dto"], serde_json::json!({"type": "object"}));
        units.reset();
        assert_eq!(units.snapshot(), UnitsInfo::default());
    }

    // --- Schemas ---

    #[test]
    fn test_class_to_schema() {
        let mut class = ClassFile::new("com/acme/Order");
        for (name, desc) in [
            ("id", "J"),
            ("count", "I"),
            ("price", "D"),
            ("paid", "Z"),
            ("note", "Ljava/lang/String;"),
            ("tags", "[Ljava/lang/String;"),
            ("owner", "Lcom/acme/User;"),
        ] {
            class.fields.push(FieldDef { name: name.into(), descriptor: desc.into() });
        }
        let schema = class_to_schema(&class).unwrap();
        let props = &schema["Order"]["properties"];
        assert_eq!(props["id"], serde_json::json!({"type": "integer", "format": "int64"}));
        assert_eq!(props["count"]["format"], "int32");
        assert_eq!(props["price"]["type"], "number");
        assert_eq!(props["paid"]["type"], "boolean");
        assert_eq!(props["note"]["type"], "string");
        assert_eq!(props["tags"]["items"]["type"], "string");
        assert_eq!(props["owner"]["$ref"], "#/components/schemas/User");

        class.fields.push(FieldDef { name: "bad".into(), descriptor: "Q".into() });
        assert!(class_to_schema(&class).is_err());
    }

    // --- Properties ---

    proptest::proptest! {
        #[test]
        fn prop_taint_names_are_recognised(index in 0usize..100_000, prefix in "[a-z]{0,8}") {
            let name = taint::taint_name(index);
            proptest::prop_assert!(taint::is_taint_input(&name));
            let joined = format!("{}{}", prefix, name);
            proptest::prop_assert!(taint::includes_taint_input(&joined));
        }

        #[test]
        fn prop_objective_values_only_rise(values in proptest::collection::vec(0.0f64..=1.0, 1..20)) {
            let t = tracer();
            let mut best = 0.0f64;
            for v in values {
                t.update_objective("Line_p", v).unwrap();
                best = best.max(v);
                proptest::prop_assert_eq!(t.value("Line_p").unwrap(), best);
            }
        }

        #[test]
        fn prop_padded_numbers_sort_like_numbers(a in 0i64..99_999, b in 0i64..99_999) {
            let (pa, pb) = (naming::pad_number(a).unwrap(), naming::pad_number(b).unwrap());
            proptest::prop_assert_eq!(pa.cmp(&pb), a.cmp(&b));
        }
    }
}
