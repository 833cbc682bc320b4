#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use heurist_bytecode::*;

    use crate::error::{JavaException, VmError};
    use crate::native::*;
    use crate::vm::Vm;

    fn simple_class(descriptor: &str, code: Vec<Op>, constants: Vec<Value>) -> ClassFile {
        let mut class = ClassFile::new("test/Main");
        class.constants = constants;
        class.add_method(Method {
            name: "main".into(),
            descriptor: descriptor.into(),
            is_static: true,
            locals: 4,
            code,
        });
        class
    }

    fn run_class(class: ClassFile, args: Vec<Value>) -> Result<Option<Value>, VmError> {
        let descriptor = class.methods[0].descriptor.clone();
        let mut vm = Vm::new(Arc::new(class), Arc::new(NativeRegistry::with_library()));
        vm.invoke("main", &descriptor, args)
    }

    fn run_value(class: ClassFile, args: Vec<Value>) -> Value {
        run_class(class, args).unwrap().unwrap()
    }

    #[test]
    fn test_arithmetic() {
        let class = simple_class(
            "()J",
            vec![Op::PushConst(0), Op::PushConst(1), Op::Add, Op::Ret],
            vec![Value::Int(10), Value::Int(3)],
        );
        assert_eq!(run_value(class, vec![]), Value::Int(13));
    }

    #[test]
    fn test_mixed_float_arithmetic() {
        let class = simple_class(
            "()D",
            vec![Op::PushConst(0), Op::PushConst(1), Op::Mul, Op::Ret],
            vec![Value::Int(3), Value::Float(0.5)],
        );
        assert_eq!(run_value(class, vec![]), Value::Float(1.5));
    }

    #[test]
    fn test_overflow_wraps() {
        let class = simple_class(
            "()J",
            vec![Op::PushConst(0), Op::PushConst(1), Op::Add, Op::Ret],
            vec![Value::Int(i64::MAX), Value::Int(1)],
        );
        assert_eq!(run_value(class, vec![]), Value::Int(i64::MIN));
    }

    #[test]
    fn test_division_by_zero_throws() {
        let class = simple_class(
            "()J",
            vec![Op::PushConst(0), Op::PushConst(1), Op::Div, Op::Ret],
            vec![Value::Int(1), Value::Int(0)],
        );
        match run_class(class, vec![]) {
            Err(VmError::Thrown(e)) => assert_eq!(e.class, "java.lang.ArithmeticException"),
            other => panic!("expected ArithmeticException, got {other:?}"),
        }
    }

    #[test]
    fn test_locals_and_arguments() {
        let class = simple_class(
            "(JJ)J",
            vec![Op::LoadLocal(0), Op::LoadLocal(1), Op::Sub, Op::StoreLocal(2), Op::LoadLocal(2), Op::Ret],
            vec![],
        );
        assert_eq!(run_value(class, vec![Value::Int(9), Value::Int(4)]), Value::Int(5));
    }

    #[test]
    fn test_arity_mismatch() {
        let class = simple_class("(J)J", vec![Op::LoadLocal(0), Op::Ret], vec![]);
        assert!(matches!(
            run_class(class, vec![]),
            Err(VmError::ArityMismatch { expected: 1, got: 0 })
        ));
    }

    #[test]
    fn test_conditional_jumps() {
        // return x > 0 ? 1 : 0
        let class = simple_class(
            "(I)I",
            vec![
                Op::LoadLocal(0),
                Op::Jump(JumpKind::Ifle, 4),
                Op::PushConst(0),
                Op::Ret,
                Op::PushConst(1),
                Op::Ret,
            ],
            vec![Value::Int(1), Value::Int(0)],
        );
        assert_eq!(run_value(class.clone(), vec![Value::Int(5)]), Value::Int(1));
        assert_eq!(run_value(class.clone(), vec![Value::Int(0)]), Value::Int(0));
        assert_eq!(run_value(class, vec![Value::Int(-5)]), Value::Int(0));
    }

    #[test]
    fn test_int_comparison_jump_and_bool_operand() {
        let class = simple_class(
            "(II)Z",
            vec![
                Op::LoadLocal(0),
                Op::LoadLocal(1),
                Op::Jump(JumpKind::IfIcmpge, 5),
                Op::PushConst(0),
                Op::Ret,
                Op::PushConst(1),
                Op::Ret,
            ],
            vec![Value::Bool(true), Value::Bool(false)],
        );
        assert_eq!(run_value(class.clone(), vec![Value::Int(1), Value::Int(2)]), Value::Bool(true));
        assert_eq!(run_value(class, vec![Value::Bool(true), Value::Int(1)]), Value::Bool(false));
    }

    #[test]
    fn test_null_and_reference_jumps() {
        let class = simple_class(
            "(Ljava/lang/Object;)I",
            vec![
                Op::LoadLocal(0),
                Op::Jump(JumpKind::Ifnonnull, 4),
                Op::PushConst(0),
                Op::Ret,
                Op::PushConst(1),
                Op::Ret,
            ],
            vec![Value::Int(0), Value::Int(1)],
        );
        assert_eq!(run_value(class.clone(), vec![Value::Null]), Value::Int(0));
        assert_eq!(run_value(class, vec!["x".into()]), Value::Int(1));

        let class = simple_class(
            "(Ljava/lang/Object;Ljava/lang/Object;)I",
            vec![
                Op::LoadLocal(0),
                Op::LoadLocal(1),
                Op::Jump(JumpKind::IfAcmpeq, 5),
                Op::PushConst(0),
                Op::Ret,
                Op::PushConst(1),
                Op::Ret,
            ],
            vec![Value::Int(0), Value::Int(1)],
        );
        assert_eq!(run_value(class.clone(), vec!["a".into(), "a".into()]), Value::Int(1));
        assert_eq!(run_value(class, vec!["a".into(), "b".into()]), Value::Int(0));
    }

    #[test]
    fn test_three_way_compare() {
        let class = simple_class(
            "(JJ)I",
            vec![Op::LoadLocal(0), Op::LoadLocal(1), Op::Cmp(CmpKind::Lcmp), Op::Ret],
            vec![],
        );
        assert_eq!(run_value(class.clone(), vec![Value::Int(5), Value::Int(10)]), Value::Int(-1));
        assert_eq!(run_value(class.clone(), vec![Value::Int(10), Value::Int(10)]), Value::Int(0));
        assert_eq!(run_value(class, vec![Value::Int(11), Value::Int(10)]), Value::Int(1));

        let nan = simple_class(
            "(DD)I",
            vec![Op::LoadLocal(0), Op::LoadLocal(1), Op::Cmp(CmpKind::Dcmpg), Op::Ret],
            vec![],
        );
        assert_eq!(run_value(nan, vec![Value::Float(f64::NAN), Value::Float(1.0)]), Value::Int(1));
    }

    #[test]
    fn test_stack_shuffles() {
        let class = simple_class(
            "()J",
            vec![
                Op::PushConst(0),
                Op::PushConst(1),
                Op::Dup2,
                Op::Sub,
                Op::Swap,
                Op::Pop,
                Op::Swap,
                Op::Pop,
                Op::Ret,
            ],
            vec![Value::Int(7), Value::Int(2)],
        );
        // 7 2 7 2 -> 7 2 5 -> 7 5 2 -> 7 5 -> 5 7 -> 5
        assert_eq!(run_value(class, vec![]), Value::Int(5));
    }

    #[test]
    fn test_concat_and_lists() {
        let class = simple_class(
            "()Ljava/lang/String;",
            vec![Op::PushConst(0), Op::PushConst(1), Op::Concat, Op::Ret],
            vec![Value::String("n=".into()), Value::Int(3)],
        );
        assert_eq!(run_value(class, vec![]), Value::String("n=3".into()));

        let class = simple_class(
            "()J",
            vec![
                Op::PushConst(0),
                Op::PushConst(1),
                Op::PushConst(2),
                Op::MakeList(3),
                Op::PushConst(1),
                Op::ListGet,
                Op::Ret,
            ],
            vec![Value::Int(10), Value::Int(1), Value::Int(30)],
        );
        assert_eq!(run_value(class, vec![]), Value::Int(1));
    }

    #[test]
    fn test_throw() {
        let class = simple_class(
            "()V",
            vec![Op::PushConst(1), Op::Throw(0)],
            vec![Value::String("java.lang.IllegalStateException".into()), Value::String("boom".into())],
        );
        match run_class(class, vec![]) {
            Err(VmError::Thrown(e)) => {
                assert_eq!(e, JavaException::new("java.lang.IllegalStateException", Some("boom".into())))
            }
            other => panic!("expected exception, got {other:?}"),
        }
    }

    #[test]
    fn test_void_method_returns_none() {
        let class = simple_class("()V", vec![Op::Ret], vec![]);
        assert_eq!(run_class(class, vec![]).unwrap(), None);
    }

    #[test]
    fn test_call_own_method() {
        let mut class = simple_class(
            "(J)J",
            vec![Op::LoadLocal(0), Op::Invoke(0), Op::PushConst(0), Op::Add, Op::Ret],
            vec![Value::Int(1)],
        );
        class.add_method(Method {
            name: "twice".into(),
            descriptor: "(J)J".into(),
            is_static: true,
            locals: 1,
            code: vec![Op::LoadLocal(0), Op::LoadLocal(0), Op::Add, Op::Ret],
        });
        class.add_method_ref(MethodRef::new(InvokeKind::Static, "test/Main", "twice", "(J)J"));
        assert_eq!(run_value(class, vec![Value::Int(20)]), Value::Int(41));
    }

    #[test]
    fn test_infinite_recursion_overflows() {
        let mut class = simple_class("()V", vec![Op::Invoke(0), Op::Ret], vec![]);
        class.add_method_ref(MethodRef::new(InvokeKind::Static, "test/Main", "main", "()V"));
        assert!(matches!(run_class(class, vec![]), Err(VmError::StackOverflow(_))));
    }

    #[test]
    fn test_step_limit() {
        let class = simple_class("()V", vec![Op::Jump(JumpKind::Goto, 0)], vec![]);
        let mut vm = Vm::new(Arc::new(class), Arc::new(NativeRegistry::new()));
        vm.set_max_steps(100);
        assert!(matches!(
            vm.invoke("main", "()V", vec![]),
            Err(VmError::ExecutionLimitExceeded(100))
        ));
    }

    #[test]
    fn test_native_string_equals() {
        let mut class = simple_class(
            "(Ljava/lang/String;)Z",
            vec![Op::PushConst(0), Op::LoadLocal(0), Op::Invoke(0), Op::Ret],
            vec![Value::String("foo".into())],
        );
        class.add_method_ref(MethodRef::new(
            InvokeKind::Virtual,
            "java/lang/String",
            "equals",
            "(Ljava/lang/Object;)Z",
        ));
        assert_eq!(run_value(class.clone(), vec!["foo".into()]), Value::Bool(true));
        assert_eq!(run_value(class.clone(), vec!["fop".into()]), Value::Bool(false));
        assert_eq!(run_value(class, vec![Value::Null]), Value::Bool(false));
    }

    #[test]
    fn test_native_npe_on_null_receiver() {
        let mut class = simple_class(
            "(Ljava/lang/String;)Z",
            vec![Op::LoadLocal(0), Op::Invoke(0), Op::Ret],
            vec![],
        );
        class.add_method_ref(MethodRef::new(InvokeKind::Virtual, "java/lang/String", "isEmpty", "()Z"));
        match run_class(class, vec![Value::Null]) {
            Err(VmError::Thrown(e)) => assert_eq!(e.class, "java.lang.NullPointerException"),
            other => panic!("expected NPE, got {other:?}"),
        }
    }

    #[test]
    fn test_unresolved_native() {
        let mut class = simple_class("()V", vec![Op::Invoke(0), Op::Ret], vec![]);
        class.add_method_ref(MethodRef::new(InvokeKind::Static, "com/acme/Missing", "call", "()V"));
        assert!(matches!(run_class(class, vec![]), Err(VmError::UnresolvedMethod { .. })));
    }

    #[test]
    fn test_custom_native_and_abort() {
        let mut natives = NativeRegistry::new();
        natives.register("com/acme/Ext", "twice", "(J)J", |args| {
            Ok(Some(Value::Int(args[0].as_int().unwrap_or(0) * 2)))
        });
        natives.register("com/acme/Ext", "stop", "()V", |_| Err(NativeError::Abort("killed".into())));

        let mut class = simple_class("(J)J", vec![Op::LoadLocal(0), Op::Invoke(0), Op::Ret], vec![]);
        class.add_method_ref(MethodRef::new(InvokeKind::Static, "com/acme/Ext", "twice", "(J)J"));
        class.add_method(Method {
            name: "halt".into(),
            descriptor: "()V".into(),
            is_static: true,
            locals: 0,
            code: vec![Op::Invoke(1), Op::Ret],
        });
        class.add_method_ref(MethodRef::new(InvokeKind::Static, "com/acme/Ext", "stop", "()V"));

        let mut vm = Vm::new(Arc::new(class), Arc::new(natives));
        assert_eq!(vm.invoke("main", "(J)J", vec![Value::Int(21)]).unwrap(), Some(Value::Int(42)));
        assert!(matches!(vm.invoke("halt", "()V", vec![]), Err(VmError::Aborted(_))));
        // the VM is reusable after an aborted run
        assert_eq!(vm.invoke("main", "(J)J", vec![Value::Int(1)]).unwrap(), Some(Value::Int(2)));
    }

    #[test]
    fn test_library_numbers() {
        let lib = NativeRegistry::with_library();
        let parse_int = lib.resolve(&MethodKey::new("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I")).unwrap();
        assert_eq!(parse_int(&["42".into()]).unwrap(), Some(Value::Int(42)));
        assert!(matches!(
            parse_int(&["4x2".into()]),
            Err(NativeError::Thrown(JavaException { ref class, .. })) if class == "java.lang.NumberFormatException"
        ));
        assert!(parse_int(&["99999999999".into()]).is_err());

        let parse_double = lib.resolve(&MethodKey::new("java/lang/Double", "parseDouble", "(Ljava/lang/String;)D")).unwrap();
        assert_eq!(parse_double(&[" 2.5 ".into()]).unwrap(), Some(Value::Float(2.5)));
        assert!(parse_double(&["inf".into()]).is_err());
        assert!(parse_double(&[Value::Null]).is_err());
    }

    #[test]
    fn test_library_collections_and_maps() {
        let lib = NativeRegistry::with_library();
        let contains = lib.resolve(&MethodKey::new("java/util/Collection", "contains", "(Ljava/lang/Object;)Z")).unwrap();
        let list = Value::List(vec![Value::Int(1), "a".into()]);
        assert_eq!(contains(&[list.clone(), "a".into()]).unwrap(), Some(Value::Bool(true)));
        assert_eq!(contains(&[list, Value::Int(2)]).unwrap(), Some(Value::Bool(false)));

        let mut m = BTreeMap::new();
        m.insert("k".to_string(), Value::Int(5));
        let get = lib.resolve(&MethodKey::new("java/util/Map", "get", "(Ljava/lang/Object;)Ljava/lang/Object;")).unwrap();
        assert_eq!(get(&[Value::Map(m.clone()), "k".into()]).unwrap(), Some(Value::Int(5)));
        assert_eq!(get(&[Value::Map(m), "z".into()]).unwrap(), Some(Value::Null));
    }

    #[test]
    fn test_library_uri_regex_json() {
        let lib = NativeRegistry::with_library();
        let create = lib.resolve(&MethodKey::new("java/net/URI", "create", "(Ljava/lang/String;)Ljava/net/URI;")).unwrap();
        assert!(create(&["http://example.com/a?b=c".into()]).is_ok());
        assert!(create(&["relative/path".into()]).is_ok());
        assert!(create(&["has space".into()]).is_err());

        let matches = lib.resolve(&MethodKey::new("java/lang/String", "matches", "(Ljava/lang/String;)Z")).unwrap();
        assert_eq!(matches(&["abc123".into(), "[a-z]+\\d+".into()]).unwrap(), Some(Value::Bool(true)));
        assert_eq!(matches(&["abc123x".into(), "[a-z]+\\d+".into()]).unwrap(), Some(Value::Bool(false)));
        assert!(matches(&["a".into(), "(".into()]).is_err());

        let from_json = lib
            .resolve(&MethodKey::new("com/google/gson/Gson", "fromJson", "(Ljava/lang/String;Ljava/lang/Class;)Ljava/lang/Object;"))
            .unwrap();
        let v = from_json(&[r#"{"name":"x","n":[1,2.5]}"#.into(), "com.foo.Dto".into()]).unwrap().unwrap();
        let Value::Map(fields) = v else { panic!("expected map") };
        assert_eq!(fields["name"], Value::String("x".into()));
        assert_eq!(fields["n"], Value::List(vec![Value::Int(1), Value::Float(2.5)]));
        assert!(from_json(&["{".into(), "com.foo.Dto".into()]).is_err());
    }

    #[test]
    fn test_library_url_connection() {
        let lib = NativeRegistry::with_library();
        let open = lib.resolve(&MethodKey::new("java/net/URL", "openConnection", "()Ljava/net/URLConnection;")).unwrap();
        let Some(Value::Map(conn)) = open(&["https://api.example.org/v1".into()]).unwrap() else {
            panic!("expected connection map");
        };
        assert_eq!(conn["host"], Value::String("api.example.org".into()));
        assert_eq!(conn["port"], Value::Int(443));
        assert!(open(&["not a url".into()]).is_err());
    }
}
