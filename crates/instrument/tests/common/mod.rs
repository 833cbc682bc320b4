#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use heurist_instrument::{
    ExecutionTracer, InstrumentationConfig, InstrumentingClassLoader, LoadedClass, ObjectiveRecorder,
    ReplacementRegistry, UnitsInfoRecorder,
};
use heurist_vm::NativeRegistry;

// Heuristic constants are process-wide; tests that load classes run one at a time.
static LOCK: Mutex<()> = Mutex::new(());

pub struct Harness {
    pub loader: InstrumentingClassLoader,
    _guard: MutexGuard<'static, ()>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(InstrumentationConfig::default(), NativeRegistry::with_library())
    }

    pub fn with_config(config: InstrumentationConfig) -> Self {
        Self::with(config, NativeRegistry::with_library())
    }

    /// A loader with its own tracer and recorders, so objectives never leak
    /// between tests.
    pub fn with(config: InstrumentationConfig, natives: NativeRegistry) -> Self {
        let guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tracer = Arc::new(ExecutionTracer::new(Arc::new(ObjectiveRecorder::new())));
        let loader = InstrumentingClassLoader::with_parts(
            config,
            natives,
            ReplacementRegistry::with_defaults(),
            tracer,
            Arc::new(UnitsInfoRecorder::new()),
        )
        .expect("loader setup failed");
        Harness { loader, _guard: guard }
    }

    pub fn load(&self, source: &str) -> LoadedClass {
        let class = heurist_asm::assemble(source).expect("assembly failed");
        self.loader.load(class).expect("load failed")
    }

    pub fn tracer(&self) -> &Arc<ExecutionTracer> {
        self.loader.tracer()
    }

    pub fn value(&self, id: &str) -> f64 {
        self.tracer()
            .value(id)
            .unwrap_or_else(|e| panic!("{e}"))
    }
}

/// Three-way comparison over two longs, lines 3 and 5.
pub const CALC: &str = r#"
.class com/acme/Calc
.source "Calc.java"

.method static sign (JJ)I
    .line 3
    load 0
    load 1
    lcmp
    dup
    ifge non_negative
    pop
    push -1
    ret
non_negative:
    .line 5
    ifne positive
    push 0
    ret
positive: push 1
    ret
.end
"#;

/// `input.equals("foo")` on line 7.
pub const LOGIN: &str = r#"
.class com/acme/Login

.method static check (Ljava/lang/String;)Z
    .line 7
    load 0
    push "foo"
    invokevirtual java/lang/String equals (Ljava/lang/Object;)Z
    ret
.end
"#;

pub const CALC_COMPARISON: &str = "NumericComparison_at_com.acme.Calc_00003_0";
pub const LOGIN_EQUALS: &str = "MethodReplacement_at_com.acme.Login_00007_0";
