//! Loads class files through the instrumentation pipeline and runs them
//! against natives wired to the tracer.

use std::sync::Arc;

use dashmap::DashMap;
use heurist_bytecode::{verify, ClassFile, Value};
use heurist_vm::{NativeRegistry, Vm};
use tracing::info;

use crate::config::{self, InstrumentationConfig};
use crate::error::InstrumentError;
use crate::passes::{ClassReport, Instrumenter};
use crate::probes;
use crate::recorder::ObjectiveRecorder;
use crate::replacement::ReplacementRegistry;
use crate::tracer::ExecutionTracer;
use crate::units::UnitsInfoRecorder;

#[derive(Debug, Clone)]
pub struct LoadedClass {
    pub class: Arc<ClassFile>,
    pub report: ClassReport,
}

pub struct InstrumentingClassLoader {
    instrumenter: Instrumenter,
    natives: Arc<NativeRegistry>,
    tracer: Arc<ExecutionTracer>,
    units: Arc<UnitsInfoRecorder>,
    /// Instrumented classes by internal name. A class is rewritten once.
    cache: DashMap<String, LoadedClass>,
}

impl InstrumentingClassLoader {
    /// A loader reporting to the process-wide tracer and recorders.
    pub fn new(config: InstrumentationConfig) -> Result<Self, InstrumentError> {
        Self::with_parts(
            config,
            NativeRegistry::with_library(),
            ReplacementRegistry::with_defaults(),
            ExecutionTracer::global(),
            UnitsInfoRecorder::global(),
        )
    }

    /// `natives` holds the originals; replacements without one stay
    /// inactive.
    pub fn with_parts(
        config: InstrumentationConfig,
        mut natives: NativeRegistry,
        replacements: ReplacementRegistry,
        tracer: Arc<ExecutionTracer>,
        units: Arc<UnitsInfoRecorder>,
    ) -> Result<Self, InstrumentError> {
        config.validate()?;
        config::install_heuristics(config.heuristics);

        let active = replacements.active(&config, &natives);
        active.install(&mut natives, tracer.clone(), units.clone())?;
        probes::install(&mut natives, tracer.clone());
        info!(
            replacements = active.len(),
            natives = natives.len(),
            categories = ?config.replacement_categories,
            "instrumenting class loader ready"
        );

        let instrumenter = Instrumenter::new(config, active, tracer.recorder().clone(), units.clone());
        Ok(InstrumentingClassLoader {
            instrumenter,
            natives: Arc::new(natives),
            tracer,
            units,
            cache: DashMap::new(),
        })
    }

    pub fn config(&self) -> &InstrumentationConfig {
        self.instrumenter.config()
    }

    pub fn tracer(&self) -> &Arc<ExecutionTracer> {
        &self.tracer
    }

    pub fn recorder(&self) -> &Arc<ObjectiveRecorder> {
        self.tracer.recorder()
    }

    pub fn units(&self) -> &Arc<UnitsInfoRecorder> {
        &self.units
    }

    pub fn natives(&self) -> &Arc<NativeRegistry> {
        &self.natives
    }

    /// Verify and instrument `class`, or return the cached result of an
    /// earlier load of the same name.
    pub fn load(&self, class: ClassFile) -> Result<LoadedClass, InstrumentError> {
        if let Some(loaded) = self.cache.get(&class.name) {
            return Ok(loaded.clone());
        }
        verify::verify_class(&class)?;
        let (instrumented, report) = self.instrumenter.instrument(&class);
        let loaded = LoadedClass { class: Arc::new(instrumented), report };
        let entry = self.cache.entry(class.name.clone()).or_insert(loaded);
        Ok(entry.clone())
    }

    pub fn load_bytes(&self, data: &[u8]) -> Result<LoadedClass, InstrumentError> {
        self.load(ClassFile::from_bytes(data)?)
    }

    pub fn loaded(&self, name: &str) -> Option<LoadedClass> {
        self.cache.get(name).map(|l| l.clone())
    }

    /// A fresh VM over an instrumented class. One per thread.
    pub fn vm(&self, class: &LoadedClass) -> Vm {
        let mut vm = Vm::new(class.class.clone(), self.natives.clone());
        vm.set_max_steps(self.config().max_steps);
        vm
    }

    /// Invoke `method` of a loaded class as one action.
    pub fn run(
        &self,
        class_name: &str,
        method: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, InstrumentError> {
        let class = self.loaded(class_name).ok_or_else(|| InstrumentError::UnknownClass(class_name.to_string()))?;
        let mut vm = self.vm(&class);
        self.tracer.set_executing_action(true);
        let result = vm.invoke(method, descriptor, args);
        self.tracer.set_executing_action(false);
        Ok(result?)
    }
}
