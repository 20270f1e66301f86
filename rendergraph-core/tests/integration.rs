//! Integration Tests for the Render Graph Pipeline
//!
//! These tests drive graphs through compile → resize → execute against the
//! headless device, using passes that record what they see.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use rendergraph_core::vm::{Address, Instruction};
use rendergraph_core::{
    Compiler, CompilerConfig, Error, ExecutionStatus, Graph, HeadlessDevice, NativeHandle, Node,
    NodeKind, OperatorKind, OperationRegistry, Parameters, Pass, RenderTarget, Trap, Value,
};

/// One `render` call as seen by a recorder.
#[derive(Debug, Clone, PartialEq)]
struct Call {
    pass: &'static str,
    /// Inputs in pop order: last port first.
    inputs: Vec<Value>,
    target: RenderTarget,
}

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<Call>>>);

impl Log {
    fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    fn last(&self, pass: &str) -> Call {
        self.0
            .lock()
            .iter()
            .rev()
            .find(|call| call.pass == pass)
            .cloned()
            .unwrap_or_else(|| panic!("pass {pass} never rendered"))
    }

    fn clear(&self) {
        self.0.lock().clear();
    }
}

/// A pass that records its inputs and target, then pushes fixed outputs.
struct Recorder {
    name: &'static str,
    outputs: Vec<Value>,
    log: Log,
    proceed: Arc<AtomicBool>,
}

impl Pass for Recorder {
    fn render(&mut self, target: &RenderTarget, parameters: &mut Parameters<'_>) -> bool {
        let mut inputs = Vec::new();
        while let Some(value) = parameters.pop() {
            inputs.push(value);
        }
        self.log.0.lock().push(Call {
            pass: self.name,
            inputs,
            target: *target,
        });

        if !self.proceed.load(Ordering::SeqCst) {
            return false;
        }
        for value in &self.outputs {
            parameters.push(*value);
        }
        true
    }
}

struct Harness {
    registry: OperationRegistry,
    log: Log,
    proceed: Arc<AtomicBool>,
}

impl Harness {
    fn new() -> Self {
        Self {
            registry: OperationRegistry::new(),
            log: Log::default(),
            proceed: Arc::new(AtomicBool::new(true)),
        }
    }

    fn recorder(self, name: &'static str, outputs: &[Value]) -> Self {
        let outputs = outputs.to_vec();
        let log = self.log.clone();
        let proceed = self.proceed.clone();
        self.registry
            .register_pass(name, move || Recorder {
                name,
                outputs: outputs.clone(),
                log: log.clone(),
                proceed: proceed.clone(),
            })
            .unwrap();
        self
    }

    fn compiler(self, config: CompilerConfig) -> (Compiler, Log, Arc<AtomicBool>) {
        (
            Compiler::with_config(Arc::new(self.registry), config),
            self.log,
            self.proceed,
        )
    }
}

/// a + b feeding a pass that presents.
fn addition_graph() -> Graph {
    let mut graph = Graph::new();
    graph.add_node(Node::float("a", 2.0)).unwrap();
    graph.add_node(Node::float("b", 3.0)).unwrap();
    graph
        .add_node(Node::operator("sum", OperatorKind::Addition))
        .unwrap();
    graph.add_node(Node::pass("show", "show")).unwrap();
    graph.add_node(Node::texture("screen", "RGBA8")).unwrap();
    graph.add_node(Node::present("present")).unwrap();
    graph.connect("a", 0, "sum", 0).unwrap();
    graph.connect("b", 0, "sum", 1).unwrap();
    graph.connect("sum", 0, "show", 0).unwrap();
    graph.connect("show", 0, "screen", 0).unwrap();
    graph.connect("screen", 0, "present", 0).unwrap();
    graph
}

#[test]
fn addition_writes_the_operator_slot() {
    let (compiler, log, _) = Harness::new()
        .recorder("show", &[Value::from_uint(1)])
        .compiler(CompilerConfig::default());
    let mut instance = compiler.compile(&addition_graph()).unwrap();

    let bytes = instance.program().as_bytes();
    assert_eq!(bytes.last(), Some(&0xff));

    assert_eq!(instance.execute().unwrap(), ExecutionStatus::Completed);

    let sum = instance.value_slot("sum").unwrap();
    assert_eq!(instance.value(sum).unwrap().as_float(), 5.0);
    assert_eq!(log.last("show").inputs, [Value::from_float(5.0)]);
}

#[test]
fn operators_can_feed_present() {
    let (compiler, _, _) = Harness::new().compiler(CompilerConfig::default());

    let mut graph = Graph::new();
    graph.add_node(Node::float("a", 2.0)).unwrap();
    graph.add_node(Node::float("b", 3.0)).unwrap();
    graph
        .add_node(Node::operator("sum", OperatorKind::Addition))
        .unwrap();
    graph.add_node(Node::present("present")).unwrap();
    graph.connect("a", 0, "sum", 0).unwrap();
    graph.connect("b", 0, "sum", 1).unwrap();
    graph.connect("sum", 0, "present", 0).unwrap();

    let mut instance = compiler.compile(&graph).unwrap();
    assert_eq!(
        instance.program().to_string(),
        "0000 PUSH v0\n0003 PUSH v1\n0006 ADD.f\n0008 POP v2\n0011 HALT\n"
    );
    assert_eq!(instance.execute().unwrap(), ExecutionStatus::Completed);

    let sum = instance.value_slot("sum").unwrap();
    assert_eq!(instance.value(sum).unwrap().as_float(), 5.0);
}

#[test]
fn floats_can_feed_present() {
    let (compiler, _, _) = Harness::new().compiler(CompilerConfig::internal());

    let mut graph = Graph::new();
    graph.add_node(Node::float("a", 2.0)).unwrap();
    graph.add_node(Node::present("present")).unwrap();
    graph.connect("a", 0, "present", 0).unwrap();

    let mut instance = compiler.compile(&graph).unwrap();
    assert_eq!(instance.default_framebuffer(), NativeHandle::NULL);

    let mut device = HeadlessDevice::new();
    instance.resize(&mut device, 64, 64).unwrap();
    assert_eq!(instance.execute().unwrap(), ExecutionStatus::Completed);
    assert_eq!(instance.value(0).unwrap().as_float(), 2.0);
}

#[test]
fn float_slots_follow_encounter_order() {
    let (compiler, _, _) = Harness::new()
        .recorder("show", &[Value::ZERO])
        .compiler(CompilerConfig::default());

    let mut graph = addition_graph();
    // Unreachable constants still get a slot.
    graph.add_node(Node::float("spare", -0.5)).unwrap();
    let instance = compiler.compile(&graph).unwrap();

    let floats = [("a", 2.0), ("b", 3.0), ("spare", -0.5)];
    for (index, (id, value)) in floats.iter().enumerate() {
        assert_eq!(instance.value_slot(id), Some(index));
        assert_eq!(instance.value(index).unwrap().as_float(), *value);
    }
    // floats, then the operator, then one slot per pass output port
    assert_eq!(instance.value_slot("sum"), Some(3));
    assert_eq!(instance.value_slots("show"), Some(4..5));
    assert_eq!(instance.value_count(), 5);
}

/// gbuffer(2 outputs) -> albedo, normal -> compose -> screen -> present
fn deferred_graph() -> Graph {
    let mut graph = Graph::new();
    graph.add_node(Node::pass("gbuffer", "gbuffer")).unwrap();
    graph.add_node(Node::texture("albedo", "RGBA8")).unwrap();
    graph.add_node(Node::texture("normal", "RGBA16F")).unwrap();
    graph.add_node(Node::texture("depth", "DEPTH_COMPONENT24")).unwrap();
    graph.add_node(Node::pass("compose", "compose")).unwrap();
    graph.add_node(Node::texture("screen", "RGBA8")).unwrap();
    graph.add_node(Node::present("present")).unwrap();
    graph.connect("gbuffer", 0, "albedo", 0).unwrap();
    graph.connect("gbuffer", 1, "normal", 0).unwrap();
    graph.connect("gbuffer", 2, "depth", 0).unwrap();
    graph.connect("albedo", 0, "compose", 0).unwrap();
    graph.connect("normal", 0, "compose", 1).unwrap();
    graph.connect("compose", 0, "screen", 0).unwrap();
    graph.connect("screen", 0, "present", 0).unwrap();
    graph
}

#[test]
fn pass_outputs_are_popped_in_reverse_port_order() {
    let (compiler, log, _) = Harness::new()
        .recorder(
            "gbuffer",
            &[
                Value::from_uint(10),
                Value::from_uint(11),
                Value::from_uint(12),
            ],
        )
        .recorder("compose", &[Value::ZERO])
        .compiler(CompilerConfig::default());
    let mut instance = compiler.compile(&deferred_graph()).unwrap();

    let slots = instance.value_slots("gbuffer").unwrap();
    assert_eq!(slots.len(), 3);

    let instructions: Vec<Instruction> = instance
        .program()
        .instructions()
        .map(|decoded| decoded.unwrap().1)
        .collect();
    let call = instructions
        .iter()
        .position(|i| *i == Instruction::Call(0))
        .unwrap();
    let pops: Vec<_> = instructions[call + 1..call + 4].to_vec();
    let expected: Vec<_> = slots
        .clone()
        .rev()
        .map(|slot| Instruction::Pop(Address::value(slot).unwrap()))
        .collect();
    assert_eq!(pops, expected);

    instance.execute().unwrap();
    assert_eq!(instance.value(slots.start).unwrap().as_uint(), 10);
    assert_eq!(instance.value(slots.start + 2).unwrap().as_uint(), 12);

    // compose reads albedo and normal through the texture hop
    assert_eq!(
        log.last("compose").inputs,
        [Value::from_uint(11), Value::from_uint(10)]
    );
}

#[test]
fn resize_binds_targets_without_touching_bytecode() {
    let (compiler, log, _) = Harness::new()
        .recorder("gbuffer", &[Value::ZERO; 3])
        .recorder("compose", &[Value::ZERO])
        .compiler(CompilerConfig::external(NativeHandle(42)));
    let mut instance = compiler.compile(&deferred_graph()).unwrap();
    let mut device = HeadlessDevice::new();

    let program = instance.program().clone();
    let counts = (
        instance.value_count(),
        instance.texture_count(),
        instance.operation_count(),
    );
    // screen is aliased to the window surface
    assert_eq!(counts.1, 3);
    assert_eq!(instance.framebuffer_count(), 1);

    instance.resize(&mut device, 640, 480).unwrap();
    instance.execute().unwrap();
    let first = log.last("gbuffer").target;
    assert_eq!((first.width, first.height), (640, 480));
    assert!(device.framebuffer(first.framebuffer).is_some());
    assert_eq!(log.last("compose").target.framebuffer, NativeHandle(42));

    let record = device.framebuffer(first.framebuffer).unwrap();
    assert_eq!(record.attachments.len(), 3);

    instance.resize(&mut device, 1280, 720).unwrap();
    instance.execute().unwrap();
    let second = log.last("gbuffer").target;
    assert_eq!((second.width, second.height), (1280, 720));
    assert_ne!(second.framebuffer, first.framebuffer);

    assert_eq!(instance.program(), &program);
    assert_eq!(
        (
            instance.value_count(),
            instance.texture_count(),
            instance.operation_count()
        ),
        counts
    );
    assert_eq!(device.live_textures(), 3);
    assert_eq!(device.live_framebuffers(), 1);

    let albedo = instance.symbols().texture_slot("albedo").unwrap();
    let handle = instance.render_texture(albedo).unwrap();
    assert_eq!(device.texture(handle).unwrap().width, 1280);

    instance.release(&mut device);
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.live_framebuffers(), 0);
}

#[test]
fn internal_default_framebuffer() {
    let (compiler, log, _) = Harness::new()
        .recorder("gbuffer", &[Value::ZERO; 3])
        .recorder("compose", &[Value::ZERO])
        .compiler(CompilerConfig::internal());
    let mut instance = compiler.compile(&deferred_graph()).unwrap();
    let mut device = HeadlessDevice::new();

    assert_eq!(instance.texture_count(), 4);
    assert_eq!(instance.framebuffer_count(), 2);
    assert_eq!(instance.default_framebuffer(), NativeHandle::NULL);

    instance.resize(&mut device, 320, 200).unwrap();
    instance.execute().unwrap();

    let default = instance.default_framebuffer();
    assert!(!default.is_null());
    assert_eq!(log.last("compose").target.framebuffer, default);
}

#[test]
fn set_constant_is_visible_on_next_execute() {
    let (compiler, log, _) = Harness::new()
        .recorder("show", &[Value::ZERO])
        .compiler(CompilerConfig::default());
    let mut instance = compiler.compile(&addition_graph()).unwrap();

    instance.execute().unwrap();
    assert_eq!(log.last("show").inputs, [Value::from_float(5.0)]);

    let a = instance.value_slot("a").unwrap();
    instance.set_constant(a, 40.0f32).unwrap();
    instance.execute().unwrap();
    assert_eq!(log.last("show").inputs, [Value::from_float(43.0)]);

    // Patched constants persist across frames.
    instance.execute().unwrap();
    assert_eq!(instance.value(a).unwrap().as_float(), 40.0);
}

#[test]
fn graph_without_work_just_halts() {
    let (compiler, _, _) = Harness::new().compiler(CompilerConfig::default());

    let mut graph = Graph::new();
    graph.add_node(Node::texture("image", "RGBA8")).unwrap();
    graph.add_node(Node::present("present")).unwrap();
    graph.connect("image", 0, "present", 0).unwrap();

    let mut instance = compiler.compile(&graph).unwrap();
    assert_eq!(instance.program().to_string(), "0000 HALT\n");
    assert_eq!(instance.execute().unwrap(), ExecutionStatus::Completed);
}

#[test]
fn cycles_fail_compilation() {
    let (compiler, _, _) = Harness::new()
        .recorder("show", &[Value::ZERO])
        .compiler(CompilerConfig::default());

    let mut graph = Graph::new();
    graph.add_node(Node::float("a", 1.0)).unwrap();
    graph
        .add_node(Node::operator("x", OperatorKind::Addition))
        .unwrap();
    graph
        .add_node(Node::operator("y", OperatorKind::Addition))
        .unwrap();
    graph.add_node(Node::pass("show", "show")).unwrap();
    graph.add_node(Node::present("present")).unwrap();
    graph.connect("a", 0, "x", 0).unwrap();
    graph.connect("y", 0, "x", 1).unwrap();
    graph.connect("x", 0, "y", 0).unwrap();
    graph.connect("a", 0, "y", 1).unwrap();
    graph.connect("x", 0, "show", 0).unwrap();
    graph.connect("show", 0, "present", 0).unwrap();

    assert!(matches!(
        compiler.compile(&graph),
        Err(Error::CyclicGraph { .. })
    ));
}

#[test]
fn abort_stops_the_frame_and_keeps_the_instance() {
    let (compiler, log, proceed) = Harness::new()
        .recorder("gbuffer", &[Value::from_uint(1), Value::from_uint(2), Value::from_uint(3)])
        .recorder("compose", &[Value::ZERO])
        .compiler(CompilerConfig::default());
    let mut instance = compiler.compile(&deferred_graph()).unwrap();

    proceed.store(false, Ordering::SeqCst);
    let gbuffer = instance.symbols().operation_index("gbuffer").unwrap();
    assert_eq!(
        instance.execute().unwrap(),
        ExecutionStatus::Aborted {
            operation: gbuffer
        }
    );
    // compose never ran
    assert_eq!(log.calls().len(), 1);
    assert_eq!(instance.operation_node(gbuffer), Some("gbuffer"));

    log.clear();
    proceed.store(true, Ordering::SeqCst);
    assert_eq!(instance.execute().unwrap(), ExecutionStatus::Completed);
    let passes: Vec<_> = log.calls().iter().map(|call| call.pass).collect();
    assert_eq!(passes, ["gbuffer", "compose"]);
}

#[test]
fn output_count_mismatch_is_a_trap() {
    let (compiler, _, _) = Harness::new()
        .recorder("show", &[])
        .compiler(CompilerConfig::default());
    let mut instance = compiler.compile(&addition_graph()).unwrap();

    assert!(matches!(
        instance.execute(),
        Err(Error::VmTrap(Trap::OutputCountMismatch {
            expected: 1,
            found: 0,
            ..
        }))
    ));
    // The trap leaves nothing on the stack; the next frame traps the same way.
    assert!(instance.execute().is_err());
}

#[test]
fn source_textures_push_native_handles() {
    let (compiler, log, _) = Harness::new()
        .recorder("show", &[Value::ZERO])
        .compiler(CompilerConfig::default());

    let mut graph = Graph::new();
    graph.add_node(Node::texture("noise", "R8")).unwrap();
    graph.add_node(Node::pass("show", "show")).unwrap();
    graph.add_node(Node::texture("screen", "RGBA8")).unwrap();
    graph.add_node(Node::present("present")).unwrap();
    graph.connect("noise", 0, "show", 0).unwrap();
    graph.connect("show", 0, "screen", 0).unwrap();
    graph.connect("screen", 0, "present", 0).unwrap();

    let mut instance = compiler.compile(&graph).unwrap();
    assert!(instance
        .program()
        .to_string()
        .starts_with("0000 PUSH t0\n"));

    let mut device = HeadlessDevice::new();
    instance.resize(&mut device, 4, 4).unwrap();
    instance.execute().unwrap();

    let noise = instance.render_texture(0).unwrap();
    assert_eq!(log.last("show").inputs, [Value::from_uint(noise.raw())]);
}

#[test]
fn deep_texture_chains_are_rejected() {
    let (compiler, _, _) = Harness::new()
        .recorder("draw", &[Value::ZERO])
        .recorder("show", &[Value::ZERO])
        .compiler(CompilerConfig::default());

    let mut graph = Graph::new();
    graph.add_node(Node::pass("draw", "draw")).unwrap();
    graph.add_node(Node::texture("first", "RGBA8")).unwrap();
    graph.add_node(Node::texture("second", "RGBA8")).unwrap();
    graph.add_node(Node::pass("show", "show")).unwrap();
    graph.add_node(Node::present("present")).unwrap();
    graph.connect("draw", 0, "first", 0).unwrap();
    graph.connect("first", 0, "second", 0).unwrap();
    graph.connect("second", 0, "show", 0).unwrap();
    graph.connect("show", 0, "present", 0).unwrap();

    assert!(matches!(
        compiler.compile(&graph),
        Err(Error::UnsupportedIndirection { node }) if node == "show"
    ));
}

#[test]
fn integer_mode_operators() {
    let (compiler, log, _) = Harness::new()
        .recorder("show", &[Value::ZERO])
        .compiler(CompilerConfig::default());

    let mut graph = Graph::new();
    graph.add_node(Node::float("a", 0.0)).unwrap();
    graph.add_node(Node::float("b", 0.0)).unwrap();
    graph
        .add_node(Node::operator("less", OperatorKind::Less).with_metadata("mode", "int"))
        .unwrap();
    graph.add_node(Node::operator("not", OperatorKind::Not)).unwrap();
    graph.add_node(Node::pass("show", "show")).unwrap();
    graph.add_node(Node::present("present")).unwrap();
    graph.connect("a", 0, "less", 0).unwrap();
    graph.connect("b", 0, "less", 1).unwrap();
    graph.connect("less", 0, "not", 0).unwrap();
    graph.connect("not", 0, "show", 0).unwrap();
    graph.connect("show", 0, "present", 0).unwrap();

    let mut instance = compiler.compile(&graph).unwrap();
    let a = instance.value_slot("a").unwrap();
    let b = instance.value_slot("b").unwrap();

    instance.set_constant(a, -3i32).unwrap();
    instance.set_constant(b, 2i32).unwrap();
    instance.execute().unwrap();
    assert_eq!(log.last("show").inputs, [Value::from_bool(false)]);

    instance.set_constant(a, 5i32).unwrap();
    instance.execute().unwrap();
    assert_eq!(log.last("show").inputs, [Value::from_bool(true)]);
}

#[test]
fn graphs_load_from_json() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let source = r#"{
        "nodes": [
            {"id": "a", "type": "float", "metadata": {"value": "1.5"}},
            {"id": "b", "type": "float", "metadata": {"value": "2"}},
            {"id": "c", "type": "float", "metadata": {"value": "4"}},
            {"id": "fma", "type": "multiply-add"},
            {"id": "show", "type": "pass", "metadata": {"subtype": "show"}},
            {"id": "present", "type": "present"}
        ],
        "edges": [
            {"source": "a", "target": "fma", "metadata": {"target_id": "0"}},
            {"source": "b", "target": "fma", "metadata": {"target_id": "1"}},
            {"source": "c", "target": "fma", "metadata": {"target_id": "2"}},
            {"source": "fma", "target": "show"},
            {"source": "show", "target": "present"}
        ]
    }"#;

    let graph = Graph::from_json(source).unwrap();
    let (compiler, log, _) = Harness::new()
        .recorder("show", &[Value::ZERO])
        .compiler(CompilerConfig::default());
    let mut instance = compiler.compile(&graph).unwrap();

    instance.execute().unwrap();
    assert_eq!(log.last("show").inputs, [Value::from_float(9.5)]);
}

#[test]
fn unknown_node_types_fail_to_load() {
    let source = r#"{"nodes": [{"id": "x", "type": "hologram"}], "edges": []}"#;
    assert!(matches!(
        Graph::from_json(source),
        Err(Error::UnknownNodeType(t)) if t == "hologram"
    ));
    assert_eq!("pass".parse::<NodeKind>().unwrap(), NodeKind::Pass);
}
