use briny_net::definition::{Argument, NetDef, OperatorDef};
use briny_net::device::{DeviceOption, DeviceType};
use briny_net::gradient::{gradient_name, GradientMaker, GradientContext, GradientRegistry, GradientWrapper};
use briny_net::net::create_net;
use briny_net::ops::cpu;
use briny_net::registry::OperatorRegistry;
use briny_net::workspace::Workspace;
use briny_net::{Error, Result};

struct FooGradient;

impl GradientMaker for FooGradient {
    fn gradient_defs(&self, cx: &mut GradientContext<'_>) -> Result<Vec<OperatorDef>> {
        Ok(vec![OperatorDef::new(
            "FooGradient",
            "",
            [cx.grad_output(0)?],
            [cx.grad_input(0)],
        )])
    }
}

fn foo_def() -> OperatorDef {
    OperatorDef::new("Foo", "", ["in"], ["out"])
        .with_engine("DUMMY_ENGINE")
        .with_device(DeviceOption::cpu())
        .with_arg(Argument::int("arg", 1))
}

#[test]
fn gradient_copies_engine_device_and_arguments() {
    let mut gradients = GradientRegistry::new();
    assert!(gradients.register("Foo", FooGradient));

    let meta = gradients
        .gradient_for_op(&foo_def(), &[GradientWrapper::dense("out_grad")])
        .unwrap();

    assert_eq!(meta.ops.len(), 1);
    let grad = &meta.ops[0];
    assert_eq!(grad.op_type, "FooGradient");
    assert_eq!(grad.engine, "DUMMY_ENGINE");
    assert_eq!(grad.device_option.device_type, DeviceType::Cpu);
    assert_eq!(grad.inputs, ["out_grad"]);
    assert_eq!(grad.outputs, ["in_grad"]);
    assert_eq!(grad.args, [Argument::int("arg", 1)]);

    assert_eq!(meta.g_input.len(), 1);
    assert!(meta.g_input[0].is_dense());
    assert_eq!(meta.g_input[0].dense, gradient_name("in"));
}

#[test]
fn unregistered_type_has_no_gradient() {
    let gradients = GradientRegistry::new();
    assert!(matches!(
        gradients.gradient_for_op(&foo_def(), &[GradientWrapper::dense("out_grad")]),
        Err(Error::NoGradient(t)) if t == "Foo"
    ));
}

#[test]
fn maker_can_opt_out_of_copying_the_engine() {
    struct Plain;

    impl GradientMaker for Plain {
        fn gradient_defs(&self, cx: &mut GradientContext<'_>) -> Result<Vec<OperatorDef>> {
            let g = cx.grad_output(0)?;
            cx.set_dense(0, g.clone());
            Ok(vec![OperatorDef::new("Identity", "", [g.clone()], [g])])
        }

        fn copy_engine(&self) -> bool {
            false
        }
    }

    let mut gradients = GradientRegistry::new();
    gradients.register("Foo", Plain);
    let meta = gradients
        .gradient_for_op(&foo_def(), &[GradientWrapper::dense("out_grad")])
        .unwrap();
    assert!(meta.ops[0].engine.is_empty());
    assert_eq!(meta.g_input[0].dense, "out_grad");
}

#[test]
fn copy_gradient_runs_as_a_net() {
    let mut gradients = GradientRegistry::new();
    cpu::register_gradients(&mut gradients);

    let forward = OperatorDef::new("Copy", "", ["x"], ["y"]);
    let meta = gradients
        .gradient_for_op(&forward, &[GradientWrapper::dense(gradient_name("y"))])
        .unwrap();
    assert_eq!(meta.ops[0].inputs, ["y_grad"]);
    assert_eq!(meta.ops[0].outputs, ["x_grad"]);

    let mut registry = OperatorRegistry::new();
    cpu::register_cpu_operators(&mut registry).unwrap();
    let backward = meta
        .ops
        .into_iter()
        .fold(NetDef::new("backward").with_external_input("y_grad"), NetDef::with_op)
        .with_external_output("x_grad");

    let ws = Workspace::new();
    ws.feed("y_grad", 0.5_f64);
    let mut net = create_net(&registry, &backward, &ws).unwrap();
    net.run().unwrap();
    assert_eq!(*ws.fetch::<f64>("x_grad").unwrap(), 0.5);
}

#[test]
fn no_op_has_no_gradient_operators() {
    let mut gradients = GradientRegistry::new();
    cpu::register_gradients(&mut gradients);
    let def = OperatorDef::new("NoOp", "", ["a", "b"], ["c"]);
    let meta = gradients
        .gradient_for_op(&def, &[GradientWrapper::dense("c_grad")])
        .unwrap();
    assert!(meta.ops.is_empty());
    assert!(meta.g_input.iter().all(GradientWrapper::is_empty));
    assert_eq!(meta.g_input.len(), 2);
}
