mod common;

use ai_bt::nodes::{
    Arithmetic, ArithmeticOp, Compare, CompareOp, Fail, Inverter, Repeat, Selector, Sequence,
    SetVariable, Succeed, Wait, YieldOnce,
};
use ai_bt::{BehaviourTree, StackState, State, TreePrototype, TreePrototypeBuilder, VariableField};
use ai_core::{VariableData, VariableType, VariableValue};
use uuid::Uuid;

use common::{actor, count, entries, log, registry, tick, Scripted};

fn started(builder: TreePrototypeBuilder) -> BehaviourTree {
    let mut tree = BehaviourTree::new(builder.build(), actor(), registry()).unwrap();
    tree.start(&tick(0)).unwrap();
    tree
}

/// Tick until the tree stops running; returns the number of ticks taken.
fn run_to_end(tree: &mut BehaviourTree, limit: u64) -> u64 {
    for n in 1..=limit {
        if !tree.is_running() {
            return n - 1;
        }
        tree.fixed_update(&tick(n)).unwrap();
    }
    assert!(!tree.is_running(), "tree still running after {limit} ticks");
    limit
}

fn single(name: &str, node: impl ai_bt::NodeTemplate) -> TreePrototypeBuilder {
    let mut builder = TreePrototype::builder(name);
    let head = builder.node(name, node);
    builder.head(head);
    builder
}

#[test]
fn inverter_flips_its_child() {
    let mut builder = TreePrototype::builder("invert");
    let fail = builder.node("fail", Fail);
    let head = builder.node("not", Inverter::new(fail));
    builder.head(head);
    assert_eq!(started(builder).last_result(), Some(true));

    let mut builder = TreePrototype::builder("invert");
    let succeed = builder.node("succeed", Succeed);
    let head = builder.node("not", Inverter::new(succeed));
    builder.head(head);
    assert_eq!(started(builder).last_result(), Some(false));
}

#[test]
fn selector_tries_children_in_order() {
    let calls = log();
    let mut builder = TreePrototype::builder("select");
    let a = builder.node("a", Scripted::forever("a", &calls, State::Failed));
    let b = builder.node("b", Scripted::forever("b", &calls, State::Success));
    let c = builder.node("c", Scripted::forever("c", &calls, State::Success));
    let head = builder.node("select", Selector::new([a, b, c]));
    builder.head(head);

    let tree = started(builder);
    assert_eq!(tree.last_result(), Some(true));
    assert_eq!(
        entries(&calls),
        vec!["execute:a", "stop:a", "execute:b", "stop:b"]
    );
}

#[test]
fn empty_composites() {
    let tree = started(single("seq", Sequence::new(Vec::<Uuid>::new())));
    assert_eq!(tree.last_result(), Some(true));
    let tree = started(single("select", Selector::new(Vec::<Uuid>::new())));
    assert_eq!(tree.last_result(), Some(false));
}

#[test]
fn sequence_runs_every_child_on_success() {
    let calls = log();
    let mut builder = TreePrototype::builder("seq");
    let a = builder.node("a", Scripted::forever("a", &calls, State::Success));
    let b = builder.node("b", YieldOnce::default());
    let c = builder.node("c", Scripted::forever("c", &calls, State::Success));
    let head = builder.node("seq", Sequence::new([a, b, c]));
    builder.head(head);

    let mut tree = started(builder);
    assert_eq!(tree.stack_state(), StackState::WaitNextTick);
    assert_eq!(tree.current_node_name(), Some("b"));
    assert_eq!(run_to_end(&mut tree, 4), 1);
    assert_eq!(tree.last_result(), Some(true));
    assert_eq!(count(&calls, "execute:c"), 1);
}

#[test]
fn repeat_runs_one_iteration_per_tick() {
    let calls = log();
    let mut builder = TreePrototype::builder("repeat");
    let leaf = builder.node("leaf", Scripted::forever("leaf", &calls, State::Failed));
    let head = builder.node("repeat", Repeat::times(leaf, 3));
    builder.head(head);

    let mut tree = started(builder);
    assert_eq!(tree.stack_len(), 1);
    assert_eq!(run_to_end(&mut tree, 10), 2);
    // Child results do not matter.
    assert_eq!(tree.last_result(), Some(true));
    assert_eq!(count(&calls, "execute:leaf"), 3);
}

#[test]
fn repeat_zero_times_skips_the_child() {
    let calls = log();
    let mut builder = TreePrototype::builder("repeat");
    let leaf = builder.node("leaf", Scripted::forever("leaf", &calls, State::Success));
    let head = builder.node("repeat", Repeat::times(leaf, 0));
    builder.head(head);

    assert_eq!(started(builder).last_result(), Some(true));
    assert_eq!(count(&calls, "execute:leaf"), 0);
}

#[test]
fn repeat_forever_keeps_going() {
    let calls = log();
    let mut builder = TreePrototype::builder("forever");
    let leaf = builder.node("leaf", Scripted::forever("leaf", &calls, State::Success));
    let head = builder.node("repeat", Repeat::forever(leaf));
    builder.head(head);

    let mut tree = started(builder);
    for n in 1..=20 {
        tree.fixed_update(&tick(n)).unwrap();
    }
    assert!(tree.is_running());
    assert_eq!(count(&calls, "execute:leaf"), 21);
}

#[test]
fn wait_counts_tick_time() {
    let mut tree = started(single("wait", Wait::new(1.0)));
    assert!(tree.is_running());
    // 0.5s per tick: done once a full second has accumulated.
    assert_eq!(run_to_end(&mut tree, 10), 2);
    assert_eq!(tree.last_result(), Some(true));
}

#[test]
fn wait_reads_its_duration_from_a_variable() {
    let mut builder = TreePrototype::builder("wait");
    let seconds = builder.variable(VariableData::new("seconds", VariableType::Int).with_default(2));
    let head = builder.node("wait", Wait::from_field(VariableField::reference(seconds)));
    builder.head(head);

    let mut tree = started(builder);
    assert_eq!(run_to_end(&mut tree, 10), 4);
}

struct Calc {
    builder: TreePrototypeBuilder,
    result: Uuid,
}

fn calc(op: ArithmeticOp, left: VariableValue, right: VariableValue, ty: VariableType) -> Calc {
    let mut builder = TreePrototype::builder("calc");
    let result = builder.variable(VariableData::new("result", ty).with_default(-1));
    let head = builder.node(
        "calc",
        Arithmetic::new(op, left, right, VariableField::reference(result)),
    );
    builder.head(head);
    Calc { builder, result }
}

fn evaluate(calc: Calc) -> (Option<bool>, Option<VariableValue>, bool) {
    let tree = started(calc.builder);
    (
        tree.last_result(),
        tree.locals().value_of(calc.result).cloned(),
        tree.is_paused(),
    )
}

#[test]
fn integer_arithmetic_stays_integral() {
    let (result, value, _) = evaluate(calc(
        ArithmeticOp::Multiply,
        VariableValue::Int(6),
        VariableValue::Int(7),
        VariableType::Int,
    ));
    assert_eq!(result, Some(true));
    assert_eq!(value, Some(VariableValue::Int(42)));

    let (_, value, _) = evaluate(calc(
        ArithmeticOp::Divide,
        VariableValue::Int(7),
        VariableValue::Int(2),
        VariableType::Int,
    ));
    assert_eq!(value, Some(VariableValue::Int(3)));
}

#[test]
fn mixed_arithmetic_is_floating_point() {
    let (result, value, _) = evaluate(calc(
        ArithmeticOp::Divide,
        VariableValue::Int(7),
        VariableValue::Float(2.0),
        VariableType::Float,
    ));
    assert_eq!(result, Some(true));
    assert_eq!(value, Some(VariableValue::Float(3.5)));

    let (_, value, _) = evaluate(calc(
        ArithmeticOp::Subtract,
        VariableValue::Float(0.5),
        VariableValue::Int(2),
        VariableType::Float,
    ));
    assert_eq!(value, Some(VariableValue::Float(-1.5)));
}

#[test]
fn undefined_arithmetic_fails_and_leaves_the_result_alone() {
    let cases = [
        (VariableValue::Int(1), VariableValue::Int(0), VariableType::Int),
        (VariableValue::Float(1.0), VariableValue::Float(0.0), VariableType::Float),
    ];
    for (left, right, ty) in cases {
        let (result, value, paused) = evaluate(calc(ArithmeticOp::Divide, left, right, ty));
        assert_eq!(result, Some(false));
        let untouched = match ty {
            VariableType::Int => VariableValue::Int(-1),
            _ => VariableValue::Float(-1.0),
        };
        assert_eq!(value, Some(untouched));
        assert!(!paused);
    }

    let (result, value, _) = evaluate(calc(
        ArithmeticOp::Add,
        VariableValue::Int(i64::MAX),
        VariableValue::Int(1),
        VariableType::Int,
    ));
    assert_eq!(result, Some(false));
    assert_eq!(value, Some(VariableValue::Int(-1)));
}

#[test]
fn non_numeric_operand_is_a_node_error() {
    let (result, value, paused) = evaluate(calc(
        ArithmeticOp::Add,
        VariableValue::from("three"),
        VariableValue::Int(1),
        VariableType::Int,
    ));
    assert_eq!(result, None);
    assert_eq!(value, Some(VariableValue::Int(-1)));
    assert!(paused);
}

fn compare(left: VariableValue, op: CompareOp, right: VariableValue) -> Option<bool> {
    started(single("compare", Compare::new(left, op, right))).last_result()
}

#[test]
fn compare_handles_mixed_numbers_and_strings() {
    use VariableValue::{Float, Int};

    assert_eq!(compare(Int(3), CompareOp::Less, Float(3.5)), Some(true));
    assert_eq!(compare(Float(2.0), CompareOp::Equal, Int(2)), Some(true));
    assert_eq!(compare(Int(4), CompareOp::GreaterOrEqual, Int(4)), Some(true));
    assert_eq!(compare(Int(4), CompareOp::Greater, Int(4)), Some(false));
    assert_eq!(
        compare("apple".into(), CompareOp::Less, "banana".into()),
        Some(true)
    );
    assert_eq!(
        compare("apple".into(), CompareOp::NotEqual, Int(1)),
        Some(true)
    );
    // Incomparable values fail instead of faulting.
    assert_eq!(compare("apple".into(), CompareOp::Less, Int(1)), Some(false));
    assert_eq!(compare(Float(f64::NAN), CompareOp::LessOrEqual, Float(1.0)), Some(false));
}

#[test]
fn set_variable_copies_between_variables() {
    let mut builder = TreePrototype::builder("copy");
    let source =
        builder.variable(VariableData::new("source", VariableType::Float).with_default(1.5));
    let target = builder.variable(VariableData::new("target", VariableType::Float));
    let head = builder.node(
        "copy",
        SetVariable::new(
            VariableField::reference(target),
            VariableField::reference(source),
        ),
    );
    builder.head(head);

    let tree = started(builder);
    assert_eq!(tree.last_result(), Some(true));
    assert_eq!(tree.locals().value_of(target), Some(&VariableValue::Float(1.5)));
}

#[test]
fn writing_a_constant_faults() {
    let mut builder = TreePrototype::builder("constant");
    let fixed = builder.variable(
        VariableData::new("fixed", VariableType::Int)
            .with_default(3)
            .constant(),
    );
    let head = builder.node(
        "set",
        SetVariable::new(VariableField::reference(fixed), VariableField::constant(4)),
    );
    builder.head(head);

    let tree = started(builder);
    assert!(tree.is_paused());
    assert_eq!(tree.locals().value_of(fixed), Some(&VariableValue::Int(3)));
}
