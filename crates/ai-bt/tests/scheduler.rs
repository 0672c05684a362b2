mod common;

use ai_bt::nodes::{Sequence, Succeed};
use ai_bt::{
    BehaviourTree, Capability, ErrorPolicy, Node, NodeContext, NodeError, NodeRef, SchedulerError,
    StackState, State, TreeError, TreePrototype, TreeSettings,
};
use ai_bt::{BindError, Binder};
use uuid::Uuid;

use common::{actor, count, entries, log, registry, tick, Log, Scripted};

/// Pushes `child` (bound or not) and reports `state`.
#[derive(Clone)]
struct Pusher {
    child: NodeRef,
    bind_child: bool,
    state: State,
}

impl Pusher {
    fn new(child: Uuid, state: State) -> Self {
        Self {
            child: NodeRef::new(child),
            bind_child: true,
            state,
        }
    }

    fn unbound(child: Uuid) -> Self {
        Self {
            bind_child: false,
            ..Self::new(child, State::NoReturn)
        }
    }
}

impl Node for Pusher {
    fn capability(&self) -> Capability {
        Capability::Flow
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), BindError> {
        if self.bind_child {
            binder.node(&mut self.child)?;
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        ctx.push(&self.child);
        Ok(self.state)
    }
}

/// Raises from `execute`; optionally recovers in `handle_error`.
#[derive(Clone)]
struct Raising {
    recover: bool,
}

impl Node for Raising {
    fn capability(&self) -> Capability {
        Capability::Determine
    }

    fn execute(&mut self, _ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        Err(NodeError::custom("sensor offline"))
    }

    fn handle_error(&mut self, _ctx: &mut NodeContext<'_>, _error: &NodeError) -> State {
        if self.recover {
            State::Failed
        } else {
            State::Error
        }
    }
}

fn tree_with_head(
    build: impl FnOnce(&mut ai_bt::TreePrototypeBuilder) -> Uuid,
    policy: ErrorPolicy,
) -> BehaviourTree {
    let mut builder = TreePrototype::builder("scheduler");
    let head = build(&mut builder);
    builder
        .head(head)
        .settings(TreeSettings::default().with_error_policy(policy));
    BehaviourTree::new(builder.build(), actor(), registry()).unwrap()
}

/// A flow node that never pushes anything.
fn lazy(calls: &Log) -> Scripted {
    Scripted::forever("lazy", calls, State::NoReturn).with_capability(Capability::Flow)
}

#[test]
fn no_return_without_push_faults_and_pauses() {
    let calls = log();
    let mut tree = tree_with_head(
        |b| b.node("lazy", lazy(&calls)),
        ErrorPolicy::Restart,
    );

    // Contract violations pause even under the restart policy.
    tree.start(&tick(0)).unwrap();
    assert!(tree.is_paused());
    assert_eq!(tree.stack_state(), StackState::Invalid);
    assert_eq!(tree.generation(), 0);

    tree.fixed_update(&tick(1)).unwrap();
    assert_eq!(count(&calls, "execute:lazy"), 1);
}

#[test]
fn contract_violation_is_returned_under_throw() {
    let calls = log();
    let mut tree = tree_with_head(
        |b| b.node("lazy", lazy(&calls)),
        ErrorPolicy::Throw,
    );

    let err = tree.start(&tick(0)).unwrap_err();
    assert!(matches!(
        err,
        TreeError::Scheduler(SchedulerError::NoReturnWithoutPush { ref node }) if node == "lazy"
    ));
    assert!(!tree.is_running());
    assert_eq!(tree.stack_len(), 0);
    assert_eq!(count(&calls, "stop:lazy"), 1);
}

#[test]
fn waiting_from_a_non_action_node_is_illegal() {
    let calls = log();
    let mut tree = tree_with_head(
        |b| {
            b.node(
                "decider",
                Scripted::forever("decider", &calls, State::WaitAction)
                    .with_capability(Capability::Determine),
            )
        },
        ErrorPolicy::Throw,
    );

    let err = tree.start(&tick(0)).unwrap_err();
    assert!(matches!(
        err,
        TreeError::Scheduler(SchedulerError::IllegalWait { reason, .. })
            if reason == "the node is not action-capable"
    ));
}

#[test]
fn waiting_without_a_registered_action_is_illegal() {
    let calls = log();
    let mut tree = tree_with_head(
        |b| b.node("actor", Scripted::forever("actor", &calls, State::WaitAction)),
        ErrorPolicy::Throw,
    );

    let err = tree.start(&tick(0)).unwrap_err();
    assert!(matches!(
        err,
        TreeError::Scheduler(SchedulerError::IllegalWait { reason, .. })
            if reason == "no action was registered"
    ));
}

#[test]
fn pushing_and_finishing_in_one_call_is_rejected() {
    let mut tree = tree_with_head(
        |b| {
            let leaf = b.node("leaf", Succeed);
            b.node("eager", Pusher::new(leaf, State::Success))
        },
        ErrorPolicy::Throw,
    );

    let err = tree.start(&tick(0)).unwrap_err();
    assert!(matches!(
        err,
        TreeError::Scheduler(SchedulerError::UnexpectedPush { state: State::Success, .. })
    ));
}

#[test]
fn pushing_a_node_already_on_the_stack_is_rejected() {
    let outer = Uuid::new_v4();
    let mut tree = tree_with_head(
        |b| {
            let inner = b.node("inner", Pusher::new(outer, State::NoReturn));
            b.add(
                ai_bt::NodePrototype::new("outer", Pusher::new(inner, State::NoReturn))
                    .with_id(outer),
            )
        },
        ErrorPolicy::Throw,
    );

    let err = tree.start(&tick(0)).unwrap_err();
    assert!(matches!(
        err,
        TreeError::Scheduler(SchedulerError::AlreadyOnStack { ref node }) if node == "outer"
    ));
}

#[test]
fn node_error_is_routed_through_handle_error() {
    let mut recovering = tree_with_head(
        |b| b.node("sensor", Raising { recover: true }),
        ErrorPolicy::Throw,
    );
    recovering.start(&tick(0)).unwrap();
    assert_eq!(recovering.last_result(), Some(false));

    let mut failing = tree_with_head(
        |b| b.node("sensor", Raising { recover: false }),
        ErrorPolicy::Pause,
    );
    failing.start(&tick(0)).unwrap();
    assert!(failing.is_paused());
    assert_eq!(failing.stack_state(), StackState::Invalid);
}

#[test]
fn unresolved_push_is_a_missing_node() {
    let mut paused = tree_with_head(
        |b| b.node("dangling", Pusher::unbound(Uuid::new_v4())),
        ErrorPolicy::Pause,
    );
    paused.start(&tick(0)).unwrap();
    assert!(paused.is_paused());

    let mut thrown = tree_with_head(
        |b| b.node("dangling", Pusher::unbound(Uuid::new_v4())),
        ErrorPolicy::Throw,
    );
    let err = thrown.start(&tick(0)).unwrap_err();
    assert!(matches!(
        err,
        TreeError::Scheduler(SchedulerError::MissingNode { .. })
    ));
    assert!(!thrown.is_running());
}

fn nested(calls: &Log) -> BehaviourTree {
    tree_with_head(
        |b| {
            let leaf = b.node("leaf", Scripted::forever("leaf", calls, State::Yield));
            b.node("idle", Scripted::forever("idle", calls, State::Success));
            let inner = b.node("inner", Sequence::new([leaf]));
            b.node("outer", Sequence::new([inner]))
        },
        ErrorPolicy::Pause,
    )
}

#[test]
fn end_stops_every_node_once_in_lifo_order() {
    let calls = log();
    let stops = log();
    let mut builder = TreePrototype::builder("lifo");
    let leaf = builder.node("leaf", Scripted::forever("leaf", &calls, State::Yield));
    let middle = builder.node("middle", StopProbe::new("middle", &stops, leaf));
    let top = builder.node("top", StopProbe::new("top", &stops, middle));
    builder.head(top);
    let mut tree = BehaviourTree::new(builder.build(), actor(), registry()).unwrap();

    tree.start(&tick(0)).unwrap();
    assert_eq!(tree.stack_len(), 3);

    tree.end();
    tree.end();
    assert_eq!(entries(&stops), vec!["stop:middle", "stop:top"]);
    assert_eq!(count(&calls, "stop:leaf"), 1);
    assert_eq!(tree.stack_len(), 0);
    assert!(!tree.is_running());

    // An ended tree ignores ticks.
    tree.fixed_update(&tick(1)).unwrap();
    assert_eq!(count(&calls, "execute:leaf"), 1);
}

#[test]
fn break_to_unwinds_down_to_the_target() {
    let calls = log();
    let mut tree = nested(&calls);
    tree.start(&tick(0)).unwrap();
    assert_eq!(tree.stack_len(), 3);

    let find = |name: &str| {
        tree.graph()
            .iter()
            .find(|(_, slot)| slot.name() == name)
            .map(|(index, _)| index)
            .unwrap()
    };
    let leaf = find("leaf");
    let idle = find("idle");
    let inner = find("inner");

    // Not on the stack: nothing happens.
    assert!(!tree.break_to(Some(idle)));
    assert_eq!(tree.stack_len(), 3);
    assert_eq!(count(&calls, "stop:leaf"), 0);

    assert!(tree.break_to(Some(inner)));
    assert_eq!(tree.stack_len(), 2);
    assert_eq!(tree.current_node(), Some(inner));
    assert_eq!(count(&calls, "stop:leaf"), 1);
    assert_eq!(tree.stack_state(), StackState::Ready);

    // The target runs again on the next tick and pushes its child afresh.
    tree.fixed_update(&tick(1)).unwrap();
    assert_eq!(tree.current_node(), Some(leaf));
    assert_eq!(count(&calls, "execute:leaf"), 2);

    assert!(tree.break_to(None));
    assert_eq!(tree.stack_len(), 0);
    assert!(!tree.is_running());
    assert_eq!(count(&calls, "stop:leaf"), 2);
}

#[test]
fn a_finished_node_can_be_pushed_again() {
    let calls = log();
    let mut builder = TreePrototype::builder("again");
    let leaf = builder.node("leaf", Scripted::forever("leaf", &calls, State::Success));
    let repeat = builder.node("repeat", ai_bt::nodes::Repeat::times(leaf, 3));
    builder.head(repeat);
    let mut tree = BehaviourTree::new(builder.build(), actor(), registry()).unwrap();

    tree.start(&tick(0)).unwrap();
    tree.fixed_update(&tick(1)).unwrap();
    tree.fixed_update(&tick(2)).unwrap();

    assert_eq!(
        entries(&calls),
        vec![
            "execute:leaf",
            "stop:leaf",
            "execute:leaf",
            "stop:leaf",
            "execute:leaf",
            "stop:leaf",
        ]
    );
    assert_eq!(tree.last_result(), Some(true));
}

/// A flow node that logs its own `stop`.
#[derive(Clone)]
struct StopProbe {
    name: &'static str,
    log: Log,
    child: NodeRef,
}

impl StopProbe {
    fn new(name: &'static str, log: &Log, child: Uuid) -> Self {
        Self {
            name,
            log: log.clone(),
            child: NodeRef::new(child),
        }
    }
}

impl Node for StopProbe {
    fn capability(&self) -> Capability {
        Capability::Flow
    }

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), BindError> {
        binder.node(&mut self.child)
    }

    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<State, NodeError> {
        ctx.push(&self.child);
        Ok(State::NoReturn)
    }

    fn stop(&mut self) {
        self.log.lock().push(format!("stop:{}", self.name));
    }
}
