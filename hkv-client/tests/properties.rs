use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::executor::block_on;
use proptest::prelude::*;

use hkv_client::{
    inspect, reconcile, ClusterClient, ClusterValue, Cmd, Completion, ErrorPolicy, ExecOutcome,
    Inspection, NodeAddr, Route, SlotRange, StaticTopology, TopologySnapshot, Transaction,
    Transport, TransportError, Value, SLOT_COUNT,
};

/// Answers every command with `node/index/name`, or aborts on one node.
#[derive(Default)]
struct EchoTransport {
    abort_on: Option<NodeAddr>,
    submissions: AtomicUsize,
}

impl Transport for EchoTransport {
    async fn submit(
        &self,
        commands: &[Cmd],
        targets: &[NodeAddr],
    ) -> Result<Completion, TransportError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let replies = targets
            .iter()
            .map(|node| {
                let reply = if self.abort_on.as_ref() == Some(node) {
                    Value::Nil
                } else {
                    Value::Array(
                        commands
                            .iter()
                            .enumerate()
                            .map(|(idx, cmd)| echo(node, idx, cmd.name()))
                            .collect(),
                    )
                };
                (node.clone(), reply)
            })
            .collect();
        Ok(Completion::Replies(replies))
    }

    async fn send(
        &self,
        command: &Cmd,
        targets: &[NodeAddr],
    ) -> Result<HashMap<NodeAddr, Value>, TransportError> {
        Ok(targets
            .iter()
            .map(|node| (node.clone(), echo(node, 0, command.name())))
            .collect())
    }
}

fn echo(node: &NodeAddr, idx: usize, name: &str) -> Value {
    Value::Bulk(format!("{node}/{idx}/{name}").into_bytes())
}

/// `shards` primaries splitting the slot space evenly, one replica each.
fn cluster(shards: u16) -> TopologySnapshot {
    let width = SLOT_COUNT / shards;
    let ranges = (0..shards)
        .map(|idx| {
            let start = idx * width;
            let end = if idx == shards - 1 { SLOT_COUNT - 1 } else { start + width - 1 };
            SlotRange::new(start, end, format!("10.0.{idx}.1:6379"))
                .with_replicas([format!("10.0.{idx}.2:6379")])
        })
        .collect();
    TopologySnapshot::new(ranges).expect("topology")
}

fn client(shards: u16, transport: EchoTransport) -> ClusterClient<EchoTransport, StaticTopology> {
    ClusterClient::new(transport, StaticTopology::new(cluster(shards)))
}

fn build(commands: &[(String, String)]) -> Transaction {
    commands
        .iter()
        .fold(Transaction::new(), |tx, (name, key)| {
            tx.custom_command([name.as_str(), key.as_str()])
        })
}

fn command_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["GET", "INCR", "DEL", "TYPE"]).prop_map(String::from),
            "[a-z]{1,8}",
        ),
        0..16,
    )
}

fn single_route() -> impl Strategy<Value = Route> {
    prop_oneof![
        Just(Route::Default),
        Just(Route::Random),
        (0..SLOT_COUNT).prop_map(Route::SlotId),
        "[a-z]{1,8}".prop_map(|key| Route::SlotKey(key.into_bytes())),
    ]
}

proptest! {
    #[test]
    fn single_node_routes_yield_one_single_per_command(
        commands in command_strategy(),
        route in single_route(),
        shards in 1u16..5,
    ) {
        let client = client(shards, EchoTransport::default());
        let outcome = block_on(client.exec_routed(build(&commands), route)).unwrap();
        let results = outcome.into_completed().unwrap();
        prop_assert_eq!(results.len(), commands.len());
        for (idx, entry) in results.iter().enumerate() {
            let value = entry.single().unwrap().as_ref().unwrap();
            let text = value.as_str().unwrap();
            let suffix = format!("/{}/{}", idx, commands[idx].0);
            prop_assert!(text.ends_with(&suffix));
        }
    }

    #[test]
    fn fan_out_yields_k_values_in_stable_order(
        commands in command_strategy(),
        shards in 2u16..6,
        all_nodes in any::<bool>(),
    ) {
        let client = client(shards, EchoTransport::default());
        let snapshot = cluster(shards);
        let (route, expected) = if all_nodes {
            (Route::AllNodes, snapshot.nodes().to_vec())
        } else {
            (Route::AllPrimaries, snapshot.primaries().to_vec())
        };

        let results = block_on(client.exec_routed(build(&commands), route))
            .unwrap()
            .into_completed()
            .unwrap();
        prop_assert_eq!(results.len(), commands.len());
        for (idx, entry) in results.iter().enumerate() {
            let values = entry.multi().unwrap();
            let nodes: Vec<NodeAddr> = values.iter().map(|v| v.node.clone()).collect();
            prop_assert_eq!(&nodes, &expected);
            for tagged in values {
                prop_assert_eq!(
                    tagged.value.as_ref().unwrap(),
                    &echo(&tagged.node, idx, &commands[idx].0)
                );
            }
        }
    }

    #[test]
    fn reconciling_twice_gives_identical_results(
        items in prop::collection::vec(0i64..100, 0..12),
        shards in 1usize..5,
    ) {
        let targets: Vec<NodeAddr> = (0..shards).map(|i| NodeAddr::new(format!("n{i}:1"))).collect();
        let payload: HashMap<NodeAddr, Value> = targets
            .iter()
            .map(|node| (node.clone(), Value::Array(items.iter().map(|&i| Value::Integer(i)).collect())))
            .collect();

        let first = reconcile(&targets, payload.clone(), items.len(), ErrorPolicy::Inline).unwrap();
        let second = reconcile(&targets, payload, items.len(), ErrorPolicy::Inline).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert!(first.iter().all(|entry| entry.is_single() == (shards == 1)));
    }

    #[test]
    fn any_abort_marker_aborts_everything(
        healthy in prop::collection::vec(0i64..10, 0..6),
        aborting in 1usize..4,
    ) {
        let mut replies = HashMap::new();
        for (idx, value) in healthy.iter().enumerate() {
            replies.insert(NodeAddr::new(format!("ok{idx}:1")), Value::Array(vec![Value::Integer(*value)]));
        }
        for idx in 0..aborting {
            replies.insert(NodeAddr::new(format!("watch{idx}:1")), Value::Nil);
        }
        let verdict = inspect(Completion::Replies(replies));
        prop_assert!(
            matches!(verdict, Inspection::Aborted { node: Some(ref node) } if node.as_str() == "watch0:1"),
            "unexpected verdict: {:?}",
            verdict
        );
    }
}

#[test]
fn abort_on_one_node_aborts_fan_out() {
    let snapshot = cluster(3);
    let transport = EchoTransport {
        abort_on: Some(snapshot.primaries()[1].clone()),
        ..EchoTransport::default()
    };
    let client = client(3, transport);

    let outcome = block_on(client.exec_routed(Transaction::new().incr("n").get("n"), Route::AllPrimaries))
        .unwrap();
    assert_eq!(outcome, ExecOutcome::Aborted);
}

#[test]
fn default_route_follows_first_key() {
    let client = client(2, EchoTransport::default());
    let snapshot = cluster(2);
    // "foo" hashes to slot 12182, in the second half.
    let owner = snapshot.primary_for_slot(12182).unwrap().clone();

    let tx = Transaction::new().info().get("foo").get("bar");
    let results = block_on(client.exec(tx)).unwrap().into_completed().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[1], Ok(echo(&owner, 1, "GET")));
}

#[test]
fn empty_transaction_still_round_trips_once() {
    let client = client(2, EchoTransport::default());
    let outcome = block_on(client.exec_routed(Transaction::new(), Route::AllPrimaries)).unwrap();
    assert_eq!(outcome, ExecOutcome::Completed(Vec::new()));
    assert_eq!(client.transport().submissions.load(Ordering::SeqCst), 1);
}

#[test]
fn independent_clients_do_not_interfere() {
    let one = client(1, EchoTransport::default());
    let three = client(3, EchoTransport::default());

    let tx = || Transaction::new().ping();
    let single = block_on(one.exec_routed(tx(), Route::AllPrimaries)).unwrap();
    let multi = block_on(three.exec_routed(tx(), Route::AllPrimaries)).unwrap();

    assert!(single.completed().unwrap()[0].is_single());
    assert_eq!(multi.completed().unwrap()[0].multi().map(<[_]>::len), Some(3));
    assert_eq!(one.transport().submissions.load(Ordering::SeqCst), 1);
    assert_eq!(three.transport().submissions.load(Ordering::SeqCst), 1);
}

#[test]
fn single_command_shape_follows_route() {
    let client = client(2, EchoTransport::default());
    let one = block_on(client.custom_command(["PING"], Route::Random)).unwrap();
    assert!(matches!(one, ClusterValue::Single(_)));
    let all = block_on(client.custom_command(["PING"], Route::AllNodes)).unwrap();
    assert_eq!(all.multi().map(<[_]>::len), Some(4));
}
