use std::sync::Arc;
use std::time::Duration;

use wallpath::adapters::inbound::{CommandBody, CommandHandler, PlanCommand, ReplyBody};
use wallpath::adapters::outbound::{InMemoryPlanStore, InMemoryWallSource, RecordingChannel};
use wallpath::application::{Dispatcher, PlanCache, PlanSource, PlanningService, PlanningSettings};
use wallpath::domains::path_planning::*;

async fn handler() -> (CommandHandler, Arc<InMemoryPlanStore>, Arc<RecordingChannel>) {
    let walls = Arc::new(InMemoryWallSource::new());
    walls
        .insert_wall(Wall::new("w1", 10.0, 10.0, vec![Obstacle::circle(5.0, 5.0, 1.0)]))
        .await;
    let store = Arc::new(InMemoryPlanStore::new());
    let cache = Arc::new(PlanCache::default());
    let channel = Arc::new(RecordingChannel::new());

    let planning = Arc::new(PlanningService::new(
        walls,
        store.clone(),
        cache.clone(),
        Arc::new(StrategyRegistry::with_defaults()),
        PlanningSettings::default(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(cache, store.clone(), channel.clone(), Duration::from_secs(30)));
    (CommandHandler::new(planning, dispatcher), store, channel)
}

#[tokio::test]
async fn test_plan_then_dispatch_over_json() {
    let (handler, store, channel) = handler().await;

    let reply = handler
        .handle_bytes(br#"{"request_id":"req-1","command":"plan","wall_id":"w1","algorithm":"astar","connectivity":"eight"}"#)
        .await;
    assert_eq!(reply.request_id.as_deref(), Some("req-1"));
    let plan = match reply.body {
        ReplyBody::Planned { plan, source } => {
            assert_eq!(source, PlanSource::Computed);
            plan
        }
        other => panic!("unexpected reply {:?}", other),
    };
    assert!(store.load(&plan.id).await.unwrap().is_some());

    let reply = handler
        .handle(PlanCommand {
            request_id: Some("req-2".to_string()),
            body: CommandBody::Dispatch {
                plan_id: plan.id.clone(),
            },
        })
        .await;
    match reply.body {
        ReplyBody::Dispatched { result } => assert_eq!(result.plan_id, plan.id),
        other => panic!("unexpected reply {:?}", other),
    }
    assert_eq!(channel.messages().await.len(), 1);

    let reply = handler
        .handle(PlanCommand {
            request_id: None,
            body: CommandBody::GetPlan { plan_id: plan.id.clone() },
        })
        .await;
    match reply.body {
        ReplyBody::Found { plan: found, source } => {
            assert_eq!(found, plan);
            assert_eq!(source, PlanSource::Cache);
        }
        other => panic!("unexpected reply {:?}", other),
    }
}

#[tokio::test]
async fn test_failures_become_error_replies() {
    let (handler, _, _) = handler().await;

    let reply = handler
        .handle_bytes(br#"{"request_id":"r","command":"plan","wall_id":"w1","algorithm":"bogus"}"#)
        .await;
    match reply.body {
        ReplyBody::Error { error } => {
            assert_eq!(error.kind, "unsupported_algorithm");
            assert!(!error.retriable);
        }
        other => panic!("unexpected reply {:?}", other),
    }

    let reply = handler.handle_bytes(br#"{"command":"get_plan","plan_id":"nope"}"#).await;
    assert!(matches!(reply.body, ReplyBody::Error { ref error } if error.kind == "plan_not_found"));

    let reply = handler.handle_bytes(b"not json").await;
    assert!(reply.request_id.is_none());
    assert!(matches!(reply.body, ReplyBody::Error { ref error } if error.kind == "serialization"));
}

#[tokio::test]
async fn test_stats_reply_counts_computations() {
    let (handler, _, _) = handler().await;
    for _ in 0..3 {
        handler
            .handle_bytes(br#"{"command":"plan","wall_id":"w1","algorithm":"dijkstra"}"#)
            .await;
    }

    let reply = handler.handle_bytes(br#"{"command":"stats"}"#).await;
    match reply.body {
        ReplyBody::Stats { stats } => {
            assert_eq!(stats.computations, 1);
            assert_eq!(stats.hits, 2);
            assert_eq!(stats.entries, 1);
        }
        other => panic!("unexpected reply {:?}", other),
    }

    let json = serde_json::to_value(handler.handle_bytes(br#"{"command":"stats"}"#).await).unwrap();
    assert_eq!(json["status"], "stats");
}
