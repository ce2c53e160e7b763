//! End-to-end resolution behaviour of the engine.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use redirects::content::NodeTable;
use redirects::model::{Destination, RedirectRule, RootNodeId, RuleDraft};
use redirects::routing::{normalize, MatchKind, ResolutionEngine};
use redirects::store::{MemoryRepository, RuleRepository};

mod common;

use common::{engine, rule, FakeResolver};

fn url_rule(path: &str, target: &str) -> RedirectRule {
    RedirectRule::new(RuleDraft::new(path, Destination::for_url(target)).permanent(true)).unwrap()
}

#[test]
fn test_normalization_is_idempotent() {
    let inputs = [
        ("/About-Us/", ""),
        ("about-us", ""),
        ("https://example.com/about%2Dus?x=1#top", ""),
        ("  /a//b///  ", "q=1 "),
        ("/%2541", ""),
        ("/", ""),
    ];
    for (path, query) in inputs {
        let once = normalize(path, query);
        let twice = normalize(&once.path, &once.query);
        assert_eq!(once, twice, "input {:?}", (path, query));
    }
}

#[tokio::test]
async fn test_equivalent_paths_hit_the_same_rule() {
    let rule = url_rule("/About-Us", "https://example.com/company");
    let id = rule.id();
    let engine = engine(Arc::new(NodeTable::new()), vec![rule]);

    for path in [
        "/about-us",
        "/ABOUT-US/",
        "about-us",
        "/about%2Dus",
        "https://old.example.com/about-us",
        "/about-us#team",
    ] {
        let hit = engine.resolve(None, path, "").await;
        assert_eq!(hit.map(|r| r.rule_id), Some(id), "path {path}");
    }
}

#[tokio::test]
async fn test_root_scoped_rule_beats_global() {
    let global = url_rule("/sale", "/global-sale");
    let scoped = RedirectRule::new(
        RuleDraft::new("/sale", Destination::for_url("/site-sale")).root(RootNodeId(1050)),
    )
    .unwrap();
    let engine = engine(Arc::new(NodeTable::new()), vec![global, scoped]);

    let url = |root: Option<i32>| {
        let engine = Arc::clone(&engine);
        async move {
            engine
                .resolve(root.map(RootNodeId), "/sale", "")
                .await
                .map(|r| r.url)
        }
    };
    assert_eq!(url(Some(1050)).await.as_deref(), Some("/site-sale"));
    assert_eq!(url(Some(2000)).await.as_deref(), Some("/global-sale"));
    assert_eq!(url(None).await.as_deref(), Some("/global-sale"));
}

#[tokio::test]
async fn test_query_specific_rule_beats_agnostic() {
    let specific = RedirectRule::new(
        RuleDraft::new("/product", Destination::for_url("/product-one")).query("id=1"),
    )
    .unwrap();
    let agnostic = url_rule("/product", "/products");
    let global_specific = RedirectRule::new(
        RuleDraft::new("/list", Destination::for_url("/global-list")).query("page=2"),
    )
    .unwrap();
    let scoped_agnostic = RedirectRule::new(
        RuleDraft::new("/list", Destination::for_url("/site-list")).root(RootNodeId(7)),
    )
    .unwrap();
    let engine = engine(
        Arc::new(NodeTable::new()),
        vec![specific, agnostic, global_specific, scoped_agnostic],
    );

    let hit = |path: &'static str, query: &'static str, root: Option<i32>| {
        let engine = Arc::clone(&engine);
        async move {
            engine
                .resolve(root.map(RootNodeId), path, query)
                .await
                .map(|r| r.url)
        }
    };
    assert_eq!(hit("/product", "id=1", None).await.as_deref(), Some("/product-one"));
    assert_eq!(hit("/product?id=1", "", None).await.as_deref(), Some("/product-one"));
    assert_eq!(hit("/product", "id=2", None).await.as_deref(), Some("/products"));
    assert_eq!(hit("/product", "", None).await.as_deref(), Some("/products"));

    // Root scope outranks query specificity.
    assert_eq!(hit("/list", "page=2", Some(7)).await.as_deref(), Some("/site-list"));
    assert_eq!(hit("/list", "page=2", None).await.as_deref(), Some("/global-list"));
}

#[tokio::test]
async fn test_patterns_apply_oldest_first_after_exact() {
    let newer = rule(json!({
        "path": "^/blog/",
        "isPattern": true,
        "permanent": true,
        "destination": { "url": "/news" },
        "createdUtc": "2021-06-01T00:00:00Z"
    }));
    let older = rule(json!({
        "path": "^/blog/2019/",
        "isPattern": true,
        "permanent": true,
        "destination": { "url": "/archive" },
        "createdUtc": "2020-06-01T00:00:00Z"
    }));
    let exact = url_rule("/blog/2019/launch", "/launch");
    let engine = engine(Arc::new(NodeTable::new()), vec![newer, older, exact]);

    let hit = engine.resolve(None, "/blog/2019/other", "").await.unwrap();
    assert_eq!(hit.url, "/archive");
    assert_eq!(hit.matched, MatchKind::Pattern);

    let hit = engine.resolve(None, "/blog/2022/post", "").await.unwrap();
    assert_eq!(hit.url, "/news");

    let hit = engine.resolve(None, "/blog/2019/launch", "").await.unwrap();
    assert_eq!(hit.url, "/launch");
    assert_eq!(hit.matched, MatchKind::Exact);
}

#[tokio::test]
async fn test_unresolvable_destinations_fall_through() {
    let resolver = Arc::new(
        FakeResolver::default()
            .with_node(30, "/node-thirty")
            .failing(20)
            .hanging(40),
    );
    let missing = rule(json!({
        "path": "/moved",
        "destination": { "url": "/cached-ten", "content": { "id": 10 } },
        "createdUtc": "2020-01-01T00:00:00Z"
    }));
    let failing = rule(json!({
        "path": "^/moved",
        "isPattern": true,
        "destination": { "url": "/cached-twenty", "content": { "id": 20 } },
        "createdUtc": "2020-01-02T00:00:00Z"
    }));
    let hanging = rule(json!({
        "path": "^/mov",
        "isPattern": true,
        "destination": { "url": "/cached-forty", "media": { "id": 40 } },
        "createdUtc": "2020-01-03T00:00:00Z"
    }));
    let working = rule(json!({
        "path": "^/m",
        "isPattern": true,
        "destination": { "url": "/cached-thirty", "content": { "id": 30 } },
        "createdUtc": "2020-01-04T00:00:00Z"
    }));

    let engine = engine(resolver.clone(), vec![missing, failing, hanging, working]);
    let hit = engine.resolve(None, "/moved", "").await.unwrap();
    assert_eq!(hit.url, "/node-thirty");
    assert_eq!(resolver.calls(), 4);

    // Nothing left to fall back on.
    let only_missing = rule(json!({
        "path": "/gone",
        "destination": { "url": "/cached", "content": { "id": 99 } }
    }));
    let engine = common::engine(Arc::new(FakeResolver::default()), vec![only_missing]);
    assert_eq!(engine.resolve(None, "/gone", "").await, None);
}

#[tokio::test]
async fn test_stored_rule_with_invalid_destination_is_skipped() {
    let broken = rule(json!({
        "path": "/broken",
        "destination": { "url": "" }
    }));
    assert!(!broken.is_valid());
    let engine = engine(Arc::new(NodeTable::new()), vec![broken]);
    assert_eq!(engine.resolve(None, "/broken", "").await, None);
}

#[tokio::test]
async fn test_json_round_trip_and_legacy_link() {
    let canonical = rule(json!({
        "id": "7d444840-9dc0-11d1-b245-5ffdce74fad2",
        "rootNodeId": 1050,
        "path": "/old-page",
        "queryString": "a=1",
        "isPattern": false,
        "permanent": false,
        "destination": { "url": "/new-page", "name": "New page", "content": { "id": 1234 } },
        "forwardQueryString": true,
        "createdUtc": "2019-03-01T10:00:00Z",
        "updatedUtc": "2019-03-02T10:00:00Z"
    }));

    let text = serde_json::to_string(&canonical).unwrap();
    let back: RedirectRule = serde_json::from_str(&text).unwrap();
    assert_eq!(back, canonical);

    let legacy = rule(json!({
        "id": "7d444840-9dc0-11d1-b245-5ffdce74fad2",
        "rootId": 1050,
        "url": "/old-page",
        "queryString": "a=1",
        "isRegex": false,
        "isPermanent": false,
        "link": { "id": 1234, "name": "New page", "url": "/new-page", "mode": "content" },
        "forward": true,
        "created": "2019-03-01T10:00:00Z",
        "updated": "2019-03-02T10:00:00Z"
    }));
    assert_eq!(legacy, canonical);

    let resolver = Arc::new(FakeResolver::default().with_node(1234, "/new-page-moved"));
    let engine = engine(resolver, vec![legacy]);
    let hit = engine
        .resolve(Some(RootNodeId(1050)), "/Old-Page/", "a=1")
        .await
        .unwrap();
    // The matched query is consumed, not forwarded.
    assert_eq!(hit.url, "/new-page-moved");
    assert_eq!(hit.status_code, 302);
    assert!(hit.forward_query);
}

#[tokio::test]
async fn test_forward_query_composition() {
    let plain = RedirectRule::new(
        RuleDraft::new("/a", Destination::for_url("https://x/y")).forward_query(),
    )
    .unwrap();
    let with_query = RedirectRule::new(
        RuleDraft::new("/b", Destination::for_url("https://x/y?z=1")).forward_query(),
    )
    .unwrap();
    let engine = engine(Arc::new(NodeTable::new()), vec![plain, with_query]);

    let a = engine.resolve(None, "/a", "ref=42").await.unwrap();
    assert_eq!(a.url, "https://x/y?ref=42");
    let b = engine.resolve(None, "/b?ref=42", "").await.unwrap();
    assert_eq!(b.url, "https://x/y?z=1&ref=42");
    let none = engine.resolve(None, "/a", "").await.unwrap();
    assert_eq!(none.url, "https://x/y");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_index_swap_is_atomic_under_concurrent_resolution() {
    const PATHS: usize = 10;
    let rule_set = |version: usize| -> Vec<RedirectRule> {
        (0..PATHS)
            .map(|i| url_rule(&format!("/r{i}"), &format!("/v{version}")))
            .collect()
    };

    let engine = Arc::new(ResolutionEngine::new(Arc::new(NodeTable::new())));
    engine.load_rules(rule_set(0));

    let mut readers = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        readers.push(tokio::spawn(async move {
            for _ in 0..500 {
                // Every rule in one snapshot comes from the same version.
                let index = engine.snapshot();
                let targets: Vec<String> = (0..PATHS)
                    .map(|i| {
                        let path = format!("/r{i}");
                        let target = index
                            .candidates(None, &path, "")
                            .next()
                            .map(|c| c.rule().destination().url().to_string())
                            .unwrap_or_default();
                        target
                    })
                    .collect();
                assert!(targets.iter().all(|t| t == &targets[0]), "torn index: {targets:?}");
                assert!(!targets[0].is_empty());

                assert!(engine.resolve(None, "/r3", "").await.is_some());
                tokio::task::yield_now().await;
            }
        }));
    }

    let writer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for version in 1..=100 {
                engine.load_rules(rule_set(version));
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    let hit = engine.resolve(None, "/r0", "").await.unwrap();
    assert_eq!(hit.url, "/v100");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rebuilds_converge() {
    let repo = Arc::new(MemoryRepository::new());
    let engine = Arc::new(ResolutionEngine::new(Arc::new(NodeTable::new())));

    let mut tasks = Vec::new();
    for i in 0..20 {
        let repo = Arc::clone(&repo);
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            repo.create(RuleDraft::new(format!("/p{i}"), Destination::for_url("/t")))
                .unwrap();
            engine.rebuild(repo.as_ref()).await.unwrap();
            // The caller's own change is visible once rebuild returns.
            assert!(engine.resolve(None, &format!("/p{i}"), "").await.is_some());
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(engine.snapshot().stats().exact_rules, 20);
    assert!(engine.generation() <= 20);
}

#[tokio::test]
async fn test_rebuild_loop_follows_repository() {
    let repo = Arc::new(MemoryRepository::new());
    let engine = Arc::new(ResolutionEngine::new(Arc::new(NodeTable::new())));
    let shutdown = redirects::Shutdown::new();

    let task = tokio::spawn(Arc::clone(&engine).run_rebuilds(
        Arc::clone(&repo) as Arc<dyn RuleRepository>,
        shutdown.subscribe(),
    ));

    repo.create(RuleDraft::new("/later", Destination::for_url("/now")))
        .unwrap();

    let found = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if engine.resolve(None, "/later", "").await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(found.is_ok(), "rebuild loop did not pick up the new rule");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("rebuild loop did not stop")
        .unwrap();
}
