use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use discovery_core::config::EngineConfig;
use discovery_core::error::{Error, TransportError};
use discovery_core::traits::{EngagementCapability, FetchCapability};
use discovery_core::types::{
    Difficulty, Direction, EngagementCounters, EngagementField, EntitySet, EntityType,
    FacetQueryParams, ItemKey, PageCursor, RawPage, SortMode, TimeRange,
};
use discovery_engine::{DiscoveryEngine, EnginePhase, StateStore, ViewModel, WatchStore};

struct Reply {
    delay: Duration,
    result: Result<RawPage, TransportError>,
}

/// Per-collection queue of scripted replies. An empty queue answers with an
/// empty last page.
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<HashMap<EntityType, VecDeque<Reply>>>,
    calls: Mutex<Vec<(EntityType, FacetQueryParams, PageCursor)>>,
}

impl ScriptedBackend {
    fn reply(
        &self,
        entity_type: EntityType,
        delay: Duration,
        result: Result<RawPage, TransportError>,
    ) -> &Self {
        let reply = Reply { delay, result };
        self.replies.lock().unwrap().entry(entity_type).or_default().push_back(reply);
        self
    }

    fn page(&self, entity_type: EntityType, records: Vec<Value>, last: bool) -> &Self {
        let next_token = if last { None } else { Some(format!("after-{}", records.len())) };
        let page = RawPage { records, next_token, end_of_collection: last };
        self.reply(entity_type, Duration::ZERO, Ok(page))
    }

    fn calls(&self) -> Vec<(EntityType, FacetQueryParams, PageCursor)> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_for(&self, entity_type: EntityType) -> usize {
        self.calls().iter().filter(|(t, _, _)| *t == entity_type).count()
    }
}

#[async_trait]
impl FetchCapability for ScriptedBackend {
    async fn fetch(
        &self,
        entity_type: EntityType,
        params: &FacetQueryParams,
        cursor: &PageCursor,
    ) -> Result<RawPage, TransportError> {
        self.calls.lock().unwrap().push((entity_type, params.clone(), cursor.clone()));
        let reply =
            self.replies.lock().unwrap().get_mut(&entity_type).and_then(VecDeque::pop_front);
        let Some(reply) = reply else {
            return Ok(RawPage { records: Vec::new(), next_token: None, end_of_collection: true });
        };
        tokio::time::sleep(reply.delay).await;
        reply.result
    }
}

#[derive(Default)]
struct ScriptedEngagement {
    delay: Duration,
    outcomes: Mutex<VecDeque<Result<Option<EngagementCounters>, TransportError>>>,
    calls: Mutex<Vec<(ItemKey, EngagementField, Direction)>>,
}

#[async_trait]
impl EngagementCapability for ScriptedEngagement {
    async fn submit(
        &self,
        item_key: &ItemKey,
        field: EngagementField,
        direction: Direction,
    ) -> Result<Option<EngagementCounters>, TransportError> {
        self.calls.lock().unwrap().push((item_key.clone(), field, direction));
        tokio::time::sleep(self.delay).await;
        self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

fn recipe(id: u64, name: &str, day: u32, likes: u64) -> Value {
    json!({
        "recipe_id": id,
        "name": name,
        "likes_count": likes,
        "created_at": format!("2024-05-{day:02}T10:00:00Z"),
    })
}

fn recipes(ids: std::ops::Range<u64>, name: &str) -> Vec<Value> {
    ids.map(|id| recipe(id, &format!("{name} {id}"), u32::try_from(id % 28).unwrap() + 1, id))
        .collect()
}

fn community(slug: &str) -> Value {
    json!({"slug": slug, "name": slug, "created": "2023-02-01T00:00:00Z", "member_count": 40})
}

struct Harness {
    engine: DiscoveryEngine,
    backend: Arc<ScriptedBackend>,
    engagement: Arc<ScriptedEngagement>,
    store: Arc<WatchStore>,
}

fn harness(types: EntitySet, backend: ScriptedBackend, engagement: ScriptedEngagement) -> Harness {
    let config = EngineConfig::default()
        .with_entity_types(types)
        .with_page_size(10)
        .with_fetch_timeout(Duration::from_secs(2));
    let backend = Arc::new(backend);
    let engagement = Arc::new(engagement);
    let store = Arc::new(WatchStore::new());
    let engine = DiscoveryEngine::new(backend.clone(), engagement.clone(), store.clone(), &config);
    Harness { engine, backend, engagement, store }
}

fn recipes_only() -> EntitySet {
    EntitySet::single(EntityType::Recipe)
}

fn ids(view: &ViewModel) -> Vec<String> {
    view.items.iter().map(|i| i.key().to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn typing_burst_issues_one_search_with_final_text() {
    let backend = ScriptedBackend::default();
    backend.page(EntityType::Recipe, recipes(0..3, "Pizza"), true);
    let h = harness(recipes_only(), backend, ScriptedEngagement::default());

    for text in ["p", "pi", "piz", "pizz", "pizza"] {
        h.engine.set_query(text);
        tokio::time::sleep(Duration::from_millis(120)).await;
    }
    assert!(h.backend.calls().is_empty(), "still inside the debounce window");
    h.engine.settled().await;

    let calls = h.backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.text.as_deref(), Some("pizza"));
    let view = h.engine.view();
    assert_eq!(view.phase, EnginePhase::Ready);
    assert_eq!(view.items.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn load_more_appends_second_page_without_duplicate_requests() {
    let backend = ScriptedBackend::default();
    backend.page(EntityType::Recipe, recipes(0..10, "Pizza"), false);
    backend.reply(
        EntityType::Recipe,
        Duration::from_millis(500),
        Ok(RawPage {
            records: recipes(10..20, "Pizza"),
            next_token: Some("20".into()),
            end_of_collection: false,
        }),
    );
    let h = harness(recipes_only(), backend, ScriptedEngagement::default());

    h.engine.set_query("pizza");
    h.engine.submit();
    h.engine.settled().await;
    assert!(h.engine.view().has_more);

    assert_eq!(h.engine.load_more(), 1);
    assert_eq!(h.engine.load_more(), 0, "page already in flight");
    assert!(h.engine.view().is_loading_more);
    h.engine.settled().await;

    assert_eq!(h.backend.calls_for(EntityType::Recipe), 2);
    let second_cursor = &h.backend.calls()[1].2;
    assert_eq!(second_cursor.position, 10);
    assert_eq!(second_cursor.token.as_deref(), Some("after-10"));

    let view = h.engine.view();
    let unique: HashSet<String> = ids(&view).into_iter().collect();
    assert_eq!(view.items.len(), 20);
    assert_eq!(unique.len(), 20);
    let ranks: Vec<u32> = view.items.iter().map(|i| i.source_rank).collect();
    assert_eq!(ranks, (0..20).collect::<Vec<u32>>());
    assert!(!view.is_loading_more);
}

#[tokio::test(start_paused = true)]
async fn failed_collection_does_not_hide_other_results() {
    let backend = ScriptedBackend::default();
    backend.page(EntityType::Recipe, recipes(0..5, "Pizza"), true);
    backend.reply(
        EntityType::Community,
        Duration::ZERO,
        Err(TransportError::new("502 bad gateway")),
    );
    let types = EntitySet::new([EntityType::Recipe, EntityType::Community]).unwrap();
    let h = harness(types, backend, ScriptedEngagement::default());

    h.engine.set_query("pizza");
    h.engine.submit();
    h.engine.settled().await;

    let view = h.engine.view();
    assert_eq!(view.phase, EnginePhase::Ready);
    assert_eq!(view.items.len(), 5);
    assert!(view.errors_by_entity_type.contains_key(&EntityType::Community));
    assert!(!view.errors_by_entity_type.contains_key(&EntityType::Recipe));

    // The failed collection is retried from its first page and appended.
    h.backend.page(EntityType::Community, vec![community("pizza-makers")], true);
    assert_eq!(h.engine.retry(), 1);
    h.engine.settled().await;
    let view = h.engine.view();
    assert!(view.errors_by_entity_type.is_empty());
    assert_eq!(view.items.len(), 6);
    assert!(h.backend.calls().last().is_some_and(|(_, _, cursor)| cursor.is_first_page()));
}

#[tokio::test(start_paused = true)]
async fn timed_out_fetch_keeps_cursor_for_retry() {
    let backend = ScriptedBackend::default();
    backend.page(EntityType::Recipe, recipes(0..10, "Soup"), false);
    backend.reply(EntityType::Recipe, Duration::from_secs(30), Ok(RawPage::default()));
    backend.page(EntityType::Recipe, recipes(10..12, "Soup"), true);
    let h = harness(recipes_only(), backend, ScriptedEngagement::default());

    h.engine.set_query("soup");
    h.engine.submit();
    h.engine.settled().await;
    h.engine.load_more();
    h.engine.settled().await;

    let view = h.engine.view();
    assert!(view.errors_by_entity_type[&EntityType::Recipe].is_timeout());
    assert_eq!(view.items.len(), 10);

    assert_eq!(h.engine.retry(), 1);
    h.engine.settled().await;
    let calls = h.backend.calls();
    assert_eq!(calls[1].2, calls[2].2, "retry reuses the cursor that timed out");
    let view = h.engine.view();
    assert_eq!(view.items.len(), 12);
    assert!(!view.has_more);
}

#[tokio::test(start_paused = true)]
async fn results_of_superseded_search_are_discarded() {
    let backend = ScriptedBackend::default();
    backend.reply(
        EntityType::Recipe,
        Duration::from_secs(1),
        Ok(RawPage { records: recipes(0..4, "Soup"), next_token: None, end_of_collection: true }),
    );
    backend.page(EntityType::Recipe, recipes(50..52, "Pizza"), true);
    let h = harness(recipes_only(), backend, ScriptedEngagement::default());

    h.engine.set_query("soup");
    h.engine.submit();
    h.engine.set_query("pizza");
    h.engine.submit();
    h.engine.settled().await;

    assert_eq!(h.backend.calls().len(), 2);
    let view = h.engine.view();
    assert_eq!(ids(&view), vec!["recipe:50", "recipe:51"]);
    assert_eq!(view.facets.query_text(), "pizza");
}

#[tokio::test(start_paused = true)]
async fn sort_change_reorders_without_fetching() {
    let backend = ScriptedBackend::default();
    backend.page(
        EntityType::Recipe,
        vec![
            recipe(1, "Old pizza", 1, 90),
            recipe(2, "New pizza", 20, 5),
            recipe(3, "Mid pizza", 10, 40),
        ],
        true,
    );
    let h = harness(recipes_only(), backend, ScriptedEngagement::default());
    h.engine.set_query("pizza");
    h.engine.settled().await;

    h.engine.set_sort_mode(SortMode::Newest);
    h.engine.settled().await;
    assert_eq!(ids(&h.engine.view()), vec!["recipe:2", "recipe:3", "recipe:1"]);

    h.engine.set_sort_mode(SortMode::Popular);
    h.engine.settled().await;
    assert_eq!(ids(&h.engine.view()), vec!["recipe:1", "recipe:3", "recipe:2"]);
    assert_eq!(h.backend.calls().len(), 1);
    assert_eq!(h.store.latest(), h.engine.view());
}

#[tokio::test(start_paused = true)]
async fn clearing_the_query_goes_idle_without_fetching() {
    let backend = ScriptedBackend::default();
    backend.page(EntityType::Recipe, recipes(0..3, "Pizza"), true);
    let h = harness(recipes_only(), backend, ScriptedEngagement::default());
    h.engine.set_query("pizza");
    h.engine.settled().await;
    assert_eq!(h.engine.view().items.len(), 3);

    h.engine.set_query("   ");
    h.engine.settled().await;
    let view = h.engine.view();
    assert_eq!(view.phase, EnginePhase::Idle);
    assert!(view.items.is_empty());
    assert!(!view.has_more);
    assert_eq!(h.backend.calls().len(), 1);
    assert_eq!(h.engine.load_more(), 0);
}

#[tokio::test(start_paused = true)]
async fn second_like_while_pending_conflicts() {
    let backend = ScriptedBackend::default();
    backend.page(EntityType::Recipe, vec![recipe(7, "Pizza", 3, 10)], true);
    let engagement =
        ScriptedEngagement { delay: Duration::from_millis(200), ..ScriptedEngagement::default() };
    let h = harness(recipes_only(), backend, engagement);
    h.engine.set_query("pizza");
    h.engine.settled().await;

    let key = ItemKey::new(EntityType::Recipe, "7");
    h.engine.like(&key).expect("first like");
    assert!(matches!(h.engine.like(&key), Err(Error::Conflict { .. })));
    assert!(matches!(h.engine.unlike(&key), Err(Error::Conflict { .. })));
    let view = h.engine.view();
    assert_eq!(view.item(&key).map(|i| (i.counters.likes, i.viewer.liked)), Some((11, true)));

    h.engine.settled().await;
    assert_eq!(h.engagement.calls.lock().unwrap().len(), 1);
    assert_eq!(h.engine.view().item(&key).map(|i| i.counters.likes), Some(11));
    assert!(matches!(h.engine.like(&key), Err(Error::Redundant { .. })));
}

#[tokio::test(start_paused = true)]
async fn rejected_follow_rolls_back_and_reports_item_error() {
    let backend = ScriptedBackend::default();
    backend.page(EntityType::Community, vec![community("pizza-makers")], true);
    let engagement = ScriptedEngagement::default();
    engagement.outcomes.lock().unwrap().push_back(Err(TransportError::new("403 forbidden")));
    engagement
        .outcomes
        .lock()
        .unwrap()
        .push_back(Ok(Some(EngagementCounters { members: 77, ..EngagementCounters::default() })));
    let h = harness(EntitySet::single(EntityType::Community), backend, engagement);
    h.engine.set_query("pizza");
    h.engine.settled().await;

    let key = ItemKey::new(EntityType::Community, "pizza-makers");
    h.engine.follow(&key).expect("follow");
    assert_eq!(h.engine.view().item(&key).map(|i| i.counters.members), Some(41));
    h.engine.settled().await;
    let view = h.engine.view();
    assert_eq!(
        view.item(&key).map(|i| (i.counters.members, i.viewer.following)),
        Some((40, false))
    );
    assert_eq!(view.item_errors.get(&key).map(String::as_str), Some("403 forbidden"));

    h.engine.follow(&key).expect("follow again");
    h.engine.settled().await;
    let view = h.engine.view();
    assert_eq!(
        view.item(&key).map(|i| (i.counters.members, i.viewer.following)),
        Some((77, true))
    );
    assert!(view.item_errors.is_empty());
    assert!(matches!(h.engine.like(&key), Err(Error::Unsupported { .. })));
}

#[tokio::test(start_paused = true)]
async fn pending_like_survives_a_new_search() {
    let backend = ScriptedBackend::default();
    backend.page(EntityType::Recipe, vec![recipe(7, "Pizza", 3, 10)], true);
    backend.page(
        EntityType::Recipe,
        vec![recipe(7, "Pizza", 3, 10), recipe(8, "Pizza bianca", 4, 2)],
        true,
    );
    let engagement =
        ScriptedEngagement { delay: Duration::from_secs(1), ..ScriptedEngagement::default() };
    let h = harness(recipes_only(), backend, engagement);
    h.engine.set_query("pizza");
    h.engine.settled().await;

    let key = ItemKey::new(EntityType::Recipe, "7");
    h.engine.like(&key).expect("like");
    h.engine.set_query("pizza b");
    h.engine.submit();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let view = h.engine.view();
    assert_eq!(view.items.len(), 2, "fresh results merged before the like settled");
    assert_eq!(view.item(&key).map(|i| (i.counters.likes, i.viewer.liked)), Some((11, true)));
    h.engine.settled().await;
    assert_eq!(h.engine.view().item(&key).map(|i| i.counters.likes), Some(11));
}

#[tokio::test(start_paused = true)]
async fn facet_controls_without_text_schedule_a_search() {
    let backend = ScriptedBackend::default();
    backend.page(EntityType::Recipe, recipes(0..2, "Salad"), true);
    backend.page(EntityType::Recipe, recipes(5..6, "Salad"), true);
    let h = harness(recipes_only(), backend, ScriptedEngagement::default());

    h.engine.toggle_tag("vegan");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.backend.calls().is_empty(), "tag change is debounced");
    h.engine.settled().await;

    let calls = h.backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.text, None);
    assert_eq!(calls[0].1.tags, vec!["vegan".to_string()]);
    let view = h.engine.view();
    assert_eq!(view.phase, EnginePhase::Ready);
    assert_eq!(view.items.len(), 2);

    h.engine.set_difficulty(Some(Difficulty::Easy));
    h.engine.set_time_range(Some(TimeRange::Under30));
    h.engine.settled().await;

    let calls = h.backend.calls();
    assert_eq!(calls.len(), 2, "both changes land in one search");
    let params = &calls[1].1;
    assert_eq!(params.tags, vec!["vegan".to_string()]);
    assert_eq!(params.difficulty, Some(Difficulty::Easy));
    assert_eq!(params.time_range, Some(TimeRange::Under30));
    assert_eq!(ids(&h.engine.view()), vec!["recipe:5"]);
}

#[tokio::test(start_paused = true)]
async fn sort_change_while_search_is_pending_reorders_at_once() {
    let backend = ScriptedBackend::default();
    backend.page(
        EntityType::Recipe,
        vec![
            recipe(1, "Old pizza", 1, 90),
            recipe(2, "New pizza", 20, 5),
            recipe(3, "Mid pizza", 10, 40),
        ],
        true,
    );
    let h = harness(recipes_only(), backend, ScriptedEngagement::default());
    h.engine.set_query("pizza");
    h.engine.settled().await;

    h.engine.set_query("pizza dough");
    h.engine.set_sort_mode(SortMode::Newest);
    let view = h.engine.view();
    assert_eq!(ids(&view), vec!["recipe:2", "recipe:3", "recipe:1"]);
    assert_eq!(h.store.latest(), view);
    assert_eq!(h.backend.calls().len(), 1, "new search still debounced");
}

#[tokio::test(start_paused = true)]
async fn load_more_page_of_superseded_search_is_discarded() {
    let backend = ScriptedBackend::default();
    backend.page(EntityType::Recipe, recipes(0..10, "Soup"), false);
    backend.reply(
        EntityType::Recipe,
        Duration::from_secs(1),
        Ok(RawPage { records: recipes(10..20, "Soup"), next_token: None, end_of_collection: true }),
    );
    backend.page(EntityType::Recipe, recipes(50..52, "Pizza"), true);
    let h = harness(recipes_only(), backend, ScriptedEngagement::default());

    h.engine.set_query("soup");
    h.engine.submit();
    h.engine.settled().await;
    assert_eq!(h.engine.load_more(), 1);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.backend.calls().len(), 2, "second soup page requested");

    h.engine.set_query("pizza");
    h.engine.submit();
    h.engine.settled().await;

    assert_eq!(h.backend.calls().len(), 3);
    let view = h.engine.view();
    assert_eq!(ids(&view), vec!["recipe:50", "recipe:51"]);
    assert!(!view.is_loading_more);
    assert!(!view.has_more);
}

#[tokio::test(start_paused = true)]
async fn engagement_slower_than_timeout_rolls_back() {
    let backend = ScriptedBackend::default();
    backend.page(EntityType::Recipe, vec![recipe(7, "Pizza", 3, 10)], true);
    let engagement =
        ScriptedEngagement { delay: Duration::from_secs(5), ..ScriptedEngagement::default() };
    let h = harness(recipes_only(), backend, engagement);
    h.engine.set_query("pizza");
    h.engine.settled().await;

    let key = ItemKey::new(EntityType::Recipe, "7");
    h.engine.like(&key).expect("like");
    assert_eq!(h.engine.view().item(&key).map(|i| i.counters.likes), Some(11));
    h.engine.settled().await;

    let view = h.engine.view();
    assert_eq!(view.item(&key).map(|i| (i.counters.likes, i.viewer.liked)), Some((10, false)));
    let error = view.item_errors.get(&key).expect("timeout recorded");
    assert!(error.starts_with("timed out"), "{error}");
    assert_eq!(h.engagement.calls.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn item_errors_leave_with_their_items() {
    let backend = ScriptedBackend::default();
    backend.page(EntityType::Recipe, vec![recipe(7, "Pizza", 3, 10)], true);
    backend.page(EntityType::Recipe, vec![recipe(7, "Pizza", 3, 10)], true);
    backend.page(EntityType::Recipe, vec![recipe(8, "Pizza bianca", 4, 2)], true);
    let engagement = ScriptedEngagement::default();
    for _ in 0..2 {
        engagement.outcomes.lock().unwrap().push_back(Err(TransportError::new("500 oops")));
    }
    let h = harness(recipes_only(), backend, engagement);
    h.engine.set_query("pizza");
    h.engine.settled().await;

    let key = ItemKey::new(EntityType::Recipe, "7");
    h.engine.like(&key).expect("like");
    h.engine.settled().await;
    assert!(h.engine.view().item_errors.contains_key(&key));

    // Still presented after a refresh, so the error stays.
    h.engine.submit();
    h.engine.settled().await;
    assert!(h.engine.view().item_errors.contains_key(&key));

    h.engine.set_query("pizza bianca");
    h.engine.settled().await;
    let view = h.engine.view();
    assert_eq!(ids(&view), vec!["recipe:8"]);
    assert!(view.item_errors.is_empty());

    let key = ItemKey::new(EntityType::Recipe, "8");
    h.engine.like(&key).expect("like");
    h.engine.settled().await;
    assert!(h.engine.view().item_errors.contains_key(&key));
    h.engine.set_query("");
    h.engine.settled().await;
    assert!(h.engine.view().item_errors.is_empty());
}

#[tokio::test(start_paused = true)]
async fn server_counters_do_not_break_popular_order_on_load_more() {
    let backend = ScriptedBackend::default();
    let first: Vec<Value> = (0..10).map(|i| recipe(i, "Pizza", 1, 50 - i)).collect();
    backend.page(EntityType::Recipe, first, false);
    backend.page(EntityType::Recipe, vec![recipe(99, "Pizza late", 1, 45)], true);
    let engagement = ScriptedEngagement::default();
    engagement
        .outcomes
        .lock()
        .unwrap()
        .push_back(Ok(Some(EngagementCounters { likes: 500, ..EngagementCounters::default() })));
    let h = harness(recipes_only(), backend, engagement);
    h.engine.set_sort_mode(SortMode::Popular);
    h.engine.set_query("pizza");
    h.engine.settled().await;

    h.engine.like(&ItemKey::new(EntityType::Recipe, "9")).expect("like");
    h.engine.settled().await;
    assert_eq!(h.engine.load_more(), 1);
    h.engine.settled().await;

    let view = h.engine.view();
    let popularity: Vec<u64> = view.items.iter().map(|i| i.counters.popularity()).collect();
    assert_eq!(popularity, vec![500, 50, 49, 48, 47, 46, 45, 45, 44, 43, 42]);
    assert_eq!(view.items[0].id, "9");
    // Equal popularity falls back to source rank.
    assert_eq!(view.items[7].id, "99");
}

struct CountingStore {
    published: Mutex<Vec<ViewModel>>,
}

impl StateStore for CountingStore {
    fn publish(&self, view: &ViewModel) {
        self.published.lock().unwrap().push(view.clone());
    }
}

#[tokio::test(start_paused = true)]
async fn partially_settled_search_is_never_published() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.page(EntityType::Recipe, recipes(0..3, "Pizza"), true);
    backend.reply(
        EntityType::User,
        Duration::from_millis(400),
        Ok(RawPage {
            records: vec![json!({"username": "pizza_pat", "joined_at": "2022-01-01T00:00:00Z"})],
            next_token: None,
            end_of_collection: true,
        }),
    );
    let store = Arc::new(CountingStore { published: Mutex::new(Vec::new()) });
    let types = EntitySet::new([EntityType::Recipe, EntityType::User]).unwrap();
    let config = EngineConfig::default().with_entity_types(types);
    let engagement = Arc::new(ScriptedEngagement::default());
    let engine = DiscoveryEngine::new(backend.clone(), engagement, store.clone(), &config);

    engine.set_query("pizza");
    engine.settled().await;

    let published = store.published.lock().unwrap();
    for view in published.iter().filter(|v| v.is_searching) {
        assert!(view.items.is_empty(), "recipes shown before users answered");
    }
    let last = published.last().expect("published");
    assert_eq!(last.items.len(), 4);
    assert_eq!(last.phase, EnginePhase::Ready);
}
