//! End-to-end debrief turns against a scripted backend

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cockpit_logbook::session::Role;
use cockpit_logbook::{
    AttemptError, CompletionBackend, CompletionClient, CompletionRequest, ConversationSession,
    DraftRecord, JsonlLogbook, LogbookStore, ModelEndpoint, Phase, RetryPolicy, Tag,
    TagMergePolicy, TurnError, TurnStage, TurnStatus,
};
use chrono::NaiveDate;

type Script = VecDeque<Result<String, AttemptError>>;

struct ScriptedBackend {
    scripts: Mutex<HashMap<String, Script>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedBackend {
    fn new(scripts: Vec<(&str, Vec<Result<String, AttemptError>>)>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(
                scripts
                    .into_iter()
                    .map(|(model, script)| (model.to_string(), script.into()))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// (model, prompt) for every attempt made
    fn attempts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, AttemptError> {
        let model = request.endpoint.model.clone();
        self.prompts
            .lock()
            .unwrap()
            .push((model.clone(), request.prompt.to_string()));
        self.scripts
            .lock()
            .unwrap()
            .get_mut(&model)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(AttemptError::Transport("script exhausted".into())))
    }

    fn provider_name(&self) -> &str {
        "Scripted"
    }
}

fn ok(text: &str) -> Result<String, AttemptError> {
    Ok(text.to_string())
}

fn busy() -> Result<String, AttemptError> {
    Err(AttemptError::Busy { status: 503 })
}

fn client(backend: Arc<ScriptedBackend>) -> CompletionClient {
    CompletionClient::new(
        backend,
        vec![ModelEndpoint::new("primary"), ModelEndpoint::new("secondary")],
        RetryPolicy {
            delay_ms: 0,
            ..RetryPolicy::default()
        },
        Duration::from_secs(5),
    )
    .unwrap()
}

/// Session whose draft already holds an approach debrief
async fn seeded_session() -> ConversationSession {
    let backend = ScriptedBackend::new(vec![(
        "primary",
        vec![ok(r#"Noted.||JSON_START||{"phase":"Approach","tags":["WM"],"location":"ITM","summary":"- late descent"}"#)],
    )]);
    let mut session = ConversationSession::default();
    session
        .handle_turn(&client(backend), "Descent was late into ITM")
        .await
        .unwrap();
    session
}

#[tokio::test]
async fn scenario_a_unknown_tag_dropped_rest_merged() {
    let backend = ScriptedBackend::new(vec![(
        "primary",
        vec![ok(r#"Got it.||JSON_START||{"phase":"Landing","tags":["SA","BOGUS"],"location":"HND","summary":"- crosswind landing"}"#)],
    )]);
    let mut session = ConversationSession::default();

    let outcome = session
        .handle_turn(&client(backend), "Crosswind landing at HND")
        .await
        .unwrap();

    assert_eq!(outcome.reply, "Got it.");
    assert_eq!(outcome.status, TurnStatus::Extracted);
    assert_eq!(outcome.model, "primary");
    assert_eq!(outcome.draft.phase, Phase::Landing);
    assert_eq!(outcome.draft.tags, BTreeSet::from([Tag::Sa]));
    assert_eq!(outcome.draft.location, "HND");
    assert_eq!(outcome.draft.summary, "- crosswind landing");
    assert_eq!(session.draft(), &outcome.draft);
    assert_eq!(session.stage(), TurnStage::Idle);
}

#[tokio::test]
async fn scenario_b_no_delimiter_is_reply_only() {
    let mut session = seeded_session().await;
    let before = session.draft().clone();

    let backend = ScriptedBackend::new(vec![("primary", vec![ok("Say again your altitude?")])]);
    let outcome = session
        .handle_turn(&client(backend), "We were high")
        .await
        .unwrap();

    assert_eq!(outcome.reply, "Say again your altitude?");
    assert_eq!(outcome.status, TurnStatus::ReplyOnly);
    assert_eq!(session.draft(), &before);
}

#[tokio::test]
async fn scenario_c_malformed_payload_keeps_reply() {
    let mut session = seeded_session().await;
    let before = session.draft().clone();

    let backend = ScriptedBackend::new(vec![(
        "primary",
        vec![ok(r#"Copy that.||JSON_START||{"phase": "Landing", tags: [}"#)],
    )]);
    let outcome = session
        .handle_turn(&client(backend), "Then we landed")
        .await
        .unwrap();

    assert_eq!(outcome.reply, "Copy that.");
    assert_eq!(outcome.status, TurnStatus::MalformedPayload);
    assert_eq!(session.draft(), &before);

    let last = session.messages().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "Copy that.");
}

#[tokio::test]
async fn scenario_d_busy_primary_falls_back_to_secondary() {
    let reply = r#"Roger.||JSON_START||{"phase":"Taxi","location":"CTS"}"#;
    let backend = ScriptedBackend::new(vec![
        ("primary", vec![busy(), busy(), busy()]),
        ("secondary", vec![ok(reply)]),
    ]);
    let mut session = ConversationSession::default();
    let outcome = session
        .handle_turn(&client(backend.clone()), "Taxi at CTS was slow")
        .await
        .unwrap();

    // Same result as a single direct call to the secondary
    let direct = ScriptedBackend::new(vec![("primary", vec![ok(reply)])]);
    let mut reference = ConversationSession::default();
    let expected = reference
        .handle_turn(&client(direct), "Taxi at CTS was slow")
        .await
        .unwrap();

    assert_eq!(outcome.reply, expected.reply);
    assert_eq!(outcome.draft, expected.draft);
    assert_eq!(outcome.status, expected.status);
    assert_eq!(outcome.model, "secondary");

    let models: Vec<String> = backend.attempts().into_iter().map(|(m, _)| m).collect();
    assert_eq!(models, vec!["primary", "primary", "primary", "secondary"]);
}

#[tokio::test]
async fn scenario_e_backend_unavailable_leaves_state_untouched() {
    let mut session = seeded_session().await;
    let draft_before = session.draft().clone();
    let history_before = session.messages().to_vec();

    let backend = ScriptedBackend::new(vec![
        ("primary", vec![busy(), busy(), busy()]),
        ("secondary", vec![busy(), busy(), busy()]),
    ]);
    let err = session
        .handle_turn(&client(backend), "Anything?")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TurnError::BackendUnavailable {
            endpoints_tried: 2,
            last_error: AttemptError::Busy { status: 503 },
        }
    ));
    assert_eq!(session.draft(), &draft_before);
    assert_eq!(session.stage(), TurnStage::Idle);

    // Earlier history is untouched; only the utterance is added
    let history = session.messages();
    assert_eq!(&history[..history_before.len()], history_before.as_slice());
    assert_eq!(history.len(), history_before.len() + 1);
    assert_eq!(history.last().unwrap().role, Role::User);
    assert_eq!(history.last().unwrap().content, "Anything?");
}

#[tokio::test]
async fn summary_is_fed_back_into_next_prompt() {
    let backend = ScriptedBackend::new(vec![(
        "primary",
        vec![
            ok(r#"Noted.||JSON_START||{"summary":"- late descent"}"#),
            ok(r#"Noted.||JSON_START||{"summary":"- late descent\n- long flare"}"#),
        ],
    )]);
    let client = client(backend.clone());
    let mut session = ConversationSession::default();

    session.handle_turn(&client, "Descent was late").await.unwrap();
    let outcome = session.handle_turn(&client, "Flare was long").await.unwrap();

    assert_eq!(outcome.draft.summary, "- late descent\n- long flare");
    let prompts = backend.attempts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].1.contains("- late descent"));
    assert!(prompts[1].1.contains("- late descent"));
    assert!(prompts[1].1.contains("Flare was long"));
}

#[tokio::test]
async fn union_policy_accumulates_tags_across_turns() {
    let backend = ScriptedBackend::new(vec![(
        "primary",
        vec![
            ok(r#"A.||JSON_START||{"tags":["SA"]}"#),
            ok(r#"B.||JSON_START||{"tags":["CO"]}"#),
        ],
    )]);
    let client = client(backend);

    let mut union = ConversationSession::new(TagMergePolicy::Union);
    union.handle_turn(&client, "first").await.unwrap();
    let outcome = union.handle_turn(&client, "second").await.unwrap();
    assert_eq!(outcome.draft.tags, BTreeSet::from([Tag::Sa, Tag::Co]));
}

#[tokio::test]
async fn replace_policy_retracts_stale_tags() {
    let backend = ScriptedBackend::new(vec![(
        "primary",
        vec![
            ok(r#"A.||JSON_START||{"tags":["SA","WM"]}"#),
            ok(r#"B.||JSON_START||{"tags":["CO"]}"#),
        ],
    )]);
    let client = client(backend);

    let mut session = ConversationSession::default();
    session.handle_turn(&client, "first").await.unwrap();
    let outcome = session.handle_turn(&client, "second").await.unwrap();
    assert_eq!(outcome.draft.tags, BTreeSet::from([Tag::Co]));
}

#[tokio::test]
async fn empty_utterance_rejected_without_backend_call() {
    let backend = ScriptedBackend::new(vec![]);
    let mut session = ConversationSession::default();

    let err = session
        .handle_turn(&client(backend.clone()), "   ")
        .await
        .unwrap_err();

    assert_eq!(err, TurnError::EmptyUtterance);
    assert!(backend.attempts().is_empty());
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn commit_persists_draft_and_resets_session() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = JsonlLogbook::new(dir.path().join("logbook.jsonl"));

    let mut session = seeded_session().await;
    let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
    let entry = session.commit(date);
    store.append(std::slice::from_ref(&entry)).unwrap();

    let saved = store.read().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].phase, Phase::Approach);
    assert_eq!(saved[0].location, "ITM");
    assert_eq!(saved[0].tags, BTreeSet::from([Tag::Wm]));
    assert_eq!(saved[0].summary, "- late descent");

    assert_eq!(session.draft(), &DraftRecord::default());
    assert_eq!(session.messages().len(), 1);
}

struct StalledBackend;

#[async_trait]
impl CompletionBackend for StalledBackend {
    async fn complete(&self, _request: &CompletionRequest<'_>) -> Result<String, AttemptError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".to_string())
    }

    fn provider_name(&self) -> &str {
        "Stalled"
    }
}

#[tokio::test(start_paused = true)]
async fn dropped_turn_leaves_draft_and_next_turn_recovers() {
    let mut session = seeded_session().await;
    let draft_before = session.draft().clone();

    let stalled = CompletionClient::new(
        Arc::new(StalledBackend),
        vec![ModelEndpoint::new("primary")],
        RetryPolicy::default(),
        Duration::from_secs(30),
    )
    .unwrap();

    let cancelled =
        tokio::time::timeout(Duration::from_secs(1), session.handle_turn(&stalled, "hello")).await;
    assert!(cancelled.is_err());
    assert_eq!(session.stage(), TurnStage::Sending);
    assert_eq!(session.draft(), &draft_before);
    assert_eq!(session.messages().last().unwrap().content, "hello");

    let backend = ScriptedBackend::new(vec![(
        "primary",
        vec![ok(r#"Copy.||JSON_START||{"phase":"Landing","tags":["SA"]}"#)],
    )]);
    let outcome = session
        .handle_turn(&client(backend), "Then we landed")
        .await
        .unwrap();

    assert_eq!(session.stage(), TurnStage::Idle);
    assert_eq!(outcome.status, TurnStatus::Extracted);
    assert_eq!(outcome.draft.phase, Phase::Landing);
    assert_eq!(outcome.draft.tags, BTreeSet::from([Tag::Sa]));
    assert_eq!(outcome.draft.location, "ITM");
    assert_eq!(session.draft(), &outcome.draft);
}
