//! End-to-end checks of the public API: routing over shared memory, and
//! scheduled jobs delivered through a channel.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mpaia::assistant::{
    Assistant, AssistantRouter, EchoAssistant, ProviderAssistant, StandaloneAssistant,
};
use mpaia::channels::MessageChannel;
use mpaia::error::{ChannelError, LlmError, RouterError};
use mpaia::jobs::{Job, JobKind, Scheduler};
use mpaia::llm::{ChatMessage, CompletionProvider, Role};

struct CannedProvider {
    replies: Mutex<VecDeque<String>>,
}

impl CannedProvider {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
        })
    }
}

#[async_trait]
impl CompletionProvider for CannedProvider {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, _history: &[ChatMessage]) -> Result<String, LlmError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::RequestFailed {
                provider: "canned".to_string(),
                reason: "rate limited".to_string(),
            })
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
}

impl Outbox {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageChannel for Outbox {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn send(&self, destination: &str, text: &str) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), text.to_string()));
        Ok(())
    }
}

#[tokio::test]
async fn single_echo_router() {
    let selector = CannedProvider::new(&[]);
    let router =
        AssistantRouter::new(vec![Arc::new(EchoAssistant::new()) as Arc<dyn Assistant>], selector)
            .unwrap();

    let reply = router.process("hi").await.unwrap();

    assert_eq!(reply, "You said: hi");
    assert_eq!(
        router.history().await,
        vec![ChatMessage::user("hi"), ChatMessage::assistant("You said: hi")]
    );
}

#[tokio::test]
async fn router_routes_and_shares_memory() {
    // Selector picks the provider assistant, then the echo assistant, then says nothing useful.
    let selector = CannedProvider::new(&["0", "Assistant 1 fits best.", "none of them"]);
    let llm = CannedProvider::new(&["Paris."]);
    let assistants: Vec<Arc<dyn Assistant>> = vec![
        Arc::new(ProviderAssistant::new(llm, "general knowledge questions")),
        Arc::new(EchoAssistant::new().with_used_for("repeating text back")),
    ];
    let router = AssistantRouter::new(assistants, selector).unwrap();

    assert_eq!(router.process("capital of France?").await.unwrap(), "Paris.");
    assert_eq!(router.process("say cheese").await.unwrap(), "You said: say cheese");

    let err = router.process("???").await.unwrap_err();
    assert!(matches!(err, RouterError::Selection { .. }));

    let history = router.history().await;
    assert_eq!(history.len(), 5);
    assert_eq!(history[0], ChatMessage::user("capital of France?"));
    assert_eq!(history[3].role, Role::Assistant);
    assert_eq!(history[3].content, "You said: say cheese");
    // The unrouted message is still part of the conversation.
    assert_eq!(history[4], ChatMessage::user("???"));
}

#[tokio::test]
async fn provider_failure_becomes_apology() {
    let llm = CannedProvider::new(&[]);
    let assistant = ProviderAssistant::new(llm, "general");
    let router = AssistantRouter::new(
        vec![Arc::new(assistant) as Arc<dyn Assistant>],
        CannedProvider::new(&[]),
    )
    .unwrap();

    let reply = router.process("hello").await.unwrap();

    assert!(reply.contains("An error occurred"));
    assert_eq!(router.history().await, vec![ChatMessage::user("hello")]);
}

#[tokio::test]
async fn one_shot_job_delivers_then_retires() {
    let outbox = Arc::new(Outbox::default());
    let scheduler = Scheduler::new(outbox.clone());
    let llm = CannedProvider::new(&["Time to stretch!"]);
    let assistant = Arc::new(StandaloneAssistant::new(Arc::new(ProviderAssistant::new(
        llm,
        "reminders",
    ))));

    let job = Job::new(JobKind::OneShot, "* * * * * *", "remind me to stretch", "42", assistant)
        .unwrap();
    let id = scheduler.add(job).await.unwrap();
    assert_eq!(scheduler.list().await, vec![id]);

    tokio::time::timeout(Duration::from_secs(5), async {
        while !scheduler.list().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("one-shot job did not retire");

    assert_eq!(
        outbox.sent(),
        vec![("42".to_string(), "Time to stretch!".to_string())]
    );

    scheduler.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn duplicate_registration_keeps_one_job() {
    let scheduler = Scheduler::new(Arc::new(Outbox::default()));
    let echo = || Arc::new(StandaloneAssistant::new(Arc::new(EchoAssistant::new())));

    scheduler
        .add(Job::message("0 8 * * *", "weather", "42", echo()).unwrap())
        .await
        .unwrap();
    scheduler
        .add(Job::message("0 8 * * *", "news", "42", echo()).unwrap())
        .await
        .unwrap();
    scheduler
        .add(Job::message("0 8 * * *", "news", "43", echo()).unwrap())
        .await
        .unwrap();

    assert_eq!(
        scheduler.list().await,
        vec![
            "MessageJob_0 8 * * *_42".to_string(),
            "MessageJob_0 8 * * *_43".to_string()
        ]
    );
    assert!(!scheduler.remove("MessageJob_0 8 * * *_44").await);
    assert_eq!(scheduler.list().await.len(), 2);
}
