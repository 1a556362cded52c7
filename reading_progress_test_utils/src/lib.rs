use std::sync::{Arc, Mutex};

use async_executor::Executor;
use async_trait::async_trait;
use log::LevelFilter;
use reading_progress::{
    ApiCredentials, EngineTasks, ProgressEngine, ProgressOptions, TokenProvider,
    env::ProgressEnvironment, error::ProgressError,
};

use crate::{manual_timer::ManualTimer, mock_reading_service::MockReadingService};

pub mod manual_timer;
pub mod mock_reading_service;

pub const TEST_ENDPOINT: &str = "https://books.test/";
pub const TEST_TOKEN: &str = "token";

pub struct EngineTest {
    pub http: Arc<MockReadingService>,
    pub timer: ManualTimer,
    pub tokens: TestTokenProvider,
    pub ex: Executor<'static>,
}

impl EngineTest {
    pub fn new() -> Self {
        let _ = env_logger::builder()
            .filter_level(LevelFilter::max())
            .is_test(true)
            .try_init();

        Self {
            http: Arc::new(MockReadingService::new()),
            timer: ManualTimer::new(),
            tokens: TestTokenProvider::default(),
            ex: Executor::new(),
        }
    }

    pub fn environment(&self) -> ProgressEnvironment {
        ProgressEnvironment::custom(
            Arc::new(self.http.clone().client()),
            Box::new(self.timer.clone()),
        )
    }

    pub fn options(&self, book_id: &str, max_pages: u32) -> ProgressOptions {
        ProgressOptions::new(book_id, max_pages, self.tokens.clone())
    }

    /// Attaches an engine and spawns its tasks on [Self::ex].
    pub fn attach(&self, options: ProgressOptions) -> ProgressEngine {
        let (engine, tasks) = ProgressEngine::attach(self.environment(), options);
        self.spawn_tasks(tasks);
        engine
    }

    pub fn spawn_tasks(&self, tasks: EngineTasks) {
        self.ex.spawn(tasks.into_task()).detach();
    }

    /// Drives [Self::ex] until `fut` completes.
    pub fn run<T>(&self, fut: impl Future<Output = T>) -> T {
        futures_lite::future::block_on(self.ex.run(fut))
    }
}

impl Default for EngineTest {
    fn default() -> Self {
        Self::new()
    }
}

/// A [TokenProvider] handing out [TEST_TOKEN] until [Self::sign_out] is called.
#[derive(Clone)]
pub struct TestTokenProvider {
    token: Arc<Mutex<Option<String>>>,
}

impl TestTokenProvider {
    pub fn sign_out(&self) {
        *self.token.lock().unwrap() = None;
    }

    pub fn sign_in(&self, token: &str) {
        *self.token.lock().unwrap() = Some(token.to_string());
    }
}

impl Default for TestTokenProvider {
    fn default() -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(TEST_TOKEN.to_string()))),
        }
    }
}

#[async_trait]
impl TokenProvider for TestTokenProvider {
    async fn fetch_credentials(&self) -> Result<Option<ApiCredentials>, ProgressError> {
        let token = self.token.lock().unwrap().clone();
        Ok(token.map(|token| ApiCredentials {
            endpoint: TEST_ENDPOINT.to_string(),
            token,
        }))
    }
}
