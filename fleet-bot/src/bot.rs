//! Bot lifecycle
//!
//! Registers with the coordinator, keeps the bot lease alive with periodic
//! heartbeats and drives the scheduler on the poll interval until shutdown.

use anyhow::{Result, anyhow};
use fleet_core::domain::bot::BotIdentity;
use fleet_core::domain::job::Assignment;
use fleet_core::dto::bot::{BotMetrics, Heartbeat, RegisterBot, RegisterResponse, Resources};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::repository::{BotRepository, JobRepository};
use crate::scheduler::{Scheduler, TickReport};
use crate::service::{ExecutionService, OutboxService};

/// Registration attempts before giving up
const MAX_REGISTER_ATTEMPTS: u32 = 10;

/// Exponential backoff between two bounds
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            current: min,
        }
    }

    /// Returns the delay to wait now and doubles the next one, capped at max
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// A worker bot bound to one coordinator
pub struct Bot {
    config: Arc<Config>,
    identity: BotIdentity,
    bots: Arc<dyn BotRepository>,
    jobs: Arc<dyn JobRepository>,
    executor: Arc<dyn ExecutionService>,
    outbox: Arc<dyn OutboxService>,
}

impl Bot {
    pub fn new(
        config: Arc<Config>,
        identity: BotIdentity,
        bots: Arc<dyn BotRepository>,
        jobs: Arc<dyn JobRepository>,
        executor: Arc<dyn ExecutionService>,
        outbox: Arc<dyn OutboxService>,
    ) -> Self {
        Self {
            config,
            identity,
            bots,
            jobs,
            executor,
            outbox,
        }
    }

    fn registration(&self) -> RegisterBot {
        let mut meta = Map::new();
        meta.insert(
            "hostname".to_string(),
            Value::String(self.identity.hostname.clone()),
        );
        meta.insert("os".to_string(), Value::String(self.identity.os.clone()));

        let mut constraints = Map::new();
        constraints.insert(
            "bot_lease_ttl_sec".to_string(),
            Value::from(self.config.bot_lease_ttl.as_secs()),
        );
        constraints.insert(
            "job_lease_ttl_sec".to_string(),
            Value::from(self.config.job_lease_ttl.as_secs()),
        );

        RegisterBot {
            bot_key: self.identity.bot_key.clone(),
            instance_id: self.identity.instance_id.clone(),
            version: self.config.version.clone(),
            capabilities: self.executor.supported_operations(),
            resources: Resources::default(),
            constraints,
            meta,
        }
    }

    /// Registers with the coordinator, retrying with exponential backoff
    ///
    /// The coordinator may not be up yet when the bot starts (common in
    /// container environments), so failures are retried a bounded number of
    /// times.
    async fn register_with_retry(&self) -> Result<RegisterResponse> {
        let request = self.registration();
        let mut backoff = Backoff::new(self.config.min_backoff, self.config.max_backoff);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.bots.register(&request).await {
                Ok(response) => {
                    if attempt > 1 {
                        info!(
                            "Successfully registered with coordinator after {} attempt(s)",
                            attempt
                        );
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt >= MAX_REGISTER_ATTEMPTS {
                        error!(
                            "Failed to register with coordinator after {} attempts",
                            MAX_REGISTER_ATTEMPTS
                        );
                        return Err(anyhow!("Failed to register with coordinator: {:#}", e));
                    }

                    let delay = backoff.next_delay();
                    warn!(
                        "Failed to register with coordinator (attempt {}/{}): {:#}",
                        attempt, MAX_REGISTER_ATTEMPTS, e
                    );
                    warn!("Retrying in {:?}...", delay);

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Registers and builds the scheduler for the issued bot id
    pub async fn register(&self) -> Result<Arc<Scheduler>> {
        info!(
            "Registering bot_key={} with capabilities {:?}",
            self.identity.bot_key,
            self.executor.supported_operations()
        );

        let response = self.register_with_retry().await?;
        let assignment = response
            .assignment
            .unwrap_or_else(|| Assignment::unrestricted(self.config.max_concurrency));

        info!(
            "Registered as bot_id={} (max_concurrency={}, paused={})",
            response.bot_id, assignment.max_concurrency, assignment.paused
        );

        Ok(Arc::new(Scheduler::new(
            &self.config,
            response.bot_id,
            self.identity.instance_id.clone(),
            Arc::clone(&self.jobs),
            Arc::clone(&self.executor),
            Arc::clone(&self.outbox),
            assignment,
        )))
    }

    fn spawn_heartbeat(&self, scheduler: Arc<Scheduler>) -> JoinHandle<()> {
        let bots = Arc::clone(&self.bots);
        let instance_id = self.identity.instance_id.clone();
        let period = self.config.heartbeat_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if let Err(e) = send_heartbeat(bots.as_ref(), &scheduler, &instance_id).await {
                    warn!("Heartbeat failed: {:#}", e);
                }
            }
        })
    }

    /// Registers, runs a single tick and returns its counts
    pub async fn run_once(&self) -> Result<TickReport> {
        let scheduler = self.register().await?;
        send_heartbeat(self.bots.as_ref(), &scheduler, &self.identity.instance_id)
            .await
            .unwrap_or_else(|e| warn!("Heartbeat failed: {:#}", e));
        scheduler.tick().await
    }

    /// Runs until `shutdown` resolves
    ///
    /// A tick in progress when shutdown is requested runs to completion;
    /// afterwards one last outbox flush is attempted.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let scheduler = self.register().await?;
        let heartbeat = self.spawn_heartbeat(Arc::clone(&scheduler));

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut backoff = Backoff::new(self.config.min_backoff, self.config.max_backoff);

        info!(
            "Polling every {:?}, heartbeat every {:?}",
            self.config.poll_interval, self.config.heartbeat_interval
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = interval.tick() => {}
            }

            match scheduler.tick().await {
                Ok(_) => backoff.reset(),
                Err(e) => {
                    let delay = backoff.next_delay();
                    error!("Tick failed: {:#}; backing off for {:?}", e, delay);

                    tokio::select! {
                        _ = &mut shutdown => {
                            info!("Shutdown requested");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        let flushed = scheduler.flush_outbox().await;
        if flushed.requeued > 0 {
            warn!(
                "{} report(s) remain buffered in the outbox for the next start",
                flushed.requeued
            );
        }

        heartbeat.abort();
        info!("Bot stopped");

        Ok(())
    }
}

/// Sends one heartbeat and applies any assignment it returns
async fn send_heartbeat(
    bots: &dyn BotRepository,
    scheduler: &Scheduler,
    instance_id: &str,
) -> Result<()> {
    let heartbeat = Heartbeat {
        instance_id: instance_id.to_string(),
        running: scheduler.running_jobs(),
        metrics: BotMetrics::default(),
    };

    debug!(
        "Sending heartbeat with {} running job(s)",
        heartbeat.running.len()
    );

    let response = bots.heartbeat(scheduler.bot_id(), &heartbeat).await?;
    if let Some(assignment) = response.assignment {
        scheduler.apply_assignment(assignment).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::JobRegistry;
    use crate::service::{FileOutbox, RegistryExecutionService};
    use async_trait::async_trait;
    use fleet_core::domain::job::Job;
    use fleet_core::domain::report::ReportAction;
    use fleet_core::dto::bot::{AuthTokens, HeartbeatResponse};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    struct MockBotRepository {
        failures_before_success: u32,
        register_calls: AtomicU32,
        registered: Mutex<Vec<RegisterBot>>,
        assignment: Option<Assignment>,
        heartbeats: Mutex<Vec<Heartbeat>>,
        heartbeat_assignment: Mutex<Option<Assignment>>,
    }

    impl MockBotRepository {
        fn new(failures_before_success: u32) -> Self {
            Self {
                failures_before_success,
                register_calls: AtomicU32::new(0),
                registered: Mutex::new(Vec::new()),
                assignment: None,
                heartbeats: Mutex::new(Vec::new()),
                heartbeat_assignment: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl BotRepository for MockBotRepository {
        async fn register(&self, request: &RegisterBot) -> Result<RegisterResponse> {
            let call = self.register_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures_before_success {
                anyhow::bail!("connection refused");
            }

            self.registered.lock().unwrap().push(request.clone());
            Ok(RegisterResponse {
                bot_id: "bot_abc123".to_string(),
                auth: AuthTokens {
                    access_token: "token_xyz".to_string(),
                    refresh_token: None,
                },
                assignment: self.assignment.clone(),
                config: None,
            })
        }

        async fn heartbeat(&self, bot_id: &str, heartbeat: &Heartbeat) -> Result<HeartbeatResponse> {
            assert_eq!(bot_id, "bot_abc123");
            self.heartbeats.lock().unwrap().push(heartbeat.clone());
            Ok(HeartbeatResponse {
                assignment: self.heartbeat_assignment.lock().unwrap().take(),
            })
        }
    }

    #[derive(Default)]
    struct MockJobRepository {
        claims: Mutex<VecDeque<Vec<Job>>>,
        reports: Mutex<Vec<(String, ReportAction, Value)>>,
    }

    #[async_trait]
    impl JobRepository for MockJobRepository {
        async fn claim(&self, _bot_id: &str, _operations: &[String], _limit: usize) -> Result<Vec<Job>> {
            Ok(self.claims.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn report(&self, job_id: &str, action: ReportAction, payload: &Value) -> Result<()> {
            self.reports
                .lock()
                .unwrap()
                .push((job_id.to_string(), action, payload.clone()));
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            poll_interval: Duration::from_millis(5),
            heartbeat_interval: Duration::from_millis(10),
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            ..Config::default()
        }
    }

    fn test_bot(
        bots: Arc<MockBotRepository>,
        jobs: Arc<MockJobRepository>,
    ) -> (Bot, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let bot = Bot::new(
            Arc::new(test_config()),
            BotIdentity::generate("test-host", "test-platform"),
            bots,
            jobs,
            Arc::new(RegistryExecutionService::new(Arc::new(
                JobRegistry::with_builtin(),
            ))),
            Arc::new(FileOutbox::new(dir.path().join("outbox.jsonl"))),
        );
        (bot, dir)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_millis(1500));

        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1500));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_register_retries_until_success() {
        let bots = Arc::new(MockBotRepository::new(2));
        let (bot, _dir) = test_bot(bots.clone(), Arc::new(MockJobRepository::default()));

        let scheduler = bot.register().await.unwrap();

        assert_eq!(scheduler.bot_id(), "bot_abc123");
        assert_eq!(bots.register_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_register_gives_up() {
        let bots = Arc::new(MockBotRepository::new(u32::MAX));
        let (bot, _dir) = test_bot(bots.clone(), Arc::new(MockJobRepository::default()));

        assert!(bot.register().await.is_err());
        assert_eq!(
            bots.register_calls.load(Ordering::SeqCst),
            MAX_REGISTER_ATTEMPTS
        );
    }

    #[tokio::test]
    async fn test_registration_body() {
        let bots = Arc::new(MockBotRepository::new(0));
        let (bot, _dir) = test_bot(bots.clone(), Arc::new(MockJobRepository::default()));

        bot.register().await.unwrap();

        let registered = bots.registered.lock().unwrap()[0].clone();
        assert_eq!(
            registered.capabilities,
            vec!["subtract".to_string(), "sum".to_string()]
        );
        assert_eq!(registered.resources, Resources::default());
        assert_eq!(registered.meta["hostname"], "test-host");
        assert_eq!(registered.meta["os"], "test-platform");
        assert_eq!(registered.constraints["bot_lease_ttl_sec"], 120);
        assert_eq!(registered.constraints["job_lease_ttl_sec"], 180);
        assert_eq!(registered.bot_key, bot.identity.bot_key);
    }

    #[tokio::test]
    async fn test_default_assignment_when_coordinator_sends_none() {
        let bots = Arc::new(MockBotRepository::new(0));
        let (bot, _dir) = test_bot(bots, Arc::new(MockJobRepository::default()));

        let scheduler = bot.register().await.unwrap();

        assert_eq!(scheduler.assignment().await, Assignment::unrestricted(2));
    }

    #[tokio::test]
    async fn test_heartbeat_applies_assignment() {
        let bots = Arc::new(MockBotRepository::new(0));
        let (bot, _dir) = test_bot(bots.clone(), Arc::new(MockJobRepository::default()));
        let scheduler = bot.register().await.unwrap();

        let update = Assignment {
            operations: vec!["sum".to_string()],
            max_concurrency: 4,
            paused: true,
        };
        *bots.heartbeat_assignment.lock().unwrap() = Some(update.clone());

        send_heartbeat(bots.as_ref(), &scheduler, "inst_test")
            .await
            .unwrap();

        assert_eq!(scheduler.assignment().await, update);
        let heartbeats = bots.heartbeats.lock().unwrap();
        assert_eq!(heartbeats[0].instance_id, "inst_test");
        assert!(heartbeats[0].running.is_empty());
    }

    #[tokio::test]
    async fn test_run_once_processes_claimed_jobs() {
        let jobs = Arc::new(MockJobRepository::default());
        jobs.claims
            .lock()
            .unwrap()
            .push_back(vec![Job::new("j1", "sum", json!({"a": 2, "b": 3}))]);
        let (bot, _dir) = test_bot(Arc::new(MockBotRepository::new(0)), jobs.clone());

        let report = bot.run_once().await.unwrap();

        assert_eq!(report.completed, 1);
        let reports = jobs.reports.lock().unwrap();
        assert_eq!(reports[0].0, "j1");
        assert_eq!(reports[0].1, ReportAction::Complete);
        assert_eq!(reports[0].2["result"], 5);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let jobs = Arc::new(MockJobRepository::default());
        jobs.claims
            .lock()
            .unwrap()
            .push_back(vec![Job::new("j2", "sum", json!({"a": 10, "b": -4}))]);
        let bots = Arc::new(MockBotRepository::new(0));
        let (bot, _dir) = test_bot(bots.clone(), jobs.clone());

        bot.run(tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();

        assert_eq!(bots.register_calls.load(Ordering::SeqCst), 1);
        assert!(!bots.heartbeats.lock().unwrap().is_empty());
        let reports = jobs.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].2["result"], 6);
    }
}
