//! Behavior agent coordination inside a running worker: activation,
//! displacement, and restoration.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use unitvisor::{
    AcquireFn, AcquireRef, Agent, AgentContext, AgentError, EventBus, IntervalPolicy,
    Orchestrator, OrchestratorConfig, Phase, StateSnapshot, TransactionController, TxnConfig,
    UnitId, WorkerConfig, WorkerSpec, WriterRegistry,
};

struct NoopExec;

#[async_trait]
impl unitvisor::StepExecutor for NoopExec {
    async fn apply(&self, _: &UnitId, _: &unitvisor::Step) -> anyhow::Result<()> {
        Ok(())
    }
    async fn rollback(&self, _: &UnitId, _: &unitvisor::Step) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Claims the active slot immediately and works until paused or cancelled.
struct ResidentAgent {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Agent for ResidentAgent {
    fn name(&self) -> &str {
        "resident"
    }

    async fn run(&self, mut ctx: AgentContext) -> Result<(), AgentError> {
        ctx.coordinator.activate(self.name())?;
        self.log.lock().unwrap().push("resident:active".into());
        loop {
            if !ctx.resumed().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }
}

/// Waits, takes over the slot for a burst, then finishes.
struct VisitorAgent {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Agent for VisitorAgent {
    fn name(&self) -> &str {
        "visitor"
    }

    async fn run(&self, ctx: AgentContext) -> Result<(), AgentError> {
        tokio::time::sleep(Duration::from_millis(120)).await;
        ctx.coordinator.activate(self.name())?;
        self.log.lock().unwrap().push("visitor:active".into());
        tokio::time::sleep(Duration::from_millis(120)).await;
        self.log.lock().unwrap().push("visitor:done".into());
        ctx.coordinator.finish(self.name())?;
        Ok(())
    }
}

fn orchestrator() -> Arc<Orchestrator> {
    let bus = EventBus::default();
    let txns = TransactionController::new(Arc::new(NoopExec), TxnConfig::default(), bus.clone());
    Orchestrator::new(
        OrchestratorConfig {
            poll_interval: Duration::from_millis(100),
            stagger: Duration::ZERO,
            ..OrchestratorConfig::default()
        },
        bus,
        WriterRegistry::new(),
        txns,
    )
}

fn idle_intervals() -> IntervalPolicy {
    IntervalPolicy {
        active: Duration::from_millis(20),
        waiting: Duration::from_millis(50),
        ended: Duration::from_millis(50),
        unknown: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn visitor_displaces_resident_and_restores_it() {
    let orch = orchestrator();
    let log = Arc::new(Mutex::new(Vec::new()));

    orch.register(
        WorkerSpec::new(
            WorkerConfig::new("u1", 0),
            AcquireFn::arc("idle", |_cfg| async {
                Ok(Some(StateSnapshot::new(Phase::Waiting)))
            }),
        )
        .with_intervals(idle_intervals())
        .with_agent(Arc::new(ResidentAgent { log: Arc::clone(&log) }))
        .with_agent(Arc::new(VisitorAgent { log: Arc::clone(&log) })),
    )
    .unwrap();
    orch.start_all().unwrap();

    let unit = UnitId::new("u1");
    tokio::time::sleep(Duration::from_millis(60)).await;
    let coord = orch.coordinator(&unit).unwrap();
    assert_eq!(coord.active().as_deref(), Some("resident"));
    assert!(!coord.is_paused("resident"));

    // Mid-takeover: exactly one agent is non-paused, and it is the visitor.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(coord.active().as_deref(), Some("visitor"));
    assert!(coord.is_paused("resident"));
    assert!(!coord.is_paused("visitor"));

    // After the visitor finishes, the resident gets its slot back.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(coord.active().as_deref(), Some("resident"));
    assert!(!coord.is_paused("resident"));
    assert!(coord.is_paused("visitor"));

    assert_eq!(
        log.lock().unwrap().as_slice(),
        ["resident:active", "visitor:active", "visitor:done"]
    );

    orch.stop_all(true).await.unwrap();
}

#[tokio::test]
async fn agent_failure_does_not_disturb_worker_or_peers() {
    struct FailingAgent;

    #[async_trait]
    impl Agent for FailingAgent {
        fn name(&self) -> &str {
            "failing"
        }
        async fn run(&self, ctx: AgentContext) -> Result<(), AgentError> {
            ctx.coordinator.activate(self.name())?;
            Err(AgentError::Failed {
                reason: "scripted agent failure".into(),
            })
        }
    }

    let orch = orchestrator();
    let log = Arc::new(Mutex::new(Vec::new()));
    orch.register(
        WorkerSpec::new(
            WorkerConfig::new("u1", 0),
            AcquireFn::arc("idle", |_cfg| async {
                Ok(Some(StateSnapshot::new(Phase::Waiting)))
            }),
        )
        .with_intervals(idle_intervals())
        .with_agent(Arc::new(FailingAgent))
        .with_agent(Arc::new(VisitorAgent { log: Arc::clone(&log) })),
    )
    .unwrap();
    orch.start_all().unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    let unit = UnitId::new("u1");
    let coord = orch.coordinator(&unit).unwrap();

    // The failing agent's slot was released by the runner; the visitor came
    // and went normally, and the worker kept acquiring the whole time.
    assert!(coord.active().is_none());
    assert_eq!(
        log.lock().unwrap().as_slice(),
        ["visitor:active", "visitor:done"]
    );
    assert_eq!(
        orch.state(&unit).unwrap().snapshot().phase,
        Phase::Waiting
    );

    orch.stop_all(true).await.unwrap();
}

#[tokio::test]
async fn crash_restart_stops_the_previous_generation_of_agents() {
    /// Claims the slot and works until its token is cancelled.
    struct GenerationAgent {
        spawned: Arc<AtomicUsize>,
        exited: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Agent for GenerationAgent {
        fn name(&self) -> &str {
            "keeper"
        }
        async fn run(&self, mut ctx: AgentContext) -> Result<(), AgentError> {
            self.spawned.fetch_add(1, Ordering::SeqCst);
            let _ = ctx.coordinator.activate(self.name());
            while ctx.resumed().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.exited.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let bus = EventBus::default();
    let txns = TransactionController::new(Arc::new(NoopExec), TxnConfig::default(), bus.clone());
    let orch = Orchestrator::new(
        OrchestratorConfig {
            poll_interval: Duration::from_millis(100),
            cooldown: Duration::from_millis(20),
            max_restarts: 3,
            stagger: Duration::ZERO,
            ..OrchestratorConfig::default()
        },
        bus,
        WriterRegistry::new(),
        txns,
    );

    let spawned = Arc::new(AtomicUsize::new(0));
    let exited = Arc::new(AtomicUsize::new(0));
    let crashing: AcquireRef =
        AcquireFn::arc("panicking", |_cfg| async { panic!("scripted crash") });
    orch.register(
        WorkerSpec::new(WorkerConfig::new("u1", 0), crashing)
            .with_intervals(idle_intervals())
            .with_agent(Arc::new(GenerationAgent {
                spawned: Arc::clone(&spawned),
                exited: Arc::clone(&exited),
            })),
    )
    .unwrap();
    orch.start_all().unwrap();

    // Three crashes exhaust the budget; each one must take its agent
    // generation down with it, the terminal one included.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(spawned.load(Ordering::SeqCst), 3, "one agent generation per spawn");
    assert_eq!(
        exited.load(Ordering::SeqCst),
        3,
        "no agent generation survives its worker's crash"
    );

    orch.stop_all(true).await.unwrap();
}
