// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime: composition root for shared infrastructure.
//!
//! Owns the bus, scheduler, logger fan-out, registry, and error channel.
//! Modules hold references to shared infra obtained here at load; they never
//! reach for a global. The control surface (HTTP, tests) talks only to this
//! type.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sy_core::{
    CircuitPolicy, Clock, Event, ModuleConfig, Phase, PhaseRecord, SystemClock,
};
use sy_storage::{CheckpointStore, Wal};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bus::{BusEvent, BusFilter, BusHandler, EventBus, Subscription};
use crate::connector::{Source, TransformContext, WebhookRequest, WebhookResponse};
use crate::deliver::{deliver_event, DeliveryResult};
use crate::error::{ErrorSink, RuntimeError};
use crate::fanout::LoggerFanout;
use crate::module::{ModuleInstance, ResolvedConnectors};
use crate::pipeline::{run_pipeline, PipelineVerdict};
use crate::registry::ModuleRegistry;
use crate::router::match_routes;
use crate::scheduler::{PollSpec, Scheduler};
use crate::status::{ModuleStatus, ModuleSummary, RuntimeStatus};

/// Runtime construction options.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Root for per-module state (checkpoints).
    pub modules_dir: PathBuf,
    /// Journal path; `Some` selects the durable bus variant.
    pub wal_path: Option<PathBuf>,
    pub circuit: CircuitPolicy,
    /// Hard timeout per actor delivery.
    pub delivery_timeout: Duration,
    /// Grace period for draining a module's queued events on unload/stop.
    pub drain_timeout: Duration,
}

impl RuntimeOptions {
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
            wal_path: None,
            circuit: CircuitPolicy::default(),
            delivery_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(5),
        }
    }

    /// Select the durable (journal-backed) bus.
    pub fn durable(mut self, wal_path: impl Into<PathBuf>) -> Self {
        self.wal_path = Some(wal_path.into());
        self
    }
}

/// A webhook-capable source registered for ingress under its source id.
#[derive(Clone)]
pub struct WebhookTarget {
    pub module: String,
    pub source_name: String,
    pub source: Arc<dyn Source>,
}

pub struct Runtime<C: Clock = SystemClock> {
    options: RuntimeOptions,
    clock: C,
    bus: EventBus,
    registry: ModuleRegistry,
    scheduler: Scheduler,
    fanout: LoggerFanout,
    checkpoints: CheckpointStore,
    cancel: CancellationToken,
    errors: ErrorSink,
    raw_errors_rx: Mutex<Option<UnboundedReceiver<RuntimeError>>>,
    public_errors_tx: tokio::sync::mpsc::UnboundedSender<RuntimeError>,
    public_errors_rx: Mutex<Option<UnboundedReceiver<RuntimeError>>>,
    /// Routing subscription per active module.
    subscriptions: Mutex<HashMap<String, Subscription>>,
    /// Webhook ingress table, keyed by source id.
    webhooks: Mutex<HashMap<String, WebhookTarget>>,
    started: Mutex<Option<Instant>>,
    http_port: Mutex<Option<u16>>,
}

impl Runtime<SystemClock> {
    pub fn new(options: RuntimeOptions) -> Result<Self, RuntimeError> {
        Self::with_clock(options, SystemClock)
    }
}

impl<C: Clock> Runtime<C> {
    pub fn with_clock(options: RuntimeOptions, clock: C) -> Result<Self, RuntimeError> {
        let (errors, raw_errors_rx) = ErrorSink::new();
        let (public_errors_tx, public_errors_rx) = tokio::sync::mpsc::unbounded_channel();
        let bus = match &options.wal_path {
            Some(path) => EventBus::durable(Wal::open(path)?, errors.clone()),
            None => EventBus::new(errors.clone()),
        };
        let checkpoints = CheckpointStore::new(&options.modules_dir);
        Ok(Self {
            options,
            clock,
            bus,
            registry: ModuleRegistry::new(),
            scheduler: Scheduler::new(),
            fanout: LoggerFanout::new(),
            checkpoints,
            cancel: CancellationToken::new(),
            errors,
            raw_errors_rx: Mutex::new(Some(raw_errors_rx)),
            public_errors_tx,
            public_errors_rx: Mutex::new(Some(public_errors_rx)),
            subscriptions: Mutex::new(HashMap::new()),
            webhooks: Mutex::new(HashMap::new()),
            started: Mutex::new(None),
            http_port: Mutex::new(None),
        })
    }

    /// Bring shared infrastructure up. Module loads are accepted after this.
    ///
    /// Also starts the error forwarder: every runtime error becomes a
    /// `system.error` record on the fan-out before reaching the channel
    /// handed out by [`Runtime::take_errors`].
    pub async fn start(&self) {
        *self.started.lock() = Some(self.clock.now());
        self.fanout
            .emit(None, PhaseRecord::system(Phase::SystemStart, self.clock.utc_now()))
            .await;

        let raw = self.raw_errors_rx.lock().take();
        if let Some(mut raw) = raw {
            let fanout = self.fanout.clone();
            let clock = self.clock.clone();
            let public = self.public_errors_tx.clone();
            tokio::spawn(async move {
                while let Some(error) = raw.recv().await {
                    fanout
                        .emit(
                            None,
                            PhaseRecord::system(Phase::SystemError, clock.utc_now())
                                .with_error(error.to_string()),
                        )
                        .await;
                    let _ = public.send(error);
                }
            });
        }
        info!(durable = self.options.wal_path.is_some(), "runtime started");
    }

    /// Build, initialize, register, and activate a module.
    ///
    /// Failure before registration leaves no side effects; failure while
    /// wiring rolls back (deregister + shutdown).
    pub async fn load_module(
        &self,
        config: ModuleConfig,
        connectors: ResolvedConnectors,
    ) -> Result<ModuleStatus, RuntimeError> {
        config.validate()?;
        if self.registry.get(&config.name).is_some() {
            return Err(RuntimeError::ModuleAlreadyLoaded(config.name));
        }

        let instance = Arc::new(ModuleInstance::new(config, connectors, &self.cancel));
        instance.initialize().await?;
        self.registry.register(Arc::clone(&instance))?;

        if let Err(e) = self.wire(&instance).await {
            self.registry.remove(instance.name());
            self.unwire(&instance).await;
            instance.shutdown().await;
            return Err(e);
        }

        info!(module = instance.name(), "module loaded");
        Ok(instance.status(self.clock.utc_now()))
    }

    /// Deactivate, unwire, deregister, and shut a module down.
    pub async fn unload_module(&self, name: &str) -> Result<(), RuntimeError> {
        let instance =
            self.registry.get(name).ok_or_else(|| RuntimeError::ModuleNotFound(name.to_string()))?;
        instance.deactivate();
        self.unwire(&instance).await;
        self.registry.remove(name);
        instance.shutdown().await;
        info!(module = name, "module unloaded");
        Ok(())
    }

    /// Unload then load under the same name, atomically from the caller's
    /// viewpoint: the registry never shows the name absent.
    ///
    /// The replacement is initialized first, so a bad new config leaves the
    /// old module running untouched.
    pub async fn reload_module(
        &self,
        name: &str,
        new_config: Option<ModuleConfig>,
        connectors: ResolvedConnectors,
    ) -> Result<ModuleStatus, RuntimeError> {
        let old =
            self.registry.get(name).ok_or_else(|| RuntimeError::ModuleNotFound(name.to_string()))?;
        let config = new_config.unwrap_or_else(|| old.config().clone());
        if config.name != name {
            return Err(sy_core::ConfigError::invalid("name", "reload cannot rename a module").into());
        }
        config.validate()?;

        let replacement = Arc::new(ModuleInstance::new(config, connectors, &self.cancel));
        replacement.initialize().await?;

        // Tear the old instance down while its registry entry stays visible.
        old.deactivate();
        self.unwire(&old).await;
        old.shutdown().await;

        self.registry.replace(name, Arc::clone(&replacement))?;
        if let Err(e) = self.wire(&replacement).await {
            self.registry.remove(name);
            self.unwire(&replacement).await;
            replacement.shutdown().await;
            return Err(e);
        }

        info!(module = name, "module reloaded");
        Ok(replacement.status(self.clock.utc_now()))
    }

    /// Publish an event to the bus on behalf of a loaded module.
    pub async fn inject(&self, module: &str, event: Event) -> Result<(), RuntimeError> {
        if self.registry.get(module).is_none() {
            return Err(RuntimeError::ModuleNotFound(module.to_string()));
        }
        self.fanout
            .emit(
                Some(module),
                PhaseRecord::for_event(Phase::SourceEmit, &event, self.clock.utc_now())
                    .with_module(module),
            )
            .await;
        self.bus.publish(module, &event)?;
        Ok(())
    }

    /// Dispatch an inbound webhook to its registered source and inject the
    /// events it returns.
    pub async fn handle_webhook(
        &self,
        source_id: &str,
        request: WebhookRequest,
    ) -> Result<WebhookResponse, RuntimeError> {
        let target = self
            .webhooks
            .lock()
            .get(source_id)
            .cloned()
            .ok_or_else(|| RuntimeError::WebhookUnknownSource(source_id.to_string()))?;

        let response = target.source.webhook(request).await.map_err(|e| {
            RuntimeError::Webhook { source_id: source_id.to_string(), message: e.to_string() }
        })?;

        for event in &response.events {
            self.inject(&target.module, event.clone()).await?;
        }
        Ok(response)
    }

    /// Runtime-wide snapshot.
    pub fn status(&self) -> RuntimeStatus {
        let uptime_ms = self
            .started
            .lock()
            .map(|s| self.clock.now().duration_since(s).as_millis() as u64)
            .unwrap_or(0);
        let now = self.clock.utc_now();
        RuntimeStatus {
            pid: std::process::id(),
            uptime_ms,
            http_port: *self.http_port.lock(),
            durable: self.options.wal_path.is_some(),
            pending_events: self.bus.pending_count(),
            modules: self.registry.list().iter().map(|i| i.status(now)).collect(),
        }
    }

    pub fn module_status(&self, name: &str) -> Result<ModuleStatus, RuntimeError> {
        self.registry
            .get(name)
            .map(|i| i.status(self.clock.utc_now()))
            .ok_or_else(|| RuntimeError::ModuleNotFound(name.to_string()))
    }

    pub fn module_summaries(&self) -> Vec<ModuleSummary> {
        self.registry.list().iter().map(|i| i.summary()).collect()
    }

    /// Receiver half of the runtime error channel. First caller takes it.
    /// Errors flow once [`Runtime::start`] has run.
    pub fn take_errors(&self) -> Option<UnboundedReceiver<RuntimeError>> {
        self.public_errors_rx.lock().take()
    }

    /// Config of a loaded module, for reloads that keep the old config.
    pub fn module_config(&self, name: &str) -> Option<ModuleConfig> {
        self.registry.get(name).map(|i| i.config().clone())
    }

    pub fn set_http_port(&self, port: Option<u16>) {
        *self.http_port.lock() = port;
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_stopping(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[doc(hidden)]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Unload every module in parallel, drain deliveries, flush the journal.
    pub async fn stop(self: &Arc<Self>) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.fanout
            .emit(None, PhaseRecord::system(Phase::SystemStop, self.clock.utc_now()))
            .await;
        self.cancel.cancel();

        let mut unloads = Vec::new();
        for name in self.registry.names() {
            let runtime = Arc::clone(self);
            unloads.push(tokio::spawn(async move {
                if let Err(e) = runtime.unload_module(&name).await {
                    warn!(module = %name, "unload during stop failed: {}", e);
                }
            }));
        }
        for unload in unloads {
            let _ = unload.await;
        }

        if let Err(e) = self.bus.flush() {
            warn!("journal flush on stop failed: {}", e);
        }
        info!("runtime stopped");
    }

    /// Attach routing, webhook ingress, loggers, and scheduling, then
    /// activate. Pending journal entries for the module re-dispatch once
    /// routing is live.
    async fn wire(&self, instance: &Arc<ModuleInstance>) -> Result<(), RuntimeError> {
        let module = instance.name().to_string();
        self.fanout.attach(&module, instance.loggers());

        for def in &instance.config().sources {
            let source = match instance.source(&def.name) {
                Some(source) => source,
                None => continue,
            };
            if source.accepts_webhooks() {
                let mut webhooks = self.webhooks.lock();
                if webhooks.contains_key(&def.name) {
                    return Err(RuntimeError::WebhookConflict(def.name.clone()));
                }
                webhooks.insert(
                    def.name.clone(),
                    WebhookTarget {
                        module: module.clone(),
                        source_name: def.name.clone(),
                        source: Arc::clone(&source),
                    },
                );
            }
        }

        let subscription = self
            .bus
            .subscribe(BusFilter::for_module(&module), self.routing_handler(Arc::clone(instance)));
        self.subscriptions.lock().insert(module.clone(), subscription);

        for def in &instance.config().sources {
            let interval = match instance.config().poll_interval(def)? {
                Some(interval) => interval,
                None => continue,
            };
            let (source, health) = match (instance.source(&def.name), instance.health(&def.name)) {
                (Some(source), Some(health)) => (source, health),
                _ => continue,
            };
            self.scheduler.schedule(PollSpec {
                module: module.clone(),
                source_name: def.name.clone(),
                source,
                interval,
                health,
                bus: self.bus.clone(),
                checkpoints: self.checkpoints.clone(),
                fanout: self.fanout.clone(),
                errors: self.errors.clone(),
                policy: self.options.circuit,
                clock: self.clock.clone(),
                cancel: instance.cancel_token().child_token(),
            });
        }

        instance.activate(&self.clock);
        self.bus.redispatch(Some(&module));
        Ok(())
    }

    /// Reverse of [`Runtime::wire`]: stop scheduling, drop webhook entries,
    /// unsubscribe routing (draining queued events within the grace period),
    /// detach loggers.
    async fn unwire(&self, instance: &Arc<ModuleInstance>) {
        let module = instance.name();
        self.scheduler.unschedule_module(module).await;
        self.webhooks.lock().retain(|_, target| target.module != module);

        let subscription = self.subscriptions.lock().remove(module);
        if let Some(subscription) = subscription {
            let drain = subscription.unsubscribe();
            if tokio::time::timeout(self.options.drain_timeout, drain).await.is_err() {
                warn!(module, "drain timed out with deliveries in flight");
            }
        }

        self.fanout.detach(module);
    }

    fn routing_handler(&self, instance: Arc<ModuleInstance>) -> BusHandler {
        let ctx = Arc::new(RouteCtx {
            instance,
            bus: self.bus.clone(),
            fanout: self.fanout.clone(),
            errors: self.errors.clone(),
            clock: self.clock.clone(),
            delivery_timeout: self.options.delivery_timeout,
        });
        Arc::new(move |bus_event| {
            let ctx = Arc::clone(&ctx);
            Box::pin(async move {
                handle_routed_event(ctx, bus_event).await;
                Ok(())
            })
        })
    }
}

struct RouteCtx<C: Clock> {
    instance: Arc<ModuleInstance>,
    bus: EventBus,
    fanout: LoggerFanout,
    errors: ErrorSink,
    clock: C,
    delivery_timeout: Duration,
}

/// Route one bus event through the module: match, pipeline, deliver, ack.
///
/// The ack happens only after every matched route finished, so a crash
/// mid-pipeline replays the event from the journal.
async fn handle_routed_event<C: Clock>(ctx: Arc<RouteCtx<C>>, bus_event: BusEvent) {
    let module = bus_event.module.as_str();
    let event = &bus_event.event;

    let routes = match_routes(event, ctx.instance.routes());
    if routes.is_empty() {
        ctx.fanout
            .emit(
                Some(module),
                PhaseRecord::for_event(Phase::RouteNoMatch, event, ctx.clock.utc_now())
                    .with_module(module),
            )
            .await;
        if let Err(e) = ctx.bus.ack(&event.id) {
            ctx.errors.report(RuntimeError::Publish(e));
        }
        return;
    }

    for route in routes {
        ctx.instance.counters.routed.fetch_add(1, Ordering::Relaxed);
        ctx.fanout
            .emit(
                Some(module),
                PhaseRecord::for_event(Phase::RouteMatch, event, ctx.clock.utc_now())
                    .with_module(module)
                    .with_route(&route.name),
            )
            .await;

        let context = TransformContext {
            source: event.source.clone(),
            target: route.then.actor.clone(),
            event_type: event.kind.as_str().to_string(),
            route_name: route.name.clone(),
            module_name: module.to_string(),
        };
        let verdict = run_pipeline(
            event.clone(),
            route,
            ctx.instance.transform_set(),
            &context,
            &ctx.fanout,
            &ctx.clock,
            module,
        )
        .await;

        match verdict {
            PipelineVerdict::Deliver(ready) => match ctx.instance.actor(&route.then.actor) {
                Some(actor) => {
                    let result = deliver_event(
                        &ready,
                        route,
                        actor,
                        ctx.delivery_timeout,
                        &ctx.fanout,
                        &ctx.clock,
                        module,
                    )
                    .await;
                    match result {
                        DeliveryResult::Delivered => {
                            ctx.instance.counters.delivered.fetch_add(1, Ordering::Relaxed);
                        }
                        DeliveryResult::Rejected(_) => {
                            ctx.instance.counters.failed.fetch_add(1, Ordering::Relaxed);
                        }
                        DeliveryResult::Failed(message) => {
                            ctx.instance.counters.failed.fetch_add(1, Ordering::Relaxed);
                            ctx.errors.report(RuntimeError::Delivery {
                                module: module.to_string(),
                                actor: route.then.actor.clone(),
                                message,
                            });
                        }
                    }
                }
                None => {
                    ctx.errors.report(RuntimeError::Delivery {
                        module: module.to_string(),
                        actor: route.then.actor.clone(),
                        message: "actor not resolved".to_string(),
                    });
                }
            },
            PipelineVerdict::Dropped => {}
            PipelineVerdict::Halted(error) => {
                ctx.errors.report(RuntimeError::TransformHalt {
                    route: route.name.clone(),
                    source: error,
                });
            }
        }
    }

    if let Err(e) = ctx.bus.ack(&event.id) {
        ctx.errors.report(RuntimeError::Publish(e));
    }
}

#[cfg(test)]
#[path = "runtime_tests/mod.rs"]
mod tests;
