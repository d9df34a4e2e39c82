// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sy-runtime: The Switchyard runtime engine
//!
//! Event bus, router, transform pipeline, delivery, poll scheduler with
//! circuit breaking, module lifecycle, and the runtime composition root.

pub mod bus;
pub mod connector;
pub mod deliver;
pub mod error;
pub mod fanout;
pub mod module;
pub mod pipeline;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod scheduler;
mod script;
pub mod status;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use bus::{BusEvent, BusFilter, BusHandler, EventBus, Subscription};
pub use connector::{
    Actor, ConnectorError, ConnectorFactory, ConnectorResult, Delivery, Logger, PollOutcome,
    Source, Transform, TransformContext, TransformOutcome, WebhookRequest, WebhookResponse,
};
pub use deliver::DeliveryResult;
pub use error::{ErrorSink, RuntimeError};
pub use fanout::LoggerFanout;
pub use module::{ModuleInstance, ModuleState, ResolvedConnectors};
pub use pipeline::{PipelineVerdict, TransformError, TransformSet};
pub use registry::ModuleRegistry;
pub use router::match_routes;
pub use runtime::{Runtime, RuntimeOptions, WebhookTarget};
pub use scheduler::{PollSpec, Scheduler};
pub use script::DROP_EXIT_CODE;
pub use status::{ModuleStatus, ModuleSummary, RuntimeStatus, SourceStatus};
