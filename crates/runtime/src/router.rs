// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route matching.
//!
//! Pure function over an event and a module's route list. Matches come back
//! in declaration order and each is processed independently: fan-out, no
//! route cancels another.

use sy_core::{Event, Route};

/// All routes whose trigger fires for this event, in declaration order.
pub fn match_routes<'a>(event: &Event, routes: &'a [Route]) -> Vec<&'a Route> {
    routes.iter().filter(|route| route.when.matches(event)).collect()
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
