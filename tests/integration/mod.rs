//! Integration Tests Module
//!
//! End-to-end tests for the research engine. Collaborators are scripted
//! (model backend, web tool) or run against temp directories (document
//! index, memory store); nothing touches the network.

// Shared scripted collaborators
mod support;

// Plan validation properties
mod validator_test;


// Local file resolution order
mod resolver_test;

// Plan execution, dry runs, step cap and memory projection
mod executor_test;

// Plan creation and plan-then-execute
mod planner_test;

// SQLite memory store and bridge
mod memory_test;
