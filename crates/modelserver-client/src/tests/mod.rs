//! Crate-level tests driving the client and subscription manager together.

mod edit_behaviour;
mod subscription_behaviour;
mod support;
