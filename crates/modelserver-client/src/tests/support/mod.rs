//! Shared fixtures for the crate's tests.

mod recording_channel;
mod recording_listener;
mod scripted_transport;

use modelserver_config::{ApiVersion, Config};

pub(crate) use recording_channel::RecordingChannelFactory;
pub(crate) use recording_listener::{ListenerEvent, RecordingListener};
pub(crate) use scripted_transport::ScriptedTransport;

pub(crate) const BREWER: &str = "SuperBrewer3000.coffee";
pub(crate) const BASE_URL: &str = "http://localhost:8081/";

/// Configuration targeting a local server with the given API version.
pub(crate) fn config_for(api_version: ApiVersion) -> Config {
    Config::default()
        .with_base_url(BASE_URL)
        .with_api_version(api_version)
}
