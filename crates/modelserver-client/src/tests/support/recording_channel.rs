//! Channel factory that records traffic instead of touching the network.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::transport::{Channel, ChannelAddress, ChannelFactory, TransportError};

/// Everything the factory and its channels observed.
#[derive(Debug, Default)]
pub(crate) struct ChannelFactoryState {
    pub(crate) opened: Vec<ChannelAddress>,
    pub(crate) sent: Vec<(String, String)>,
    pub(crate) closed: Vec<String>,
    pub(crate) fail_open: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingChannelFactory {
    state: Arc<Mutex<ChannelFactoryState>>,
}

impl RecordingChannelFactory {
    /// Makes every following `open` fail with `message`.
    pub(crate) fn fail_open_with(&self, message: &str) {
        self.state().fail_open = Some(message.to_owned());
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ChannelFactoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn opened(&self) -> Vec<ChannelAddress> {
        self.state().opened.clone()
    }

    /// Address of the most recent channel opened for `modeluri`, as a
    /// transport would echo it back with channel events.
    pub(crate) fn address_of(&self, modeluri: &str) -> ChannelAddress {
        self.state()
            .opened
            .iter()
            .rev()
            .find(|address| address.modeluri() == modeluri)
            .cloned()
            .unwrap_or_else(|| panic!("no channel opened for {modeluri}"))
    }

    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.state().sent.clone()
    }

    pub(crate) fn closed(&self) -> Vec<String> {
        self.state().closed.clone()
    }
}

impl ChannelFactory for RecordingChannelFactory {
    fn open(&self, address: &ChannelAddress) -> Result<Box<dyn Channel>, TransportError> {
        let mut state = self.state();
        if let Some(message) = &state.fail_open {
            return Err(TransportError::new(message.clone()));
        }
        state.opened.push(address.clone());
        Ok(Box::new(RecordingChannel {
            modeluri: address.modeluri().to_owned(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct RecordingChannel {
    modeluri: String,
    state: Arc<Mutex<ChannelFactoryState>>,
}

impl RecordingChannel {
    fn state(&self) -> MutexGuard<'_, ChannelFactoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Channel for RecordingChannel {
    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let modeluri = self.modeluri.clone();
        self.state().sent.push((modeluri, text.to_owned()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let modeluri = self.modeluri.clone();
        self.state().closed.push(modeluri);
        Ok(())
    }
}
