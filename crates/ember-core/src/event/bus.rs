// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Mutex;

use crate::sync::MutexExt;

/// A fan-out event channel.
///
/// Every call to [`subscribe`](EventBus::subscribe) creates an independent
/// unbounded `flume` channel; [`publish`](EventBus::publish) clones the event
/// into each live subscriber. Subscribers whose receiver has been dropped are
/// pruned on the next publish.
#[derive(Debug)]
pub struct EventBus<T: Clone + Send + 'static> {
    subscribers: Mutex<Vec<flume::Sender<T>>>,
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Creates a bus without subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new subscriber and returns its receiving end.
    ///
    /// ## Returns
    /// An unbounded receiver that gets every event published from now on.
    pub fn subscribe(&self) -> flume::Receiver<T> {
        let (sender, receiver) = flume::unbounded();
        let mut subscribers = self.subscribers.lock_recover();
        subscribers.push(sender);
        log::debug!("EventBus subscriber added ({} total).", subscribers.len());
        receiver
    }

    /// Delivers `event` to every live subscriber.
    ///
    /// ## Arguments
    /// * `event` - The event, cloned once per subscriber.
    ///
    /// ## Returns
    /// The number of subscribers that received it.
    pub fn publish(&self, event: T) -> usize {
        let mut subscribers = self.subscribers.lock_recover();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        log::trace!("Published an event to {} subscriber(s).", subscribers.len());
        subscribers.len()
    }

    /// Returns the number of subscribers still registered.
    ///
    /// Disconnected subscribers are only noticed on publish, so this may
    /// over-count until then.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock_recover().len()
    }
}

impl<T: Clone + Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
