//! Per-stream consumer lists and the rebindable spectrum tap.

use crate::consumer::dedicated::DedicatedConsumer;
use crate::device::StreamKey;
use crate::{Consumer, ConsumerId, ExecutionMode, Sample, SampleBlock, SignalParams};

struct InlineEntry {
    id: ConsumerId,
    consumer: Box<dyn Consumer>,
    running: bool,
}

struct DedicatedEntry {
    id: ConsumerId,
    consumer: DedicatedConsumer,
}

/// A consumer taken out of a registry.
pub(crate) enum Detached {
    Inline(Box<dyn Consumer>),
    Dedicated(DedicatedConsumer),
}

impl Detached {
    pub(crate) fn name(&self) -> &str {
        match self {
            Self::Inline(consumer) => consumer.name(),
            Self::Dedicated(consumer) => consumer.name(),
        }
    }
}

/// The consumers of one receive stream, inline and dedicated, each list in
/// registration order.
pub(crate) struct ConsumerRegistry {
    inline: Vec<InlineEntry>,
    dedicated: Vec<DedicatedEntry>,
    queue_depth: usize,
}

impl ConsumerRegistry {
    pub(crate) fn new(dedicated_queue_depth: usize) -> Self {
        Self {
            inline: Vec::new(),
            dedicated: Vec::new(),
            queue_depth: dedicated_queue_depth,
        }
    }

    /// Registers a consumer. Dedicated consumers get their worker here.
    pub(crate) fn push(&mut self, id: ConsumerId, consumer: Box<dyn Consumer>, mode: ExecutionMode) {
        match mode {
            ExecutionMode::Inline => self.inline.push(InlineEntry {
                id,
                consumer,
                running: false,
            }),
            ExecutionMode::Dedicated => self.dedicated.push(DedicatedEntry {
                id,
                consumer: DedicatedConsumer::spawn(consumer, self.queue_depth),
            }),
        }
    }

    /// Unregisters a consumer, stopping it first if it is running.
    pub(crate) fn remove(&mut self, id: ConsumerId) -> Option<Detached> {
        if let Some(pos) = self.inline.iter().position(|e| e.id == id) {
            let mut entry = self.inline.remove(pos);
            if entry.running {
                entry.consumer.stop();
            }
            return Some(Detached::Inline(entry.consumer));
        }
        let pos = self.dedicated.iter().position(|e| e.id == id)?;
        let entry = self.dedicated.remove(pos);
        entry.consumer.stop();
        Some(Detached::Dedicated(entry.consumer))
    }

    pub(crate) fn len(&self) -> usize {
        self.inline.len() + self.dedicated.len()
    }

    pub(crate) fn has_dedicated(&self) -> bool {
        !self.dedicated.is_empty()
    }

    pub(crate) fn dropped_blocks(&self) -> u64 {
        self.dedicated.iter().map(|e| e.consumer.dropped_blocks()).sum()
    }

    /// Sends new signal parameters to every consumer, inline ones first.
    pub(crate) fn notify_all(&mut self, params: SignalParams) {
        for entry in &mut self.inline {
            entry.consumer.on_signal_changed(params);
        }
        for entry in &self.dedicated {
            entry.consumer.on_signal_changed(params);
        }
    }

    pub(crate) fn start_inline(&mut self) {
        for entry in self.inline.iter_mut().filter(|e| !e.running) {
            entry.consumer.start();
            entry.running = true;
        }
    }

    pub(crate) fn stop_inline(&mut self) {
        for entry in self.inline.iter_mut().filter(|e| e.running) {
            entry.consumer.stop();
            entry.running = false;
        }
    }

    pub(crate) fn start_dedicated(&self) {
        for entry in &self.dedicated {
            entry.consumer.start();
        }
    }

    pub(crate) fn stop_dedicated(&self) {
        for entry in &self.dedicated {
            entry.consumer.stop();
        }
    }

    /// Starts one consumer, whichever list it is in.
    pub(crate) fn start_one(&mut self, id: ConsumerId) {
        if let Some(entry) = self.inline.iter_mut().find(|e| e.id == id) {
            if !entry.running {
                entry.consumer.start();
                entry.running = true;
            }
        } else if let Some(entry) = self.dedicated.iter().find(|e| e.id == id) {
            entry.consumer.start();
        }
    }

    /// Hands a borrowed range to every running inline consumer.
    pub(crate) fn deliver_inline(&mut self, samples: &[Sample]) {
        for entry in self.inline.iter_mut().filter(|e| e.running) {
            entry.consumer.accept(samples);
        }
    }

    /// Queues a shared block for every dedicated consumer.
    ///
    /// `on_overflow` receives the consumer name and its total drop count
    /// whenever a queue is full.
    pub(crate) fn deliver_dedicated(&self, block: &SampleBlock, mut on_overflow: impl FnMut(&str, u64)) {
        for entry in &self.dedicated {
            if let Some(dropped) = entry.consumer.offer(block) {
                on_overflow(entry.consumer.name(), dropped);
            }
        }
    }
}

/// The single spectrum consumer and the stream feeding it.
///
/// The input may name any stream, receive or transmit, including one that
/// does not exist yet; the tap is simply not fed until it does.
pub(crate) struct SpectrumTap {
    consumer: Option<Box<dyn Consumer>>,
    input: StreamKey,
    running: bool,
}

impl Default for SpectrumTap {
    fn default() -> Self {
        Self {
            consumer: None,
            input: StreamKey::rx(0),
            running: false,
        }
    }
}

impl SpectrumTap {
    /// Installs a consumer, returning the previous one after stopping it.
    pub(crate) fn bind(&mut self, consumer: Box<dyn Consumer>) -> Option<Box<dyn Consumer>> {
        let previous = self.unbind();
        self.consumer = Some(consumer);
        previous
    }

    /// Removes the consumer, stopping it if it is running.
    pub(crate) fn unbind(&mut self) -> Option<Box<dyn Consumer>> {
        let mut consumer = self.consumer.take()?;
        if self.running {
            consumer.stop();
            self.running = false;
        }
        Some(consumer)
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.consumer.is_some()
    }

    pub(crate) fn input(&self) -> StreamKey {
        self.input
    }

    pub(crate) fn set_input(&mut self, key: StreamKey) {
        self.input = key;
    }

    /// True if a consumer is bound and fed from `key`.
    pub(crate) fn is_bound_to(&self, key: StreamKey) -> bool {
        self.consumer.is_some() && self.input == key
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.consumer.as_deref().map(|c| c.name())
    }

    pub(crate) fn notify(&mut self, params: SignalParams) {
        if let Some(consumer) = &mut self.consumer {
            consumer.on_signal_changed(params);
        }
    }

    pub(crate) fn feed(&mut self, samples: &[Sample]) {
        if !self.running {
            return;
        }
        if let Some(consumer) = &mut self.consumer {
            consumer.accept(samples);
        }
    }

    pub(crate) fn start(&mut self) {
        if self.running {
            return;
        }
        if let Some(consumer) = &mut self.consumer {
            consumer.start();
            self.running = true;
        }
    }

    pub(crate) fn stop(&mut self) {
        if !self.running {
            return;
        }
        if let Some(consumer) = &mut self.consumer {
            consumer.stop();
        }
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Journaling {
        name: String,
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl Journaling {
        fn boxed(name: &str, journal: &Arc<Mutex<Vec<String>>>) -> Box<dyn Consumer> {
            Box::new(Self {
                name: name.to_string(),
                journal: journal.clone(),
            })
        }
    }

    impl Consumer for Journaling {
        fn name(&self) -> &str {
            &self.name
        }

        fn on_signal_changed(&mut self, params: SignalParams) {
            self.journal
                .lock()
                .push(format!("{} signal {}", self.name, params.sample_rate));
        }

        fn accept(&mut self, samples: &[Sample]) {
            self.journal
                .lock()
                .push(format!("{} accept {}", self.name, samples.len()));
        }

        fn start(&mut self) {
            self.journal.lock().push(format!("{} start", self.name));
        }

        fn stop(&mut self) {
            self.journal.lock().push(format!("{} stop", self.name));
        }
    }

    #[tokio::test]
    async fn test_notify_in_registration_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ConsumerRegistry::new(4);
        registry.push(ConsumerId::new(1), Journaling::boxed("a", &journal), ExecutionMode::Inline);
        registry.push(ConsumerId::new(2), Journaling::boxed("b", &journal), ExecutionMode::Dedicated);
        registry.push(ConsumerId::new(3), Journaling::boxed("c", &journal), ExecutionMode::Inline);

        registry.notify_all(SignalParams::new(10, 0));
        assert_eq!(
            *journal.lock(),
            vec!["a signal 10", "c signal 10", "b signal 10"]
        );
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn test_inline_delivery_only_while_running() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ConsumerRegistry::new(4);
        registry.push(ConsumerId::new(1), Journaling::boxed("a", &journal), ExecutionMode::Inline);

        registry.deliver_inline(&[Sample::new(0.0, 0.0); 4]);
        registry.start_inline();
        registry.start_inline();
        registry.deliver_inline(&[Sample::new(0.0, 0.0); 4]);
        registry.stop_inline();
        registry.stop_inline();

        assert_eq!(*journal.lock(), vec!["a start", "a accept 4", "a stop"]);
    }

    #[tokio::test]
    async fn test_remove_stops_running_consumer() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ConsumerRegistry::new(4);
        registry.push(ConsumerId::new(1), Journaling::boxed("a", &journal), ExecutionMode::Inline);
        registry.start_inline();

        let removed = registry.remove(ConsumerId::new(1)).unwrap();
        assert_eq!(removed.name(), "a");
        assert!(registry.remove(ConsumerId::new(1)).is_none());
        assert_eq!(*journal.lock(), vec!["a start", "a stop"]);
    }

    #[test]
    fn test_spectrum_tap_binding() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut tap = SpectrumTap::default();
        assert!(!tap.is_bound_to(StreamKey::rx(0)));

        assert!(tap.bind(Journaling::boxed("fft", &journal)).is_none());
        assert!(tap.is_bound_to(StreamKey::rx(0)));

        tap.set_input(StreamKey::tx(1));
        assert!(!tap.is_bound_to(StreamKey::rx(0)));
        assert!(tap.is_bound_to(StreamKey::tx(1)));
        assert_eq!(tap.name(), Some("fft"));
    }

    #[test]
    fn test_spectrum_tap_feeds_only_while_running() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut tap = SpectrumTap::default();
        tap.bind(Journaling::boxed("fft", &journal));

        tap.feed(&[Sample::new(0.0, 0.0); 2]);
        tap.start();
        tap.feed(&[Sample::new(0.0, 0.0); 2]);
        let old = tap.bind(Journaling::boxed("fft2", &journal));

        assert!(old.is_some());
        assert_eq!(*journal.lock(), vec!["fft start", "fft accept 2", "fft stop"]);
    }
}
