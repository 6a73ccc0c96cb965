//! Per-stream record owned by the engine loop.

use ringbuf::traits::{Consumer as _, Observer as _};

use super::StreamStats;
use crate::device::{SampleReader, StreamDirection, StreamKey};
use crate::pipeline::registry::{ConsumerRegistry, SpectrumTap};
use crate::pipeline::{MirroredRingBuffer, StreamCorrector};
use crate::{EngineConfig, SampleBlock, SignalParams};

/// How a pump pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PumpOutcome {
    /// Samples committed during the pass.
    pub(crate) delivered: usize,
    /// Samples are left in the port or the ring.
    pub(crate) more: bool,
}

/// Everything the engine knows about one stream.
pub(crate) struct Stream {
    pub(crate) key: StreamKey,
    pub(crate) params: SignalParams,
    pub(crate) connected: bool,
    pub(crate) ring: MirroredRingBuffer,
    pub(crate) corrector: StreamCorrector,
    pub(crate) consumers: ConsumerRegistry,
    pub(crate) port: Option<SampleReader>,
    pub(crate) delivered: u64,
}

impl Stream {
    pub(crate) fn new(key: StreamKey, connected: bool, config: &EngineConfig) -> Self {
        Self {
            key,
            params: SignalParams::default(),
            connected,
            ring: MirroredRingBuffer::new(config.ring_capacity),
            corrector: StreamCorrector::new(config.correction),
            consumers: ConsumerRegistry::new(config.dedicated_queue_depth),
            port: None,
            delivered: 0,
        }
    }

    /// Most samples one pump pass may deliver: a second's worth, or one full
    /// ring when the rate is unknown.
    pub(crate) fn budget(&self) -> usize {
        match self.params.sample_rate {
            0 => self.ring.capacity(),
            rate => rate as usize,
        }
    }

    /// Empties the ring and discards whatever the port holds.
    pub(crate) fn flush(&mut self) {
        self.ring.reset();
        if let Some(port) = &mut self.port {
            port.clear();
        }
    }

    pub(crate) fn port_has_data(&self) -> bool {
        self.port.as_ref().is_some_and(|port| !port.is_empty())
    }

    /// Moves as many samples as fit from the port into the ring.
    pub(crate) fn transfer(&mut self) -> usize {
        let Some(port) = &mut self.port else {
            return 0;
        };
        let mut moved = 0;
        loop {
            let run = self.ring.vacant_run();
            if run.is_empty() {
                break;
            }
            let n = port.pop_slice(run);
            if n == 0 {
                break;
            }
            self.ring.advance_write(n);
            moved += n;
        }
        moved
    }

    /// Delivers buffered samples until the ring runs dry, the budget is
    /// spent, or `interrupted` reports a waiting control request.
    ///
    /// Receive streams are corrected in place and fanned out to inline
    /// consumers, the spectrum tap and dedicated consumers. Transmit streams
    /// only forward what was consumed to the spectrum tap.
    pub(crate) fn pump(
        &mut self,
        spectrum: &mut SpectrumTap,
        interrupted: impl Fn() -> bool,
        mut on_overflow: impl FnMut(StreamKey, &str, u64),
    ) -> PumpOutcome {
        let budget = self.budget();
        let mut delivered = 0;

        loop {
            if interrupted() {
                break;
            }
            self.transfer();
            if self.ring.fill() == 0 || delivered >= budget {
                break;
            }

            let ranges = self.ring.read_begin(self.ring.fill().min(budget - delivered));
            let count = ranges.len();

            match self.key.direction {
                StreamDirection::Rx => {
                    let samples = self.ring.range_mut(ranges.first);
                    self.corrector.process(samples);
                    self.consumers.deliver_inline(samples);
                    if spectrum.is_bound_to(self.key) {
                        spectrum.feed(samples);
                    }
                    if self.consumers.has_dedicated() {
                        let block = SampleBlock::with_key(
                            &*samples,
                            self.delivered,
                            self.params,
                            self.key,
                        );
                        let key = self.key;
                        self.consumers.deliver_dedicated(&block, |name, dropped| {
                            on_overflow(key, name, dropped);
                        });
                    }
                    self.ring.read_commit(count);
                }
                StreamDirection::Tx => {
                    let consumed = self.ring.read_commit(count);
                    if spectrum.is_bound_to(self.key) {
                        spectrum.feed(self.ring.last_consumed(consumed));
                    }
                }
            }

            self.delivered += count as u64;
            delivered += count;
        }

        PumpOutcome {
            delivered,
            more: self.ring.fill() > 0 || self.port_has_data(),
        }
    }

    pub(crate) fn stats(&self) -> StreamStats {
        StreamStats {
            key: self.key,
            params: self.params,
            connected: self.connected,
            buffered: self.ring.fill(),
            delivered: self.delivered,
            consumers: self.consumers.len(),
            dropped_blocks: self.consumers.dropped_blocks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sample_queue;
    use crate::{Consumer, ConsumerId, ExecutionMode, Sample};
    use parking_lot::Mutex;
    use ringbuf::traits::Producer as _;
    use std::sync::Arc;

    struct Collect(Arc<Mutex<Vec<Sample>>>);

    impl Consumer for Collect {
        fn name(&self) -> &str {
            "collect"
        }

        fn accept(&mut self, samples: &[Sample]) {
            self.0.lock().extend_from_slice(samples);
        }
    }

    fn ramp(len: usize) -> Vec<Sample> {
        (0..len).map(|n| Sample::new(n as f32, 0.0)).collect()
    }

    fn small_config() -> EngineConfig {
        EngineConfig {
            ring_capacity: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_pump_delivers_in_order_through_small_ring() {
        let mut stream = Stream::new(StreamKey::rx(0), true, &small_config());
        stream.params = SignalParams::new(1000, 0);
        let (mut writer, reader) = sample_queue(64);
        stream.port = Some(reader);
        writer.push_slice(&ramp(30));

        let seen = Arc::new(Mutex::new(Vec::new()));
        stream
            .consumers
            .push(ConsumerId::new(1), Box::new(Collect(seen.clone())), ExecutionMode::Inline);
        stream.consumers.start_inline();

        let mut spectrum = SpectrumTap::default();
        let outcome = stream.pump(&mut spectrum, || false, |_, _, _| {});

        assert_eq!(outcome.delivered, 30);
        assert!(!outcome.more);
        assert_eq!(*seen.lock(), ramp(30));
        assert_eq!(stream.stats().delivered, 30);
    }

    #[test]
    fn test_pump_respects_budget() {
        let mut stream = Stream::new(StreamKey::rx(0), true, &small_config());
        stream.params = SignalParams::new(10, 0);
        let (mut writer, reader) = sample_queue(64);
        stream.port = Some(reader);
        writer.push_slice(&ramp(25));

        let mut spectrum = SpectrumTap::default();
        let first = stream.pump(&mut spectrum, || false, |_, _, _| {});
        assert_eq!(first.delivered, 10);
        assert!(first.more);

        let second = stream.pump(&mut spectrum, || false, |_, _, _| {});
        let third = stream.pump(&mut spectrum, || false, |_, _, _| {});
        assert_eq!(second.delivered + third.delivered, 15);
        assert!(!third.more);
    }

    #[test]
    fn test_pump_yields_to_pending_requests() {
        let mut stream = Stream::new(StreamKey::rx(0), true, &small_config());
        let (mut writer, reader) = sample_queue(64);
        stream.port = Some(reader);
        writer.push_slice(&ramp(5));

        let mut spectrum = SpectrumTap::default();
        let outcome = stream.pump(&mut spectrum, || true, |_, _, _| {});
        assert_eq!(outcome.delivered, 0);
        assert!(outcome.more);
    }

    #[test]
    fn test_tx_stream_feeds_spectrum_with_consumed_samples() {
        let mut stream = Stream::new(StreamKey::tx(0), false, &small_config());
        stream.params = SignalParams::new(1000, 0);
        let (mut writer, reader) = sample_queue(64);
        stream.port = Some(reader);
        writer.push_slice(&ramp(12));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut spectrum = SpectrumTap::default();
        spectrum.bind(Box::new(Collect(seen.clone())));
        spectrum.set_input(StreamKey::tx(0));
        spectrum.start();

        let outcome = stream.pump(&mut spectrum, || false, |_, _, _| {});
        assert_eq!(outcome.delivered, 12);
        assert_eq!(*seen.lock(), ramp(12));
    }

    #[test]
    fn test_flush_discards_port_and_ring() {
        let mut stream = Stream::new(StreamKey::rx(0), true, &small_config());
        let (mut writer, reader) = sample_queue(64);
        stream.port = Some(reader);
        writer.push_slice(&ramp(20));
        stream.transfer();

        stream.flush();
        assert_eq!(stream.ring.fill(), 0);
        assert!(!stream.port_has_data());
    }
}
