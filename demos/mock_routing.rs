//! Mock routing example.
//!
//! Routes a DC-offset tone from a mock two-channel receiver to an inline
//! power meter, a dedicated channel consumer and the spectrum tap, then
//! retunes the device while running.
//!
//! Run with: cargo run --example mock_routing
//! Set `RUST_LOG=sdr_router=debug` for engine logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sdr_router::device::{tone, MockDevice, StreamDirection, StreamKey};
use sdr_router::{
    ChannelConsumer, Consumer, CorrectionSettings, EngineEvent, ExecutionMode, RoutingEngine,
    Sample, SampleBlock, SignalParams,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Tracks the mean power of everything it receives.
struct PowerMeter {
    samples: Arc<AtomicU64>,
    power_bits: Arc<AtomicU64>,
}

impl Consumer for PowerMeter {
    fn name(&self) -> &str {
        "power-meter"
    }

    fn on_signal_changed(&mut self, params: SignalParams) {
        println!("[power-meter] signal is now {params}");
    }

    fn accept(&mut self, samples: &[Sample]) {
        let power = samples.iter().map(|s| f64::from(s.norm_sqr())).sum::<f64>() / samples.len() as f64;
        self.power_bits.store(power.to_bits(), Ordering::Relaxed);
        self.samples.fetch_add(samples.len() as u64, Ordering::Relaxed);
    }
}

/// Counts what reaches the spectrum tap.
struct SpectrumCounter(Arc<AtomicU64>);

impl Consumer for SpectrumCounter {
    fn name(&self) -> &str {
        "spectrum"
    }

    fn accept(&mut self, samples: &[Sample]) {
        self.0.fetch_add(samples.len() as u64, Ordering::Relaxed);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sdr_router=info")),
        )
        .init();

    let rx0 = StreamKey::rx(0);
    let device = MockDevice::new(2, 0)
        .with_description("mock dual receiver")
        .with_signal(rx0, SignalParams::new(250_000, 433_920_000));
    let radio = device.handle();

    let engine = RoutingEngine::builder()
        .on_event(|event| match event {
            EngineEvent::ConsumerOverflow { consumer, dropped_blocks, .. } => {
                eprintln!("[event] {consumer} dropped {dropped_blocks} blocks");
            }
            other => println!("[event] {other:?}"),
        })
        .spawn()?;

    engine.attach_device(device).await?;
    let index = engine.add_stream(StreamDirection::Rx, true).await?;
    engine
        .configure_correction(index, CorrectionSettings::FULL)
        .await?;

    let samples = Arc::new(AtomicU64::new(0));
    let power_bits = Arc::new(AtomicU64::new(0));
    engine
        .attach_consumer(
            index,
            PowerMeter {
                samples: samples.clone(),
                power_bits: power_bits.clone(),
            },
            ExecutionMode::Inline,
        )
        .await?;

    let (tx, mut blocks) = mpsc::channel::<SampleBlock>(64);
    engine
        .attach_consumer(index, ChannelConsumer::with_name("recorder", tx), ExecutionMode::Dedicated)
        .await?;

    let spectrum = Arc::new(AtomicU64::new(0));
    engine.bind_spectrum(SpectrumCounter(spectrum.clone())).await?;

    println!("init  -> {}", engine.init().await?);
    println!("start -> {}", engine.start().await?);

    let recorder = tokio::spawn(async move {
        let mut received = 0usize;
        while let Some(block) = blocks.recv().await {
            received += block.len();
        }
        received
    });

    let offset = Sample::new(0.3, -0.2);
    for round in 0..20 {
        radio.push(rx0, &tone(25_000, 0.01, 0.5, offset));
        if round == 10 {
            radio.retune(rx0, SignalParams::new(250_000, 434_000_000));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let stats = engine.stats().await?;
    println!(
        "delivered {} samples, {} buffered, mean power {:.3}",
        stats.rx[0].delivered,
        stats.rx[0].buffered,
        f64::from_bits(power_bits.load(Ordering::Relaxed))
    );
    println!(
        "power meter saw {}, spectrum saw {}",
        samples.load(Ordering::Relaxed),
        spectrum.load(Ordering::Relaxed)
    );

    println!("stop  -> {}", engine.stop().await?);
    engine.shutdown().await?;

    println!("recorder received {} samples", recorder.await?);
    Ok(())
}
