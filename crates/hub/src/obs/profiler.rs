//! Process profiler: last-write-wins gauges, per-name timers, scheduler-lag
//! observation, periodic RSS/CPU sampling, and the external-process
//! snapshots reported by the screen client and the overlay.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use sn_domain::now_ms;

/// RSS/CPU and lag-window roll-up cadence.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(10);
/// Scheduler-lag probe cadence.
const LAG_PROBE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimerStat {
    pub count: u64,
    pub total_ms: f64,
    pub last_ms: f64,
    pub max_ms: f64,
}

#[derive(Default)]
struct LagWindow {
    samples: Vec<f64>,
}

pub struct Profiler {
    gauges: RwLock<HashMap<String, f64>>,
    timers: RwLock<HashMap<String, TimerStat>>,
    lag: Mutex<LagWindow>,
    sense_snapshot: RwLock<Option<serde_json::Value>>,
    overlay_snapshot: RwLock<Option<serde_json::Value>>,
    started: Instant,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self {
            gauges: RwLock::new(HashMap::new()),
            timers: RwLock::new(HashMap::new()),
            lag: Mutex::new(LagWindow::default()),
            sense_snapshot: RwLock::new(None),
            overlay_snapshot: RwLock::new(None),
            started: Instant::now(),
        }
    }

    pub fn gauge(&self, name: &str, value: f64) {
        self.gauges.write().insert(name.to_string(), value);
    }

    pub fn timer_record(&self, name: &str, d_ms: f64) {
        let mut timers = self.timers.write();
        let stat = timers.entry(name.to_string()).or_default();
        stat.count += 1;
        stat.total_ms += d_ms;
        stat.last_ms = d_ms;
        if d_ms > stat.max_ms {
            stat.max_ms = d_ms;
        }
    }

    /// Run a future, recording its wall time under `name`.
    pub async fn time_async<T, F>(&self, name: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let out = fut.await;
        self.timer_record(name, start.elapsed().as_secs_f64() * 1_000.0);
        out
    }

    // ── External snapshots ─────────────────────────────────────────

    pub fn record_sense_snapshot(&self, snapshot: serde_json::Value) {
        *self.sense_snapshot.write() = Some(snapshot);
    }

    pub fn record_overlay_snapshot(&self, snapshot: serde_json::Value) {
        *self.overlay_snapshot.write() = Some(snapshot);
    }

    // ── Snapshot exposure ──────────────────────────────────────────

    /// Combined snapshot for `/health` and the overlay `profiling` push.
    /// External snapshots read `null` until first report.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "ts": now_ms(),
            "uptimeS": self.started.elapsed().as_secs_f64(),
            "gauges": self.gauges.read().clone(),
            "timers": self.timers.read().clone(),
            "senseClient": self.sense_snapshot.read().clone(),
            "overlay": self.overlay_snapshot.read().clone(),
        })
    }

    // ── Sampling tasks ─────────────────────────────────────────────

    /// Spawn the lag probe and the 10 s sampler.
    pub fn spawn_samplers(self: &Arc<Self>, cancel: CancellationToken) {
        let profiler = self.clone();
        let lag_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut expected = Instant::now() + LAG_PROBE_INTERVAL;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(expected.into()) => {
                        let lag_ms =
                            Instant::now().saturating_duration_since(expected).as_secs_f64() * 1_000.0;
                        profiler.lag.lock().samples.push(lag_ms);
                        expected += LAG_PROBE_INTERVAL;
                    }
                    _ = lag_cancel.cancelled() => return,
                }
            }
        });

        let profiler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
            let mut prev_cpu: Option<(Instant, f64)> = None;
            loop {
                tokio::select! {
                    _ = interval.tick() => profiler.sample(&mut prev_cpu),
                    _ = cancel.cancelled() => return,
                }
            }
        });
    }

    fn sample(&self, prev_cpu: &mut Option<(Instant, f64)>) {
        if let Some(rss_mb) = read_rss_mb() {
            self.gauge("proc.rssMb", rss_mb);
        }
        if let Some(cpu_secs) = read_cpu_seconds() {
            let now = Instant::now();
            if let Some((prev_at, prev_secs)) = prev_cpu.replace((now, cpu_secs)) {
                let wall = now.duration_since(prev_at).as_secs_f64();
                if wall > 0.0 {
                    self.gauge("proc.cpuPct", (cpu_secs - prev_secs) / wall * 100.0);
                }
            }
        }

        // Roll the lag window into gauges, then reset it.
        let samples = std::mem::take(&mut self.lag.lock().samples);
        if !samples.is_empty() {
            let max = samples.iter().cloned().fold(0.0, f64::max);
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            self.gauge("loop.lagMeanMs", mean);
            self.gauge("loop.lagMaxMs", max);
        }
    }
}

/// Resident set size from `/proc/self/statm`, in MB. `None` off Linux.
fn read_rss_mb() -> Option<f64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: f64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4_096.0 / (1024.0 * 1024.0))
}

/// Cumulative user+system CPU time from `/proc/self/stat`, in seconds.
fn read_cpu_seconds() -> Option<f64> {
    let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
    // Field 2 (comm) may contain spaces; skip past the closing paren.
    let rest = stat.rsplit_once(')')?.1;
    let mut fields = rest.split_whitespace();
    // utime and stime are fields 14 and 15 overall; after the paren we are
    // at field 3, so skip 10.
    let utime: f64 = fields.nth(10)?.parse().ok()?;
    let stime: f64 = fields.next()?.parse().ok()?;
    Some((utime + stime) / 100.0)
}
