use replicore_shared::ReplicationSettings;

const TIME_BEFORE_THROTTLE: f64 = 2.0;
const TIME_TO_THROTTLE: f64 = 5.0;
const REPLICATE_DELTA_SCALE: f64 = 0.7;

/// When an object is next considered for replication, and how fast adaptive
/// frequency currently lets it update
#[derive(Clone, Debug)]
pub(crate) struct UpdateTiming {
    next_update_time: f64,
    last_replicate_time: f64,
    optimal_update_delta: f64,
    /// Skipped because its connection was saturated, reconsidered next tick
    pending_net_update: bool,
    force_net_update: bool,
}

fn delta_bounds(settings: &ReplicationSettings) -> (f64, f64) {
    let min_delta = 1.0 / f64::from(settings.net_update_frequency.max(f32::EPSILON));
    let slow_delta = 1.0 / f64::from(settings.min_net_update_frequency.max(f32::EPSILON));
    (min_delta, slow_delta.max(min_delta))
}

impl UpdateTiming {
    pub fn new(now: f64) -> Self {
        Self {
            next_update_time: now,
            last_replicate_time: now,
            optimal_update_delta: 0.0,
            pending_net_update: false,
            force_net_update: false,
        }
    }

    pub fn is_due(&self, now: f64) -> bool {
        self.force_net_update || self.pending_net_update || now >= self.next_update_time
    }

    pub fn force_update(&mut self) {
        self.force_net_update = true;
    }

    pub fn set_pending(&mut self) {
        self.pending_net_update = true;
    }

    pub fn next_update_time(&self) -> f64 {
        self.next_update_time
    }

    /// Schedules the next consideration after this one, jittered by up to
    /// half a tick so objects sharing a frequency spread out
    pub fn schedule_next(&mut self, now: f64, tick_delta: f64, settings: &ReplicationSettings, adaptive: bool) {
        let update_delta = if adaptive {
            self.adaptive_delta(now, settings)
        } else {
            delta_bounds(settings).0
        };
        self.next_update_time = now + fastrand::f64() * 0.5 * tick_delta + update_delta;
        self.pending_net_update = false;
        self.force_net_update = false;
    }

    /// Something was written for the object this tick
    pub fn replicated(&mut self, now: f64, settings: &ReplicationSettings) {
        let (min_delta, max_delta) = delta_bounds(settings);
        let since_last = now - self.last_replicate_time;
        self.optimal_update_delta = (since_last * REPLICATE_DELTA_SCALE).clamp(min_delta, max_delta);
        self.last_replicate_time = now;
    }

    fn adaptive_delta(&mut self, now: f64, settings: &ReplicationSettings) -> f64 {
        let (min_delta, max_delta) = delta_bounds(settings);
        let since_last = now - self.last_replicate_time;
        if since_last > TIME_BEFORE_THROTTLE {
            let alpha = ((since_last - TIME_BEFORE_THROTTLE) / TIME_TO_THROTTLE).clamp(0.0, 1.0);
            self.optimal_update_delta = min_delta + (max_delta - min_delta) * alpha;
        }
        self.optimal_update_delta.clamp(min_delta, max_delta)
    }
}
