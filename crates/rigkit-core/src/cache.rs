//! Per-field caching of frequently polled rig state.
//!
//! Polling applications (loggers, panadapters, the daemon's telemetry
//! publisher) re-read frequency, mode and VFO many times a second. The
//! cache answers those reads from memory while an entry is younger than
//! its field's timeout, cutting transport traffic dramatically on slow
//! serial links.
//!
//! Policy:
//! - every entry carries the [`Instant`] it was captured at;
//! - a read older than the field's timeout misses, forcing a fresh
//!   dispatch;
//! - a timeout of 0 disables caching for that field entirely;
//! - per-field overrides take precedence over the global default;
//! - writes are stored write-through by the dispatch layer, so a `get`
//!   immediately after a successful `set` does not touch the transport.

use std::collections::HashMap;

use tokio::time::{Duration, Instant};

use crate::types::{Mode, PowerStat, Vfo};

/// A cacheable state field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheField {
    /// VFO frequency.
    Freq,
    /// VFO mode + passband.
    Mode,
    /// Active VFO.
    Vfo,
    /// PTT state.
    Ptt,
    /// Split state + TX VFO.
    Split,
    /// Power state.
    PowerStat,
}

/// All cacheable fields.
pub const ALL_CACHE_FIELDS: &[CacheField] = &[
    CacheField::Freq,
    CacheField::Mode,
    CacheField::Vfo,
    CacheField::Ptt,
    CacheField::Split,
    CacheField::PowerStat,
];

/// Cache timeout policy: a global default plus per-field overrides.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    default_ms: u64,
    overrides: HashMap<CacheField, u64>,
}

/// Default cache timeout when none is configured.
const DEFAULT_CACHE_MS: u64 = 500;

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy {
            default_ms: DEFAULT_CACHE_MS,
            overrides: HashMap::new(),
        }
    }
}

impl CachePolicy {
    /// A policy with caching disabled for every field.
    pub fn disabled() -> Self {
        CachePolicy {
            default_ms: 0,
            overrides: HashMap::new(),
        }
    }

    /// Set the global default timeout, clearing per-field overrides.
    ///
    /// This is the bulk-reconfiguration path ("all fields" timeout).
    pub fn set_all(&mut self, timeout_ms: u64) {
        self.default_ms = timeout_ms;
        self.overrides.clear();
    }

    /// Override the timeout for one field.
    pub fn set_field(&mut self, field: CacheField, timeout_ms: u64) {
        self.overrides.insert(field, timeout_ms);
    }

    /// Effective timeout for a field. 0 means caching is disabled.
    pub fn timeout_ms(&self, field: CacheField) -> u64 {
        self.overrides.get(&field).copied().unwrap_or(self.default_ms)
    }
}

/// A cached value with its capture timestamp.
#[derive(Debug, Clone, Copy)]
struct Entry<T> {
    value: T,
    stamp: Instant,
}

impl<T: Copy> Entry<T> {
    fn new(value: T) -> Self {
        Entry {
            value,
            stamp: Instant::now(),
        }
    }

    fn fresh(&self, timeout_ms: u64) -> Option<T> {
        if timeout_ms == 0 {
            return None;
        }
        if self.stamp.elapsed() < Duration::from_millis(timeout_ms) {
            Some(self.value)
        } else {
            None
        }
    }
}

/// The per-handle cache of recently observed rig state.
#[derive(Debug, Default)]
pub struct Cache {
    policy: CachePolicy,
    freq: HashMap<Vfo, Entry<u64>>,
    mode: HashMap<Vfo, Entry<(Mode, u64)>>,
    vfo: Option<Entry<Vfo>>,
    ptt: HashMap<Vfo, Entry<bool>>,
    split: HashMap<Vfo, Entry<(bool, Vfo)>>,
    powerstat: Option<Entry<PowerStat>>,
}

impl Cache {
    /// Create a cache with the given policy.
    pub fn with_policy(policy: CachePolicy) -> Self {
        Cache {
            policy,
            ..Cache::default()
        }
    }

    /// The active policy.
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Mutable access to the policy for reconfiguration.
    pub fn policy_mut(&mut self) -> &mut CachePolicy {
        &mut self.policy
    }

    /// Fresh cached frequency for a VFO, if any.
    pub fn freq(&self, vfo: Vfo) -> Option<u64> {
        let t = self.policy.timeout_ms(CacheField::Freq);
        self.freq.get(&vfo).and_then(|e| e.fresh(t))
    }

    /// Last observed frequency for a VFO regardless of age.
    ///
    /// Used by twiddle suppression, which must answer from the last known
    /// value even after the normal cache timeout has lapsed.
    pub fn freq_any_age(&self, vfo: Vfo) -> Option<u64> {
        self.freq.get(&vfo).map(|e| e.value)
    }

    /// Store a frequency observation. A no-op when the field's timeout
    /// is 0.
    pub fn put_freq(&mut self, vfo: Vfo, freq_hz: u64) {
        if self.policy.timeout_ms(CacheField::Freq) > 0 {
            self.freq.insert(vfo, Entry::new(freq_hz));
        }
    }

    /// Fresh cached mode + passband for a VFO, if any.
    pub fn mode(&self, vfo: Vfo) -> Option<(Mode, u64)> {
        let t = self.policy.timeout_ms(CacheField::Mode);
        self.mode.get(&vfo).and_then(|e| e.fresh(t))
    }

    /// Store a mode observation.
    pub fn put_mode(&mut self, vfo: Vfo, mode: Mode, passband_hz: u64) {
        if self.policy.timeout_ms(CacheField::Mode) > 0 {
            self.mode.insert(vfo, Entry::new((mode, passband_hz)));
        }
    }

    /// Fresh cached active VFO, if any.
    pub fn vfo(&self) -> Option<Vfo> {
        let t = self.policy.timeout_ms(CacheField::Vfo);
        self.vfo.as_ref().and_then(|e| e.fresh(t))
    }

    /// Store an active-VFO observation.
    pub fn put_vfo(&mut self, vfo: Vfo) {
        if self.policy.timeout_ms(CacheField::Vfo) > 0 {
            self.vfo = Some(Entry::new(vfo));
        }
    }

    /// Fresh cached PTT state for a VFO, if any.
    pub fn ptt(&self, vfo: Vfo) -> Option<bool> {
        let t = self.policy.timeout_ms(CacheField::Ptt);
        self.ptt.get(&vfo).and_then(|e| e.fresh(t))
    }

    /// Store a PTT observation.
    pub fn put_ptt(&mut self, vfo: Vfo, on: bool) {
        if self.policy.timeout_ms(CacheField::Ptt) > 0 {
            self.ptt.insert(vfo, Entry::new(on));
        }
    }

    /// Fresh cached split state for a VFO, if any.
    pub fn split(&self, vfo: Vfo) -> Option<(bool, Vfo)> {
        let t = self.policy.timeout_ms(CacheField::Split);
        self.split.get(&vfo).and_then(|e| e.fresh(t))
    }

    /// Store a split observation.
    pub fn put_split(&mut self, vfo: Vfo, on: bool, tx_vfo: Vfo) {
        if self.policy.timeout_ms(CacheField::Split) > 0 {
            self.split.insert(vfo, Entry::new((on, tx_vfo)));
        }
    }

    /// Fresh cached power state, if any.
    pub fn powerstat(&self) -> Option<PowerStat> {
        let t = self.policy.timeout_ms(CacheField::PowerStat);
        self.powerstat.as_ref().and_then(|e| e.fresh(t))
    }

    /// Store a power-state observation.
    pub fn put_powerstat(&mut self, status: PowerStat) {
        if self.policy.timeout_ms(CacheField::PowerStat) > 0 {
            self.powerstat = Some(Entry::new(status));
        }
    }

    /// Drop the entry for one field/VFO pair.
    ///
    /// Called by the dispatch layer when a backend call for that field
    /// fails, so a stale value is never re-served after an error.
    pub fn invalidate(&mut self, field: CacheField, vfo: Vfo) {
        match field {
            CacheField::Freq => {
                self.freq.remove(&vfo);
            }
            CacheField::Mode => {
                self.mode.remove(&vfo);
            }
            CacheField::Vfo => self.vfo = None,
            CacheField::Ptt => {
                self.ptt.remove(&vfo);
            }
            CacheField::Split => {
                self.split.remove(&vfo);
            }
            CacheField::PowerStat => self.powerstat = None,
        }
    }

    /// Drop every entry.
    pub fn invalidate_all(&mut self) {
        self.freq.clear();
        self.mode.clear();
        self.vfo = None;
        self.ptt.clear();
        self.split.clear();
        self.powerstat = None;
    }
}

/// Twiddle suppression: tracks VFOs whose frequency changed outside the
/// control software (the operator turning the knob).
///
/// While a VFO is inside the suppression window, background polls of that
/// VFO are answered from cache without dispatching, so the software does
/// not fight the operator for the dial.
#[derive(Debug)]
pub struct TwiddleGuard {
    window_ms: u64,
    last_change: HashMap<Vfo, Instant>,
}

/// Default twiddle suppression window.
const DEFAULT_TWIDDLE_MS: u64 = 0;

impl Default for TwiddleGuard {
    fn default() -> Self {
        TwiddleGuard {
            window_ms: DEFAULT_TWIDDLE_MS,
            last_change: HashMap::new(),
        }
    }
}

impl TwiddleGuard {
    /// Create a guard with the given window. 0 disables suppression.
    pub fn new(window_ms: u64) -> Self {
        TwiddleGuard {
            window_ms,
            last_change: HashMap::new(),
        }
    }

    /// Reconfigure the window.
    pub fn set_window(&mut self, window_ms: u64) {
        self.window_ms = window_ms;
    }

    /// The configured window in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Record an external change event on a VFO.
    pub fn note_change(&mut self, vfo: Vfo) {
        if self.window_ms > 0 {
            self.last_change.insert(vfo, Instant::now());
        }
    }

    /// Whether polling of this VFO is currently suppressed.
    pub fn suppressed(&self, vfo: Vfo) -> bool {
        if self.window_ms == 0 {
            return false;
        }
        match self.last_change.get(&vfo) {
            Some(stamp) => stamp.elapsed() < Duration::from_millis(self.window_ms),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[test]
    fn policy_default_and_override() {
        let mut policy = CachePolicy::default();
        assert_eq!(policy.timeout_ms(CacheField::Freq), DEFAULT_CACHE_MS);

        policy.set_field(CacheField::Freq, 50);
        assert_eq!(policy.timeout_ms(CacheField::Freq), 50);
        assert_eq!(policy.timeout_ms(CacheField::Mode), DEFAULT_CACHE_MS);
    }

    #[test]
    fn policy_set_all_clears_overrides() {
        let mut policy = CachePolicy::default();
        policy.set_field(CacheField::Freq, 50);
        policy.set_all(1000);
        assert_eq!(policy.timeout_ms(CacheField::Freq), 1000);
        assert_eq!(policy.timeout_ms(CacheField::Ptt), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_hits() {
        let mut cache = Cache::default();
        cache.put_freq(Vfo::A, 14_074_000);
        assert_eq!(cache.freq(Vfo::A), Some(14_074_000));
        assert_eq!(cache.freq(Vfo::B), None);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_misses() {
        let mut cache = Cache::default();
        cache.put_freq(Vfo::A, 14_074_000);

        advance(Duration::from_millis(DEFAULT_CACHE_MS - 1)).await;
        assert_eq!(cache.freq(Vfo::A), Some(14_074_000));

        advance(Duration::from_millis(2)).await;
        assert_eq!(cache.freq(Vfo::A), None);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_disables_field() {
        let mut policy = CachePolicy::default();
        policy.set_field(CacheField::Freq, 0);
        let mut cache = Cache::with_policy(policy);

        cache.put_freq(Vfo::A, 14_074_000);
        // Never served, never stored.
        assert_eq!(cache.freq(Vfo::A), None);
        assert_eq!(cache.mode(Vfo::A), None);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_policy_caches_nothing() {
        let mut cache = Cache::with_policy(CachePolicy::disabled());
        cache.put_freq(Vfo::A, 1);
        cache.put_vfo(Vfo::B);
        cache.put_powerstat(PowerStat::On);
        assert_eq!(cache.freq(Vfo::A), None);
        assert_eq!(cache.vfo(), None);
        assert_eq!(cache.powerstat(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_single_field() {
        let mut cache = Cache::default();
        cache.put_freq(Vfo::A, 14_074_000);
        cache.put_mode(Vfo::A, Mode::USB, 2400);

        cache.invalidate(CacheField::Freq, Vfo::A);
        assert_eq!(cache.freq(Vfo::A), None);
        assert_eq!(cache.mode(Vfo::A), Some((Mode::USB, 2400)));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_all_fields() {
        let mut cache = Cache::default();
        cache.put_freq(Vfo::A, 14_074_000);
        cache.put_vfo(Vfo::A);
        cache.put_split(Vfo::A, true, Vfo::B);
        cache.invalidate_all();
        assert_eq!(cache.freq(Vfo::A), None);
        assert_eq!(cache.vfo(), None);
        assert_eq!(cache.split(Vfo::A), None);
    }

    #[tokio::test(start_paused = true)]
    async fn per_field_override_beats_global() {
        let mut policy = CachePolicy::default();
        policy.set_all(1000);
        policy.set_field(CacheField::Ptt, 20);
        let mut cache = Cache::with_policy(policy);

        cache.put_freq(Vfo::A, 7_000_000);
        cache.put_ptt(Vfo::A, true);

        advance(Duration::from_millis(21)).await;
        assert_eq!(cache.ptt(Vfo::A), None, "override expired");
        assert_eq!(cache.freq(Vfo::A), Some(7_000_000), "global still fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn freq_any_age_ignores_staleness() {
        let mut cache = Cache::default();
        cache.put_freq(Vfo::A, 14_074_000);
        advance(Duration::from_millis(DEFAULT_CACHE_MS * 4)).await;
        assert_eq!(cache.freq(Vfo::A), None);
        assert_eq!(cache.freq_any_age(Vfo::A), Some(14_074_000));
    }

    #[tokio::test(start_paused = true)]
    async fn twiddle_window() {
        let mut guard = TwiddleGuard::new(3000);
        assert!(!guard.suppressed(Vfo::A));

        guard.note_change(Vfo::A);
        assert!(guard.suppressed(Vfo::A));
        assert!(!guard.suppressed(Vfo::B));

        advance(Duration::from_millis(2999)).await;
        assert!(guard.suppressed(Vfo::A));

        advance(Duration::from_millis(2)).await;
        assert!(!guard.suppressed(Vfo::A));
    }

    #[tokio::test(start_paused = true)]
    async fn twiddle_disabled_by_default() {
        let mut guard = TwiddleGuard::default();
        guard.note_change(Vfo::A);
        assert!(!guard.suppressed(Vfo::A));
    }
}
