use std::time::Duration;

/// Search policy for host-galaxy determination.
///
/// The search starts narrow and widens geometrically so a nova sitting just
/// past a galaxy's edge is still picked up, without immediately sweeping in
/// unrelated neighbors.
#[derive(Debug, Clone)]
pub struct HostSearchPolicy {
    pub initial_radius_deg: f64,
    pub growth_factor: f64,
    pub max_radius_deg: f64,
    /// Separations within this of each other count as a tie; ties prefer a
    /// neighbor with a cataloged distance measurement.
    pub tie_epsilon_deg: f64,
}

impl Default for HostSearchPolicy {
    fn default() -> Self {
        Self {
            // 5 arcmin
            initial_radius_deg: 5.0 / 60.0,
            growth_factor: 2.0,
            max_radius_deg: 2.0,
            tie_epsilon_deg: 1e-3,
        }
    }
}

/// Orchestrator tunables. Every external call is bounded by `call_timeout`;
/// transient failures retry with exponential backoff up to `max_attempts`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub call_timeout: Duration,
    pub host_search: HostSearchPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(5),
            call_timeout: Duration::from_secs(15),
            host_search: HostSearchPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `NOVA_*` environment variables where present.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_u32("NOVA_MAX_ATTEMPTS") {
            config.max_attempts = v.max(1);
        }
        if let Some(v) = env_u64("NOVA_BACKOFF_BASE_MS") {
            config.backoff_base = Duration::from_millis(v);
        }
        if let Some(v) = env_u64("NOVA_BACKOFF_CAP_MS") {
            config.backoff_cap = Duration::from_millis(v);
        }
        if let Some(v) = env_u64("NOVA_CALL_TIMEOUT_SEC") {
            config.call_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_f64("NOVA_HOST_INITIAL_RADIUS_DEG") {
            if v > 0.0 {
                config.host_search.initial_radius_deg = v;
            }
        }
        if let Some(v) = env_f64("NOVA_HOST_MAX_RADIUS_DEG") {
            if v > 0.0 {
                config.host_search.max_radius_deg = v;
            }
        }
        // The radius schedule must strictly widen, so a factor at or below
        // 1.0 is ignored.
        if let Some(v) = env_f64("NOVA_HOST_GROWTH_FACTOR") {
            if v > 1.0 {
                config.host_search.growth_factor = v;
            }
        }
        config
    }
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok()?.parse().ok()
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.parse().ok()
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok()?.parse().ok()
}
