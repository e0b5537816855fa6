use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};
use universe_api::{
    export_universe, BoxError, HookDeclarations, HookRegistry, ServerDefinition, ServerHook,
    ServerProcess, TypeRegistrar,
};

// ============================================================================
// Hooks
// ============================================================================

/// Greets on activation and remembers where the engine is bound.
#[derive(Debug, Default)]
pub struct WelcomeHook {
    activations: AtomicUsize,
    bound_to: Mutex<Option<String>>,
}

impl WelcomeHook {
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn bound_to(&self) -> Option<String> {
        self.bound_to
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ServerHook for WelcomeHook {
    fn hook(&self, process: &ServerProcess) {
        self.activations.fetch_add(1, Ordering::SeqCst);
        let address = process.local_addr().to_string();
        info!("👋 Lobby is open on {}", address);
        *self
            .bound_to
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(address);
    }
}

pub const TICK_ENV: &str = "LOBBY_TICK_MS";
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Lobby tick rate, configurable through `LOBBY_TICK_MS`.
#[derive(Debug)]
pub struct TickHook {
    interval: Duration,
}

impl TickHook {
    pub fn from_env() -> Result<Self, BoxError> {
        Self::from_setting(std::env::var(TICK_ENV).ok().as_deref())
    }

    pub fn from_setting(value: Option<&str>) -> Result<Self, BoxError> {
        let interval = match value {
            None => DEFAULT_TICK,
            Some(raw) => {
                let millis: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|e| format!("{TICK_ENV}={raw:?} is not a number of milliseconds: {e}"))?;
                if millis == 0 {
                    return Err(format!("{TICK_ENV} must be greater than zero").into());
                }
                Duration::from_millis(millis)
            }
        };
        Ok(Self { interval })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl ServerHook for TickHook {
    fn hook(&self, process: &ServerProcess) {
        info!("⏱️ Lobby on port {} ticks every {:?}", process.port(), self.interval);
    }
}

/// Tracks how many players are in the lobby.
///
/// Registered by name so other modules of the same archive can declare it.
#[derive(Debug, Default)]
pub struct PlayerCountHook {
    players: AtomicU32,
    activated: AtomicUsize,
}

impl PlayerCountHook {
    pub fn players(&self) -> u32 {
        self.players.load(Ordering::SeqCst)
    }

    pub fn join(&self) -> u32 {
        self.players.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn leave(&self) -> u32 {
        self.players
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .map_or(0, |previous| previous.saturating_sub(1))
    }

    pub fn is_activated(&self) -> bool {
        self.activated.load(Ordering::SeqCst) > 0
    }
}

impl ServerHook for PlayerCountHook {
    fn hook(&self, _process: &ServerProcess) {
        self.activated.fetch_add(1, Ordering::SeqCst);
        info!("🧮 Player counter ready ({} online)", self.players());
    }
}

// ============================================================================
// Definition
// ============================================================================

#[derive(Debug, Default)]
pub struct LobbyServer {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl LobbyServer {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl ServerDefinition for LobbyServer {
    fn declare_hooks(hooks: &mut HookDeclarations) {
        hooks
            .hook::<WelcomeHook>()
            .hook_with(TickHook::from_env)
            .named(PLAYER_COUNT_HOOK);
    }

    fn name(&self) -> Option<String> {
        Some("Lobby".to_string())
    }

    fn on_start(&self, process: &ServerProcess, hooks: &HookRegistry) {
        self.starts.fetch_add(1, Ordering::SeqCst);

        let welcome = hooks.get::<WelcomeHook>();
        info!(
            "🏁 Lobby started with {} hooks; welcome bound to {}",
            hooks.len(),
            welcome.bound_to().unwrap_or_else(|| process.local_addr().to_string())
        );

        if hooks.try_get::<TickHook>().is_none() {
            warn!("⚠️ Lobby runs without a tick hook");
        }
    }

    fn on_stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        info!("🚪 Lobby closed");
    }
}

// ============================================================================
// Registration
// ============================================================================

pub const LOBBY_SERVER: &str = "lobby.LobbyServer";
pub const PLAYER_COUNT_HOOK: &str = "lobby.PlayerCountHook";

pub fn register(registrar: &mut TypeRegistrar) {
    registrar
        .definition::<LobbyServer>(LOBBY_SERVER)
        .hook::<PlayerCountHook>(PLAYER_COUNT_HOOK);
}

export_universe!(register);
