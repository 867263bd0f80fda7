use unlagged_core::{HistoryDepth, PlayerId, RewindWorld, Tick, MS_PER_SECOND};

/// Maps a round-trip latency onto the tick the client perceived as "now".
///
/// The delta is `floor(latency_ms * tic_rate / 1000)` ticks, clamped so the
/// result never leaves the retained window (`current - depth + 1`) nor drops
/// below tick zero.
#[must_use]
pub fn unlagged_tick(current: Tick, latency_ms: u32, tic_rate: u32, depth: HistoryDepth) -> Tick {
    let delta = u64::from(latency_ms) * u64::from(tic_rate) / MS_PER_SECOND;
    let oldest_retained = u64::try_from(depth.get()).unwrap_or(u64::MAX) - 1;
    current.saturating_sub(delta.min(oldest_retained))
}

/// Historical tick that `player` perceived as the present.
#[must_use]
pub fn target_tick<W>(world: &W, player: PlayerId) -> Tick
where
    W: RewindWorld + ?Sized,
{
    unlagged_tick(
        world.current_tick(),
        world.player_latency_ms(player),
        world.tic_rate(),
        world.lag_compensation().history_depth,
    )
}
