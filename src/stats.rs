use dashmap::DashMap;

use crate::routing::Route;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CmdStats {
    pub total: u64,
    /// Commands that had to be re-sent to the fallback node.
    pub fallbacks: u64,
}

/// Per-multiplexer statistics (shared across all database handles).
///
/// The intent is operational visibility: "which commands actually go where".
#[derive(Debug, Default)]
pub struct Stats {
    // Keyed by (route, command_upper).
    by_route_cmd: DashMap<(Route, String), CmdStats>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, route: Route, cmd_upper: &str) {
        let key = (route, cmd_upper.to_string());
        let mut entry = self.by_route_cmd.entry(key).or_default();
        entry.total = entry.total.saturating_add(1);
    }

    /// Count a command first planned for `route` that fell back to the other node.
    pub fn record_fallback(&self, route: Route, cmd_upper: &str) {
        let key = (route, cmd_upper.to_string());
        let mut entry = self.by_route_cmd.entry(key).or_default();
        entry.fallbacks = entry.fallbacks.saturating_add(1);
    }

    pub fn get(&self, route: Route, cmd_upper: &str) -> CmdStats {
        self.by_route_cmd
            .get(&(route, cmd_upper.to_string()))
            .map(|e| *e.value())
            .unwrap_or_default()
    }

    /// Render summary lines similar to:
    ///
    /// ```text
    /// REPLICA HGET             8056 times (fallback 3 times)
    /// PRIMARY HSET             125 times
    /// ```
    pub fn render_summary_lines(&self) -> Vec<String> {
        let mut rows: Vec<(Route, String, CmdStats)> = self
            .by_route_cmd
            .iter()
            .map(|e| {
                let ((route, cmd), stats) = (e.key(), *e.value());
                (*route, cmd.clone(), stats)
            })
            .collect();

        rows.sort_by(|a, b| {
            // Replica traffic first (typical interest for this client).
            route_rank(a.0)
                .cmp(&route_rank(b.0))
                .then_with(|| b.2.total.cmp(&a.2.total))
                .then_with(|| a.1.cmp(&b.1))
        });

        let mut out = Vec::with_capacity(rows.len());
        for (route, cmd, stats) in rows {
            let route_s = match route {
                Route::Replica => "REPLICA",
                Route::Primary => "PRIMARY",
            };

            let mut line = format!("{:<7} {:<16} {} times", route_s, cmd, stats.total);
            if stats.fallbacks > 0 {
                line.push_str(&format!(" (fallback {} times)", stats.fallbacks));
            }

            out.push(line);
        }

        out
    }
}

fn route_rank(r: Route) -> u8 {
    match r {
        Route::Replica => 0,
        Route::Primary => 1,
    }
}
