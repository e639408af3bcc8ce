//! Risk limits and the per-run state that enforces them.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::RejectReason;
use crate::error::ConfigError;

/// At most `max_trades` new positions within any `period_bars` rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeFrequencyLimit {
    pub max_trades: usize,
    pub period_bars: usize,
}

/// After `max_losses` losing positions in a row, no entries for `cooldown_bars`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossStreakLimit {
    pub max_losses: usize,
    pub cooldown_bars: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Drawdown fraction of peak realized equity that permanently blocks entries.
    pub max_drawdown: Option<f64>,
    pub max_trades: Option<TradeFrequencyLimit>,
    pub loss_streak: Option<LossStreakLimit>,
}

impl RiskLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dd) = self.max_drawdown {
            if !(dd > 0.0 && dd <= 1.0) {
                return Err(ConfigError::ContradictoryRiskLimits(format!(
                    "max_drawdown {dd} would block every entry or never trigger; expected (0, 1]"
                )));
            }
        }
        if let Some(freq) = self.max_trades {
            if freq.max_trades == 0 {
                return Err(ConfigError::ContradictoryRiskLimits(
                    "max_trades = 0 forbids all entries".into(),
                ));
            }
            if freq.period_bars == 0 {
                return Err(ConfigError::invalid("max_trades.period_bars", "must be >= 1"));
            }
        }
        if let Some(streak) = self.loss_streak {
            if streak.max_losses == 0 {
                return Err(ConfigError::ContradictoryRiskLimits(
                    "loss_streak.max_losses = 0 would put the run in permanent cooldown".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Mutable risk bookkeeping for one run.
#[derive(Debug, Clone)]
pub struct RiskState {
    limits: RiskLimits,
    peak_equity: f64,
    kill_switch: bool,
    entry_bars: VecDeque<usize>,
    consecutive_losses: usize,
    cooldown_until: Option<usize>,
}

impl RiskState {
    pub fn new(limits: RiskLimits, initial_equity: f64) -> Self {
        Self {
            limits,
            peak_equity: initial_equity,
            kill_switch: false,
            entry_bars: VecDeque::new(),
            consecutive_losses: 0,
            cooldown_until: None,
        }
    }

    pub fn kill_switch_tripped(&self) -> bool {
        self.kill_switch
    }

    pub fn consecutive_losses(&self) -> usize {
        self.consecutive_losses
    }

    /// Feed realized equity. Returns true the first time the kill switch trips.
    pub fn observe_equity(&mut self, equity: f64) -> bool {
        self.peak_equity = self.peak_equity.max(equity);
        let Some(max_dd) = self.limits.max_drawdown else {
            return false;
        };
        if self.kill_switch || self.peak_equity <= 0.0 {
            return false;
        }
        let drawdown = (self.peak_equity - equity) / self.peak_equity;
        if drawdown >= max_dd {
            self.kill_switch = true;
            return true;
        }
        false
    }

    /// Check whether an entry (or scale-in) may fire at `bar_index`.
    pub fn check_entry(&self, bar_index: usize) -> Result<(), RejectReason> {
        if self.kill_switch {
            return Err(RejectReason::DrawdownKillSwitch);
        }
        if let Some(until_bar) = self.cooldown_until {
            if bar_index <= until_bar {
                return Err(RejectReason::LossCooldown { until_bar });
            }
        }
        if let Some(freq) = self.limits.max_trades {
            let trades_in_period = self
                .entry_bars
                .iter()
                .filter(|&&b| b + freq.period_bars > bar_index)
                .count();
            if trades_in_period >= freq.max_trades {
                return Err(RejectReason::TradeFrequency { trades_in_period });
            }
        }
        Ok(())
    }

    /// Record a new position opening.
    pub fn record_entry(&mut self, bar_index: usize) {
        self.entry_bars.push_back(bar_index);
        if let Some(freq) = self.limits.max_trades {
            while self
                .entry_bars
                .front()
                .is_some_and(|&b| b + freq.period_bars <= bar_index)
            {
                self.entry_bars.pop_front();
            }
        }
    }

    /// Record a fully closed position and its total net PnL.
    pub fn record_close(&mut self, net_pnl: f64, bar_index: usize) {
        if net_pnl < 0.0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
        if let Some(streak) = self.limits.loss_streak {
            if self.consecutive_losses >= streak.max_losses {
                self.cooldown_until = Some(bar_index + streak.cooldown_bars);
                self.consecutive_losses = 0;
            }
        }
    }
}
