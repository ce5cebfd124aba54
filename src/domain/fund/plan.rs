//! Investment plans: each day a plan names a cash amount to invest at that
//! day's net value.
//!
//! Before asking the plan, the run checks the held position against the
//! portfolio stop-loss: once the unrealized loss exceeds `stop_loss` of the
//! cost basis, the whole position is redeemed and nothing is bought that day.
//! Realized stop-loss losses are folded back into the final `total_cost`.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::{FundAction, FundKind, FundOutcome, FundTransaction, NavPoint};
use crate::domain::indicator::CloseHistory;

pub const DEFAULT_AMOUNT: f64 = 1000.0;
pub const DEFAULT_DROP_CAP: f64 = 3000.0;
pub const DEFAULT_RSI_CAP: f64 = 8000.0;
pub const DEFAULT_PERIOD_DAYS: usize = 5;
pub const DEFAULT_MA_WINDOW: usize = 5;
pub const DEFAULT_MONTH_DAYS: usize = 20;
pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_PLAN_STOP_LOSS: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanKind {
    /// `amount` on any day the value fell.
    FixedDrop,
    /// Grows with the size of the fall, capped at `drop_cap`.
    DynamicDrop,
    /// `amount` every `period_days` days.
    Periodic,
    /// `amount` whenever the value is at or below its trailing average.
    MovingAverage,
    /// Tops the holding up to a target that grows each month.
    ValueAveraging,
    Rsi,
    /// Tiered RSI buying, capped at `rsi_cap`.
    EnhancedRsi,
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanKind::FixedDrop => "fixed_drop",
            PlanKind::DynamicDrop => "dynamic_drop",
            PlanKind::Periodic => "periodic",
            PlanKind::MovingAverage => "ma",
            PlanKind::ValueAveraging => "value_averaging",
            PlanKind::Rsi => "rsi",
            PlanKind::EnhancedRsi => "enhanced_rsi",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown investment plan '{0}'")]
pub struct UnknownPlan(pub String);

impl FromStr for PlanKind {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fixed_drop" => Ok(PlanKind::FixedDrop),
            "dynamic_drop" => Ok(PlanKind::DynamicDrop),
            "periodic" => Ok(PlanKind::Periodic),
            "ma" | "moving_average" => Ok(PlanKind::MovingAverage),
            "value_averaging" => Ok(PlanKind::ValueAveraging),
            "rsi" => Ok(PlanKind::Rsi),
            "enhanced_rsi" => Ok(PlanKind::EnhancedRsi),
            other => Err(UnknownPlan(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanParams {
    /// Base investment per signal.
    pub amount: f64,
    pub drop_cap: f64,
    pub rsi_cap: f64,
    pub period_days: usize,
    pub ma_window: usize,
    /// Value-averaging target growth per month.
    pub target_growth: f64,
    pub month_days: usize,
    pub rsi_period: usize,
    /// Fraction of cost basis lost before the position is redeemed.
    pub stop_loss: f64,
}

impl Default for PlanParams {
    fn default() -> Self {
        PlanParams {
            amount: DEFAULT_AMOUNT,
            drop_cap: DEFAULT_DROP_CAP,
            rsi_cap: DEFAULT_RSI_CAP,
            period_days: DEFAULT_PERIOD_DAYS,
            ma_window: DEFAULT_MA_WINDOW,
            target_growth: DEFAULT_AMOUNT,
            month_days: DEFAULT_MONTH_DAYS,
            rsi_period: DEFAULT_RSI_PERIOD,
            stop_loss: DEFAULT_PLAN_STOP_LOSS,
        }
    }
}

/// What a plan may look at on one day.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanDay {
    /// Zero-based position in the series.
    pub index: usize,
    pub nav: f64,
    pub prev_nav: Option<f64>,
    /// Mean of the `ma_window` values before today.
    pub ma: Option<f64>,
    /// RSI over the `rsi_period` changes ending today.
    pub rsi: Option<f64>,
    /// Units held, valued at today's net value.
    pub holding_value: f64,
}

/// Cash the plan invests on `day`; zero means no signal.
pub fn plan_amount(kind: PlanKind, params: &PlanParams, day: &PlanDay) -> f64 {
    match kind {
        PlanKind::FixedDrop => match day.prev_nav {
            Some(prev) if day.nav < prev => params.amount,
            _ => 0.0,
        },
        PlanKind::DynamicDrop => {
            let Some(prev) = day.prev_nav.filter(|p| *p > 0.0) else {
                return 0.0;
            };
            let drop_pct = (prev - day.nav) / prev * 100.0;
            if drop_pct <= 0.0 {
                return 0.0;
            }
            (params.amount * (1.0 + (drop_pct / 2.0).powf(1.5))).min(params.drop_cap)
        }
        PlanKind::Periodic => {
            if day.index % params.period_days.max(1) == 0 {
                params.amount
            } else {
                0.0
            }
        }
        PlanKind::MovingAverage => match day.ma {
            Some(ma) if day.nav <= ma => params.amount,
            _ => 0.0,
        },
        PlanKind::ValueAveraging => {
            let month_days = params.month_days.max(1);
            if day.index % month_days != 0 {
                return 0.0;
            }
            let month = (day.index / month_days) as f64;
            let target = params.target_growth * (month + 1.0);
            (target - day.holding_value).max(0.0)
        }
        PlanKind::Rsi => match day.rsi {
            Some(rsi) if rsi < 30.0 => params.amount,
            Some(rsi) if rsi < 40.0 => params.amount / 2.0,
            _ => 0.0,
        },
        PlanKind::EnhancedRsi => {
            let multiple = match day.rsi {
                Some(rsi) if rsi < 15.0 => 8.0,
                Some(rsi) if rsi <= 20.0 => 4.0,
                Some(rsi) if rsi <= 25.0 => 2.0,
                Some(rsi) if rsi <= 30.0 => 1.0,
                _ => return 0.0,
            };
            (params.amount * multiple).min(params.rsi_cap)
        }
    }
}

/// Runs `kind` over the series, buying fractional units with each amount.
pub fn calculate_investment(kind: PlanKind, params: &PlanParams, points: &[NavPoint]) -> FundOutcome {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return FundOutcome::empty(FundKind::Plan(kind));
    };

    let mut history = CloseHistory::new(params.ma_window.max(params.rsi_period + 1));
    let mut units = 0.0;
    let mut cost = 0.0;
    let mut loss = 0.0;
    let mut transactions = Vec::new();

    for (index, point) in points.iter().enumerate() {
        let prev_nav = history.last();
        let ma = history.sma(params.ma_window);
        history.push(point.nav);

        let holding_value = units * point.nav;
        if cost > 0.0 && (cost - holding_value) / cost > params.stop_loss {
            loss += cost - holding_value;
            debug!(date = %point.date, units, value = holding_value, cost, "plan stop-loss");
            transactions.push(FundTransaction {
                date: point.date,
                action: FundAction::Liquidate,
                units,
                price: point.nav,
                amount: holding_value,
            });
            units = 0.0;
            cost = 0.0;
            continue;
        }

        let day = PlanDay {
            index,
            nav: point.nav,
            prev_nav,
            ma,
            rsi: history.rsi(params.rsi_period),
            holding_value,
        };
        let amount = plan_amount(kind, params, &day);
        if amount > 0.0 && amount.is_finite() {
            let bought = amount / point.nav;
            units += bought;
            cost += amount;
            transactions.push(FundTransaction {
                date: point.date,
                action: FundAction::Buy,
                units: bought,
                price: point.nav,
                amount,
            });
        }
    }

    FundOutcome {
        kind: FundKind::Plan(kind),
        total_cost: cost + loss,
        units,
        first_nav: first.nav,
        last_nav: last.nav,
        fees: 0.0,
        loss,
        transactions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(navs: &[f64]) -> Vec<NavPoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        navs.iter()
            .enumerate()
            .map(|(i, &nav)| NavPoint {
                date: start + chrono::Duration::days(i as i64),
                nav,
                change_pct: 0.0,
            })
            .collect()
    }

    fn day(index: usize, nav: f64) -> PlanDay {
        PlanDay {
            index,
            nav,
            ..Default::default()
        }
    }

    fn buy_days(outcome: &FundOutcome) -> Vec<f64> {
        outcome
            .transactions
            .iter()
            .filter(|t| t.action == FundAction::Buy)
            .map(|t| t.price)
            .collect()
    }

    #[test]
    fn fixed_drop_buys_on_falling_days() {
        let outcome = calculate_investment(
            PlanKind::FixedDrop,
            &PlanParams::default(),
            &series(&[1.0, 0.99, 1.0, 0.98]),
        );
        assert_eq!(buy_days(&outcome), vec![0.99, 0.98]);
        assert!((outcome.total_cost - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn dynamic_drop_grows_then_caps() {
        let params = PlanParams::default();
        let two_pct = PlanDay {
            prev_nav: Some(1.0),
            ..day(1, 0.98)
        };
        // 1000 * (1 + 1^1.5)
        assert!((plan_amount(PlanKind::DynamicDrop, &params, &two_pct) - 2000.0).abs() < 1e-6);

        let ten_pct = PlanDay {
            prev_nav: Some(1.0),
            ..day(1, 0.9)
        };
        assert_eq!(plan_amount(PlanKind::DynamicDrop, &params, &ten_pct), 3000.0);

        let wider = PlanParams {
            drop_cap: 5000.0,
            ..PlanParams::default()
        };
        assert_eq!(plan_amount(PlanKind::DynamicDrop, &wider, &ten_pct), 5000.0);

        let rise = PlanDay {
            prev_nav: Some(1.0),
            ..day(1, 1.01)
        };
        assert_eq!(plan_amount(PlanKind::DynamicDrop, &params, &rise), 0.0);
        assert_eq!(plan_amount(PlanKind::DynamicDrop, &params, &day(0, 1.0)), 0.0);
    }

    #[test]
    fn periodic_every_fifth_day() {
        let outcome = calculate_investment(PlanKind::Periodic, &PlanParams::default(), &series(&[1.0; 11]));
        let dates: Vec<usize> = outcome
            .transactions
            .iter()
            .map(|t| (t.date - NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).num_days() as usize)
            .collect();
        assert_eq!(dates, vec![0, 5, 10]);
    }

    #[test]
    fn moving_average_needs_a_full_window() {
        let params = PlanParams {
            ma_window: 3,
            ..PlanParams::default()
        };
        // day 3: mean(1.0, 1.1, 1.2) = 1.1 >= 1.05
        // day 4: mean(1.1, 1.2, 1.05) = 1.1167 < 1.3
        let outcome = calculate_investment(
            PlanKind::MovingAverage,
            &params,
            &series(&[1.0, 1.1, 1.2, 1.05, 1.3]),
        );
        assert_eq!(buy_days(&outcome), vec![1.05]);
    }

    #[test]
    fn value_averaging_tops_up_to_target() {
        let params = PlanParams::default();
        assert_eq!(plan_amount(PlanKind::ValueAveraging, &params, &day(0, 1.0)), 1000.0);
        assert_eq!(plan_amount(PlanKind::ValueAveraging, &params, &day(7, 1.0)), 0.0);

        let behind = PlanDay {
            holding_value: 1500.0,
            ..day(20, 1.0)
        };
        assert_eq!(plan_amount(PlanKind::ValueAveraging, &params, &behind), 500.0);

        let ahead = PlanDay {
            holding_value: 2500.0,
            ..day(20, 1.0)
        };
        assert_eq!(plan_amount(PlanKind::ValueAveraging, &params, &ahead), 0.0);
    }

    #[test]
    fn rsi_tiers() {
        let params = PlanParams::default();
        let at = |rsi: Option<f64>| PlanDay { rsi, ..day(20, 1.0) };
        assert_eq!(plan_amount(PlanKind::Rsi, &params, &at(Some(25.0))), 1000.0);
        assert_eq!(plan_amount(PlanKind::Rsi, &params, &at(Some(35.0))), 500.0);
        assert_eq!(plan_amount(PlanKind::Rsi, &params, &at(Some(45.0))), 0.0);
        assert_eq!(plan_amount(PlanKind::Rsi, &params, &at(None)), 0.0);
    }

    #[test]
    fn enhanced_rsi_tiers_and_cap() {
        let params = PlanParams::default();
        let at = |rsi: f64| PlanDay {
            rsi: Some(rsi),
            ..day(20, 1.0)
        };
        assert_eq!(plan_amount(PlanKind::EnhancedRsi, &params, &at(10.0)), 8000.0);
        assert_eq!(plan_amount(PlanKind::EnhancedRsi, &params, &at(20.0)), 4000.0);
        assert_eq!(plan_amount(PlanKind::EnhancedRsi, &params, &at(22.0)), 2000.0);
        assert_eq!(plan_amount(PlanKind::EnhancedRsi, &params, &at(30.0)), 1000.0);
        assert_eq!(plan_amount(PlanKind::EnhancedRsi, &params, &at(31.0)), 0.0);

        let capped = PlanParams {
            rsi_cap: 5000.0,
            ..PlanParams::default()
        };
        assert_eq!(plan_amount(PlanKind::EnhancedRsi, &capped, &at(10.0)), 5000.0);
    }

    #[test]
    fn rsi_plans_skip_series_without_losses() {
        let rising: Vec<f64> = (0..30).map(|i| 1.0 + i as f64 * 0.01).collect();
        let flat = [1.0; 30];
        for kind in [PlanKind::Rsi, PlanKind::EnhancedRsi] {
            for navs in [&rising[..], &flat[..]] {
                let outcome = calculate_investment(kind, &PlanParams::default(), &series(navs));
                assert!(outcome.transactions.is_empty());
                assert_eq!(outcome.total_cost, 0.0);
            }
        }
    }

    #[test]
    fn rsi_plan_buys_after_a_selloff() {
        let params = PlanParams {
            rsi_period: 3,
            ..PlanParams::default()
        };
        // changes over days 1..=3: -0.1, -0.1, -0.1 -> no gains, RSI 0
        let outcome = calculate_investment(PlanKind::Rsi, &params, &series(&[1.0, 0.9, 0.8, 0.7]));
        assert_eq!(buy_days(&outcome), vec![0.7]);
    }

    #[test]
    fn stop_loss_liquidates_and_folds_loss_into_cost() {
        let outcome = calculate_investment(
            PlanKind::FixedDrop,
            &PlanParams::default(),
            &series(&[1.0, 0.95, 0.85, 0.80]),
        );
        // 0.85 is 10.5% under the 0.95 entry: redeemed, no buy that day
        assert_eq!(outcome.count(FundAction::Liquidate), 1);
        assert_eq!(buy_days(&outcome), vec![0.95, 0.80]);

        let lost = 1000.0 - 1000.0 / 0.95 * 0.85;
        assert!((outcome.loss - lost).abs() < 1e-9);
        assert!((outcome.units - 1250.0).abs() < 1e-9);
        assert!((outcome.total_cost - (1000.0 + lost)).abs() < 1e-9);
    }
}
