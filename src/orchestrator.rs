use crate::errors::{InvalidIntervalError, LedgerError};
use crate::interval::Interval;
use crate::market_data::MarketDataSource;
use crate::models::{BackTestResult, BacktestRequest, BotConfig};
use crate::runner::run_backtest;
use crate::schedule::CronRule;
use anyhow::{anyhow, Result};
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{info, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;

/// External collaborator that persists a finished result set. Failures
/// are logged and swallowed; they never fail the backtest call.
pub trait ReportSink: Send + Sync {
    fn save(&self, results: &[BackTestResult]) -> Result<()>;
}

struct RunTask {
    index: usize,
    config: BotConfig,
}

struct RunOutcome {
    index: usize,
    result: BackTestResult,
}

/// Runs many configurations concurrently on a bounded worker pool, one
/// simulated exchange per run, and ranks the outcomes.
pub struct BacktestOrchestrator {
    pool_size: usize,
}

impl BacktestOrchestrator {
    pub fn new(pool_size: usize) -> Result<Self> {
        if pool_size == 0 {
            return Err(anyhow!("Worker pool size must be greater than zero"));
        }
        Ok(Self { pool_size })
    }

    pub fn with_default_pool() -> Self {
        Self {
            pool_size: num_cpus::get().max(1),
        }
    }

    /// Validates the request, runs every configuration with per-run
    /// failure isolation, and returns the results sorted by final total
    /// savings descending. Ties keep submission order.
    pub fn run(
        &self,
        request: &BacktestRequest,
        source: Arc<dyn MarketDataSource>,
        sink: Option<&dyn ReportSink>,
    ) -> Result<Vec<BackTestResult>> {
        let interval = validate_request(request)?;

        let total = request.configs.len();
        let workers = self.pool_size.min(total);
        info!(
            "Backtesting {} configuration{} on {} worker{}",
            total,
            if total == 1 { "" } else { "s" },
            workers,
            if workers == 1 { "" } else { "s" }
        );

        let (task_tx, task_rx): (Sender<RunTask>, Receiver<RunTask>) = bounded(total);
        let (result_tx, result_rx): (Sender<RunOutcome>, Receiver<RunOutcome>) = bounded(total);

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let source = source.clone();
            let balance = request.balance.clone();

            let handle = thread::spawn(move || {
                while let Ok(task) = rx.recv() {
                    let result =
                        match run_backtest(&task.config, &balance, &interval, source.as_ref()) {
                            Ok(result) => result,
                            Err(error) => {
                                warn!(
                                    "Backtest failed for account {} ({} on {}): {:#}",
                                    task.config.account_id,
                                    task.config.strategy.as_str(),
                                    task.config.figi,
                                    error
                                );
                                BackTestResult::failed(task.config, interval, format!("{:#}", error))
                            }
                        };
                    if result_tx
                        .send(RunOutcome {
                            index: task.index,
                            result,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            });
            handles.push(handle);
        }
        drop(task_rx);
        drop(result_tx);

        for (index, config) in request.configs.iter().cloned().enumerate() {
            task_tx.send(RunTask { index, config })?;
        }
        drop(task_tx);

        let mut slots: Vec<Option<BackTestResult>> = vec![None; total];
        let mut completed = 0usize;
        while completed < total {
            match result_rx.recv() {
                Ok(outcome) => {
                    slots[outcome.index] = Some(outcome.result);
                    completed += 1;
                }
                Err(_) => break,
            }
        }
        for handle in handles {
            let _ = handle.join();
        }

        let mut results: Vec<BackTestResult> = Vec::with_capacity(total);
        for (index, slot) in slots.into_iter().enumerate() {
            results.push(slot.unwrap_or_else(|| {
                BackTestResult::failed(
                    request.configs[index].clone(),
                    interval,
                    "Worker terminated before producing a result".to_string(),
                )
            }));
        }
        results.sort_by(|a, b| b.final_total_savings().cmp(&a.final_total_savings()));

        let failures = results.iter().filter(|result| result.error.is_some()).count();
        if failures > 0 {
            warn!(
                "Backtesting completed with {} failure{}",
                failures,
                if failures == 1 { "" } else { "s" }
            );
        }

        if let Some(sink) = sink {
            if let Err(error) = sink.save(&results) {
                warn!("Failed to save backtest report: {:#}", error);
            }
        }

        Ok(results)
    }
}

/// Synchronous up-front validation; the single wall-clock read happens
/// here. Everything after this point runs on simulated time only.
fn validate_request(request: &BacktestRequest) -> Result<Interval> {
    if request.configs.is_empty() {
        return Err(anyhow!("Configuration list is empty"));
    }
    if request.balance.initial_amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount(request.balance.initial_amount).into());
    }
    if let Some(top_up) = &request.balance.top_up {
        if top_up.amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(top_up.amount).into());
        }
        CronRule::parse(&top_up.rule)?;
    }

    let now = Utc::now();
    let interval = request.interval.limit_by_now(now);
    let (from, to) = interval.bounds().ok_or_else(|| {
        InvalidIntervalError("backtest interval must have a start instant".to_string())
    })?;
    if from > now || to > now {
        return Err(InvalidIntervalError(format!(
            "interval [{} .. {}] must not lie in the future",
            from, to
        ))
        .into());
    }
    if interval.to_days() < dec!(1) {
        return Err(InvalidIntervalError(format!(
            "interval must span at least one day, got {} days",
            interval.to_days()
        ))
        .into());
    }
    Ok(interval)
}
