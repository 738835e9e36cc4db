//! Display and printing utilities

use chrono::Utc;
use tracing::{error, info, warn};
use crate::{
    arbitrage::SessionStats,
    types::{ArbitrageOpportunity, ExecutionOutcome, ExecutionReport, TradingSession},
};

pub fn print_session_stats(session: &TradingSession, stats: &SessionStats) {
    let runtime = (Utc::now() - session.start_time).num_minutes();

    info!("\n📊 Session Statistics ({} minutes)", runtime);
    info!("   🔁 CYCLES:");
    info!("     Completed: {}", stats.cycles);
    info!("     Skipped ticks: {}", stats.skipped_ticks);
    info!("   📈 ARBITRAGE:");
    info!("     Opportunities: {}", stats.opportunities);
    info!("     Confirmed swaps: {}", stats.swaps);
    info!("     Failed attempts: {}", stats.failed_attempts);
    info!("     Abandoned legs: {}", stats.abandoned_legs);
    info!("     Realized profit: {}", stats.realized_profit);
    info!("");
}

pub fn print_opportunity(opportunity: &ArbitrageOpportunity) {
    warn!("\n🎯 ARBITRAGE OPPORTUNITY #{}", opportunity.id);
    warn!("📋 Buy on {} → Sell on {}", opportunity.buy_venue, opportunity.sell_venue);
    warn!("💰 Spread Analysis:");
    warn!("   Buy price:  {:.6} {}", opportunity.buy_price, opportunity.token_out);
    warn!("   Sell price: {:.6} {}", opportunity.sell_price, opportunity.token_out);
    warn!("   Spread: {:.4}%", opportunity.percentage_difference);
    warn!("   Trading: {} {}", opportunity.initial_balance, opportunity.token_in);
    warn!("   Expected profit: {:.6} {}", opportunity.expected_profit, opportunity.token_in);
    warn!("   Starting slippage: {}%", opportunity.slippage);
}

pub fn print_execution_report(report: &ExecutionReport) {
    match &report.outcome {
        ExecutionOutcome::Succeeded(transaction) => {
            warn!("\n✅ SWAP {} on {}", report.tokens, report.venue);
            warn!("   Tx: {}", transaction.link);
            warn!("   Amount in: {}", transaction.amount);
            if let Some(balance) = transaction.balance {
                warn!("   {} balance: {}", report.tokens.token_out, balance);
            }
            warn!("   Attempts: {} (final slippage {}%)", report.attempts, report.final_slippage);
        }
        ExecutionOutcome::Abandoned(reason) => {
            error!("\n🛑 SWAP {} ABANDONED on {}", report.tokens, report.venue);
            error!("   Reason: {}", reason);
            error!(
                "   Attempts: {} ({} failed, last slippage {}%)",
                report.attempts,
                report.failed_attempts(),
                report.final_slippage
            );
        }
    }
}
