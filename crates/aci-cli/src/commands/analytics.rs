// Usage analytics command

use aci_core::analytics::{DistributionDatapoint, TimeSeriesDatapoint};
use anyhow::{Context as _, Result};
use clap::ValueEnum;

use super::Context;
use crate::output::{print_table_header, print_table_row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UsageBy {
    App,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UsageView {
    /// Share of calls per app or function
    Distribution,
    /// Calls per day
    Timeseries,
}

pub async fn run(ctx: &Context, by: UsageBy, view: UsageView) -> Result<()> {
    let api_key = ctx.api_key()?;
    match view {
        UsageView::Distribution => {
            let data = match by {
                UsageBy::App => ctx.client.app_usage_distribution(api_key).await,
                UsageBy::Function => ctx.client.function_usage_distribution(api_key).await,
            }
            .context("Failed to fetch usage distribution")?;
            if ctx.output.is_text() {
                print_distribution(&data);
            } else {
                ctx.output.print_value(&data)?;
            }
        }
        UsageView::Timeseries => {
            let data = match by {
                UsageBy::App => ctx.client.app_usage_timeseries(api_key).await,
                UsageBy::Function => ctx.client.function_usage_timeseries(api_key).await,
            }
            .context("Failed to fetch usage timeseries")?;
            if ctx.output.is_text() {
                print_timeseries(&data);
            } else {
                ctx.output.print_value(&data)?;
            }
        }
    }
    Ok(())
}

fn print_distribution(data: &[DistributionDatapoint]) {
    if data.is_empty() {
        println!("No usage recorded");
        return;
    }
    let total: f64 = data.iter().map(|d| d.value).sum();
    print_table_header(&[("NAME", 40), ("CALLS", 10), ("SHARE", 6)]);
    for point in data {
        let share = if total > 0.0 {
            format!("{:.1}%", point.value / total * 100.0)
        } else {
            "-".to_string()
        };
        print_table_row(&[(&point.name, 40), (&point.value.to_string(), 10), (&share, 6)]);
    }
}

fn print_timeseries(data: &[TimeSeriesDatapoint]) {
    if data.is_empty() {
        println!("No usage recorded");
        return;
    }
    print_table_header(&[("DATE", 12), ("CALLS", 10), ("TOP", 40)]);
    for point in data {
        let top = point
            .values
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| name.as_str())
            .unwrap_or("-");
        print_table_row(&[(&point.date, 12), (&point.total().to_string(), 10), (top, 40)]);
    }
}
