use crate::client::SalesApi;
use crate::error::LoadError;
use crate::types::YearlyTotal;
use tracing::{error, info};

/// Bar series of total sales per year, in the order the API lists years.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSeries {
    pub totals: Vec<YearlyTotal>,
}

impl ChartSeries {
    pub const TITLE: &'static str = "Car Sales by Year";
    pub const LABEL: &'static str = "Annual Sales";

    pub fn years(&self) -> Vec<i32> {
        self.totals.iter().map(|t| t.year).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.totals.iter().map(|t| t.total).collect()
    }

    pub fn max_total(&self) -> f64 {
        self.totals.iter().map(|t| t.total).fold(0.0, f64::max)
    }
}

/// Fetches every year's rows one request at a time and sums them. Any failed request
/// fails the whole series.
pub async fn yearly_totals<A: SalesApi>(api: &A) -> Result<ChartSeries, LoadError> {
    let years = api
        .list_years()
        .await
        .map_err(LoadError::new("years", None))?;

    let mut totals = Vec::with_capacity(years.len());
    for year in years {
        let records = api
            .list_sales(year)
            .await
            .map_err(LoadError::new("sales rows", Some(year)))?;
        let total = records.iter().map(|r| r.sales_value()).sum();
        totals.push(YearlyTotal { year, total });
    }

    Ok(ChartSeries { totals })
}

/// Builds the series for one page load, logging instead of returning a failure.
pub async fn load_chart<A: SalesApi>(api: &A) -> Option<ChartSeries> {
    match yearly_totals(api).await {
        Ok(series) => {
            info!(years = ?series.years(), totals = ?series.values(), "chart data loaded");
            Some(series)
        }
        Err(err) => {
            error!(error = %err, "chart build abandoned");
            None
        }
    }
}
