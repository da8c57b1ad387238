use ridehub_core::{
    compute_financials, driver_earnings, monthly_breakdown, Booking, BucketField, DriverId,
};
use serde_json::json;

use crate::commands::runtime::{self, GlobalOptions};
use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, Default)]
pub struct FinancialsArgs {
    pub driver: Option<i64>,
    pub bucket: Option<BucketField>,
    pub monthly: bool,
}

pub fn run(options: &GlobalOptions, args: FinancialsArgs) -> CommandResult {
    runtime::with_service("financials", options, |context| async move {
        let snapshot = match context.service.refresh().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                return runtime::application_failure("financials", error, &context.correlation_id)
            }
        };

        let rate = snapshot.commission_rate;
        let bookings = snapshot.bookings();
        let totals = compute_financials(&bookings, rate);

        let mut data = json!({
            "commission_rate": rate.value(),
            "totals": totals,
        });

        if args.monthly {
            let bucket = args.bucket.unwrap_or(context.config.finance.revenue_bucket);
            data["bucket"] = json!(bucket);
            data["monthly"] = json!(monthly_breakdown(&bookings, rate, bucket));
        }

        if let Some(driver) = args.driver.map(DriverId) {
            let own: Vec<Booking> =
                bookings.iter().filter(|booking| booking.is_assigned_to(driver)).cloned().collect();
            let bucket = args.bucket.unwrap_or(context.config.finance.earnings_bucket);
            data["driver"] = json!({
                "driver_id": driver,
                "earnings": driver_earnings(&bookings, driver, rate),
                "bucket": bucket,
                "monthly": monthly_breakdown(&own, rate, bucket),
            });
        }

        let message = format!(
            "revenue {} / driver commission {} at {rate} / net {}",
            totals.total_revenue, totals.driver_commission, totals.net_revenue
        );
        CommandResult::success_with_data("financials", message, Some(data))
    })
}
