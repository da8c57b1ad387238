use clap::ValueEnum;
use ridehub_core::{BookingId, DriverId};

use crate::commands::runtime::{self, GlobalOptions, EXIT_CONFIG};
use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ActionKind {
    AssignDriver,
    StartTrip,
    CompleteTrip,
    Cancel,
    Pay,
    Review,
}

impl ActionKind {
    fn label(&self) -> &'static str {
        match self {
            Self::AssignDriver => "assign-driver",
            Self::StartTrip => "start-trip",
            Self::CompleteTrip => "complete-trip",
            Self::Cancel => "cancel",
            Self::Pay => "pay",
            Self::Review => "review",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ActionArgs {
    pub kind: ActionKind,
    pub booking: i64,
    pub driver: Option<i64>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

pub fn run(options: &GlobalOptions, args: ActionArgs) -> CommandResult {
    if let Some(missing) = missing_argument(&args) {
        return CommandResult::failure(
            "action",
            "invalid_arguments",
            format!("`{}` requires {missing}", args.kind.label()),
            EXIT_CONFIG,
        );
    }

    runtime::with_service("action", options, |context| async move {
        let booking_id = BookingId(args.booking);
        let service = &context.service;
        let outcome = match args.kind {
            ActionKind::AssignDriver => {
                let driver = DriverId(args.driver.unwrap_or_default());
                service.assign_driver(booking_id, driver).await
            }
            ActionKind::StartTrip => service.start_trip(booking_id).await,
            ActionKind::CompleteTrip => service.complete_trip(booking_id).await,
            ActionKind::Cancel => service.cancel(booking_id).await,
            ActionKind::Pay => service.confirm_payment(booking_id).await,
            ActionKind::Review => {
                let rating = args.rating.unwrap_or_default();
                let comment = args.comment.unwrap_or_default();
                service.submit_review(booking_id, rating, comment).await
            }
        };

        match outcome {
            Ok(snapshot) => CommandResult::success_with_data(
                "action",
                format!("{} succeeded for booking {booking_id}", args.kind.label()),
                runtime::to_data(&snapshot),
            ),
            Err(error) => runtime::application_failure("action", error, &context.correlation_id),
        }
    })
}

fn missing_argument(args: &ActionArgs) -> Option<&'static str> {
    match args.kind {
        ActionKind::AssignDriver if args.driver.is_none() => Some("--driver"),
        ActionKind::Review if args.rating.is_none() => Some("--rating"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{missing_argument, ActionArgs, ActionKind};

    fn args(kind: ActionKind) -> ActionArgs {
        ActionArgs { kind, booking: 1, driver: None, rating: None, comment: None }
    }

    #[test]
    fn assign_and_review_need_their_extra_arguments() {
        assert_eq!(missing_argument(&args(ActionKind::AssignDriver)), Some("--driver"));
        assert_eq!(missing_argument(&args(ActionKind::Review)), Some("--rating"));
        assert_eq!(missing_argument(&args(ActionKind::Pay)), None);
    }
}
