use ridehub_client::BookingScope;
use ridehub_core::{DriverId, UserId};

use crate::commands::runtime::{self, GlobalOptions};
use crate::commands::CommandResult;

/// Narrows the listing to another actor's bookings. Only admins may use it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScopeFilter {
    pub user: Option<i64>,
    pub driver: Option<i64>,
}

impl ScopeFilter {
    fn scope(&self) -> Option<BookingScope> {
        match (self.user, self.driver) {
            (Some(user), _) => Some(BookingScope::User(UserId(user))),
            (None, Some(driver)) => Some(BookingScope::Driver(DriverId(driver))),
            (None, None) => None,
        }
    }
}

pub fn run(options: &GlobalOptions, filter: ScopeFilter) -> CommandResult {
    runtime::with_service("bookings", options, |context| async move {
        let refreshed = match filter.scope() {
            Some(scope) => context.service.refresh_scope(scope).await,
            None => context.service.refresh().await,
        };
        let snapshot = match refreshed {
            Ok(snapshot) => snapshot,
            Err(error) => {
                return runtime::application_failure("bookings", error, &context.correlation_id)
            }
        };

        let counts = &snapshot.counts;
        let message = format!(
            "{} bookings for {} ({} active, {} completed, {} cancelled)",
            counts.total, snapshot.actor, counts.active, counts.completed, counts.cancelled
        );
        CommandResult::success_with_data("bookings", message, runtime::to_data(&snapshot))
    })
}
